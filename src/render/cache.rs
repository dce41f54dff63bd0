//! Render cache: structural keys, LRU eviction, TTL expiry.
//!
//! Keys hash the normalized tree, so inputs that normalize alike share an
//! entry. Structure and values are hashed, never object identity, except for
//! components, which are identified by name and implementation address.
//! Recency is tracked with a monotonic counter under the map's lock, so LRU
//! order stays consistent when renders interleave.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::options::RenderOptions;
use crate::tree::{Inner, NodeKey, Props, Tree, VNode};

/// Default number of cached documents.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default time to live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Salt for the second hash stored in every key.
const CHECK_SALT: u64 = 0x636f_6865_7265_6e74;

/// Structural hash identifying one render input.
///
/// Two independent hashes are kept; entries match only when both agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: u64,
    check: u64,
}

impl CacheKey {
    /// Hash `(normalized nodes, options, loaded css)`.
    pub fn compute(nodes: &[VNode], options: &RenderOptions, css: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        let mut checker = DefaultHasher::new();
        CHECK_SALT.hash(&mut checker);
        for h in [&mut hasher, &mut checker] {
            nodes.len().hash(h);
            for node in nodes {
                hash_vnode(node, h);
            }
            options.hash(h);
            css.hash(h);
        }
        Self {
            hash: hasher.finish(),
            check: checker.finish(),
        }
    }

    /// The primary hash value.
    pub fn value(self) -> u64 {
        self.hash
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters since the cache was created (or last cleared).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ---------------------------------------------------------------------------
// RenderCache
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    markup: String,
    inserted_at: Instant,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Entry>,
    tick: u64,
    stats: CacheStats,
}

impl CacheInner {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Thread-safe LRU cache of rendered markup.
#[derive(Debug)]
pub struct RenderCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, Some(DEFAULT_TTL))
    }
}

impl RenderCache {
    /// Cache holding at most `capacity` documents, each for at most `ttl`.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity,
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, entry: &Entry) -> bool {
        self.ttl.is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }

    /// Look up `key`, promoting it to most recently used.
    pub fn get(&self, key: CacheKey) -> Option<String> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(&key) {
            Some(entry) => self.expired(entry),
            None => {
                inner.stats.misses += 1;
                return None;
            }
        };
        if expired {
            inner.entries.remove(&key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            return None;
        }
        let tick = inner.touch();
        inner.stats.hits += 1;
        let entry = inner.entries.get_mut(&key)?;
        entry.last_used = tick;
        Some(entry.markup.clone())
    }

    /// Whether a fresh entry exists. Does not affect recency or stats.
    pub fn contains(&self, key: CacheKey) -> bool {
        self.lock()
            .entries
            .get(&key)
            .is_some_and(|entry| !self.expired(entry))
    }

    /// Store `markup`, evicting the least recently used entry at capacity.
    pub fn insert(&self, key: CacheKey, markup: String) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let lru = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| *k);
            if let Some(lru) = lru {
                inner.entries.remove(&lru);
                inner.stats.evictions += 1;
                tracing::trace!(key = lru.hash, "evicted least recently used render");
            }
        }
        let tick = inner.touch();
        inner.entries.insert(
            key,
            Entry {
                markup,
                inserted_at: Instant::now(),
                last_used: tick,
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !self.expired(entry));
        let removed = before - inner.entries.len();
        inner.stats.expirations += removed as u64;
        removed
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats = CacheStats::default();
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.entries.len(),
            capacity: self.capacity,
            ..inner.stats
        }
    }
}

// ---------------------------------------------------------------------------
// Structural hashing
// ---------------------------------------------------------------------------

fn hash_tree<H: Hasher>(tree: &Tree, h: &mut H) {
    match tree {
        Tree::Empty => 0u8.hash(h),
        Tree::Bool(b) => (1u8, b).hash(h),
        Tree::Text(s) => (2u8, s).hash(h),
        Tree::Number(n) => (3u8, n.to_string()).hash(h),
        Tree::List(items) => {
            (4u8, items.len()).hash(h);
            for item in items {
                hash_tree(item, h);
            }
        }
        Tree::Node(entries) => {
            (5u8, entries.len()).hash(h);
            for (key, props) in entries {
                hash_node_key(key, h);
                hash_props(props, h);
            }
        }
        Tree::Resolved(nodes) => {
            (6u8, nodes.len()).hash(h);
            for node in nodes {
                hash_vnode(node, h);
            }
        }
    }
}

fn hash_node_key<H: Hasher>(key: &NodeKey, h: &mut H) {
    match key {
        NodeKey::Tag(tag) => (0u8, tag).hash(h),
        NodeKey::Component(c) => (1u8, c.name(), c.identity()).hash(h),
        NodeKey::Provider { key, value } => {
            (2u8, key).hash(h);
            hash_value(value, h);
        }
    }
}

fn hash_props<H: Hasher>(props: &Props, h: &mut H) {
    for (name, value) in props.values() {
        name.hash(h);
        hash_value(value, h);
    }
    props.children_ref().len().hash(h);
    for child in props.children_ref() {
        hash_tree(child, h);
    }
    for (event, _) in props.handlers() {
        event.hash(h);
    }
    if let Some(state) = props.state() {
        hash_value(&state.get(), h);
    }
}

fn hash_vnode<H: Hasher>(node: &VNode, h: &mut H) {
    match node {
        VNode::Text(text) => (0u8, text).hash(h),
        VNode::Element(el) => {
            (1u8, &el.tag, &el.key, el.attrs.len()).hash(h);
            for (name, value) in &el.attrs {
                name.hash(h);
                hash_value(value, h);
            }
            match &el.inner {
                Some(Inner::Text(t)) => (1u8, t).hash(h),
                Some(Inner::Html(t)) => (2u8, t).hash(h),
                None => 0u8.hash(h),
            }
            for (event, _) in &el.handlers {
                event.hash(h);
            }
            el.children.len().hash(h);
            for child in &el.children {
                hash_vnode(child, h);
            }
        }
        VNode::Component { component, props } => {
            (2u8, component.name(), component.identity()).hash(h);
            hash_props(props, h);
        }
        VNode::Provider {
            key,
            value,
            children,
        } => {
            (3u8, key).hash(h);
            hash_value(value, h);
            for child in children {
                hash_vnode(child, h);
            }
        }
    }
}

fn hash_value<H: Hasher>(value: &Value, h: &mut H) {
    match value {
        Value::Null => 0u8.hash(h),
        Value::Bool(b) => (1u8, b).hash(h),
        Value::Number(n) => (2u8, n.to_string()).hash(h),
        Value::String(s) => (3u8, s).hash(h),
        Value::Array(items) => {
            (4u8, items.len()).hash(h);
            for item in items {
                hash_value(item, h);
            }
        }
        Value::Object(map) => {
            (5u8, map.len()).hash(h);
            for (k, v) in map {
                k.hash(h);
                hash_value(v, h);
            }
        }
    }
}
