//! StateContainer: a shallow-merged JSON object with change subscribers.
//!
//! Containers are cheap handles (`Arc`) so that props clones, handlers and
//! the hydration engine all observe the same state. Notification runs with
//! the lock released; a `set` issued from inside a subscriber is merged
//! immediately and its changed keys are delivered in a follow-up pass of the
//! outer notification loop instead of recursing.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::error::{CoherentError, Result};
use crate::tree::props::kind_of;

/// Upper bound on follow-up notification passes for one outer `set`.
pub const MAX_NOTIFY_PASSES: usize = 16;

/// Callback receiving the full state and the keys that changed.
pub type Subscriber = Arc<dyn Fn(&Value, &[String]) + Send + Sync>;

/// Identifies a subscription for [`StateContainer::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StateInner {
    value: Map<String, Value>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
    /// Set while the notification loop runs.
    notifying: bool,
    /// Keys changed by re-entrant `set` calls, delivered after the current pass.
    pending: Vec<String>,
}

/// Resets the notification flag even if a subscriber panics.
struct NotifyGuard<'a> {
    container: &'a StateContainer,
}

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.container.lock();
        inner.notifying = false;
        inner.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// StateContainer
// ---------------------------------------------------------------------------

/// Shared, observable state object.
#[derive(Clone, Default)]
pub struct StateContainer {
    inner: Arc<Mutex<StateInner>>,
}

impl StateContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container holding `initial`. Non-object values start empty.
    pub fn from_value(initial: Value) -> Self {
        match initial {
            Value::Object(map) => Self::from_map(map),
            _ => Self::new(),
        }
    }

    /// Create a container holding `map`.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let container = Self::new();
        container.lock().value = map;
        container
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the whole state as a JSON object.
    pub fn get(&self) -> Value {
        Value::Object(self.lock().value.clone())
    }

    /// One key of the state.
    pub fn get_key(&self, key: &str) -> Option<Value> {
        self.lock().value.get(key).cloned()
    }

    /// Shallow-merge `patch` and notify subscribers of the keys whose value
    /// changed. Returns those keys.
    pub fn set(&self, patch: Value) -> Result<Vec<String>> {
        let Value::Object(patch) = patch else {
            return Err(CoherentError::StateUpdate(format!(
                "expected an object, got {}",
                kind_of(&patch)
            )));
        };

        let changed = {
            let mut inner = self.lock();
            let changed = merge(&mut inner.value, patch);
            if changed.is_empty() {
                return Ok(changed);
            }
            if inner.notifying {
                for key in &changed {
                    if !inner.pending.contains(key) {
                        inner.pending.push(key.clone());
                    }
                }
                tracing::trace!(keys = ?changed, "coalescing re-entrant state update");
                return Ok(changed);
            }
            inner.notifying = true;
            changed
        };

        self.notify_loop(changed.clone());
        Ok(changed)
    }

    /// Compute a patch from the current state, then [`set`](Self::set) it.
    pub fn update<F>(&self, updater: F) -> Result<Vec<String>>
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = self.get();
        self.set(updater(&current))
    }

    /// Insert keys from `defaults` that are not present yet. Never notifies.
    pub fn seed(&self, defaults: &Map<String, Value>) {
        let mut inner = self.lock();
        for (key, value) in defaults {
            if !inner.value.contains_key(key) {
                inner.value.insert(key.clone(), value.clone());
            }
        }
    }

    /// Register a subscriber.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&Value, &[String]) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(subscriber)));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Drop every key and every subscriber.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.value.clear();
        inner.subscribers.clear();
        inner.pending.clear();
    }

    /// Whether two handles share the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify_loop(&self, mut keys: Vec<String>) {
        let _guard = NotifyGuard { container: self };
        let mut passes = 0;
        loop {
            let (value, subscribers) = {
                let inner = self.lock();
                let subs: Vec<Subscriber> =
                    inner.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect();
                (Value::Object(inner.value.clone()), subs)
            };
            for subscriber in &subscribers {
                subscriber(&value, &keys);
            }

            passes += 1;
            let mut inner = self.lock();
            if inner.pending.is_empty() {
                return;
            }
            if passes >= MAX_NOTIFY_PASSES {
                tracing::warn!(
                    passes,
                    pending = ?inner.pending,
                    "state updates kept re-triggering; dropping further notifications"
                );
                return;
            }
            keys = std::mem::take(&mut inner.pending);
        }
    }
}

fn merge(target: &mut Map<String, Value>, patch: Map<String, Value>) -> Vec<String> {
    let mut changed = Vec::new();
    for (key, value) in patch {
        if target.get(&key) != Some(&value) {
            changed.push(key.clone());
            target.insert(key, value);
        }
    }
    changed
}

impl fmt::Debug for StateContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("StateContainer")
            .field("value", &inner.value)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}
