//! Props bag: ordered values, children, event handlers, injected state.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::node::Tree;
use crate::component::state::StateContainer;
use crate::error::{CoherentError, Result};
use crate::hydrate::EventContext;

/// Event handler stored under an `on<Event>` prop.
///
/// Handlers only exist in the process that built the tree. They are never
/// serialized into markup; the hydration engine binds them to DOM listeners.
pub type Handler = Arc<dyn Fn(&mut EventContext<'_>) + Send + Sync>;

/// Prop names with a meaning of their own; never emitted as attributes.
pub(crate) const RESERVED_PROPS: &[&str] = &["children", "text", "html", "key"];

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

/// The value half of a node: attributes, content, children, and handlers.
///
/// Values keep insertion order; setting an existing key replaces it in place.
#[derive(Clone, Default)]
pub struct Props {
    values: Vec<(String, Value)>,
    children: Vec<Tree>,
    handlers: Vec<(String, Handler)>,
    state: Option<StateContainer>,
}

impl Props {
    /// Create an empty props bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value (builder).
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a value in place, replacing any existing value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        for (existing, slot) in self.values.iter_mut() {
            if *existing == key {
                *slot = value;
                return;
            }
        }
        self.values.push((key, value));
    }

    /// Remove a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.values.iter().position(|(k, _)| k == key)?;
        Some(self.values.remove(pos).1)
    }

    /// Escaped text content (builder).
    pub fn text(self, text: impl Into<String>) -> Self {
        self.set("text", text.into())
    }

    /// Raw, trusted HTML content (builder).
    pub fn html(self, html: impl Into<String>) -> Self {
        self.set("html", html.into())
    }

    /// `class` attribute (builder).
    pub fn class(self, class: impl Into<String>) -> Self {
        self.set("class", class.into())
    }

    /// `id` attribute (builder).
    pub fn id(self, id: impl Into<String>) -> Self {
        self.set("id", id.into())
    }

    /// Stable list identity (builder).
    pub fn key(self, key: impl Into<String>) -> Self {
        self.set("key", key.into())
    }

    /// Append one child (builder).
    pub fn child(mut self, child: impl Into<Tree>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children (builder).
    pub fn children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tree>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Attach an event handler (builder).
    ///
    /// Accepts either the bare event type (`"click"`) or the prop spelling
    /// (`"onClick"`).
    pub fn on<F>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        self.insert_handler(event, Arc::new(handler));
        self
    }

    /// Attach an already shared handler, replacing one for the same event.
    pub fn insert_handler(&mut self, event: &str, handler: Handler) {
        let event = event_type(event);
        if let Some(slot) = self.handlers.iter_mut().find(|(e, _)| *e == event) {
            slot.1 = handler;
        } else {
            self.handlers.push((event, handler));
        }
    }

    /// Inject a state container (used by the state decorator).
    pub fn with_state(mut self, state: StateContainer) -> Self {
        self.state = Some(state);
        self
    }

    // -- accessors ----------------------------------------------------------

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Look up an integer value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Look up a boolean value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Whether a value is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Children as given (not yet flattened or filtered).
    pub fn children_ref(&self) -> &[Tree] {
        &self.children
    }

    /// Handlers keyed by event type.
    pub fn handlers(&self) -> &[(String, Handler)] {
        &self.handlers
    }

    /// The injected state container, if a state decorator supplied one.
    pub fn state(&self) -> Option<&StateContainer> {
        self.state.as_ref()
    }

    /// Read one key from the injected state.
    pub fn state_value(&self, key: &str) -> Option<Value> {
        self.state.as_ref().and_then(|s| s.get_key(key))
    }

    // -- JSON ---------------------------------------------------------------

    /// Serialize the data values only (not children, handlers, or state).
    pub fn values_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }

    /// Serialize values and children into the form read by [`Props::from_json`].
    ///
    /// Handlers, component nodes and context providers have no JSON form and
    /// are reported as structure errors. Injected state is not included.
    pub fn to_json(&self) -> Result<Value> {
        self.to_json_at("$")
    }

    pub(crate) fn to_json_at(&self, path: &str) -> Result<Value> {
        if let Some((event, _)) = self.handlers.first() {
            return Err(CoherentError::structure(
                path,
                format!("the `{event}` handler cannot be serialized"),
            ));
        }
        let mut map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !self.children.is_empty() {
            let children = self
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| child.to_json_at(&format!("{path}.children[{i}]")))
                .collect::<Result<Vec<_>>>()?;
            map.insert("children".to_owned(), Value::Array(children));
        }
        Ok(Value::Object(map))
    }

    /// Build props from a JSON object. A `children` entry becomes child trees.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(CoherentError::structure(
                "$",
                format!("props must be an object, got {}", kind_of(value)),
            ));
        };
        let mut props = Props::new();
        for (key, value) in map {
            if key == "children" {
                match Tree::from_json(value)? {
                    Tree::List(items) => props.children = items,
                    single => props.children.push(single),
                }
            } else {
                props.values.push((key.clone(), value.clone()));
            }
        }
        Ok(props)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<&str> = self.handlers.iter().map(|(e, _)| e.as_str()).collect();
        f.debug_struct("Props")
            .field("values", &self.values)
            .field("children", &self.children.len())
            .field("handlers", &handlers)
            .field("state", &self.state.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Normalize `onClick` / `click` to `click`.
pub(crate) fn event_type(name: &str) -> String {
    let bytes = name.as_bytes();
    if bytes.len() > 2 && name.starts_with("on") && bytes[2].is_ascii_uppercase() {
        name[2..].to_ascii_lowercase()
    } else {
        name.to_ascii_lowercase()
    }
}

/// Format a JSON number the way authors expect to read it (`5`, not `5.0`).
pub(crate) fn display_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Display form of a scalar value; `None` for null, objects, and arrays.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(display_number(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_replaces_in_place() {
        let props = Props::new().set("a", 1).set("b", 2).set("a", 3);
        let keys: Vec<&str> = props.values().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(props.get_i64("a"), Some(3));
    }

    #[test]
    fn builder_shortcuts() {
        let props = Props::new().class("btn").id("save").text("Save").key("k1");
        assert_eq!(props.get_str("class"), Some("btn"));
        assert_eq!(props.get_str("id"), Some("save"));
        assert_eq!(props.get_str("text"), Some("Save"));
        assert_eq!(props.get_str("key"), Some("k1"));
    }

    #[test]
    fn handler_names_are_normalized() {
        let props = Props::new().on("onClick", |_| {}).on("input", |_| {});
        let events: Vec<&str> = props.handlers().iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(events, vec!["click", "input"]);
    }

    #[test]
    fn handler_for_same_event_is_replaced() {
        let props = Props::new().on("click", |_| {}).on("onClick", |_| {});
        assert_eq!(props.handlers().len(), 1);
    }

    #[test]
    fn remove_value() {
        let mut props = Props::new().set("x", "y");
        assert_eq!(props.remove("x"), Some(json!("y")));
        assert!(props.remove("x").is_none());
    }

    #[test]
    fn to_json_keeps_children() {
        let props = Props::new()
            .set("count", 2)
            .set("tags", json!(["a", "b"]))
            .child("hello")
            .child(Tree::element("em", Props::new().text("x")));
        let value = props.to_json().unwrap();
        assert_eq!(
            value,
            json!({
                "count": 2,
                "tags": ["a", "b"],
                "children": ["hello", { "em": { "text": "x" } }],
            })
        );
        let back = Props::from_json(&value).unwrap();
        assert_eq!(back.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(back.children_ref().len(), 2);
        assert_eq!(back.to_json().unwrap(), value);
    }

    #[test]
    fn to_json_rejects_handlers() {
        let props = Props::new().child(Tree::element("button", Props::new().on("click", |_| {})));
        let err = props.to_json().unwrap_err();
        assert!(matches!(err, CoherentError::Structure { ref path, .. } if path == "$.children[0].button"));
        assert_eq!(Props::new().on("click", |_| {}).values_json(), json!({}));
    }

    #[test]
    fn from_json_splits_children() {
        let props = Props::from_json(&json!({
            "class": "list",
            "children": [{ "li": { "text": "a" } }, "b"]
        }))
        .unwrap();
        assert_eq!(props.get_str("class"), Some("list"));
        assert_eq!(props.children_ref().len(), 2);
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(Props::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn display_number_drops_trailing_zero() {
        assert_eq!(display_number(&Number::from_f64(5.0).unwrap()), "5");
        assert_eq!(display_number(&Number::from_f64(2.5).unwrap()), "2.5");
        assert_eq!(display_number(&Number::from(-3)), "-3");
    }

    #[test]
    fn scalar_text_of_values() {
        assert_eq!(scalar_text(&json!("x")), Some("x".into()));
        assert_eq!(scalar_text(&json!(true)), Some("true".into()));
        assert_eq!(scalar_text(&json!(null)), None);
        assert_eq!(scalar_text(&json!({})), None);
    }
}
