//! Pilot: drive a hydrated component the way a user would.
//!
//! The `Pilot` renders a component on the "server", parses the markup into a
//! [`Document`], hydrates it, and then offers selector-based helpers to
//! click, type, and read text.

use serde_json::Value;

use crate::component::Component;
use crate::dom::{Document, DomEvent, NodeId};
use crate::error::{CoherentError, Result};
use crate::hydrate::{hydrate_with, HydrateOptions, HydratedInstance};
use crate::tree::Props;

use super::snapshot::server_document;

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A hydrated component plus its document.
///
/// # Examples
///
/// ```ignore
/// use coherent::testing::Pilot;
///
/// let pilot = Pilot::mount(&counter, Props::new(), HydrateOptions::new())?;
/// pilot.click("button")?;
/// assert_eq!(pilot.text("[data-ref=count]")?, "1");
/// ```
pub struct Pilot {
    document: Document,
    instance: HydratedInstance,
}

impl Pilot {
    /// Render `component` with `props`, parse the output, and hydrate it.
    pub fn mount(component: &Component, props: Props, options: HydrateOptions) -> Result<Self> {
        let (document, root) = server_document(&component.node(props.clone()))?;
        let instance = hydrate_with(&document, root, component, props, options)?;
        Ok(Self { document, instance })
    }

    /// Hydrate markup that was produced elsewhere.
    pub fn hydrate_markup(
        html: &str,
        component: &Component,
        props: Props,
        options: HydrateOptions,
    ) -> Result<Self> {
        let document = Document::parse(html)?;
        let root = document
            .element_children(document.root())
            .first()
            .copied()
            .ok_or_else(|| CoherentError::Usage("markup contains no element".into()))?;
        let instance = hydrate_with(&document, root, component, props, options)?;
        Ok(Self { document, instance })
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// First node matching `selector`.
    pub fn find(&self, selector: &str) -> Result<NodeId> {
        self.document
            .query_selector(selector)?
            .ok_or_else(|| CoherentError::Usage(format!("nothing matches `{selector}`")))
    }

    /// Every node matching `selector`.
    pub fn find_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.document.query_selector_all(selector)
    }

    // ── Input simulation ─────────────────────────────────────────────

    /// Click the first match of `selector`.
    pub fn click(&self, selector: &str) -> Result<DomEvent> {
        Ok(self.document.click(self.find(selector)?))
    }

    /// Type `value` into the first match of `selector`, firing `input`.
    pub fn type_text(&self, selector: &str, value: &str) -> Result<DomEvent> {
        Ok(self.document.input(self.find(selector)?, value))
    }

    pub fn focus(&self, selector: &str) -> Result<()> {
        self.document.focus(self.find(selector)?);
        Ok(())
    }

    pub fn blur(&self) {
        self.document.blur();
    }

    /// Fire an arbitrary event at the first match of `selector`.
    pub fn fire(&self, selector: &str, event_type: &str) -> Result<DomEvent> {
        Ok(self.document.fire(self.find(selector)?, event_type))
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// Text content of the first match of `selector`.
    pub fn text(&self, selector: &str) -> Result<String> {
        Ok(self.document.text_content(self.find(selector)?))
    }

    /// Current form value of the first match of `selector`.
    pub fn value(&self, selector: &str) -> Result<String> {
        Ok(self.document.value(self.find(selector)?))
    }

    /// Markup of the instance root.
    pub fn html(&self) -> String {
        self.document.outer_html(self.instance.element())
    }

    pub fn state(&self) -> Value {
        self.instance.get_state()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn instance(&self) -> &HydratedInstance {
        &self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn echo() -> Component {
        Component::function("Echo", |_, _| {
            Ok(Tree::element(
                "label",
                Props::new()
                    .child(Tree::element("input", Props::new().set("data-bind", "text").set("value", "")))
                    .child(Tree::element("output", Props::new().set("data-ref", "text"))),
            ))
        })
    }

    #[test]
    fn typing_updates_bound_state_and_refs() {
        let pilot = Pilot::mount(&echo(), Props::new(), HydrateOptions::new()).unwrap();
        pilot.type_text("input", "hello").unwrap();
        assert_eq!(pilot.state(), json!({ "text": "hello" }));
        assert_eq!(pilot.text("output").unwrap(), "hello");
        assert_eq!(
            pilot.html(),
            "<label><input data-bind=\"text\" value><output data-ref=\"text\">hello</output></label>"
        );
    }

    #[test]
    fn missing_selector_is_a_usage_error() {
        let pilot = Pilot::mount(&echo(), Props::new(), HydrateOptions::new()).unwrap();
        assert!(matches!(pilot.click("button"), Err(CoherentError::Usage(_))));
        assert!(matches!(pilot.text("[broken"), Err(CoherentError::Selector { .. })));
    }

    #[test]
    fn hydrate_markup_records_mismatches() {
        let pilot = Pilot::hydrate_markup(
            "<label><span></span><output></output></label>",
            &echo(),
            Props::new(),
            HydrateOptions::new(),
        )
        .unwrap();
        assert_eq!(pilot.instance().mismatches().len(), 1);
        assert_eq!(pilot.find_all("input").unwrap().len(), 1);
    }
}
