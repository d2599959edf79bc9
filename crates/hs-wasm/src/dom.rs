//! `Document` over the live page

use hs_core::dom::{Document, DomError};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlElement, XPathResult};

fn js_reason(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

pub struct BrowserDocument {
    window: web_sys::Window,
    document: web_sys::Document,
}

impl BrowserDocument {
    /// The document of the current window.
    pub fn current() -> Result<Self, DomError> {
        let window = web_sys::window().ok_or_else(|| DomError::Unavailable("no window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| DomError::Unavailable("window has no document".to_string()))?;
        Ok(Self { window, document })
    }
}

impl Document for BrowserDocument {
    type Node = Element;

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, DomError> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|e| DomError::InvalidSelector(format!("{selector}: {}", js_reason(&e))))?;
        Ok((0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect())
    }

    fn all_elements(&self) -> Result<Vec<Element>, DomError> {
        let all = self.document.get_elements_by_tag_name("*");
        Ok((0..all.length()).filter_map(|i| all.item(i)).collect())
    }

    fn matches(&self, node: &Element, selector: &str) -> Result<bool, DomError> {
        node.matches(selector)
            .map_err(|e| DomError::InvalidSelector(format!("{selector}: {}", js_reason(&e))))
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn contains(&self, ancestor: &Element, node: &Element) -> bool {
        ancestor.contains(Some(node))
    }

    fn is_html_element(&self, node: &Element) -> bool {
        node.is_instance_of::<HtmlElement>()
    }

    fn click(&self, node: &Element) {
        if let Some(el) = node.dyn_ref::<HtmlElement>() {
            el.click();
        }
    }

    fn remove(&self, node: &Element) {
        node.remove();
    }

    fn evaluate_xpath(&self, expression: &str) -> Result<Vec<Element>, DomError> {
        let invalid = |e: JsValue| DomError::InvalidXPath(format!("{expression}: {}", js_reason(&e)));
        let result = self
            .document
            .evaluate_with_opt_callback_and_type(expression, &self.document, None, XPathResult::ORDERED_NODE_SNAPSHOT_TYPE)
            .map_err(invalid)?;

        let length = result.snapshot_length().map_err(invalid)?;
        let mut elements = Vec::with_capacity(length as usize);
        for i in 0..length {
            if let Some(el) = result.snapshot_item(i).map_err(invalid)?.and_then(|n| n.dyn_into::<Element>().ok()) {
                elements.push(el);
            }
        }
        Ok(elements)
    }

    fn attach_style_probe(&self, css_text: &str) -> Result<Element, DomError> {
        let style_err = |e: JsValue| DomError::Style(js_reason(&e));
        let probe = self.document.create_element("section").map_err(style_err)?;
        probe.set_attribute("style", css_text).map_err(style_err)?;

        let root = self
            .document
            .document_element()
            .ok_or_else(|| DomError::Unavailable("document has no root element".to_string()))?;
        root.append_child(&probe).map_err(style_err)?;
        Ok(probe)
    }

    fn detach_style_probe(&self, probe: &Element) {
        probe.remove();
    }

    fn computed_style(&self, node: &Element, property: &str) -> Result<String, DomError> {
        let style = self
            .window
            .get_computed_style(node)
            .map_err(|e| DomError::Style(js_reason(&e)))?
            .ok_or_else(|| DomError::Style("no computed style".to_string()))?;
        style
            .get_property_value(property.trim())
            .map(|value| value.trim().to_string())
            .map_err(|e| DomError::Style(js_reason(&e)))
    }
}
