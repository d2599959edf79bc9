//! Document capability
//!
//! The matcher never talks to a concrete DOM. The browser binding implements
//! [`Document`] over `web-sys`, the `memdom` feature implements it over a
//! parsed HTML tree.

use std::fmt;

/// DOM-level failure reported by a [`Document`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
    #[error("Invalid XPath expression: {0}")]
    InvalidXPath(String),
    #[error("Style computation failed: {0}")]
    Style(String),
    #[error("Document unavailable: {0}")]
    Unavailable(String),
}

/// The operations the selector engine needs from a live document.
pub trait Document {
    /// Element handle. Equality is node identity.
    type Node: Clone + PartialEq + fmt::Debug;

    /// `document.querySelectorAll(selector)` in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Node>, DomError>;

    /// Every element currently attached to the document.
    fn all_elements(&self) -> Result<Vec<Self::Node>, DomError>;

    /// `element.matches(selector)`.
    fn matches(&self, node: &Self::Node, selector: &str) -> Result<bool, DomError>;

    /// `element.textContent`, empty when absent.
    fn text_content(&self, node: &Self::Node) -> String;

    /// `ancestor.contains(node)`; a node contains itself.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;

    /// Whether the node is an HTML element (has inline style / computed style).
    fn is_html_element(&self, node: &Self::Node) -> bool;

    fn click(&self, node: &Self::Node);

    /// Detach the node from the document.
    fn remove(&self, node: &Self::Node);

    /// Evaluate an XPath expression against the document root, returning
    /// element results as an ordered snapshot.
    fn evaluate_xpath(&self, expression: &str) -> Result<Vec<Self::Node>, DomError>;

    /// Create a hidden element styled with `css_text` and attach it so its
    /// style gets computed.
    fn attach_style_probe(&self, css_text: &str) -> Result<Self::Node, DomError>;

    fn detach_style_probe(&self, probe: &Self::Node);

    /// Computed value of `property` on `node`, trimmed.
    fn computed_style(&self, node: &Self::Node, property: &str) -> Result<String, DomError>;
}

/// Style probe attached for the lifetime of the guard.
pub struct StyleProbe<'d, D: Document + ?Sized> {
    doc: &'d D,
    node: D::Node,
}

impl<'d, D: Document + ?Sized> StyleProbe<'d, D> {
    pub fn attach(doc: &'d D, css_text: &str) -> Result<Self, DomError> {
        let node = doc.attach_style_probe(css_text)?;
        Ok(Self { doc, node })
    }

    pub fn node(&self) -> &D::Node {
        &self.node
    }
}

impl<D: Document + ?Sized> Drop for StyleProbe<'_, D> {
    fn drop(&mut self) {
        self.doc.detach_style_probe(&self.node);
    }
}
