//! In-memory document
//!
//! A [`Document`] over a parsed HTML tree. CSS queries go through `scraper`;
//! computed style is the element's inline `style` over a table of UA
//! defaults; XPath supports the location-path subset described in
//! [`xpath`].

mod style;
mod xpath;

use std::cell::{Cell, RefCell};

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use crate::dom::{Document, DomError};

/// Handle to an element of a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemNode {
    Element(NodeId),
    /// Style probe, indexed into the probe registry
    Probe(usize),
}

pub struct MemoryDocument {
    html: RefCell<Html>,
    probes: RefCell<Vec<Option<style::Declarations>>>,
    clicks: RefCell<Vec<MemNode>>,
    fail_style: Cell<bool>,
}

impl MemoryDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: RefCell::new(Html::parse_document(source)),
            probes: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
            fail_style: Cell::new(false),
        }
    }

    /// Serialized document, reflecting removals.
    pub fn html(&self) -> String {
        self.html.borrow().html()
    }

    /// Elements clicked so far.
    pub fn clicked(&self) -> Vec<MemNode> {
        self.clicks.borrow().clone()
    }

    /// Number of style probes currently attached.
    pub fn attached_probes(&self) -> usize {
        self.probes.borrow().iter().filter(|p| p.is_some()).count()
    }

    /// Make every computed-style lookup fail.
    pub fn fail_style_lookups(&self, fail: bool) {
        self.fail_style.set(fail);
    }

    /// `tag.class1.class2` label for diagnostics.
    pub fn outer_label(&self, node: &MemNode) -> String {
        let MemNode::Element(id) = node else {
            return "probe".to_string();
        };
        let html = self.html.borrow();
        let Some(el) = html.tree.get(*id).and_then(ElementRef::wrap) else {
            return String::new();
        };
        let mut label = el.value().name().to_string();
        if let Some(classes) = el.value().attr("class") {
            for class in classes.split_whitespace() {
                label.push('.');
                label.push_str(class);
            }
        }
        label
    }

    fn with_element<T>(&self, id: NodeId, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
        let html = self.html.borrow();
        html.tree.get(id).and_then(ElementRef::wrap).map(f)
    }
}

fn parse_css(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|e| DomError::InvalidSelector(format!("{selector}: {e:?}")))
}

impl Document for MemoryDocument {
    type Node = MemNode;

    fn query_selector_all(&self, selector: &str) -> Result<Vec<MemNode>, DomError> {
        let selector = parse_css(selector)?;
        let html = self.html.borrow();
        Ok(html.select(&selector).map(|el| MemNode::Element(el.id())).collect())
    }

    fn all_elements(&self) -> Result<Vec<MemNode>, DomError> {
        let html = self.html.borrow();
        Ok(html
            .tree
            .root()
            .descendants()
            .filter(|node| node.value().is_element())
            .map(|node| MemNode::Element(node.id()))
            .collect())
    }

    fn matches(&self, node: &MemNode, selector: &str) -> Result<bool, DomError> {
        let selector = parse_css(selector)?;
        match node {
            MemNode::Element(id) => Ok(self.with_element(*id, |el| selector.matches(&el)).unwrap_or(false)),
            MemNode::Probe(_) => Ok(false),
        }
    }

    fn text_content(&self, node: &MemNode) -> String {
        match node {
            MemNode::Element(id) => self.with_element(*id, |el| el.text().collect()).unwrap_or_default(),
            MemNode::Probe(_) => String::new(),
        }
    }

    fn contains(&self, ancestor: &MemNode, node: &MemNode) -> bool {
        if ancestor == node {
            return true;
        }
        let (MemNode::Element(ancestor), MemNode::Element(node)) = (ancestor, node) else {
            return false;
        };
        let html = self.html.borrow();
        html.tree
            .get(*node)
            .map(|n| n.ancestors().any(|a| a.id() == *ancestor))
            .unwrap_or(false)
    }

    fn is_html_element(&self, _node: &MemNode) -> bool {
        true
    }

    fn click(&self, node: &MemNode) {
        self.clicks.borrow_mut().push(*node);
    }

    fn remove(&self, node: &MemNode) {
        if let MemNode::Element(id) = node {
            let mut html = self.html.borrow_mut();
            if let Some(mut n) = html.tree.get_mut(*id) {
                n.detach();
            }
        }
    }

    fn evaluate_xpath(&self, expression: &str) -> Result<Vec<MemNode>, DomError> {
        let steps = xpath::parse(expression).map_err(|reason| DomError::InvalidXPath(format!("{expression}: {reason}")))?;
        let html = self.html.borrow();
        Ok(xpath::evaluate(&html.tree, &steps)
            .into_iter()
            .map(MemNode::Element)
            .collect())
    }

    fn attach_style_probe(&self, css_text: &str) -> Result<MemNode, DomError> {
        let mut probes = self.probes.borrow_mut();
        probes.push(Some(style::parse_declarations(css_text)));
        Ok(MemNode::Probe(probes.len() - 1))
    }

    fn detach_style_probe(&self, probe: &MemNode) {
        if let MemNode::Probe(idx) = probe {
            if let Some(slot) = self.probes.borrow_mut().get_mut(*idx) {
                *slot = None;
            }
        }
    }

    fn computed_style(&self, node: &MemNode, property: &str) -> Result<String, DomError> {
        if self.fail_style.get() {
            return Err(DomError::Style(format!("lookup of '{property}' disabled")));
        }
        let property = property.trim().to_ascii_lowercase();

        match node {
            MemNode::Element(id) => {
                let resolved = self.with_element(*id, |el| {
                    let inline = el.value().attr("style").map(style::parse_declarations).unwrap_or_default();
                    style::resolve(&inline, el.value().name(), &property)
                });
                resolved.ok_or_else(|| DomError::Style("unknown element".to_string()))
            }
            MemNode::Probe(idx) => {
                let probes = self.probes.borrow();
                let declarations = probes
                    .get(*idx)
                    .and_then(Option::as_ref)
                    .ok_or_else(|| DomError::Style("probe is not attached".to_string()))?;
                Ok(style::resolve(declarations, "section", &property))
            }
        }
    }
}
