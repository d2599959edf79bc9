//! Selector Matching Engine
//!
//! Evaluates a [`SelectorChain`] against a [`Document`]. The first stage
//! seeds the candidate set, every later stage only narrows it, and
//! evaluation stops as soon as the running set is empty.

use crate::dom::{Document, DomError, StyleProbe};
use crate::host::HostError;
use crate::selector::{Action, PlainSelector, PlainTarget, SelectorError, SelectorExpr};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error(transparent)]
    Host(#[from] HostError),
}

// Appended to the probe so it never renders.
const PROBE_HIDE: &str = "display: none !important;";
const PROBE_HIDE_VISIBILITY: &str = "visibility: hidden !important; position: absolute !important;";

// =============================================================================
// Engine
// =============================================================================

/// Evaluates selector chains against one document.
pub struct SelectorEngine<'d, D: Document> {
    doc: &'d D,
}

impl<'d, D: Document> SelectorEngine<'d, D> {
    pub fn new(doc: &'d D) -> Self {
        Self { doc }
    }

    /// Elements satisfying every stage of `chain`.
    pub fn evaluate(&self, chain: &[SelectorExpr]) -> Result<Vec<D::Node>, EngineError> {
        let mut stages = chain.iter();
        let Some(first) = stages.next() else {
            return Ok(Vec::new());
        };

        let mut elements = self.seed(first)?;
        for stage in stages {
            if elements.is_empty() {
                break;
            }
            elements = self.filter(elements, stage)?;
        }

        Ok(elements)
    }

    fn seed(&self, stage: &SelectorExpr) -> Result<Vec<D::Node>, EngineError> {
        match stage {
            SelectorExpr::Plain(plain) => self.seed_plain(plain),
            SelectorExpr::Contains { .. } => Ok(Vec::new()),
            SelectorExpr::XPath { xpath } => Ok(self.evaluate_xpath(xpath)),
            SelectorExpr::Has { .. } | SelectorExpr::Not { .. } | SelectorExpr::Properties { .. } => {
                log::warn!("Unexpected initial selector type: {}", stage.kind());
                Ok(Vec::new())
            }
        }
    }

    fn seed_plain(&self, plain: &PlainSelector) -> Result<Vec<D::Node>, EngineError> {
        match &plain.target {
            PlainTarget::Css(css) => {
                let elements = match self.doc.query_selector_all(css) {
                    Ok(elements) => elements,
                    Err(e) => {
                        log::error!("Error in querySelectorAll '{css}': {e}");
                        return Ok(Vec::new());
                    }
                };
                match plain.action {
                    Some(action) => {
                        self.perform(action, &elements);
                        Ok(Vec::new())
                    }
                    None => Ok(elements),
                }
            }
            PlainTarget::TextRegex(re) => {
                let elements: Vec<D::Node> = self
                    .doc
                    .all_elements()?
                    .into_iter()
                    .filter(|el| re.is_match(&self.doc.text_content(el)))
                    .collect();
                match plain.action {
                    Some(action) => {
                        self.perform(action, &elements);
                        Ok(Vec::new())
                    }
                    None => Ok(elements),
                }
            }
        }
    }

    fn filter(&self, elements: Vec<D::Node>, stage: &SelectorExpr) -> Result<Vec<D::Node>, EngineError> {
        match stage {
            SelectorExpr::Plain(plain) => self.filter_plain(elements, plain),
            SelectorExpr::Contains { pattern, .. } => Ok(elements
                .into_iter()
                .filter(|el| {
                    let text = self.doc.text_content(el).to_lowercase();
                    pattern.is_match(text.trim())
                })
                .collect()),
            SelectorExpr::Has { selectors } => {
                let descendants = self.evaluate(selectors)?;
                Ok(elements
                    .into_iter()
                    .filter(|el| descendants.iter().any(|child| self.doc.contains(el, child)))
                    .collect())
            }
            SelectorExpr::Not { selectors } => {
                let excluded = self.evaluate(selectors)?;
                Ok(elements.into_iter().filter(|el| !excluded.contains(el)).collect())
            }
            SelectorExpr::Properties { property_filter } => self.filter_properties(elements, property_filter),
            SelectorExpr::XPath { xpath } => {
                let matched = self.evaluate_xpath(xpath);
                Ok(elements.into_iter().filter(|el| matched.contains(el)).collect())
            }
        }
    }

    fn filter_plain(&self, elements: Vec<D::Node>, plain: &PlainSelector) -> Result<Vec<D::Node>, EngineError> {
        let mut kept = Vec::with_capacity(elements.len());
        for el in elements {
            let keep = match &plain.target {
                PlainTarget::Css(css) => self.doc.matches(&el, css)?,
                PlainTarget::TextRegex(re) => re.is_match(&self.doc.text_content(&el)),
            };
            if keep {
                kept.push(el);
            }
        }

        match plain.action {
            Some(action) => {
                self.perform(action, &kept);
                Ok(Vec::new())
            }
            None => Ok(kept),
        }
    }

    fn filter_properties(&self, elements: Vec<D::Node>, property_filter: &str) -> Result<Vec<D::Node>, EngineError> {
        let declared = property_filter.trim();
        if declared.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<&str> = declared
            .split(';')
            .map(|decl| decl.split(':').next().unwrap_or("").trim())
            .collect();

        let probe = StyleProbe::attach(self.doc, &probe_css(declared, &keys))?;

        let mut kept = Vec::with_capacity(elements.len());
        for el in elements {
            if self.doc.is_html_element(&el) && self.has_all_styles(&el, probe.node(), &keys)? {
                kept.push(el);
            }
        }

        Ok(kept)
    }

    fn has_all_styles(&self, el: &D::Node, probe: &D::Node, keys: &[&str]) -> Result<bool, EngineError> {
        for key in keys {
            if key.is_empty() {
                continue;
            }
            let wanted = self.doc.computed_style(probe, key)?;
            if wanted.is_empty() {
                continue;
            }
            if self.doc.computed_style(el, key)? != wanted {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate_xpath(&self, xpath: &str) -> Vec<D::Node> {
        match self.doc.evaluate_xpath(xpath) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::error!("XPath evaluation error: {e}");
                Vec::new()
            }
        }
    }

    fn perform(&self, action: Action, elements: &[D::Node]) {
        for el in elements {
            match action {
                Action::Click => {
                    if self.doc.is_html_element(el) {
                        self.doc.click(el);
                    }
                }
                Action::Remove => self.doc.remove(el),
            }
        }
    }
}

/// Probe style text: the declared filter plus whatever keeps the probe
/// invisible without overriding a declared property.
fn probe_css(declared: &str, keys: &[&str]) -> String {
    let separator = if declared.ends_with(';') { " " } else { "; " };
    let hide = if keys.iter().any(|k| k.eq_ignore_ascii_case("display")) {
        PROBE_HIDE_VISIBILITY
    } else {
        PROBE_HIDE
    };
    format!("{declared}{separator}{hide}")
}
