//! Rule Processor
//!
//! Selects the rule entries that apply to the current page, evaluates their
//! selectors and routes hits into a per-navigation [`NavigationContext`].
//! Adserver hits queue elements for hiding; scam and phishing hits become
//! [`BlockUrl`] candidates for the security scanner.

use std::collections::HashMap;

use indexmap::IndexSet;
use regex::{Regex, RegexBuilder};

use crate::dom::Document;
use crate::matcher::{EngineError, SelectorEngine};
use crate::selector::parse_selector;
use crate::types::{BlockUrl, ProcessedRules, RuleEntry, RuleType, SelectorKind, SelectorsByDomain};
use crate::url::page_host;

// =============================================================================
// Navigation Context
// =============================================================================

/// Accumulators for one navigation.
#[derive(Debug)]
pub struct NavigationContext<N> {
    elements_to_remove: Vec<N>,
    urls_to_block: IndexSet<BlockUrl>,
}

impl<N> Default for NavigationContext<N> {
    fn default() -> Self {
        Self {
            elements_to_remove: Vec::new(),
            urls_to_block: IndexSet::new(),
        }
    }
}

impl<N: Clone + PartialEq> NavigationContext<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an element for hiding. Returns false if it was already queued.
    pub fn add_element(&mut self, element: N) -> bool {
        if self.elements_to_remove.contains(&element) {
            return false;
        }
        self.elements_to_remove.push(element);
        true
    }

    pub fn add_block_url(&mut self, block: BlockUrl) -> bool {
        self.urls_to_block.insert(block)
    }

    pub fn elements_to_remove(&self) -> &[N] {
        &self.elements_to_remove
    }

    pub fn urls_to_block(&self) -> impl Iterator<Item = &BlockUrl> {
        self.urls_to_block.iter()
    }

    pub fn block_count(&self) -> usize {
        self.urls_to_block.len()
    }

    /// Take the block candidates, leaving the set empty.
    pub fn drain_urls_to_block(&mut self) -> Vec<BlockUrl> {
        self.urls_to_block.drain(..).collect()
    }

    /// Remove every queued element from the document.
    pub fn apply_hiding<D: Document<Node = N>>(&mut self, doc: &D) -> usize {
        let hidden = self.elements_to_remove.len();
        for element in self.elements_to_remove.drain(..) {
            doc.remove(&element);
        }
        hidden
    }
}

// =============================================================================
// Reports
// =============================================================================

/// A selector whose evaluation failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorFailure {
    pub rule_type: RuleType,
    pub selector: String,
    pub error: EngineError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessReport {
    /// Selectors whose domain pattern applied to the page
    pub selectors_evaluated: usize,
    /// Selectors that did not parse
    pub selectors_skipped: usize,
    /// Selectors that matched at least one element
    pub selectors_matched: usize,
    pub elements_queued: usize,
    pub urls_queued: usize,
    pub failures: Vec<SelectorFailure>,
}

enum Hit<N> {
    Hide(Vec<N>),
    Block(BlockUrl),
}

// =============================================================================
// Processor
// =============================================================================

/// Applies a compiled rule database to a page.
///
/// Holds a cache of compiled domain patterns, so one processor should be
/// reused across navigations.
#[derive(Debug, Default)]
pub struct RuleProcessor {
    patterns: HashMap<String, Option<Regex>>,
}

impl RuleProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every applicable rule against `doc` and fill `ctx`.
    pub fn process<D: Document>(
        &mut self,
        doc: &D,
        rules: &ProcessedRules,
        current_url: &str,
        ctx: &mut NavigationContext<D::Node>,
    ) -> Result<ProcessReport, EngineError> {
        // Hostless pages (about:blank, file://) still get `*` rules.
        let current_domain = page_host(current_url).unwrap_or_default();
        let engine = SelectorEngine::new(doc);
        let mut report = ProcessReport::default();

        // Every selector is evaluated on its own; results are only merged
        // into the context once all of them have completed.
        let mut outcomes: Vec<(RuleType, &RuleEntry, Result<Option<Hit<D::Node>>, EngineError>)> = Vec::new();

        for (rule_type, domain_rules) in rules.buckets() {
            if domain_rules.is_empty() {
                continue;
            }
            if rule_type == RuleType::Whitelist {
                log::debug!("Skipping {rule_type} bucket");
                continue;
            }

            for (kind_token, selectors_by_domain) in domain_rules {
                if SelectorKind::from_token(kind_token).is_none() {
                    log::warn!("Unexpected selector kind '{kind_token}' in {rule_type} rules");
                    continue;
                }

                for entries in self.applicable(selectors_by_domain, current_url) {
                    for entry in entries {
                        let chain = match parse_selector(&entry.selector) {
                            Ok(chain) => chain,
                            Err(e) => {
                                log::debug!("Skipping selector '{}': {e}", entry.selector);
                                report.selectors_skipped += 1;
                                continue;
                            }
                        };

                        report.selectors_evaluated += 1;
                        let outcome = engine.evaluate(&chain).map(|elements| {
                            if elements.is_empty() {
                                None
                            } else if rule_type.is_page_block() {
                                Some(Hit::Block(block_url(&current_domain, rule_type, entry)))
                            } else {
                                Some(Hit::Hide(elements))
                            }
                        });
                        outcomes.push((rule_type, entry, outcome));
                    }
                }
            }
        }

        for (rule_type, entry, outcome) in outcomes {
            match outcome {
                Ok(None) => {}
                Ok(Some(Hit::Hide(elements))) => {
                    report.selectors_matched += 1;
                    for element in elements {
                        if ctx.add_element(element) {
                            report.elements_queued += 1;
                        }
                    }
                }
                Ok(Some(Hit::Block(block))) => {
                    report.selectors_matched += 1;
                    if ctx.add_block_url(block) {
                        report.urls_queued += 1;
                    }
                }
                Err(error) => {
                    log::error!("{rule_type} selector '{}' failed: {error}", entry.selector);
                    report.failures.push(SelectorFailure {
                        rule_type,
                        selector: entry.selector.clone(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Entry lists whose domain pattern applies to `url`, in database order.
    fn applicable<'r>(&mut self, selectors_by_domain: &'r SelectorsByDomain, url: &str) -> Vec<&'r [RuleEntry]> {
        selectors_by_domain
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .filter(|(pattern, _)| self.domain_applies(pattern, url))
            .map(|(_, entries)| entries.as_slice())
            .collect()
    }

    /// Whether a domain pattern applies to `url`: case-insensitive regex
    /// match, or substring containment when the pattern is not a regex.
    pub fn domain_applies(&mut self, pattern: &str, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        let compiled = self
            .patterns
            .entry(pattern.to_string())
            .or_insert_with(|| RegexBuilder::new(pattern).case_insensitive(true).build().ok());

        match compiled {
            Some(re) => re.is_match(url),
            None => pattern.is_empty() || pattern == "*" || url.contains(pattern),
        }
    }
}

fn block_url(domain: &str, rule_type: RuleType, entry: &RuleEntry) -> BlockUrl {
    BlockUrl {
        domain: domain.to_string(),
        is_silent: entry.is_silent.unwrap_or(false),
        rule_type,
        source: entry.selector.clone(),
        id: entry.id.clone(),
        is_aggressive_mode: entry.is_aggressive_mode.unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memdom::MemoryDocument;
    use crate::types::DomainRules;

    const PAGE: &str = r#"<html><body>
        <div class="banner">ad</div>
        <div class="banner">ad 2</div>
        <div id="content">Hello</div>
    </body></html>"#;

    fn bucket(kind: &str, domain: &str, entries: Vec<RuleEntry>) -> DomainRules {
        let mut by_domain = SelectorsByDomain::new();
        by_domain.insert(domain.to_string(), entries);
        let mut rules = DomainRules::new();
        rules.insert(kind.to_string(), by_domain);
        rules
    }

    fn scam_entry(selector: &str, id: &str) -> RuleEntry {
        RuleEntry {
            selector: selector.to_string(),
            is_silent: Some(false),
            is_aggressive_mode: Some(false),
            id: Some(id.to_string()),
        }
    }

    #[test]
    fn domain_pattern_matching() {
        let mut processor = RuleProcessor::new();
        assert!(processor.domain_applies("*", "https://anything.test/"));
        assert!(processor.domain_applies("EXAMPLE\\.com", "https://www.example.com/"));
        assert!(!processor.domain_applies("example\\.org", "https://www.example.com/"));
        // Invalid regex falls back to substring containment
        assert!(processor.domain_applies("shop(", "https://x.test/shop(1)"));
        assert!(!processor.domain_applies("shop(", "https://x.test/shop"));
        assert!(!processor.domain_applies("*", ""));
    }

    #[test]
    fn adserver_hits_queue_elements() {
        let doc = MemoryDocument::parse(PAGE);
        let rules = ProcessedRules {
            adserver: bucket("##", "*", vec![RuleEntry::new(".banner"), RuleEntry::new("div.banner")]),
            ..ProcessedRules::default()
        };

        let mut ctx = NavigationContext::new();
        let report = RuleProcessor::new().process(&doc, &rules, "https://news.test/", &mut ctx).unwrap();

        assert_eq!(report.selectors_evaluated, 2);
        assert_eq!(report.selectors_matched, 2);
        assert_eq!(ctx.elements_to_remove().len(), 2);
        assert_eq!(ctx.block_count(), 0);

        assert_eq!(ctx.apply_hiding(&doc), 2);
        assert!(doc.query_selector_all(".banner").unwrap().is_empty());
    }

    #[test]
    fn scam_hits_queue_block_urls_without_touching_dom() {
        let doc = MemoryDocument::parse(PAGE);
        let rules = ProcessedRules {
            scam: bucket("#?#", "badsite\\.com", vec![scam_entry("body", "42"), scam_entry("body", "42")]),
            ..ProcessedRules::default()
        };

        let mut ctx = NavigationContext::new();
        let report = RuleProcessor::new()
            .process(&doc, &rules, "https://BadSite.com/landing", &mut ctx)
            .unwrap();

        assert_eq!(report.urls_queued, 1);
        let blocks: Vec<_> = ctx.urls_to_block().cloned().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].domain, "badsite.com");
        assert_eq!(blocks[0].rule_type, RuleType::Scam);
        assert_eq!(blocks[0].id.as_deref(), Some("42"));
        assert!(ctx.elements_to_remove().is_empty());
        assert_eq!(doc.query_selector_all("body").unwrap().len(), 1);
    }

    #[test]
    fn unknown_kinds_and_bad_selectors_are_skipped() {
        let doc = MemoryDocument::parse(PAGE);
        let mut adserver = bucket("#@#", "*", vec![RuleEntry::new(".banner")]);
        adserver.insert("##".to_string(), {
            let mut by_domain = SelectorsByDomain::new();
            by_domain.insert("*".to_string(), vec![RuleEntry::new("div:has("), RuleEntry::new("#content")]);
            by_domain.insert("other\\.test".to_string(), vec![RuleEntry::new(".banner")]);
            by_domain
        });
        let rules = ProcessedRules {
            adserver,
            whitelist: bucket("##", "*", vec![RuleEntry::new("body")]),
            ..ProcessedRules::default()
        };

        let mut ctx = NavigationContext::new();
        let report = RuleProcessor::new().process(&doc, &rules, "https://news.test/", &mut ctx).unwrap();

        assert_eq!(report.selectors_skipped, 1);
        assert_eq!(report.selectors_evaluated, 1);
        assert_eq!(ctx.elements_to_remove().len(), 1);
    }

    #[test]
    fn failing_selector_does_not_stop_siblings() {
        let doc = MemoryDocument::parse(PAGE);
        let rules = ProcessedRules {
            adserver: bucket("#?#", "*", vec![RuleEntry::new("div:not(p[[)"), RuleEntry::new("div.banner:matches-css(display: block)"), RuleEntry::new("#content")]),
            ..ProcessedRules::default()
        };
        doc.fail_style_lookups(true);

        let mut ctx = NavigationContext::new();
        let report = RuleProcessor::new().process(&doc, &rules, "https://news.test/", &mut ctx).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].selector, "div.banner:matches-css(display: block)");
        // #content is one of the three divs
        assert_eq!(ctx.elements_to_remove().len(), 3);
    }

    #[test]
    fn pages_without_host_use_empty_domain() {
        let doc = MemoryDocument::parse(PAGE);
        let rules = ProcessedRules {
            adserver: bucket("##", "*", vec![RuleEntry::new(".banner")]),
            scam: bucket("##", "*", vec![scam_entry("#content", "9")]),
            ..ProcessedRules::default()
        };

        let mut ctx = NavigationContext::new();
        let report = RuleProcessor::new().process(&doc, &rules, "about:blank", &mut ctx).unwrap();

        assert_eq!(report.elements_queued, 2);
        assert_eq!(ctx.urls_to_block().next().map(|b| b.domain.as_str()), Some(""));

        let mut ctx = NavigationContext::new();
        RuleProcessor::new()
            .process(&doc, &rules, "file:///tmp/page.html", &mut ctx)
            .unwrap();
        assert_eq!(ctx.elements_to_remove().len(), 2);
    }
}
