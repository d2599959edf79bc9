//! Engine session
//!
//! Owns a loaded rule database and drives one navigation cycle: process
//! every selector, join, hide, report, then scan the block candidates.

use log::{debug, info};

use crate::config::EngineConfig;
use crate::dom::Document;
use crate::host::ProtectionHost;
use crate::matcher::EngineError;
use crate::processor::{NavigationContext, ProcessReport, RuleProcessor};
use crate::report::BlockReport;
use crate::scanner::{HeuristicSecurityScanner, ScanReport};
use crate::types::{BlockUrl, ProcessedRules};

/// Everything one navigation cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOutcome {
    pub process: ProcessReport,
    /// Elements removed from the document
    pub hidden: usize,
    pub report: BlockReport,
    pub scan: ScanReport,
}

#[derive(Debug)]
pub struct HeuristicsEngine {
    rules: ProcessedRules,
    processor: RuleProcessor,
    config: EngineConfig,
}

impl HeuristicsEngine {
    pub fn new(rules: ProcessedRules, config: EngineConfig) -> Self {
        info!(
            "Heuristics database {} v{} loaded: {} entries",
            rules.clean_name,
            rules.version,
            rules.entry_count()
        );
        Self {
            rules,
            processor: RuleProcessor::new(),
            config,
        }
    }

    pub fn rules(&self) -> &ProcessedRules {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Evaluate the database against `doc`, filling `ctx`.
    pub fn process_page<D: Document>(
        &mut self,
        doc: &D,
        page_url: &str,
        ctx: &mut NavigationContext<D::Node>,
    ) -> Result<ProcessReport, EngineError> {
        self.processor.process(doc, &self.rules, page_url, ctx)
    }

    pub fn scan_for_threats<H: ProtectionHost + ?Sized>(
        &self,
        host: &H,
        candidates: &[BlockUrl],
        page_url: &str,
        tab_id: i32,
    ) -> ScanReport {
        HeuristicSecurityScanner::new(host, &self.config).scan_for_threats(candidates, page_url, tab_id)
    }

    /// Full cycle on a fresh context.
    pub fn run_navigation<D: Document, H: ProtectionHost + ?Sized>(
        &mut self,
        doc: &D,
        page_url: &str,
        tab_id: i32,
        host: &H,
    ) -> Result<NavigationOutcome, EngineError> {
        let mut ctx = NavigationContext::new();
        let process = self.process_page(doc, page_url, &mut ctx)?;

        let hidden = ctx.apply_hiding(doc);
        let report = BlockReport::from_context(&ctx);
        let scan = self.scan_for_threats(host, report.urls(), page_url, tab_id);

        debug!(
            "Navigation on tab {}: {} hidden, {} candidates, {} blocked",
            tab_id,
            hidden,
            report.urls().len(),
            scan.blocked.len()
        );

        Ok(NavigationOutcome {
            process,
            hidden,
            report,
            scan,
        })
    }
}
