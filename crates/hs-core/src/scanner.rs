//! Heuristic Security Scanner
//!
//! Turns the block candidates collected during a navigation into host
//! actions: exclusion policy first, then metrics, the scam decision and the
//! tab redirect. Every candidate is handled on its own; a failing host call
//! is reported and the next candidate proceeds.

use log::{debug, error, info};

use crate::config::EngineConfig;
use crate::host::{HostError, ProtectionHost, RecordType, ScamContext};
use crate::types::{BlockUrl, RuleType};
use crate::url::normalize_domain;

/// Why a candidate produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The page URL does not contain the candidate's domain
    ForeignDomain,
    ProtectionInactive,
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub candidate: BlockUrl,
    pub error: HostError,
}

/// Outcome of one scan, in candidate order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Redirect URLs the tab was sent to
    pub blocked: Vec<String>,
    pub skipped: Vec<(BlockUrl, SkipReason)>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn excluded(&self) -> usize {
        self.skipped.iter().filter(|(_, reason)| *reason == SkipReason::Excluded).count()
    }
}

pub struct HeuristicSecurityScanner<'a, H: ProtectionHost + ?Sized> {
    host: &'a H,
    config: &'a EngineConfig,
}

impl<'a, H: ProtectionHost + ?Sized> HeuristicSecurityScanner<'a, H> {
    pub fn new(host: &'a H, config: &'a EngineConfig) -> Self {
        Self { host, config }
    }

    /// Whether the exclusion policy spares `source_domain` for this threat.
    ///
    /// Only page-block threats are ever excluded. The popularity table is
    /// consulted only outside aggressive mode.
    pub fn should_exclude_domain(&self, source_domain: &str, aggressive: bool, threat: RuleType) -> bool {
        if !threat.is_page_block() {
            return false;
        }
        let databases = &self.config.databases;
        let category = &self.config.whitelist_category;

        self.host.is_whitelisted(source_domain, &databases.whitelist_scams_manual, category)
            || self.host.is_whitelisted_scams_by_pattern(source_domain)
            || (!aggressive && self.host.is_whitelisted(source_domain, &databases.top1m, category))
    }

    pub fn scan_for_threats(&self, candidates: &[BlockUrl], source_url: &str, tab_id: i32) -> ScanReport {
        let source_domain = normalize_domain(source_url);
        let mut report = ScanReport::default();

        for candidate in candidates {
            match self.scan_candidate(candidate, source_url, &source_domain, tab_id) {
                Ok(Ok(redirect)) => report.blocked.push(redirect),
                Ok(Err(reason)) => {
                    debug!("Skipping {} candidate on {}: {:?}", candidate.rule_type, candidate.domain, reason);
                    report.skipped.push((candidate.clone(), reason));
                }
                Err(e) => {
                    error!("Failed to act on {} candidate for {}: {}", candidate.rule_type, source_domain, e);
                    report.failures.push(ScanFailure {
                        candidate: candidate.clone(),
                        error: e,
                    });
                }
            }
        }

        report
    }

    fn scan_candidate(
        &self,
        candidate: &BlockUrl,
        source_url: &str,
        source_domain: &str,
        tab_id: i32,
    ) -> Result<Result<String, SkipReason>, HostError> {
        if !source_url.contains(candidate.domain.as_str()) {
            return Ok(Err(SkipReason::ForeignDomain));
        }
        if !self.host.is_protection_active(&self.config.protection_feature, source_url, tab_id) {
            return Ok(Err(SkipReason::ProtectionInactive));
        }

        let aggressive = self.config.aggressive_mode || candidate.is_aggressive_mode;
        if self.should_exclude_domain(source_domain, aggressive, candidate.rule_type) {
            return Ok(Err(SkipReason::Excluded));
        }

        self.host.record_all(RecordType::Scam, tab_id, source_domain, source_domain, true)?;
        self.host.update_badge_count(tab_id)?;

        let context = self.scam_context(candidate, source_url, source_domain, tab_id);
        let action = self.host.on_scam(&context)?;
        self.host.navigate(tab_id, &action.redirect_url)?;

        info!("Blocked {} ({}) via rule {}", source_domain, context.subtype, context.rule);
        Ok(Ok(action.redirect_url))
    }

    fn scam_context(&self, candidate: &BlockUrl, source_url: &str, source_domain: &str, tab_id: i32) -> ScamContext {
        let threat = candidate.rule_type;
        let selected_checked_dbs = match threat {
            RuleType::Scam => Some(vec![self.config.databases.heuristics.clone()]),
            _ => None,
        };

        ScamContext {
            tab_id,
            tab_url: source_url.to_string(),
            url: source_domain.to_string(),
            rule_type: threat,
            subtype: format!("{threat}_heuristic"),
            rule: format!("{}{}", self.config.threat_prefix, candidate.id.as_deref().unwrap_or("unknown")),
            block_message: format!("BTW: (NETWORK_BLOCK) heuristic {threat} domain found on {source_domain}"),
            is_silent: candidate.is_silent,
            selected_checked_dbs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCall, MemoryHost};

    fn candidate(domain: &str, rule_type: RuleType, id: &str) -> BlockUrl {
        BlockUrl {
            domain: domain.to_string(),
            is_silent: false,
            rule_type,
            source: "body".to_string(),
            id: Some(id.to_string()),
            is_aggressive_mode: false,
        }
    }

    #[test]
    fn exclusion_truth_table() {
        let config = EngineConfig::default();
        let plain = MemoryHost::new();
        let popular = MemoryHost::new().with_table("top1m", ["popular.com"]);
        let manual = MemoryHost::new().with_table("whitelist_scams_manual", ["trusted.com"]);
        let pattern = MemoryHost::new().with_scam_pattern("trusted");

        let s = HeuristicSecurityScanner::new(&plain, &config);
        assert!(!s.should_exclude_domain("badsite.com", false, RuleType::Scam));
        assert!(!s.should_exclude_domain("badsite.com", false, RuleType::Adserver));

        let s = HeuristicSecurityScanner::new(&popular, &config);
        assert!(s.should_exclude_domain("popular.com", false, RuleType::Phishing));
        assert!(!s.should_exclude_domain("popular.com", true, RuleType::Phishing));
        assert!(!s.should_exclude_domain("popular.com", false, RuleType::Adserver));

        let s = HeuristicSecurityScanner::new(&manual, &config);
        assert!(s.should_exclude_domain("trusted.com", true, RuleType::Scam));

        let s = HeuristicSecurityScanner::new(&pattern, &config);
        assert!(s.should_exclude_domain("shop.trusted.net", true, RuleType::Scam));
        assert!(!s.should_exclude_domain("shop.trusted.net", true, RuleType::Whitelist));
    }

    #[test]
    fn scam_candidate_redirects_tab() {
        let config = EngineConfig::default();
        let host = MemoryHost::new();
        let scanner = HeuristicSecurityScanner::new(&host, &config);

        let report = scanner.scan_for_threats(
            &[candidate("www.badsite.com", RuleType::Scam, "42")],
            "https://www.badsite.com/landing",
            7,
        );

        assert_eq!(report.blocked.len(), 1);
        assert!(report.failures.is_empty());
        let calls = host.calls();
        assert_eq!(
            calls[0],
            HostCall::RecordAll {
                tab_id: 7,
                source_domain: "badsite.com".to_string(),
                matched_domain: "badsite.com".to_string(),
                silent: true,
            }
        );
        assert_eq!(calls[1], HostCall::UpdateBadgeCount { tab_id: 7 });
        let HostCall::OnScam(context) = &calls[2] else {
            panic!("expected on_scam, got {:?}", calls[2]);
        };
        assert_eq!(context.url, "badsite.com");
        assert_eq!(context.tab_url, "https://www.badsite.com/landing");
        assert_eq!(context.subtype, "scam_heuristic");
        assert_eq!(context.rule, "heuristic_42");
        assert_eq!(context.block_message, "BTW: (NETWORK_BLOCK) heuristic scam domain found on badsite.com");
        assert_eq!(context.selected_checked_dbs, Some(vec!["heuristics".to_string()]));
        assert_eq!(host.navigations(), vec![(7, report.blocked[0].clone())]);
    }

    #[test]
    fn phishing_on_popular_domain_is_excluded_unless_aggressive() {
        let host = MemoryHost::new().with_table("top1m", ["popular.com"]);
        let config = EngineConfig::default();
        let scanner = HeuristicSecurityScanner::new(&host, &config);
        let phish = candidate("popular.com", RuleType::Phishing, "9");

        let report = scanner.scan_for_threats(&[phish.clone()], "https://popular.com/login", 1);
        assert!(report.blocked.is_empty());
        assert_eq!(report.excluded(), 1);
        assert!(host.calls().is_empty());

        let aggressive_rule = BlockUrl {
            is_aggressive_mode: true,
            ..phish
        };
        let report = scanner.scan_for_threats(&[aggressive_rule], "https://popular.com/login", 1);
        assert_eq!(report.blocked.len(), 1);
        let HostCall::OnScam(context) = &host.calls()[2] else {
            panic!("expected on_scam");
        };
        assert_eq!(context.selected_checked_dbs, None);
    }

    #[test]
    fn inactive_protection_and_foreign_domains_are_skipped() {
        let config = EngineConfig::default();
        let host = MemoryHost::new().with_protection(false);
        let scanner = HeuristicSecurityScanner::new(&host, &config);
        let report = scanner.scan_for_threats(
            &[
                candidate("badsite.com", RuleType::Scam, "1"),
                candidate("elsewhere.com", RuleType::Scam, "2"),
            ],
            "https://badsite.com/",
            3,
        );
        let reasons: Vec<SkipReason> = report.skipped.iter().map(|(_, r)| *r).collect();
        assert_eq!(reasons, vec![SkipReason::ProtectionInactive, SkipReason::ForeignDomain]);
        assert!(host.calls().is_empty());
    }

    #[test]
    fn host_failure_does_not_stop_other_candidates() {
        let config = EngineConfig::default();
        let host = MemoryHost::new().failing("on_scam");
        let scanner = HeuristicSecurityScanner::new(&host, &config);
        let report = scanner.scan_for_threats(
            &[
                candidate("badsite.com", RuleType::Scam, "1"),
                candidate("badsite.com", RuleType::Phishing, "2"),
            ],
            "https://badsite.com/",
            3,
        );
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].error.call, "on_scam");
        let badge_updates = host
            .calls()
            .iter()
            .filter(|c| matches!(c, HostCall::UpdateBadgeCount { .. }))
            .count();
        assert_eq!(badge_updates, 2);
    }
}
