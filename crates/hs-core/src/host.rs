//! Protection host capability
//!
//! Whitelist tables, protection toggles, metrics and tab navigation belong to
//! the extension background. The scanner only sees them through
//! [`ProtectionHost`].

use std::cell::RefCell;
use std::collections::HashSet;

use serde::Serialize;

use crate::types::RuleType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Host call '{call}' failed: {reason}")]
pub struct HostError {
    pub call: &'static str,
    pub reason: String,
}

impl HostError {
    pub fn new(call: &'static str, reason: impl Into<String>) -> Self {
        Self {
            call,
            reason: reason.into(),
        }
    }
}

/// Metric category passed to `record_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Scam,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scam => "SCAM",
        }
    }
}

/// Arguments of the host's scam decision call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScamContext {
    pub tab_id: i32,
    #[serde(rename = "tabURL")]
    pub tab_url: String,
    pub url: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub subtype: String,
    pub rule: String,
    pub block_message: String,
    pub is_silent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_checked_dbs: Option<Vec<String>>,
}

/// Result of the host's scam decision call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScamAction {
    pub redirect_url: String,
}

/// Capabilities the security scanner consumes from the extension.
pub trait ProtectionHost {
    fn is_protection_active(&self, feature: &str, url: &str, tab_id: i32) -> bool;

    fn is_whitelisted(&self, domain: &str, table: &str, category: &str) -> bool;

    fn is_whitelisted_scams_by_pattern(&self, domain: &str) -> bool;

    fn record_all(
        &self,
        record_type: RecordType,
        tab_id: i32,
        source_domain: &str,
        matched_domain: &str,
        silent: bool,
    ) -> Result<(), HostError>;

    fn update_badge_count(&self, tab_id: i32) -> Result<(), HostError>;

    fn on_scam(&self, context: &ScamContext) -> Result<ScamAction, HostError>;

    fn navigate(&self, tab_id: i32, url: &str) -> Result<(), HostError>;
}

// =============================================================================
// In-memory host
// =============================================================================

/// A call observed by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    RecordAll {
        tab_id: i32,
        source_domain: String,
        matched_domain: String,
        silent: bool,
    },
    UpdateBadgeCount { tab_id: i32 },
    OnScam(ScamContext),
    Navigate { tab_id: i32, url: String },
}

/// Deterministic host backed by in-memory policy tables.
///
/// Used by the CLI and by tests. Tables are keyed by table name; pattern
/// whitelisting is a plain substring check.
#[derive(Debug, Default)]
pub struct MemoryHost {
    protection_active: bool,
    tables: Vec<(String, HashSet<String>)>,
    scam_patterns: Vec<String>,
    redirect_base: String,
    fail_on: Option<&'static str>,
    calls: RefCell<Vec<HostCall>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            protection_active: true,
            redirect_base: "https://block.heurshield.invalid/blocked".to_string(),
            ..Self::default()
        }
    }

    pub fn with_protection(mut self, active: bool) -> Self {
        self.protection_active = active;
        self
    }

    /// Add domains to a named whitelist table.
    pub fn with_table<I, S>(mut self, table: &str, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: HashSet<String> = domains.into_iter().map(|d| d.into().to_lowercase()).collect();
        match self.tables.iter_mut().find(|(name, _)| name == table) {
            Some((_, existing)) => existing.extend(entries),
            None => self.tables.push((table.to_string(), entries)),
        }
        self
    }

    pub fn with_scam_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.scam_patterns.push(pattern.into());
        self
    }

    pub fn with_redirect_base(mut self, base: impl Into<String>) -> Self {
        self.redirect_base = base.into();
        self
    }

    /// Make the named call fail, e.g. `"on_scam"`.
    pub fn failing(mut self, call: &'static str) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    pub fn navigations(&self) -> Vec<(i32, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                HostCall::Navigate { tab_id, url } => Some((*tab_id, url.clone())),
                _ => None,
            })
            .collect()
    }

    fn check(&self, call: &'static str) -> Result<(), HostError> {
        if self.fail_on == Some(call) {
            return Err(HostError::new(call, "injected failure"));
        }
        Ok(())
    }
}

impl ProtectionHost for MemoryHost {
    fn is_protection_active(&self, _feature: &str, _url: &str, _tab_id: i32) -> bool {
        self.protection_active
    }

    fn is_whitelisted(&self, domain: &str, table: &str, _category: &str) -> bool {
        let domain = domain.to_lowercase();
        self.tables
            .iter()
            .filter(|(name, _)| name == table)
            .any(|(_, entries)| entries.contains(&domain))
    }

    fn is_whitelisted_scams_by_pattern(&self, domain: &str) -> bool {
        self.scam_patterns.iter().any(|pattern| domain.contains(pattern.as_str()))
    }

    fn record_all(
        &self,
        _record_type: RecordType,
        tab_id: i32,
        source_domain: &str,
        matched_domain: &str,
        silent: bool,
    ) -> Result<(), HostError> {
        self.check("record_all")?;
        self.calls.borrow_mut().push(HostCall::RecordAll {
            tab_id,
            source_domain: source_domain.to_string(),
            matched_domain: matched_domain.to_string(),
            silent,
        });
        Ok(())
    }

    fn update_badge_count(&self, tab_id: i32) -> Result<(), HostError> {
        self.check("update_badge_count")?;
        self.calls.borrow_mut().push(HostCall::UpdateBadgeCount { tab_id });
        Ok(())
    }

    fn on_scam(&self, context: &ScamContext) -> Result<ScamAction, HostError> {
        self.check("on_scam")?;
        self.calls.borrow_mut().push(HostCall::OnScam(context.clone()));
        Ok(ScamAction {
            redirect_url: format!("{}?url={}&rule={}", self.redirect_base, context.url, context.rule),
        })
    }

    fn navigate(&self, tab_id: i32, url: &str) -> Result<(), HostError> {
        self.check("navigate")?;
        self.calls.borrow_mut().push(HostCall::Navigate {
            tab_id,
            url: url.to_string(),
        });
        Ok(())
    }
}
