//! Core type definitions for HeurShield
//!
//! These types mirror the rule database exchanged with the extension
//! background page and are shared by the compiler, the processor and the
//! scanner.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// =============================================================================
// Rule Types
// =============================================================================

/// Classification of a heuristic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Matched elements are hidden
    Adserver,
    /// Matched pages are blocked as scams
    Scam,
    /// Matched pages are blocked as phishing
    Phishing,
    /// Whitelist entries (carried by the database, never evaluated)
    Whitelist,
}

impl RuleType {
    /// Parse the wire name. Only the three compilable kinds are accepted.
    pub fn from_compilable(s: &str) -> Option<Self> {
        match s {
            "adserver" => Some(Self::Adserver),
            "scam" => Some(Self::Scam),
            "phishing" => Some(Self::Phishing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adserver => "adserver",
            Self::Scam => "scam",
            Self::Phishing => "phishing",
            Self::Whitelist => "whitelist",
        }
    }

    /// Scam and phishing hits block the page instead of hiding elements.
    pub fn is_page_block(&self) -> bool {
        matches!(self, Self::Scam | Self::Phishing)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Selector Kinds
// =============================================================================

/// Element hiding separator found in the rule text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    /// `##` - simple hiding
    Hide,
    /// `#?#` - extended / procedural
    Extended,
}

impl SelectorKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "##" => Some(Self::Hide),
            "#?#" => Some(Self::Extended),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Hide => "##",
            Self::Extended => "#?#",
        }
    }
}

// =============================================================================
// Wire Records
// =============================================================================

/// A raw heuristic rule as delivered by the rule feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicRule {
    /// Raw rule text: `<domainPattern><separator><selector>`
    pub r: String,
    /// Silent flag
    pub s: Option<bool>,
    /// Rule type
    pub t: RuleType,
    /// Aggressive-mode flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<bool>,
    #[serde(default)]
    pub id: String,
}

/// A compiled selector entry stored under a domain pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_silent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_aggressive_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RuleEntry {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            is_silent: None,
            is_aggressive_mode: None,
            id: None,
        }
    }
}

/// Domain pattern -> ordered selector entries.
pub type SelectorsByDomain = IndexMap<String, Vec<RuleEntry>>;

/// Selector kind token -> domain pattern -> entries.
///
/// Kind keys stay raw tokens so that databases produced by newer feeds with
/// separators we do not know still deserialize.
pub type DomainRules = IndexMap<String, SelectorsByDomain>;

pub const DATABASE_CLEAN_NAME: &str = "heuristics";
pub const DATABASE_VERSION: &str = "3.0.0";
pub const DATABASE_NAME: &str = "mbgc.db.heuristics.json.2";

/// The compiled rule database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRules {
    #[serde(default)]
    pub adserver: DomainRules,
    #[serde(default)]
    pub whitelist: DomainRules,
    #[serde(default)]
    pub scam: DomainRules,
    #[serde(default)]
    pub phishing: DomainRules,
    #[serde(default)]
    pub action: Vec<serde_json::Value>,
    #[serde(default)]
    pub title: Vec<serde_json::Value>,
    #[serde(default)]
    pub description: Vec<serde_json::Value>,
    #[serde(default = "default_clean_name")]
    pub clean_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_name")]
    pub name: String,
}

fn default_clean_name() -> String {
    DATABASE_CLEAN_NAME.to_string()
}

fn default_version() -> String {
    DATABASE_VERSION.to_string()
}

fn default_name() -> String {
    DATABASE_NAME.to_string()
}

impl Default for ProcessedRules {
    fn default() -> Self {
        Self {
            adserver: DomainRules::new(),
            whitelist: DomainRules::new(),
            scam: DomainRules::new(),
            phishing: DomainRules::new(),
            action: Vec::new(),
            title: Vec::new(),
            description: Vec::new(),
            clean_name: default_clean_name(),
            version: default_version(),
            name: default_name(),
        }
    }
}

impl ProcessedRules {
    pub fn bucket(&self, rule_type: RuleType) -> &DomainRules {
        match rule_type {
            RuleType::Adserver => &self.adserver,
            RuleType::Scam => &self.scam,
            RuleType::Phishing => &self.phishing,
            RuleType::Whitelist => &self.whitelist,
        }
    }

    pub fn bucket_mut(&mut self, rule_type: RuleType) -> &mut DomainRules {
        match rule_type {
            RuleType::Adserver => &mut self.adserver,
            RuleType::Scam => &mut self.scam,
            RuleType::Phishing => &mut self.phishing,
            RuleType::Whitelist => &mut self.whitelist,
        }
    }

    /// All buckets in processing order.
    pub fn buckets(&self) -> [(RuleType, &DomainRules); 4] {
        [
            (RuleType::Adserver, &self.adserver),
            (RuleType::Scam, &self.scam),
            (RuleType::Phishing, &self.phishing),
            (RuleType::Whitelist, &self.whitelist),
        ]
    }

    /// Total number of selector entries across all buckets.
    pub fn entry_count(&self) -> usize {
        self.buckets()
            .iter()
            .flat_map(|(_, rules)| rules.values())
            .flat_map(|by_domain| by_domain.values())
            .map(Vec::len)
            .sum()
    }
}

// =============================================================================
// Block Candidates
// =============================================================================

/// A page-block candidate produced by a scam/phishing hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUrl {
    /// Host of the page the rule matched on
    pub domain: String,
    pub is_silent: bool,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Selector text that produced the hit
    pub source: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub is_aggressive_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_type_wire_names() {
        assert_eq!(RuleType::from_compilable("scam"), Some(RuleType::Scam));
        assert_eq!(RuleType::from_compilable("whitelist"), None);
        assert_eq!(serde_json::to_string(&RuleType::Phishing).unwrap(), "\"phishing\"");
        assert!(RuleType::Scam.is_page_block());
        assert!(!RuleType::Adserver.is_page_block());
    }

    #[test]
    fn selector_kind_tokens() {
        assert_eq!(SelectorKind::from_token("##"), Some(SelectorKind::Hide));
        assert_eq!(SelectorKind::from_token("#?#"), Some(SelectorKind::Extended));
        assert_eq!(SelectorKind::from_token("#@#"), None);
        assert_eq!(SelectorKind::Extended.token(), "#?#");
    }

    #[test]
    fn processed_rules_deserialize_with_defaults() {
        let json = r###"{"scam":{"##":{"*":[{"selector":"body","isSilent":true,"id":"7"}]}}}"###;
        let rules: ProcessedRules = serde_json::from_str(json).unwrap();
        assert_eq!(rules.version, DATABASE_VERSION);
        assert!(rules.adserver.is_empty());
        let entry = &rules.scam["##"]["*"][0];
        assert_eq!(entry.selector, "body");
        assert_eq!(entry.is_silent, Some(true));
        assert_eq!(entry.id.as_deref(), Some("7"));
        assert_eq!(rules.entry_count(), 1);
    }

    #[test]
    fn block_url_serializes_type_field() {
        let block = BlockUrl {
            domain: "badsite.com".to_string(),
            is_silent: false,
            rule_type: RuleType::Scam,
            source: "body".to_string(),
            id: Some("1".to_string()),
            is_aggressive_mode: false,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "scam");
        assert_eq!(value["isSilent"], false);
    }
}
