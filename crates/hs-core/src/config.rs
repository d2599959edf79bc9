//! Engine configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Names of the host-side lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseNames {
    /// Manually curated scam whitelist
    pub whitelist_scams_manual: String,
    /// Popularity allowlist, ignored in aggressive mode
    pub top1m: String,
    /// The heuristics database itself, reported to the host on scam hits
    pub heuristics: String,
}

impl Default for DatabaseNames {
    fn default() -> Self {
        Self {
            whitelist_scams_manual: "whitelist_scams_manual".to_string(),
            top1m: "top1m".to_string(),
            heuristics: "heuristics".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global aggressive mode. A rule's own aggressive flag also enables it.
    pub aggressive_mode: bool,
    /// Protection feature checked before acting on a candidate
    pub protection_feature: String,
    /// Prefix of the rule identifier reported to the host
    pub threat_prefix: String,
    /// Whitelist category passed to table lookups
    pub whitelist_category: String,
    pub databases: DatabaseNames,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggressive_mode: false,
            protection_feature: "EXCLUSION_ADS".to_string(),
            threat_prefix: "heuristic_".to_string(),
            whitelist_category: "Scams".to_string(),
            databases: DatabaseNames::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
