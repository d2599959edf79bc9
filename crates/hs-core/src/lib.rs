//! HeurShield Core Library
//!
//! Heuristic content filtering for a browser extension's content script.
//! A compiled rule database maps rule types and domain patterns to selectors
//! written in a small composable selector language. Per navigation, the
//! engine evaluates the applicable selectors against the page, hides what
//! adserver rules match, and hands scam/phishing hits to the security scanner,
//! which consults the extension's protection policy before redirecting the
//! tab.
//!
//! # Architecture
//!
//! The page and the extension are reached through two capabilities:
//! [`Document`] (queries, style, XPath, element actions) and
//! [`ProtectionHost`] (whitelists, metrics, scam decisions, navigation).
//! Browser bindings live in `hs-wasm`; the `memdom` feature provides an
//! in-memory document for tools and tests.
//!
//! # Modules
//!
//! - `types`: Rule records, compiled database and block candidates
//! - `selector`: Selector language parser
//! - `dom`: Document capability
//! - `matcher`: Selector chain evaluation
//! - `processor`: Per-navigation rule processing
//! - `host`: Protection host capability and in-memory host
//! - `scanner`: Exclusion policy and block actions
//! - `report`: Block report and background messages
//! - `engine`: Navigation cycle over a loaded database
//! - `config`: Engine configuration
//! - `url`: Page URL helpers

pub mod config;
pub mod dom;
pub mod engine;
pub mod host;
pub mod matcher;
pub mod processor;
pub mod report;
pub mod scanner;
pub mod selector;
pub mod types;
pub mod url;

#[cfg(any(test, feature = "memdom"))]
pub mod memdom;

// Re-export commonly used types
pub use config::EngineConfig;
pub use dom::{Document, DomError};
pub use engine::{HeuristicsEngine, NavigationOutcome};
pub use host::{HostError, MemoryHost, ProtectionHost};
pub use matcher::{EngineError, SelectorEngine};
pub use processor::{NavigationContext, ProcessReport, RuleProcessor};
pub use report::{BlockReport, HeuristicsMessage};
pub use scanner::{HeuristicSecurityScanner, ScanReport};
pub use selector::{parse_selector, SelectorChain, SelectorError, SelectorExpr};
pub use types::{BlockUrl, HeuristicRule, ProcessedRules, RuleEntry, RuleType, SelectorKind};
