//! HeurShield Rule Compiler
//!
//! Compiles the raw heuristic rule feed into the domain-scoped
//! [`ProcessedRules`] tree the content-side engine evaluates.

pub mod builder;
pub mod parser;

pub use builder::{build_database, compile, decompile, CompileOutput, CompileStats};
pub use parser::{parse_record, split_rule, RuleIssue, RuleParts};

use hs_core::types::ProcessedRules;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Invalid database JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported database shape: expected an array of rules or a compiled object, got {0}")]
    Shape(&'static str),
}

/// Load a database in either shape: an array of raw records is compiled, an
/// object is taken as an already-compiled database.
pub fn load_database(json: &str) -> Result<CompileOutput, CompileError> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(records) => Ok(compile(&records)),
        Value::Object(_) => {
            let rules: ProcessedRules = serde_json::from_value(value)?;
            Ok(CompileOutput {
                rules,
                issues: Vec::new(),
            })
        }
        Value::Null => Err(CompileError::Shape("null")),
        Value::Bool(_) => Err(CompileError::Shape("a boolean")),
        Value::Number(_) => Err(CompileError::Shape("a number")),
        Value::String(_) => Err(CompileError::Shape("a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_raw_and_compiled_shapes() {
        let raw = r#"[{"r": "a.com##.ad", "s": null, "t": "adserver"}]"#;
        let compiled = load_database(raw).unwrap();
        assert_eq!(compiled.rules.entry_count(), 1);

        let json = serde_json::to_string(&compiled.rules).unwrap();
        let reloaded = load_database(&json).unwrap();
        assert_eq!(reloaded.rules, compiled.rules);
        assert!(reloaded.issues.is_empty());
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(matches!(load_database("\"rules\""), Err(CompileError::Shape("a string"))));
        assert!(matches!(load_database("[1,"), Err(CompileError::Json(_))));
    }
}
