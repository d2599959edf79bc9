use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use hs_core::types::{HeuristicRule, RuleType, SelectorKind};

/// Why a raw record contributed nothing to the compiled database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleIssue {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("No selector separator in rule '{0}'")]
    NoSeparator(String),
    #[error("Empty selector in rule '{0}'")]
    EmptySelector(String),
}

impl RuleIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRecord(_) => "invalid_record",
            Self::NoSeparator(_) => "no_separator",
            Self::EmptySelector(_) => "empty_selector",
        }
    }
}

/// Rule text split at its separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleParts<'a> {
    /// Domain pattern, `*` when the rule text has none
    pub domain: &'a str,
    pub kind: SelectorKind,
    pub selector: &'a str,
}

fn separator_regex() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"^(.*?)(#\?#|##)(.*)$").expect("separator pattern is valid"))
}

/// Split `domain<sep>selector` at the first `##` or `#?#`.
pub fn split_rule(text: &str) -> Result<RuleParts<'_>, RuleIssue> {
    let caps = separator_regex()
        .captures(text)
        .ok_or_else(|| RuleIssue::NoSeparator(text.to_string()))?;

    let (Some(domain), Some(separator), Some(selector)) = (caps.get(1), caps.get(2), caps.get(3)) else {
        return Err(RuleIssue::NoSeparator(text.to_string()));
    };
    let kind = SelectorKind::from_token(separator.as_str()).ok_or_else(|| RuleIssue::NoSeparator(text.to_string()))?;

    if selector.as_str().is_empty() {
        return Err(RuleIssue::EmptySelector(text.to_string()));
    }

    let domain = match domain.as_str() {
        "" => "*",
        d => d,
    };

    Ok(RuleParts {
        domain,
        kind,
        selector: selector.as_str(),
    })
}

/// Validate one raw database record.
///
/// `r` must be a non-empty string, `s` a boolean or null (absent counts as
/// null), `t` a compilable rule type. Numeric ids are kept as their decimal
/// text.
pub fn parse_record(value: &Value) -> Result<HeuristicRule, RuleIssue> {
    let invalid = |why: &str| RuleIssue::InvalidRecord(format!("{why}: {value}"));

    let obj = value.as_object().ok_or_else(|| invalid("not an object"))?;

    let r = match obj.get("r") {
        Some(Value::String(r)) if !r.is_empty() => r.clone(),
        _ => return Err(invalid("'r' must be a non-empty string")),
    };

    let s = match obj.get("s") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(s)) => Some(*s),
        Some(_) => return Err(invalid("'s' must be a boolean or null")),
    };

    let t = obj
        .get("t")
        .and_then(Value::as_str)
        .and_then(RuleType::from_compilable)
        .ok_or_else(|| invalid("'t' must be adserver, scam or phishing"))?;

    let a = obj.get("a").and_then(Value::as_bool);

    let id = match obj.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };

    Ok(HeuristicRule { r, s, t, a, id })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn splits_hide_and_extended_rules() {
        let parts = split_rule("example.com##.ad-slot").unwrap();
        assert_eq!(parts.domain, "example.com");
        assert_eq!(parts.kind, SelectorKind::Hide);
        assert_eq!(parts.selector, ".ad-slot");

        let parts = split_rule("#?#div:has-text(/win/)").unwrap();
        assert_eq!(parts.domain, "*");
        assert_eq!(parts.kind, SelectorKind::Extended);
        assert_eq!(parts.selector, "div:has-text(/win/)");
    }

    #[test]
    fn first_separator_wins() {
        let parts = split_rule("a.com##div##span").unwrap();
        assert_eq!(parts.domain, "a.com");
        assert_eq!(parts.selector, "div##span");
    }

    #[test]
    fn split_rejects_missing_separator_and_empty_selector() {
        assert!(matches!(split_rule("example.com#.ad"), Err(RuleIssue::NoSeparator(_))));
        assert!(matches!(split_rule("example.com##"), Err(RuleIssue::EmptySelector(_))));
    }

    #[test]
    fn parses_valid_records() {
        let rule = parse_record(&json!({"r": "##.x", "s": true, "t": "scam", "a": true, "id": 12})).unwrap();
        assert_eq!(rule.s, Some(true));
        assert_eq!(rule.t, RuleType::Scam);
        assert_eq!(rule.a, Some(true));
        assert_eq!(rule.id, "12");

        let rule = parse_record(&json!({"r": "##.x", "s": null, "t": "adserver", "id": "a1"})).unwrap();
        assert_eq!(rule.s, None);
        assert_eq!(rule.a, None);
    }

    #[test]
    fn rejects_invalid_records() {
        for bad in [
            json!("##.x"),
            json!({"r": "", "s": null, "t": "scam"}),
            json!({"r": "##.x", "s": "yes", "t": "scam"}),
            json!({"r": "##.x", "s": null, "t": "whitelist"}),
            json!({"r": "##.x", "s": null}),
        ] {
            let err = parse_record(&bad).unwrap_err();
            assert_eq!(err.kind(), "invalid_record");
        }
    }
}
