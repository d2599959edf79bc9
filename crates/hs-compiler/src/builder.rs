use std::collections::BTreeMap;

use log::debug;
use serde_json::Value;

use hs_core::types::{HeuristicRule, ProcessedRules, RuleEntry, RuleType, SelectorKind};

use crate::parser::{parse_record, split_rule, RuleIssue};

/// A compiled database plus everything that was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOutput {
    pub rules: ProcessedRules,
    pub issues: Vec<RuleIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub records: usize,
    pub compiled: usize,
    /// Dropped records by issue kind
    pub skipped: BTreeMap<&'static str, usize>,
}

impl CompileOutput {
    pub fn stats(&self) -> CompileStats {
        let mut skipped = BTreeMap::new();
        for issue in &self.issues {
            *skipped.entry(issue.kind()).or_insert(0) += 1;
        }
        let compiled = self.rules.entry_count();
        CompileStats {
            records: compiled + self.issues.len(),
            compiled,
            skipped,
        }
    }
}

/// Compile raw database records. Invalid records and unsplittable rules are
/// reported as issues; nothing aborts the batch.
pub fn compile(records: &[Value]) -> CompileOutput {
    let mut rules = Vec::with_capacity(records.len());
    let mut issues = Vec::new();

    for record in records {
        match parse_record(record) {
            Ok(rule) => rules.push(rule),
            Err(issue) => {
                debug!("{issue}");
                issues.push(issue);
            }
        }
    }

    let mut output = build_database(&rules);
    issues.append(&mut output.issues);
    output.issues = issues;
    output
}

/// Build the domain-scoped rule tree from validated records.
pub fn build_database(rules: &[HeuristicRule]) -> CompileOutput {
    let mut output = CompileOutput::default();

    for rule in rules {
        if let Err(issue) = insert_rule(&mut output.rules, rule) {
            debug!("{issue}");
            output.issues.push(issue);
        }
    }

    output
}

fn insert_rule(rules: &mut ProcessedRules, rule: &HeuristicRule) -> Result<(), RuleIssue> {
    let parts = split_rule(&rule.r)?;

    let entry = match rule.t {
        RuleType::Adserver => RuleEntry::new(parts.selector),
        _ => RuleEntry {
            selector: parts.selector.to_string(),
            is_silent: rule.s,
            is_aggressive_mode: Some(rule.a.unwrap_or(false)),
            id: Some(rule.id.clone()),
        },
    };

    rules
        .bucket_mut(rule.t)
        .entry(parts.kind.token().to_string())
        .or_default()
        .entry(parts.domain.to_string())
        .or_default()
        .push(entry);

    Ok(())
}

/// Render a compiled database back to source records, in tree order.
///
/// Whitelist entries and unknown selector kinds have no source form and are
/// left out.
pub fn decompile(rules: &ProcessedRules) -> Vec<HeuristicRule> {
    let mut records = Vec::new();

    for (rule_type, bucket) in rules.buckets() {
        if rule_type == RuleType::Whitelist {
            continue;
        }
        for (token, by_domain) in bucket {
            let Some(kind) = SelectorKind::from_token(token) else {
                continue;
            };
            for (domain, entries) in by_domain {
                let domain = if domain == "*" { "" } else { domain.as_str() };
                for entry in entries {
                    records.push(HeuristicRule {
                        r: format!("{domain}{}{}", kind.token(), entry.selector),
                        s: entry.is_silent,
                        t: rule_type,
                        a: entry.is_aggressive_mode,
                        id: entry.id.clone().unwrap_or_default(),
                    });
                }
            }
        }
    }

    records
}
