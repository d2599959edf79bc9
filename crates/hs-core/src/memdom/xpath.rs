//! XPath location paths
//!
//! Supports absolute paths built from `/name` and `//name` steps (`*` for any
//! element) with these predicates:
//!
//! - `[n]` position among the step's matches under one parent
//! - `[@attr]`, `[@attr='v']`
//! - `[text()='v']`, `[.='v']`
//! - `[contains(@attr,'v')]`, `[contains(text(),'v')]`, `[contains(.,'v')]`
//!
//! `text()` is the element's own text children; `.` is its full string value.

use std::collections::HashMap;

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Subject {
    Attr(String),
    OwnText,
    StringValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Exists(String),
    Equals(Subject, String),
    Contains(Subject, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Step {
    axis: Axis,
    /// `None` matches any element
    name: Option<String>,
    predicates: Vec<Predicate>,
}

pub(super) fn parse(expression: &str) -> Result<Vec<Step>, String> {
    let mut rest = expression.trim();
    if !rest.starts_with('/') {
        return Err("only absolute location paths are supported".to_string());
    }

    let mut steps = Vec::new();
    while !rest.is_empty() {
        let axis = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            Axis::Descendant
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            Axis::Child
        } else {
            return Err(format!("expected '/' at '{rest}'"));
        };

        let name_end = rest.find(['[', '/']).unwrap_or(rest.len());
        let name = rest[..name_end].trim();
        rest = &rest[name_end..];
        let name = match name {
            "" => return Err("empty step".to_string()),
            "*" => None,
            n if n.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') => Some(n.to_ascii_lowercase()),
            n => return Err(format!("unsupported node test '{n}'")),
        };

        let mut predicates = Vec::new();
        while rest.starts_with('[') {
            let close = closing_bracket(rest).ok_or_else(|| "unterminated predicate".to_string())?;
            predicates.push(parse_predicate(rest[1..close].trim())?);
            rest = &rest[close + 1..];
        }

        steps.push(Step { axis, name, predicates });
    }

    Ok(steps)
}

/// Index of the `]` closing the `[` at position 0, skipping quoted literals.
fn closing_bracket(text: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_predicate(body: &str) -> Result<Predicate, String> {
    if let Ok(position) = body.parse::<usize>() {
        if position == 0 {
            return Err("positions start at 1".to_string());
        }
        return Ok(Predicate::Position(position));
    }

    if let Some(args) = body.strip_prefix("contains(").and_then(|b| b.strip_suffix(')')) {
        let (subject, literal) = args.split_once(',').ok_or_else(|| format!("contains() needs two arguments: {body}"))?;
        return Ok(Predicate::Contains(parse_subject(subject.trim())?, parse_literal(literal.trim())?));
    }

    if let Some((subject, literal)) = body.split_once('=') {
        return Ok(Predicate::Equals(parse_subject(subject.trim())?, parse_literal(literal.trim())?));
    }

    match parse_subject(body)? {
        Subject::Attr(name) => Ok(Predicate::Exists(name)),
        _ => Err(format!("unsupported predicate '{body}'")),
    }
}

fn parse_subject(text: &str) -> Result<Subject, String> {
    match text {
        "text()" => Ok(Subject::OwnText),
        "." => Ok(Subject::StringValue),
        _ => match text.strip_prefix('@') {
            Some(name) if !name.is_empty() => Ok(Subject::Attr(name.to_ascii_lowercase())),
            _ => Err(format!("unsupported expression '{text}'")),
        },
    }
}

fn parse_literal(text: &str) -> Result<String, String> {
    let quoted = (text.starts_with('\'') && text.ends_with('\'')) || (text.starts_with('"') && text.ends_with('"'));
    if text.len() < 2 || !quoted {
        return Err(format!("expected a string literal, got '{text}'"));
    }
    Ok(text[1..text.len() - 1].to_string())
}

/// Matching element ids in document order, without duplicates.
pub(super) fn evaluate(tree: &Tree<Node>, steps: &[Step]) -> Vec<NodeId> {
    let mut context = vec![tree.root().id()];

    for step in steps {
        let mut next = Vec::new();
        for id in &context {
            let Some(node) = tree.get(*id) else { continue };
            match step.axis {
                Axis::Child => next.extend(select_children(node, step)),
                Axis::Descendant => {
                    for parent in node.descendants() {
                        next.extend(select_children(parent, step));
                    }
                }
            }
        }
        context = next;
        if context.is_empty() {
            break;
        }
    }

    let order = document_order(tree);
    context.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
    context.dedup();
    context.retain(|id| tree.get(*id).is_some_and(|n| n.value().is_element()));
    context
}

fn select_children(parent: NodeRef<'_, Node>, step: &Step) -> Vec<NodeId> {
    let mut selected: Vec<NodeRef<'_, Node>> = parent
        .children()
        .filter(|child| match child.value().as_element() {
            Some(el) => step.name.as_deref().map_or(true, |name| el.name().eq_ignore_ascii_case(name)),
            None => false,
        })
        .collect();

    for predicate in &step.predicates {
        selected = match predicate {
            Predicate::Position(n) => selected.get(n - 1).copied().into_iter().collect(),
            _ => selected.into_iter().filter(|node| holds(*node, predicate)).collect(),
        };
    }

    selected.into_iter().map(|node| node.id()).collect()
}

fn holds(node: NodeRef<'_, Node>, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Position(_) => true,
        Predicate::Exists(name) => attr(node, name).is_some(),
        Predicate::Equals(subject, literal) => value_of(node, subject).is_some_and(|v| v == *literal),
        Predicate::Contains(subject, literal) => value_of(node, subject).is_some_and(|v| v.contains(literal.as_str())),
    }
}

fn value_of(node: NodeRef<'_, Node>, subject: &Subject) -> Option<String> {
    match subject {
        Subject::Attr(name) => attr(node, name).map(str::to_string),
        Subject::OwnText => Some(node.children().filter_map(|c| c.value().as_text().map(|t| &**t)).collect()),
        Subject::StringValue => Some(node.descendants().filter_map(|c| c.value().as_text().map(|t| &**t)).collect()),
    }
}

fn attr<'a>(node: NodeRef<'a, Node>, name: &str) -> Option<&'a str> {
    node.value().as_element().and_then(|el| el.attr(name))
}

fn document_order(tree: &Tree<Node>) -> HashMap<NodeId, usize> {
    tree.root().descendants().enumerate().map(|(i, node)| (node.id(), i)).collect()
}
