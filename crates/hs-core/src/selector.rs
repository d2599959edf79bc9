//! Selector parser
//!
//! Turns the selector part of a rule into a [`SelectorChain`]. Procedural
//! operators are recognised by their textual markers; whatever text sits
//! between them is plain CSS.
//!
//! ```text
//! div.ad:has-text(sponsored):has(img.logo):not(.keep)
//!   -> [Plain("div.ad"), Contains("sponsored"), Has([Plain("img.logo")]), Not([Plain(".keep")])]
//! ```

use std::fmt;

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unbalanced parentheses at offset {0}")]
    Unbalanced(usize),
    #[error("Operator '{0}' requires an argument")]
    EmptyArgument(&'static str),
    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("Action '{0}' must follow a plain selector")]
    DanglingAction(&'static str),
}

/// DOM side effect attached to a plain selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Click,
    Remove,
}

#[derive(Debug, Clone)]
pub enum PlainTarget {
    /// Regular CSS selector
    Css(String),
    /// `/regex/` tested against element text content
    TextRegex(Regex),
}

#[derive(Debug, Clone)]
pub struct PlainSelector {
    pub target: PlainTarget,
    pub action: Option<Action>,
}

/// One stage of a selector chain.
#[derive(Debug, Clone)]
pub enum SelectorExpr {
    Plain(PlainSelector),
    Contains { text: String, pattern: Regex },
    Has { selectors: SelectorChain },
    Not { selectors: SelectorChain },
    Properties { property_filter: String },
    XPath { xpath: String },
}

impl SelectorExpr {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Plain(PlainSelector {
            target: PlainTarget::Css(selector.into()),
            action: None,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plain(_) => "plain",
            Self::Contains { .. } => "contains",
            Self::Has { .. } => "has",
            Self::Not { .. } => "not",
            Self::Properties { .. } => "properties",
            Self::XPath { .. } => "xpath",
        }
    }
}

impl fmt::Display for SelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(plain) => {
                match &plain.target {
                    PlainTarget::Css(css) => f.write_str(css)?,
                    PlainTarget::TextRegex(re) => write!(f, "/{}/", re.as_str())?,
                }
                match plain.action {
                    Some(Action::Click) => f.write_str(":click()"),
                    Some(Action::Remove) => f.write_str(":remove()"),
                    None => Ok(()),
                }
            }
            Self::Contains { text, .. } => write!(f, ":has-text({text})"),
            Self::Has { selectors } => write!(f, ":has({})", DisplayChain(selectors)),
            Self::Not { selectors } => write!(f, ":not({})", DisplayChain(selectors)),
            Self::Properties { property_filter } => write!(f, ":matches-css({property_filter})"),
            Self::XPath { xpath } => write!(f, ":xpath({xpath})"),
        }
    }
}

pub type SelectorChain = Vec<SelectorExpr>;

struct DisplayChain<'a>(&'a [SelectorExpr]);

impl fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for expr in self.0 {
            write!(f, "{expr}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Operator {
    Contains,
    Has,
    Not,
    Properties,
    XPath,
    Act(Action),
}

// Longer markers sharing a prefix must come first.
const OPERATORS: &[(&str, Operator)] = &[
    (":has-text(", Operator::Contains),
    (":-abp-contains(", Operator::Contains),
    (":contains(", Operator::Contains),
    (":-abp-has(", Operator::Has),
    (":has(", Operator::Has),
    (":not(", Operator::Not),
    (":matches-css(", Operator::Properties),
    (":-abp-properties(", Operator::Properties),
    (":xpath(", Operator::XPath),
    (":remove(", Operator::Act(Action::Remove)),
    (":click(", Operator::Act(Action::Click)),
];

/// Parse a selector into a chain of stages.
pub fn parse_selector(text: &str) -> Result<SelectorChain, SelectorError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SelectorError::Empty);
    }

    if let Some(body) = regex_literal_body(text) {
        return Ok(vec![SelectorExpr::Plain(PlainSelector {
            target: PlainTarget::TextRegex(compile_insensitive(body)?),
            action: None,
        })]);
    }

    let bytes = text.as_bytes();
    let mut stages: SelectorChain = Vec::new();
    let mut segment_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' | b'\'' => {
                if let Some(end) = quoted_end(bytes, i) {
                    i = end;
                    continue;
                }
            }
            b'[' => {
                i = skip_bracket(bytes, i);
                continue;
            }
            b':' => {
                if let Some((marker, op)) = match_operator(&text[i..]) {
                    let open = i + marker.len() - 1;
                    let close = find_closing_paren(bytes, open).ok_or(SelectorError::Unbalanced(open))?;
                    let arg = text[open + 1..close].trim();

                    if stays_in_css(marker, arg, &text[close + 1..]) {
                        i = close + 1;
                        continue;
                    }

                    flush_plain(&text[segment_start..i], &mut stages);
                    push_operator(op, marker, arg, &mut stages)?;

                    i = close + 1;
                    segment_start = i;
                    continue;
                }
            }
            b'(' => {
                i = find_closing_paren(bytes, i).ok_or(SelectorError::Unbalanced(i))? + 1;
                continue;
            }
            b')' => return Err(SelectorError::Unbalanced(i)),
            _ => {}
        }
        i += 1;
    }

    flush_plain(&text[segment_start..], &mut stages);

    if stages.is_empty() {
        return Err(SelectorError::Empty);
    }
    Ok(stages)
}

fn match_operator(rest: &str) -> Option<(&'static str, Operator)> {
    OPERATORS
        .iter()
        .find(|(marker, _)| rest.starts_with(marker))
        .map(|(marker, op)| (*marker, *op))
}

/// Native `:not()`/`:has()` with a plain CSS argument stay in the CSS text when
/// more CSS follows them, as in `div:not(.a) > span`.
fn stays_in_css(marker: &str, arg: &str, rest: &str) -> bool {
    if marker != ":not(" && marker != ":has(" {
        return false;
    }
    let rest = rest.trim_start();
    if rest.is_empty() || match_operator(rest).is_some() {
        return false;
    }
    matches!(
        parse_selector(arg).as_deref(),
        Ok([SelectorExpr::Plain(PlainSelector {
            target: PlainTarget::Css(_),
            action: None,
        })])
    )
}

fn flush_plain(segment: &str, stages: &mut SelectorChain) {
    let css = segment.trim();
    if !css.is_empty() {
        stages.push(SelectorExpr::css(css));
    }
}

fn push_operator(op: Operator, marker: &'static str, arg: &str, stages: &mut SelectorChain) -> Result<(), SelectorError> {
    let name = marker.trim_start_matches(':').trim_end_matches('(');

    let expr = match op {
        Operator::Act(action) => {
            return match stages.last_mut() {
                Some(SelectorExpr::Plain(plain)) if plain.action.is_none() => {
                    plain.action = Some(action);
                    Ok(())
                }
                _ => Err(SelectorError::DanglingAction(name)),
            };
        }
        _ if arg.is_empty() => return Err(SelectorError::EmptyArgument(name)),
        Operator::Contains => {
            let text = unquote(arg);
            let pattern = compile_insensitive(regex_literal_body(text).unwrap_or(text))?;
            SelectorExpr::Contains {
                text: text.to_string(),
                pattern,
            }
        }
        Operator::Has => SelectorExpr::Has {
            selectors: parse_selector(arg)?,
        },
        Operator::Not => SelectorExpr::Not {
            selectors: parse_selector(arg)?,
        },
        Operator::Properties => SelectorExpr::Properties {
            property_filter: unquote(arg).to_string(),
        },
        Operator::XPath => SelectorExpr::XPath {
            xpath: unquote(arg).to_string(),
        },
    };

    stages.push(expr);
    Ok(())
}

/// Body of a `/.../` literal, if `text` has that form.
pub fn regex_literal_body(text: &str) -> Option<&str> {
    if text.len() >= 2 && text.starts_with('/') && text.ends_with('/') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

fn compile_insensitive(pattern: &str) -> Result<Regex, SelectorError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| SelectorError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn unquote(arg: &str) -> &str {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &arg[1..arg.len() - 1];
        }
    }
    arg
}

/// End of the string literal opened at `start`. `None` when the quote is an
/// apostrophe inside a word (`You've`) or is never closed.
fn quoted_end(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || !bytes[start - 1].is_ascii()) {
        return None;
    }
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_bracket(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = quoted_end(bytes, i).unwrap_or(i + 1),
            b']' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index of the `)` closing the `(` at `open`.
fn find_closing_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' | b'\'' => {
                if let Some(end) = quoted_end(bytes, i) {
                    i = end;
                    continue;
                }
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(chain: &[SelectorExpr]) -> Vec<&'static str> {
        chain.iter().map(SelectorExpr::kind).collect()
    }

    #[test]
    fn parses_plain_css() {
        let chain = parse_selector(" .banner ").unwrap();
        assert_eq!(chain.len(), 1);
        match &chain[0] {
            SelectorExpr::Plain(PlainSelector { target: PlainTarget::Css(css), action: None }) => {
                assert_eq!(css, ".banner")
            }
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn parses_regex_plain() {
        let chain = parse_selector("/Win a FREE iPhone/").unwrap();
        match &chain[0] {
            SelectorExpr::Plain(PlainSelector { target: PlainTarget::TextRegex(re), .. }) => {
                assert!(re.is_match("you can win a free iphone today"));
            }
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn parses_procedural_chain() {
        let chain = parse_selector("div.ad:has-text(sponsored):has(img.logo):not(.keep)").unwrap();
        assert_eq!(kinds(&chain), vec!["plain", "contains", "has", "not"]);

        if let SelectorExpr::Has { selectors } = &chain[2] {
            assert_eq!(kinds(selectors), vec!["plain"]);
        } else {
            panic!("expected has");
        }
    }

    #[test]
    fn contains_is_case_insensitive_regex() {
        let chain = parse_selector("p:contains(/prize\\s+claim/)").unwrap();
        match &chain[1] {
            SelectorExpr::Contains { pattern, .. } => assert!(pattern.is_match("PRIZE   CLAIM")),
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn nested_parentheses_and_quotes() {
        let chain = parse_selector(r#"div:has(a[href*=":has("]):has-text(/(call|phone) now/)"#).unwrap();
        assert_eq!(kinds(&chain), vec!["plain", "has", "contains"]);
    }

    #[test]
    fn parses_properties_and_xpath() {
        let chain = parse_selector("div:matches-css(position: fixed; z-index: 9999):xpath(//div[@id='x'])").unwrap();
        assert_eq!(kinds(&chain), vec!["plain", "properties", "xpath"]);
        match &chain[1] {
            SelectorExpr::Properties { property_filter } => assert_eq!(property_filter, "position: fixed; z-index: 9999"),
            other => panic!("unexpected stage {other:?}"),
        }

        let chain = parse_selector(":xpath(//body)").unwrap();
        assert_eq!(kinds(&chain), vec!["xpath"]);
    }

    #[test]
    fn attaches_actions() {
        let chain = parse_selector("button.close:click()").unwrap();
        match &chain[0] {
            SelectorExpr::Plain(plain) => assert_eq!(plain.action, Some(Action::Click)),
            other => panic!("unexpected stage {other:?}"),
        }

        assert_eq!(
            parse_selector(":has-text(x):remove()").unwrap_err(),
            SelectorError::DanglingAction("remove")
        );
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_selector("   ").unwrap_err(), SelectorError::Empty);
        assert!(matches!(parse_selector("div:has(span"), Err(SelectorError::Unbalanced(_))));
        assert!(matches!(parse_selector("div)"), Err(SelectorError::Unbalanced(3))));
        assert_eq!(parse_selector("div:has()").unwrap_err(), SelectorError::EmptyArgument("has"));
        assert!(matches!(parse_selector("/(unclosed/"), Err(SelectorError::InvalidRegex { .. })));
    }

    #[test]
    fn apostrophes_in_text_arguments() {
        let chain = parse_selector("h1:has-text(You've won)").unwrap();
        assert_eq!(kinds(&chain), vec!["plain", "contains"]);
        match &chain[1] {
            SelectorExpr::Contains { text, pattern } => {
                assert_eq!(text, "You've won");
                assert!(pattern.is_match("YOU'VE WON a prize"));
            }
            other => panic!("unexpected stage {other:?}"),
        }

        let chain = parse_selector("p:contains(it's free):has-text(don't wait)").unwrap();
        assert_eq!(kinds(&chain), vec!["plain", "contains", "contains"]);

        let chain = parse_selector("h2:has-text('You've been selected')").unwrap();
        match &chain[1] {
            SelectorExpr::Contains { text, .. } => assert_eq!(text, "You've been selected"),
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn native_not_followed_by_combinator_stays_css() {
        let chain = parse_selector("div:not(.a) > span").unwrap();
        assert_eq!(kinds(&chain), vec!["plain"]);
        assert_eq!(chain[0].to_string(), "div:not(.a) > span");

        let chain = parse_selector("div:not(.a) span:has-text(win)").unwrap();
        assert_eq!(kinds(&chain), vec!["plain", "contains"]);
        assert_eq!(chain[0].to_string(), "div:not(.a) span");

        let chain = parse_selector("div.card:not(.keep)").unwrap();
        assert_eq!(kinds(&chain), vec!["plain", "not"]);
    }

    #[test]
    fn keeps_unknown_pseudo_classes_in_css() {
        let chain = parse_selector("li:nth-child(2) > a").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].to_string(), "li:nth-child(2) > a");
    }
}
