//! Inline style declarations and UA defaults.

pub(super) type Declarations = Vec<(String, String)>;

/// Parse `a: b; c: d !important` into lower-cased property names and trimmed
/// values. Empty names or values are dropped.
pub(super) fn parse_declarations(css_text: &str) -> Declarations {
    css_text
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(name, value)| {
            let value = value.trim();
            let value = value.strip_suffix("!important").unwrap_or(value).trim();
            (name.trim().to_ascii_lowercase(), value.to_string())
        })
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .collect()
}

/// Computed value: last inline declaration wins, else the UA default.
pub(super) fn resolve(declarations: &Declarations, tag: &str, property: &str) -> String {
    declarations
        .iter()
        .rev()
        .find(|(name, _)| name == property)
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| default_value(tag, property).to_string())
}

fn default_value(tag: &str, property: &str) -> &'static str {
    match property {
        "display" => default_display(tag),
        "position" => "static",
        "visibility" => "visible",
        "opacity" => "1",
        "z-index" => "auto",
        "float" => "none",
        "overflow" => "visible",
        _ => "",
    }
}

fn default_display(tag: &str) -> &'static str {
    match tag.to_ascii_lowercase().as_str() {
        "head" | "script" | "style" | "title" | "meta" | "link" | "template" => "none",
        "li" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "html" | "body" | "div" | "section" | "article" | "aside" | "header" | "footer" | "nav" | "main" | "p" | "ul"
        | "ol" | "form" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" | "figure" => "block",
        _ => "inline",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_declarations_win() {
        let decls = parse_declarations("color: red; COLOR: blue ; display:none !important; z-index:");
        assert_eq!(resolve(&decls, "div", "color"), "blue");
        assert_eq!(resolve(&decls, "div", "display"), "none");
        assert_eq!(resolve(&decls, "div", "z-index"), "auto");
        assert_eq!(resolve(&decls, "span", "background-color"), "");
    }

    #[test]
    fn display_defaults_follow_tag() {
        assert_eq!(resolve(&Vec::new(), "span", "display"), "inline");
        assert_eq!(resolve(&Vec::new(), "li", "display"), "list-item");
        assert_eq!(resolve(&Vec::new(), "section", "display"), "block");
    }
}
