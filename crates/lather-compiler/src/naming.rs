/// Template naming
///
/// Templates are registered and delegated to by name. Names are derived from
/// file paths for the bundle, and from the arguments of `render(...)` and
/// `extend` directives inside templates.

use std::path::Path;

/// Derive a template name from a path-like string.
///
/// With `use_basename` only the final path segment is kept. In both cases a
/// leading `./` is dropped and exactly one trailing extension is stripped
/// from the final segment.
pub fn template_name_from_path(view: &str, use_basename: bool) -> String {
    let mut view = view.trim();
    while let Some(rest) = view.strip_prefix("./") {
        view = rest;
    }

    if use_basename {
        if let Some(base) = Path::new(view).file_name().and_then(|n| n.to_str()) {
            view = base;
        }
    }

    let segment_start = view.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    match view[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => view[..segment_start + dot].to_string(),
        _ => view.to_string(),
    }
}

/// Remove one pair of matching surrounding quotes
pub fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    for quote in ['\'', '"', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Whether `text` is a single plain string literal
pub fn is_string_literal(text: &str) -> bool {
    let text = text.trim();
    let Some(quote) = text.chars().next() else {
        return false;
    };
    if !matches!(quote, '\'' | '"' | '`') || text.len() < 2 || !text.ends_with(quote) {
        return false;
    }
    let inner = &text[1..text.len() - 1];
    !inner.contains(quote) && !inner.contains('\\') && !(quote == '`' && inner.contains("${"))
}

/// Quote a template name as a single-quoted JavaScript string
pub fn quote_name(name: &str) -> String {
    format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Normalize the view argument of a `render(...)` call.
///
/// String literals are resolved at compile time; any other expression is
/// left for the render delegate to interpret.
pub fn normalize_view_argument(arg: &str) -> String {
    let arg = arg.trim();
    if is_string_literal(arg) {
        quote_name(&template_name_from_path(strip_quotes(arg), false))
    } else {
        arg.to_string()
    }
}

/// Turn a block name into an identifier fragment
pub fn sanitize_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c == '$' || c == '_' || c.is_alphanumeric() { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_file_path() {
        assert_eq!(template_name_from_path("views/home.html", true), "home");
        assert_eq!(template_name_from_path("home", true), "home");
        assert_eq!(template_name_from_path("page.en.html", true), "page.en");
        assert_eq!(template_name_from_path("  ./footer.phtml ", true), "footer");
    }

    #[test]
    fn test_view_names_keep_directories() {
        assert_eq!(template_name_from_path("helper/tip.phtml", false), "helper/tip");
        assert_eq!(template_name_from_path("./partials/v1.2/nav", false), "partials/v1.2/nav");
        assert_eq!(template_name_from_path("footer.html", false), "footer");
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("'master'"), "master");
        assert_eq!(strip_quotes("\"master.html\""), "master.html");
        assert_eq!(strip_quotes("master"), "master");
        assert_eq!(strip_quotes("'"), "'");
    }

    #[test]
    fn test_normalize_view_argument() {
        assert_eq!(normalize_view_argument("\"footer.html\""), "'footer'");
        assert_eq!(normalize_view_argument("'helper/tip.phtml'"), "'helper/tip'");
        assert_eq!(normalize_view_argument("name"), "name");
        assert_eq!(normalize_view_argument("getViewToRender()"), "getViewToRender()");
        assert_eq!(normalize_view_argument("'a' + suffix"), "'a' + suffix");
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("title"), "title");
        assert_eq!(sanitize_identifier("page-title"), "page_title");
        assert_eq!(sanitize_identifier("2col"), "_2col");
    }
}
