/// Bundle runtime
///
/// JavaScript emitted around compiled templates when they are bundled into
/// a single module: the template registry, the `render` delegate, the HTML
/// `escape` function and the `helpers` namespace.

use std::fmt::Write as _;

/// Global the bundle exports
pub const NAMESPACE: &str = "Lather";

/// Runtime pieces a bundle needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeFeatures {
    /// Leave out the render delegate and shared capabilities
    pub standalone: bool,
    pub escape: bool,
    pub helpers: bool,
}

/// Bundle header up to the first template
pub fn prelude(features: RuntimeFeatures) -> String {
    let ns = NAMESPACE;
    let mut out = String::new();
    out.push_str(&format!("// generated by lather {}\n", env!("CARGO_PKG_VERSION")));
    out.push_str("(function() {\n");
    out.push_str("    'use strict';\n\n");
    out.push_str(&format!("    var {ns} = {{}};\n"));
    out.push_str(&format!("    {ns}.templates = {{}};\n"));

    if features.standalone {
        return out;
    }

    out.push_str(&format!("    {ns}.render = function(name, args) {{\n"));
    out.push_str(&format!("        if ({ns}.templates[name]) {{\n"));
    out.push_str(&format!("            return {ns}.templates[name](args || {{}}, {ns});\n"));
    out.push_str("        }\n");
    out.push_str("        return '';\n");
    out.push_str("    };\n");

    if features.escape {
        out.push_str(&escape_source());
    }
    if features.helpers {
        out.push_str(&format!("    {ns}.helpers = {{}};\n"));
    }
    out
}

fn escape_source() -> String {
    let ns = NAMESPACE;
    let mut out = String::new();
    out.push_str(&format!(
        "    {ns}.map = {{\"&\": \"&amp;\", \"<\": \"&lt;\", \">\": \"&gt;\", '\"': \"&quot;\", \"'\": \"&#39;\", \"/\": \"&#x2F;\"}};\n"
    ));
    out.push_str(&format!("    {ns}.escape = function(arg) {{\n"));
    out.push_str("        if (arg === null || arg === undefined) {\n");
    out.push_str("            return '';\n");
    out.push_str("        }\n");
    out.push_str("        return String(arg).replace(/[&<>\"'\\/]/g, function(entity) {\n");
    out.push_str(&format!("            return {ns}.map[entity];\n"));
    out.push_str("        });\n");
    out.push_str("    };\n");
    out
}

/// Bundle footer exporting the namespace
pub fn epilogue() -> String {
    let ns = NAMESPACE;
    let mut out = String::new();
    out.push_str("    if (typeof module !== 'undefined' && module.exports) {\n");
    out.push_str(&format!("        module.exports = {ns};\n"));
    out.push_str("    } else {\n");
    out.push_str(&format!("        window.{ns} = {ns};\n"));
    out.push_str("    }\n");
    out.push_str("}());\n");
    out
}

/// Registry slot a template is assigned to; names that are not plain
/// identifiers use bracket access.
pub fn template_target(name: &str) -> String {
    if name.contains(['-', '.', '/', '\\']) {
        format!("{}.templates['{}']", NAMESPACE, name.replace('\\', "\\\\").replace('\'', "\\'"))
    } else {
        format!("{}.templates.{}", NAMESPACE, name)
    }
}

/// Register a compiled render procedure under `name`
pub fn wrap_template(name: &str, code: &str) -> crate::error::Result<String> {
    let mut out = String::new();
    write!(out, "    {} = ", template_target(name))?;
    for (i, line) in code.lines().enumerate() {
        if i > 0 {
            out.push_str("\n    ");
        }
        out.push_str(line);
    }
    out.push_str(";\n");
    Ok(out)
}

/// Remove spaces left at the end of lines
pub fn strip_trailing_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.trim_end_matches(' '));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_with_render_delegate() {
        let prelude = prelude(RuntimeFeatures::default());
        assert!(prelude.starts_with("// generated by lather "));
        assert!(prelude.contains("    var Lather = {};\n    Lather.templates = {};\n"));
        assert!(prelude.contains("return Lather.templates[name](args || {}, Lather);"));
        assert!(!prelude.contains("Lather.escape"));
        assert!(!prelude.contains("Lather.helpers"));
    }

    #[test]
    fn test_prelude_features() {
        let prelude = prelude(RuntimeFeatures {
            standalone: false,
            escape: true,
            helpers: true,
        });
        assert!(prelude.contains("Lather.escape = function(arg) {"));
        assert!(prelude.contains("return String(arg).replace(/[&<>\"'\\/]/g, function(entity) {"));
        assert!(prelude.contains("Lather.helpers = {};"));
    }

    #[test]
    fn test_standalone_prelude() {
        let prelude = prelude(RuntimeFeatures {
            standalone: true,
            escape: true,
            helpers: true,
        });
        assert!(prelude.contains("Lather.templates = {};"));
        assert!(!prelude.contains("Lather.render"));
        assert!(!prelude.contains("Lather.escape"));
    }

    #[test]
    fn test_template_target() {
        assert_eq!(template_target("home"), "Lather.templates.home");
        assert_eq!(template_target("blog-post"), "Lather.templates['blog-post']");
        assert_eq!(template_target("helper/tip"), "Lather.templates['helper/tip']");
        assert_eq!(template_target("page.en"), "Lather.templates['page.en']");
    }

    #[test]
    fn test_wrap_template_indents_body() {
        let wrapped = wrap_template("home", "function(args, ctx) {\n    return '';\n}").unwrap();
        assert_eq!(wrapped, "    Lather.templates.home = function(args, ctx) {\n        return '';\n    };\n");
    }

    #[test]
    fn test_strip_trailing_spaces() {
        assert_eq!(strip_trailing_spaces("a  \n  b \nc"), "a\n  b\nc");
    }

    #[test]
    fn test_epilogue_exports() {
        let epilogue = epilogue();
        assert!(epilogue.contains("module.exports = Lather;"));
        assert!(epilogue.contains("window.Lather = Lather;"));
    }
}
