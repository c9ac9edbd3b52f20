/// Directive splitting
///
/// Segments template text into literal runs and control directives. Output
/// tags are resolved first and folded into the surrounding literal text as
/// concatenations; control tags are then cut out by a second scan.

use once_cell::sync::Lazy;
use regex::Regex;

/// Stands in for a `'` that belongs to generated code inside literal text
pub(crate) const QUOTE_PLACEHOLDER: char = '\u{E000}';
/// Stands in for a `\` that belongs to generated code inside literal text
pub(crate) const BACKSLASH_PLACEHOLDER: char = '\u{E001}';

static MARKUP_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Delimiter pairs of the two directive families
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub output_open: String,
    pub output_close: String,
    pub block_open: String,
    pub block_close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            output_open: "{{".to_string(),
            output_close: "}}".to_string(),
            block_open: "{%".to_string(),
            block_close: "%}".to_string(),
        }
    }
}

impl Delimiters {
    pub fn new(
        output: (impl Into<String>, impl Into<String>),
        block: (impl Into<String>, impl Into<String>),
    ) -> Self {
        Self {
            output_open: output.0.into(),
            output_close: output.1.into(),
            block_open: block.0.into(),
            block_close: block.1.into(),
        }
    }
}

/// One piece of a split template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text to emit, possibly carrying folded output expressions
    Literal(String),
    /// Body of a control tag and its trailing `:` or `;`, if any
    Directive {
        body: String,
        terminator: Option<char>,
    },
}

/// Comment stripping and whitespace normalization, applied once before
/// splitting.
pub fn preprocess(source: &str) -> String {
    let text = source.replace([QUOTE_PLACEHOLDER, BACKSLASH_PLACEHOLDER], "");
    let text = MARKUP_COMMENT.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    text.replace("> <", "><")
}

/// Split a template into literal and directive segments
pub fn split(source: &str, delimiters: &Delimiters) -> Vec<Segment> {
    let text = fold_output_tags(&preprocess(source), delimiters);

    let mut segments = Vec::new();
    let mut rest = text.as_str();
    while let Some((before, inner, after)) = find_tag(rest, &delimiters.block_open, &delimiters.block_close) {
        push_literal(&mut segments, before);
        if let Some(directive) = directive_segment(inner) {
            segments.push(directive);
        }
        rest = after;
    }
    push_literal(&mut segments, rest);
    segments
}

/// Locate the next complete tag, returning the text before it, its inner
/// text and the text after it. An opening delimiter without a close is left
/// as literal text.
fn find_tag<'a>(text: &'a str, open: &str, close: &str) -> Option<(&'a str, &'a str, &'a str)> {
    let start = text.find(open)?;
    let inner_start = start + open.len();
    let inner_len = text[inner_start..].find(close)?;
    let inner_end = inner_start + inner_len;
    Some((&text[..start], &text[inner_start..inner_end], &text[inner_end + close.len()..]))
}

/// Rewrite every output tag into `' + expr + '` with its quotes and
/// backslashes protected from literal escaping.
fn fold_output_tags(text: &str, delimiters: &Delimiters) -> String {
    let mut folded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some((before, inner, after)) = find_tag(rest, &delimiters.output_open, &delimiters.output_close) {
        folded.push_str(before);

        let expr = inner.trim();
        let expr = expr.strip_suffix(';').unwrap_or(expr).trim_end();
        if !expr.is_empty() {
            folded.push(QUOTE_PLACEHOLDER);
            folded.push_str(" + ");
            folded.push_str(&protect(expr));
            folded.push_str(" + ");
            folded.push(QUOTE_PLACEHOLDER);
        }
        rest = after;
    }
    folded.push_str(rest);
    folded
}

fn protect(expr: &str) -> String {
    expr.chars()
        .map(|c| match c {
            '\'' => QUOTE_PLACEHOLDER,
            '\\' => BACKSLASH_PLACEHOLDER,
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if !text.trim().is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
}

fn directive_segment(inner: &str) -> Option<Segment> {
    let body = inner.trim();
    let (body, terminator) = match body.chars().last() {
        Some(c @ (':' | ';')) => (body[..body.len() - 1].trim_end(), Some(c)),
        _ => (body, None),
    };
    if body.is_empty() {
        return None;
    }
    Some(Segment::Directive {
        body: body.to_string(),
        terminator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(text: &str) -> Segment {
        Segment::Literal(text.to_string())
    }

    fn directive(body: &str, terminator: Option<char>) -> Segment {
        Segment::Directive {
            body: body.to_string(),
            terminator,
        }
    }

    fn split_default(source: &str) -> Vec<Segment> {
        split(source, &Delimiters::default())
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(split_default("<h1>Hello</h1>"), vec![literal("<h1>Hello</h1>")]);
    }

    #[test]
    fn test_alternating_segments() {
        let segments = split_default("<h1>Hello {% if (name) %}Craig{% else %}Person{% end %}!</h1>");
        assert_eq!(segments, vec![
            literal("<h1>Hello "),
            directive("if (name)", None),
            literal("Craig"),
            directive("else", None),
            literal("Person"),
            directive("end", None),
            literal("!</h1>"),
        ]);
    }

    #[test]
    fn test_terminator_is_captured_separately() {
        let segments = split_default("{% if (name): %}x{% endif; %}{% var a = 1; %}");
        assert_eq!(segments, vec![
            directive("if (name)", Some(':')),
            literal("x"),
            directive("endif", Some(';')),
            directive("var a = 1", Some(';')),
        ]);
    }

    #[test]
    fn test_output_tags_fold_into_literals() {
        let segments = split_default("Hello {{name}}!");
        let expected = format!("Hello {q} + name + {q}!", q = QUOTE_PLACEHOLDER);
        assert_eq!(segments, vec![Segment::Literal(expected)]);
    }

    #[test]
    fn test_output_expression_quotes_are_protected() {
        let segments = split_default("{{ items.join(', ') }}");
        let Segment::Literal(text) = &segments[0] else {
            panic!("expected a literal segment");
        };
        assert!(!text.contains('\''));
        let q = QUOTE_PLACEHOLDER;
        assert_eq!(text, &format!("{q} + items.join({q}, {q}) + {q}"));
    }

    #[test]
    fn test_whitespace_normalization() {
        assert_eq!(preprocess("<ul>\n    <li>a</li>\n    <li>b</li>\n  </ul>"), "<ul><li>a</li><li>b</li></ul>");
        assert_eq!(preprocess("a  \t b"), "a b");
        assert_eq!(preprocess("single\nnewline"), "single\nnewline");
    }

    #[test]
    fn test_markup_comments_are_removed() {
        assert_eq!(preprocess("<!-- some\ncomment -->\n<div>Hello</div>"), "\n<div>Hello</div>");
        assert_eq!(preprocess("a <!-- x --> b"), "a b");
    }

    #[test]
    fn test_whitespace_only_literals_are_dropped() {
        let segments = split_default("{% block a %}A{% end %} {% block b %}B{% end %}");
        assert_eq!(segments.len(), 6);
        assert!(!segments.contains(&literal(" ")));
    }

    #[test]
    fn test_unterminated_tags_stay_literal() {
        assert_eq!(split_default("a {% if (x)"), vec![literal("a {% if (x)")]);
        assert_eq!(split_default("a {{ b"), vec![literal("a {{ b")]);
    }

    #[test]
    fn test_custom_delimiters() {
        let delimiters = Delimiters::new(("<?=", "?>"), ("<?", "?>"));
        let segments = split("<p><?= name ?></p><? if (x) ?>y<? end ?>", &delimiters);
        let q = QUOTE_PLACEHOLDER;
        assert_eq!(segments, vec![
            Segment::Literal(format!("<p>{q} + name + {q}</p>")),
            directive("if (x)", None),
            literal("y"),
            directive("end", None),
        ]);
    }
}
