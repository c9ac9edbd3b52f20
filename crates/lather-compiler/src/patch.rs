/// Offset-based text patching
///
/// Edits are recorded against spans of an unmodified source and applied
/// back to front, so that applying one edit never shifts the offsets of an
/// edit still waiting to be applied.

use lather_lexer::Span;

/// Replacement of one byte range of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub replacement: String,
}

impl Edit {
    pub fn new(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    /// Qualify the identifier at `span` with `prefix`, e.g. `name` -> `args.name`
    pub fn qualify(span: Span, prefix: &str, name: &str) -> Self {
        Self::new(span, format!("{}.{}", prefix, name))
    }
}

/// Apply non-overlapping edits in descending start order
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));

    let mut output = source.to_string();
    for edit in edits {
        output.replace_range(edit.span.start..edit.span.end, &edit.replacement);
    }
    output
}
