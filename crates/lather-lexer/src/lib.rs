//! JavaScript tokenizer for the lather template compiler.
//!
//! The free-variable pass only needs to know where identifiers are and what
//! surrounds them, so this lexer stops at token boundaries and never builds a
//! tree. Token rules live in `lexer.alex` and are compiled by `parlex-gen`.
//! The driver switches lexer modes so that a `/` after an operand is
//! division, and so that the `}` closing a template substitution resumes the
//! template text. Whitespace and comments are dropped by [`Lexer`].

use parlex::{LexerData, LexerDriver, ParlexError};
use std::str::Bytes;
use thiserror::Error;
use try_next::{IterInput, TryNextWithContext};

// Include generated lexer code from build.rs
mod lexer {
    include!(concat!(env!("OUT_DIR"), "/lexer.rs"));
}

pub use lexer::{LexData, Mode, Rule};

/// Byte range of a token in the scanned source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Rule {
    /// Whether a token of this kind ends an operand, so that a following `/`
    /// is a division rather than the start of a regex literal.
    fn ends_operand(self) -> bool {
        matches!(
            self,
            Rule::Identifier
                | Rule::Number
                | Rule::QuestionFraction
                | Rule::String
                | Rule::Regex
                | Rule::Template
                | Rule::TemplateTail
                | Rule::RParen
                | Rule::RBracket
                | Rule::RBrace
                | Rule::This
                | Rule::Super
                | Rule::True
                | Rule::False
                | Rule::Null
        )
    }

    fn is_trivia(self) -> bool {
        matches!(self, Rule::Whitespace | Rule::Newline | Rule::Comment)
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            Rule::Var
                | Rule::Let
                | Rule::Const
                | Rule::In
                | Rule::Function
                | Rule::Catch
                | Rule::Case
                | Rule::Default
                | Rule::Else
                | Rule::Do
                | Rule::Try
                | Rule::Finally
                | Rule::Return
                | Rule::Typeof
                | Rule::Instanceof
                | Rule::New
                | Rule::Delete
                | Rule::Void
                | Rule::Throw
                | Rule::Yield
                | Rule::Await
                | Rule::This
                | Rule::Super
                | Rule::True
                | Rule::False
                | Rule::Null
                | Rule::Break
                | Rule::Continue
                | Rule::For
                | Rule::If
                | Rule::Switch
                | Rule::While
                | Rule::With
                | Rule::Class
                | Rule::Debugger
                | Rule::Enum
                | Rule::Export
                | Rule::Extends
                | Rule::Import
        )
    }
}

/// Tokenization failure, reported with the byte offset where the bad
/// token starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },

    #[error("unterminated template literal starting at byte {offset}")]
    UnterminatedTemplate { offset: usize },

    #[error("unterminated regular expression starting at byte {offset}")]
    UnterminatedRegex { offset: usize },

    #[error("unterminated block comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },

    #[error("unexpected character '{ch}' at byte {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("lexer failure: {0}")]
    Lexer(String),
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            LexError::UnterminatedString { offset }
            | LexError::UnterminatedTemplate { offset }
            | LexError::UnterminatedRegex { offset }
            | LexError::UnterminatedComment { offset }
            | LexError::UnexpectedChar { offset, .. } => *offset,
            LexError::Lexer(_) => 0,
        }
    }
}

impl From<ParlexError> for LexError {
    fn from(err: ParlexError) -> Self {
        LexError::Lexer(err.to_string())
    }
}

/// Token as produced by the generated lexer, positioned by line and column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub rule: Rule,
    pub span: Option<parlex::Span>,
}

impl RawToken {
    pub fn new(rule: Rule, span: Option<parlex::Span>) -> Self {
        Self { rule, span }
    }
}

impl parlex::Token for RawToken {
    type TokenID = Rule;

    fn token_id(&self) -> Self::TokenID {
        self.rule
    }

    fn span(&self) -> Option<parlex::Span> {
        self.span
    }
}

/// Driver that tracks brace nesting and operand position to pick the mode
/// of the next token
pub struct JsLexerDriver<I> {
    /// Open braces; `true` marks a template `${`
    braces: Vec<bool>,
    /// Last significant token ended an operand
    operand: bool,
    _input: std::marker::PhantomData<I>,
}

impl<I> JsLexerDriver<I> {
    fn new() -> Self {
        Self {
            braces: Vec::new(),
            operand: false,
            _input: std::marker::PhantomData,
        }
    }

    fn track(&mut self, rule: Rule) {
        match rule {
            Rule::LBrace => self.braces.push(false),
            Rule::TemplateHead => self.braces.push(true),
            Rule::RBrace | Rule::TemplateTail => {
                self.braces.pop();
            }
            _ => {}
        }
        if !rule.is_trivia() {
            self.operand = rule.ends_operand();
        }
    }

    fn mode(&self) -> Mode {
        let substitution = self.braces.last().copied().unwrap_or(false);
        match (substitution, self.operand) {
            (false, false) => Mode::Expr,
            (false, true) => Mode::Operand,
            (true, false) => Mode::SubstExpr,
            (true, true) => Mode::SubstOperand,
        }
    }
}

impl<I> LexerDriver for JsLexerDriver<I>
where
    I: TryNextWithContext<(), Item = u8, Error: std::fmt::Display + 'static>,
{
    type LexerData = LexData;
    type Token = RawToken;
    type Lexer = parlex::Lexer<I, Self, Self::Context>;
    type Context = ();

    fn action(
        &mut self,
        lexer: &mut Self::Lexer,
        _context: &mut Self::Context,
        rule: <Self::LexerData as LexerData>::LexerRule,
    ) -> Result<(), ParlexError> {
        let span = lexer.span();
        self.track(rule);
        lexer.begin(self.mode());
        lexer.yield_token(RawToken::new(rule, Some(span)));
        Ok(())
    }
}

/// Token produced by the lexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsToken<'input> {
    pub rule: Rule,
    pub span: Span,
    pub text: &'input str,
}

impl<'input> JsToken<'input> {
    pub fn new(rule: Rule, span: Span, text: &'input str) -> Self {
        Self { rule, span, text }
    }
}

type ByteInput<'input> = IterInput<Bytes<'input>>;

/// Streaming JavaScript lexer over a borrowed source string
pub struct Lexer<'input> {
    src: &'input str,
    /// Byte offset of every line start
    line_starts: Vec<usize>,
    inner: parlex::Lexer<ByteInput<'input>, JsLexerDriver<ByteInput<'input>>, ()>,
    /// Start offsets of the template literals with an open substitution
    templates: Vec<usize>,
    /// Second half of a split token
    pending: Option<JsToken<'input>>,
    finished: bool,
}

impl<'input> Lexer<'input> {
    pub fn try_new(src: &'input str) -> Result<Self, LexError> {
        let input = IterInput::from(src.bytes());
        let inner = parlex::Lexer::try_new(input, JsLexerDriver::new())?;

        let mut line_starts = vec![0];
        line_starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));

        Ok(Self {
            src,
            line_starts,
            inner,
            templates: Vec::new(),
            pending: None,
            finished: false,
        })
    }

    /// Byte offset of a line/column position, columns counted in characters
    fn offset(&self, position: parlex::Position) -> usize {
        let Some(&line_start) = self.line_starts.get(position.line) else {
            return self.src.len();
        };
        self.src[line_start..]
            .char_indices()
            .nth(position.column)
            .map(|(i, _)| line_start + i)
            .unwrap_or(self.src.len())
    }

    fn byte_span(&self, span: Option<parlex::Span>) -> Span {
        match span {
            Some(span) => {
                let start = self.offset(span.start);
                Span::new(start, self.offset(span.end).max(start))
            }
            None => Span::new(self.src.len(), self.src.len()),
        }
    }

    fn next_token(&mut self) -> Result<Option<JsToken<'input>>, LexError> {
        if let Some(token) = self.pending.take() {
            return Ok(Some(token));
        }
        if self.finished {
            return Ok(None);
        }

        loop {
            let Some(raw) = self.inner.try_next_with_context(&mut ())? else {
                self.finished = true;
                return Ok(None);
            };
            if raw.rule.is_trivia() {
                continue;
            }

            let mut span = self.byte_span(raw.span);
            let offset = span.start;
            match raw.rule {
                Rule::UnterminatedString => return Err(LexError::UnterminatedString { offset }),
                Rule::UnterminatedTemplate => return Err(LexError::UnterminatedTemplate { offset }),
                Rule::UnterminatedSubstitution => {
                    let offset = self.templates.last().copied().unwrap_or(offset);
                    return Err(LexError::UnterminatedTemplate { offset });
                }
                Rule::UnterminatedRegex => return Err(LexError::UnterminatedRegex { offset }),
                Rule::UnterminatedComment => return Err(LexError::UnterminatedComment { offset }),
                Rule::ErrorAny => {
                    let ch = self.src[offset..].chars().next().unwrap_or('\0');
                    return Err(LexError::UnexpectedChar { ch, offset });
                }
                Rule::TemplateHead => self.templates.push(offset),
                Rule::TemplateTail => {
                    self.templates.pop();
                }
                // `a?.5:b` is a conditional, not optional chaining
                Rule::QuestionFraction => {
                    let number = Span::new(offset + 1, span.end);
                    self.pending = Some(JsToken::new(Rule::Number, number, &self.src[number.start..number.end]));
                    let question = Span::new(offset, offset + 1);
                    return Ok(Some(JsToken::new(Rule::Question, question, &self.src[offset..offset + 1])));
                }
                Rule::End => {
                    if let Some(&start) = self.templates.last() {
                        return Err(LexError::UnterminatedTemplate { offset: start });
                    }
                    self.finished = true;
                    span = Span::new(self.src.len(), self.src.len());
                }
                _ => {}
            }

            let text = &self.src[span.start..span.end];
            return Ok(Some(JsToken::new(raw.rule, span, text)));
        }
    }
}

impl<'input> TryNextWithContext<()> for Lexer<'input> {
    type Item = JsToken<'input>;
    type Error = LexError;

    fn try_next_with_context(&mut self, _context: &mut ()) -> Result<Option<Self::Item>, Self::Error> {
        self.next_token()
    }
}

/// Create a new lexer from a string
pub fn lex_str(input: &str) -> Result<Lexer<'_>, LexError> {
    Lexer::try_new(input)
}

/// Tokenize a whole string. The last token is always [`Rule::End`].
pub fn tokenize(input: &str) -> Result<Vec<JsToken<'_>>, LexError> {
    let mut lexer = lex_str(input)?;
    let mut context = ();
    let mut tokens = Vec::new();
    while let Some(token) = lexer.try_next_with_context(&mut context)? {
        let end = token.rule == Rule::End;
        tokens.push(token);
        if end {
            break;
        }
    }
    Ok(tokens)
}

/// Whether `word` is a reserved word rather than an identifier
pub fn is_reserved_word(word: &str) -> bool {
    match tokenize(word).as_deref() {
        Ok([token, end]) => token.rule.is_keyword() && token.text == word && end.rule == Rule::End,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to collect all token kinds from input
    fn collect_rules(input: &str) -> Result<Vec<Rule>, LexError> {
        Ok(tokenize(input)?.into_iter().map(|t| t.rule).collect())
    }

    #[test]
    fn test_empty_input() -> Result<(), LexError> {
        assert_eq!(collect_rules("")?, vec![Rule::End]);
        assert_eq!(collect_rules("  \n\t ")?, vec![Rule::End]);
        Ok(())
    }

    #[test]
    fn test_keywords_vs_identifiers() -> Result<(), LexError> {
        let rules = collect_rules("var variable let letter in inner of")?;
        assert_eq!(rules, vec![
            Rule::Var, Rule::Identifier,
            Rule::Let, Rule::Identifier,
            Rule::In, Rule::Identifier,
            Rule::Identifier,
            Rule::End,
        ]);
        Ok(())
    }

    #[test]
    fn test_control_keywords() -> Result<(), LexError> {
        let rules = collect_rules("for if switch while break continue")?;
        assert_eq!(rules, vec![
            Rule::For, Rule::If, Rule::Switch, Rule::While, Rule::Break, Rule::Continue, Rule::End,
        ]);
        Ok(())
    }

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved_word("typeof"));
        assert!(is_reserved_word("while"));
        assert!(!is_reserved_word("of"));
        assert!(!is_reserved_word("render"));
        assert!(!is_reserved_word("iffy"));
    }

    #[test]
    fn test_identifier_characters() -> Result<(), LexError> {
        let tokens = tokenize("$el _private café x1")?;
        let texts: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["$el", "_private", "café", "x1", ""]);
        assert!(tokens[..4].iter().all(|t| t.rule == Rule::Identifier));
        Ok(())
    }

    #[test]
    fn test_spans_are_byte_offsets() -> Result<(), LexError> {
        let tokens = tokenize("t += 'é' + name;")?;
        let name = tokens.iter().find(|t| t.text == "name").unwrap();
        assert_eq!(name.span, Span::new(12, 16));
        assert_eq!(&"t += 'é' + name;"[name.span.start..name.span.end], "name");
        Ok(())
    }

    #[test]
    fn test_spans_on_later_lines() -> Result<(), LexError> {
        let source = "var a;\n    b += c;\n";
        let tokens = tokenize(source)?;
        let c = tokens.iter().find(|t| t.text == "c").unwrap();
        assert_eq!(c.span, Span::new(16, 17));
        Ok(())
    }

    #[test]
    fn test_strings_hide_identifiers() -> Result<(), LexError> {
        let rules = collect_rules(r#"'it\'s a name' "say \"hi\"""#)?;
        assert_eq!(rules, vec![Rule::String, Rule::String, Rule::End]);
        Ok(())
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(tokenize("x = 'abc"), Err(LexError::UnterminatedString { offset: 4 }));
        assert_eq!(tokenize("'abc\ndef'"), Err(LexError::UnterminatedString { offset: 0 }));
    }

    #[test]
    fn test_punctuators_longest_match() -> Result<(), LexError> {
        let tokens = tokenize("a === b ?. c ... => >>>= ?? x?.5:y")?;
        let texts: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["a", "===", "b", "?.", "c", "...", "=>", ">>>=", "??", "x", "?", ".5", ":", "y", ""]);
        assert_eq!(tokens[10].rule, Rule::Question);
        assert_eq!(tokens[11].rule, Rule::Number);
        Ok(())
    }

    #[test]
    fn test_regex_vs_division() -> Result<(), LexError> {
        let rules = collect_rules("a / b /= c")?;
        assert_eq!(rules, vec![
            Rule::Identifier, Rule::Slash, Rule::Identifier, Rule::Slash, Rule::Identifier, Rule::End,
        ]);

        let tokens = tokenize("s.replace(/[a/b]name\\//g, x)")?;
        let regex = tokens.iter().find(|t| t.rule == Rule::Regex).unwrap();
        assert_eq!(regex.text, "/[a/b]name\\//g");
        assert!(!tokens.iter().any(|t| t.text == "name"));
        Ok(())
    }

    #[test]
    fn test_unterminated_regex() {
        assert_eq!(tokenize("x = /abc"), Err(LexError::UnterminatedRegex { offset: 4 }));
    }

    #[test]
    fn test_template_substitutions() -> Result<(), LexError> {
        let tokens = tokenize("`Hi ${user.name}, ${ {a: 1}.a } left`")?;
        let rules: Vec<_> = tokens.iter().map(|t| t.rule).collect();
        assert_eq!(rules, vec![
            Rule::TemplateHead,
            Rule::Identifier, Rule::Dot, Rule::Identifier,
            Rule::TemplateMiddle,
            Rule::LBrace, Rule::Identifier, Rule::Colon, Rule::Number, Rule::RBrace, Rule::Dot, Rule::Identifier,
            Rule::TemplateTail,
            Rule::End,
        ]);
        Ok(())
    }

    #[test]
    fn test_regex_inside_substitution() -> Result<(), LexError> {
        let rules = collect_rules("`${ s.replace(/}/g, '') }`")?;
        assert_eq!(rules[0], Rule::TemplateHead);
        assert!(rules.contains(&Rule::Regex));
        assert_eq!(rules[rules.len() - 2], Rule::TemplateTail);
        Ok(())
    }

    #[test]
    fn test_unterminated_template() {
        assert_eq!(tokenize("`abc"), Err(LexError::UnterminatedTemplate { offset: 0 }));
        assert_eq!(tokenize("x + `a ${b"), Err(LexError::UnterminatedTemplate { offset: 4 }));
    }

    #[test]
    fn test_comments_are_skipped() -> Result<(), LexError> {
        let rules = collect_rules("a // note\n/* block\n comment */ b")?;
        assert_eq!(rules, vec![Rule::Identifier, Rule::Identifier, Rule::End]);
        assert_eq!(tokenize("a /* open"), Err(LexError::UnterminatedComment { offset: 2 }));
        Ok(())
    }

    #[test]
    fn test_numbers() -> Result<(), LexError> {
        let tokens = tokenize("0 42 3.14 .5 1e-7 0xFF 1_000")?;
        assert_eq!(tokens.len(), 8);
        assert!(tokens[..7].iter().all(|t| t.rule == Rule::Number));
        assert_eq!(tokens[4].text, "1e-7");
        Ok(())
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(tokenize("a \\ b"), Err(LexError::UnexpectedChar { ch: '\\', offset: 2 }));
    }

    #[test]
    fn test_generated_template_code() -> Result<(), LexError> {
        let input = "var __out = '<ul>';\nfor (var i = 0; i < fruits.length; i++) {\n    __out += '<li>' + fruits[i] + '</li>';\n}\n";
        let tokens = tokenize(input)?;
        let idents: Vec<_> = tokens.iter().filter(|t| t.rule == Rule::Identifier).map(|t| t.text).collect();
        assert_eq!(idents, vec!["__out", "i", "i", "fruits", "length", "i", "__out", "fruits", "i"]);
        Ok(())
    }
}
