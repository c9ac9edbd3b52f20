/// Directive classification
///
/// A control tag body is classified by its leading word into one of the
/// directive kinds the code generator knows how to emit.

use crate::naming::{strip_quotes, template_name_from_path};
use lather_lexer::is_reserved_word;

/// A classified control directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `if`, `for`, `switch` or `while` opening a compound statement
    Open { keyword: &'static str, rest: String },
    /// `elseif cond` or `else if cond`
    ElseIf(String),
    Else,
    Case(String),
    Default,
    Break,
    /// Any `end*` word standing alone
    End,
    /// `block name`
    Block(String),
    /// `extend name`, with the name already normalized
    Extend(String),
    /// `name(args)` appending its result to the output
    Call { name: String, args: String },
    /// Anything else, emitted as a statement
    Statement(String),
}

const OPENERS: &[&str] = &["if", "for", "switch", "while"];

impl Directive {
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        let (word, rest) = leading_word(body);
        let rest = rest.trim();

        if let Some(&keyword) = OPENERS.iter().find(|&&k| k == word) {
            if rest.ends_with('}') {
                return Directive::Statement(body.to_string());
            }
            return Directive::Open {
                keyword,
                rest: rest.to_string(),
            };
        }

        match word {
            "elseif" => return Directive::ElseIf(rest.to_string()),
            "else" => {
                let (next, cond) = leading_word(rest);
                if rest.is_empty() {
                    return Directive::Else;
                }
                if next == "if" {
                    return Directive::ElseIf(cond.trim().to_string());
                }
            }
            "case" => return Directive::Case(rest.trim_end_matches(':').trim_end().to_string()),
            "default" if rest.is_empty() || rest == ":" => return Directive::Default,
            "break" if rest.is_empty() => return Directive::Break,
            "block" if !rest.is_empty() => {
                return Directive::Block(strip_quotes(rest).to_string());
            }
            "extend" | "extends" if !rest.is_empty() => {
                return Directive::Extend(template_name_from_path(strip_quotes(rest), false));
            }
            _ if word.starts_with("end") && rest.is_empty() => return Directive::End,
            _ => {}
        }

        match parse_call(body, word) {
            Some((name, args)) => Directive::Call { name, args },
            None => Directive::Statement(body.to_string()),
        }
    }
}

/// Split off the leading identifier run
fn leading_word(text: &str) -> (&str, &str) {
    let end = text
        .char_indices()
        .find(|&(_, c)| !(c == '_' || c == '$' || c.is_alphanumeric()))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(end)
}

/// `name(args)` where the parenthesis opened after the name is the one
/// that closes the body
fn parse_call(body: &str, word: &str) -> Option<(String, String)> {
    if word.is_empty() || word.starts_with(|c: char| c.is_ascii_digit()) || is_reserved_word(word) {
        return None;
    }
    let open = word.len();
    if !body[open..].starts_with('(') {
        return None;
    }
    let close = matching_paren(body, open)?;
    if close != body.len() - 1 {
        return None;
    }
    Some((word.to_string(), body[open + 1..close].trim().to_string()))
}

/// Byte index of the parenthesis closing the one at `open`, skipping over
/// string literals
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}
