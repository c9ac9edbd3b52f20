/// Free-variable resolution
///
/// Scans the generated procedure body token by token and qualifies every
/// identifier that is neither declared by the template nor globally
/// available: plain references read from the data record, calls go through
/// the helper namespace. The scan is lexical; it tracks just enough bracket
/// structure to tell bindings, property names and object keys apart from
/// references, and to know where each binding goes out of scope.

use crate::builtins::is_builtin;
use crate::naming::normalize_view_argument;
use crate::patch::{apply_edits, Edit};
use crate::template::TemplateOptions;
use lather_lexer::{tokenize, JsToken, LexError, Rule};
use std::collections::HashSet;

/// Rewritten code plus what the template expects from its caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub code: String,
    /// Data record fields read by the template, in order of first use
    pub free_variables: Vec<String>,
    /// Helpers called by the template, in order of first use
    pub helpers: Vec<String>,
    pub uses_escape: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BracketKind {
    Paren { for_head: bool },
    Square,
    Block,
    Object,
}

/// Binding position inside a parameter list or destructuring pattern
#[derive(Debug, Clone, Copy)]
struct Binding {
    /// Identifiers here declare names; cleared by `=` until the next `,`
    defining: bool,
    /// Object patterns have keys that are not bindings
    object: bool,
    /// Names belong to the enclosing function rather than the block
    hoisted: bool,
}

/// Names bound in one lexical scope
#[derive(Debug, Clone, Default)]
struct Scope {
    names: HashSet<String>,
    /// Function bodies (and parameter lists) receive hoisted `var`s
    function: bool,
}

/// Bindings of an expression-bodied arrow or a loop without braces, alive
/// until the next `,` or `;` at `depth`, or until that bracket closes
#[derive(Debug, Clone)]
struct ExprScope {
    names: HashSet<String>,
    depth: usize,
}

#[derive(Debug, Clone)]
struct Bracket {
    kind: BracketKind,
    binding: Option<Binding>,
    scope: Option<Scope>,
    /// Parameter lists and `for` heads hand their names to what follows
    carries: bool,
}

/// An open `var`/`let`/`const` statement
#[derive(Debug, Clone, Copy)]
struct Declaration {
    /// Bracket depth the declaration lives at
    depth: usize,
    defining: bool,
    /// `var` rather than `let`/`const`
    hoisted: bool,
}

/// Qualifies free identifiers of one procedure body
pub struct Resolver<'a> {
    options: &'a TemplateOptions,
    /// Names bound at procedure level
    declared: HashSet<String>,
    stack: Vec<Bracket>,
    expr_scopes: Vec<ExprScope>,
    /// Scope of a just-closed parameter list or `for` head
    carry: Option<Scope>,
    declaration: Option<Declaration>,
    edits: Vec<Edit>,
    resolution: Resolution,
}

impl<'a> Resolver<'a> {
    /// Create a resolver that treats the data and context names, plus the
    /// given names, as declared.
    pub fn new<I, S>(options: &'a TemplateOptions, declared: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: HashSet<String> = declared.into_iter().map(Into::into).collect();
        names.insert(options.data_name.clone());
        names.insert(options.context_name.clone());
        Self {
            options,
            declared: names,
            stack: Vec::new(),
            expr_scopes: Vec::new(),
            carry: None,
            declaration: None,
            edits: Vec::new(),
            resolution: Resolution::default(),
        }
    }

    pub fn resolve(mut self, code: &str) -> Result<Resolution, LexError> {
        let mut tokens = tokenize(code)?;
        if tokens.last().is_some_and(|t| t.rule == Rule::End) {
            tokens.pop();
        }
        let closing = matching_parens(&tokens);

        for i in 0..tokens.len() {
            let token = &tokens[i];
            self.settle_carry(token.rule);

            match token.rule {
                Rule::Var | Rule::Let | Rule::Const => {
                    self.declaration = Some(Declaration {
                        depth: self.stack.len(),
                        defining: true,
                        hoisted: token.rule == Rule::Var,
                    });
                }
                Rule::In => self.end_declaration_here(),
                Rule::LParen => {
                    let for_head = previous(&tokens, i).is_some_and(|p| p.rule == Rule::For);
                    if for_head {
                        self.push(Bracket {
                            kind: BracketKind::Paren { for_head },
                            binding: None,
                            scope: Some(Scope::default()),
                            carries: true,
                        });
                    } else if let Some(function) = self.parameter_list(&tokens, &closing, i) {
                        self.push(Bracket {
                            kind: BracketKind::Paren { for_head },
                            binding: Some(Binding {
                                defining: true,
                                object: false,
                                hoisted: false,
                            }),
                            scope: Some(Scope {
                                names: HashSet::new(),
                                function,
                            }),
                            carries: true,
                        });
                    } else {
                        self.open_bracket(BracketKind::Paren { for_head }, false);
                    }
                }
                Rule::LBracket => self.open_bracket(BracketKind::Square, false),
                Rule::LBrace => {
                    let kind = self.brace_kind(previous(&tokens, i));
                    if kind == BracketKind::Block {
                        let scope = self.carry.take().unwrap_or_default();
                        self.push(Bracket {
                            kind,
                            binding: None,
                            scope: Some(scope),
                            carries: false,
                        });
                    } else {
                        self.open_bracket(kind, true);
                    }
                }
                Rule::RParen | Rule::RBracket | Rule::RBrace => self.pop(),
                Rule::Semicolon => {
                    self.end_expr_scopes();
                    self.end_declaration_here();
                }
                Rule::Assign => self.set_defining(false),
                Rule::Comma => {
                    self.end_expr_scopes();
                    self.set_defining(true);
                }
                Rule::Identifier => self.identifier(&tokens, i),
                _ => {}
            }
        }

        self.resolution.code = apply_edits(code, self.edits);
        Ok(self.resolution)
    }

    /// A carried scope becomes the next block's scope, survives an `=>`,
    /// and otherwise covers the expression that follows.
    fn settle_carry(&mut self, next: Rule) {
        if matches!(next, Rule::Arrow | Rule::LBrace) {
            return;
        }
        if let Some(scope) = self.carry.take() {
            self.expr_scopes.push(ExprScope {
                names: scope.names,
                depth: self.stack.len(),
            });
        }
    }

    fn identifier(&mut self, tokens: &[JsToken<'_>], i: usize) {
        let token = &tokens[i];
        let name = token.text;
        let prev = previous(tokens, i);
        let next = tokens.get(i + 1);

        if let Some(prev) = prev {
            if matches!(prev.rule, Rule::Dot | Rule::OptionalChain | Rule::Hash | Rule::Break | Rule::Continue) {
                return;
            }
            if prev.rule == Rule::Function {
                self.declare(name, true);
                return;
            }
        }

        if name == self.options.context_name {
            self.note_context_use(tokens, i);
        }

        if name == "of" && self.in_for_head() && prev.is_some_and(|p| matches!(p.rule, Rule::Identifier | Rule::RBracket | Rule::RBrace)) {
            self.declaration = None;
            return;
        }

        if next.is_some_and(|n| n.rule == Rule::Arrow) {
            let mut scope = Scope {
                names: HashSet::new(),
                function: true,
            };
            scope.names.insert(name.to_string());
            self.carry = Some(scope);
            return;
        }

        if let Some(binding) = self.stack.last().and_then(|b| b.binding) {
            if binding.object && next.is_some_and(|n| n.rule == Rule::Colon) {
                return;
            }
            if binding.defining {
                self.declare(name, binding.hoisted);
                return;
            }
        } else if let Some(declaration) = self.declaration {
            if declaration.depth == self.stack.len() && declaration.defining {
                self.set_defining(false);
                self.declare(name, declaration.hoisted);
                return;
            }
        }

        let in_object = self.stack.last().is_some_and(|b| b.kind == BracketKind::Object && b.binding.is_none());
        let after_separator = prev.is_some_and(|p| matches!(p.rule, Rule::LBrace | Rule::Comma));
        if in_object && after_separator {
            match next.map(|n| n.rule) {
                Some(Rule::Colon) | Some(Rule::LParen) => return,
                Some(Rule::Comma) | Some(Rule::RBrace) => {
                    if self.is_free(name) {
                        let field = format!("{}: {}.{}", name, self.options.data_name, name);
                        self.edits.push(Edit::new(token.span, field));
                        self.record_free_variable(name);
                    }
                    return;
                }
                _ => {}
            }
        }

        if !self.is_free(name) {
            return;
        }

        if next.is_some_and(|n| n.rule == Rule::LParen) {
            self.qualify_call(tokens, i);
        } else {
            self.edits.push(Edit::qualify(token.span, &self.options.data_name, name));
            self.record_free_variable(name);
        }
    }

    fn qualify_call(&mut self, tokens: &[JsToken<'_>], i: usize) {
        let token = &tokens[i];
        let name = token.text;
        let context = &self.options.context_name;
        match name {
            "escape" => {
                self.edits.push(Edit::qualify(token.span, context, name));
                self.resolution.uses_escape = true;
            }
            "render" => {
                self.edits.push(Edit::qualify(token.span, context, name));
                // A literal view name is normalized like the directive form
                if let (Some(view), Some(after)) = (tokens.get(i + 2), tokens.get(i + 3)) {
                    let literal = matches!(view.rule, Rule::String | Rule::Template);
                    if literal && matches!(after.rule, Rule::Comma | Rule::RParen) {
                        self.edits.push(Edit::new(view.span, normalize_view_argument(view.text)));
                    }
                }
            }
            _ if self.options.bare_calls => {}
            _ => {
                self.edits.push(Edit::qualify(token.span, &format!("{}.helpers", context), name));
                self.record_helper(name);
            }
        }
    }

    /// Record capabilities the generated code already reaches through the
    /// context, e.g. `ctx.escape(...)` or `ctx.helpers.format(...)`
    fn note_context_use(&mut self, tokens: &[JsToken<'_>], i: usize) {
        let at = |offset: usize| tokens.get(i + offset);
        if at(1).map(|t| t.rule) != Some(Rule::Dot) {
            return;
        }
        match at(2).map(|t| t.text) {
            Some("escape") => self.resolution.uses_escape = true,
            Some("helpers") if at(3).map(|t| t.rule) == Some(Rule::Dot) => {
                if let Some(helper) = at(4).filter(|t| t.rule == Rule::Identifier) {
                    self.record_helper(helper.text);
                }
            }
            _ => {}
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
            || self.stack.iter().any(|b| b.scope.as_ref().is_some_and(|s| s.names.contains(name)))
            || self.expr_scopes.iter().any(|s| s.names.contains(name))
    }

    fn is_free(&self, name: &str) -> bool {
        !self.is_declared(name) && !is_builtin(name)
    }

    /// Bind `name` in the innermost scope, or the innermost function scope
    /// when hoisted
    fn declare(&mut self, name: &str, hoisted: bool) {
        let scope = self
            .stack
            .iter_mut()
            .rev()
            .filter_map(|b| b.scope.as_mut())
            .find(|s| !hoisted || s.function);
        match scope {
            Some(scope) => scope.names.insert(name.to_string()),
            None => self.declared.insert(name.to_string()),
        };
    }

    fn record_free_variable(&mut self, name: &str) {
        if !self.resolution.free_variables.iter().any(|v| v == name) {
            self.resolution.free_variables.push(name.to_string());
        }
    }

    fn record_helper(&mut self, name: &str) {
        if !self.resolution.helpers.iter().any(|h| h == name) {
            self.resolution.helpers.push(name.to_string());
        }
    }

    /// `function (a, b)`, `catch (e)`, `(a, b) =>` and method shorthand.
    /// Returns whether the list opens a function scope.
    fn parameter_list(&self, tokens: &[JsToken<'_>], closing: &[Option<usize>], i: usize) -> Option<bool> {
        if let Some(prev) = previous(tokens, i) {
            match prev.rule {
                Rule::Function => return Some(true),
                Rule::Catch => return Some(false),
                Rule::Identifier if i > 1 && tokens[i - 2].rule == Rule::Function => return Some(true),
                _ => {}
            }
        }
        let close = closing[i]?;
        match tokens.get(close + 1).map(|t| t.rule) {
            Some(Rule::Arrow) => Some(true),
            Some(Rule::LBrace)
                if previous(tokens, i).is_some_and(|p| p.rule == Rule::Identifier)
                    && self.stack.last().is_some_and(|b| b.kind == BracketKind::Object) =>
            {
                Some(true)
            }
            _ => None,
        }
    }

    fn brace_kind(&self, prev: Option<&JsToken<'_>>) -> BracketKind {
        let Some(prev) = prev else {
            return BracketKind::Block;
        };
        match prev.rule {
            Rule::RParen
            | Rule::Semicolon
            | Rule::LBrace
            | Rule::RBrace
            | Rule::Else
            | Rule::Do
            | Rule::Try
            | Rule::Finally
            | Rule::Arrow => BracketKind::Block,
            Rule::Colon if !self.stack.last().is_some_and(|b| b.kind == BracketKind::Object) => BracketKind::Block,
            _ => BracketKind::Object,
        }
    }

    /// Open `{`, `[` or `(`, which starts a destructuring pattern when it
    /// sits in a binding position
    fn open_bracket(&mut self, kind: BracketKind, is_brace: bool) {
        let binding = match self.stack.last().and_then(|b| b.binding) {
            Some(binding) => binding.defining.then_some(binding.hoisted),
            None => self
                .declaration
                .filter(|d| d.depth == self.stack.len() && d.defining)
                .map(|d| d.hoisted),
        };
        self.push(Bracket {
            kind,
            binding: binding.map(|hoisted| Binding {
                defining: true,
                object: is_brace,
                hoisted,
            }),
            scope: None,
            carries: false,
        });
    }

    fn push(&mut self, bracket: Bracket) {
        self.stack.push(bracket);
    }

    fn pop(&mut self) {
        let Some(bracket) = self.stack.pop() else {
            return;
        };
        if bracket.carries {
            self.carry = bracket.scope;
        }
        let depth = self.stack.len();
        self.expr_scopes.retain(|s| s.depth <= depth);
        if self.declaration.is_some_and(|d| d.depth > depth) {
            self.declaration = None;
        }
    }

    fn end_expr_scopes(&mut self) {
        let depth = self.stack.len();
        self.expr_scopes.retain(|s| s.depth < depth);
    }

    fn set_defining(&mut self, defining: bool) {
        if let Some(bracket) = self.stack.last_mut() {
            if let Some(binding) = bracket.binding.as_mut() {
                binding.defining = defining;
                return;
            }
        }
        if let Some(declaration) = self.declaration.as_mut() {
            if declaration.depth == self.stack.len() {
                declaration.defining = defining;
            }
        }
    }

    fn end_declaration_here(&mut self) {
        if self.declaration.is_some_and(|d| d.depth == self.stack.len()) {
            self.declaration = None;
        }
    }

    fn in_for_head(&self) -> bool {
        matches!(self.stack.last().map(|b| b.kind), Some(BracketKind::Paren { for_head: true }))
    }
}

fn previous<'a, 't>(tokens: &'a [JsToken<'t>], i: usize) -> Option<&'a JsToken<'t>> {
    i.checked_sub(1).and_then(|p| tokens.get(p))
}

/// Index of the `)` matching each `(`
fn matching_parens(tokens: &[JsToken<'_>]) -> Vec<Option<usize>> {
    let mut closing = vec![None; tokens.len()];
    let mut open = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.rule {
            Rule::LParen => open.push(i),
            Rule::RParen => {
                if let Some(start) = open.pop() {
                    closing[start] = Some(i);
                }
            }
            _ => {}
        }
    }
    closing
}

/// Resolve free identifiers of `code`, treating `declared` as bound
pub fn resolve<I, S>(code: &str, declared: I, options: &TemplateOptions) -> Result<Resolution, LexError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Resolver::new(options, declared).resolve(code)
}
