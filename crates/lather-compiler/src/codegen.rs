/// Code generation module
///
/// Walks split template segments left to right and emits the statements of
/// the render procedure body into an ordered fragment buffer.

use crate::accumulator::{Accumulator, DEFAULT_ACCUMULATOR};
use crate::builtins::is_builtin;
use crate::directive::Directive;
use crate::inherit::{NamedBlock, OpenBlock};
use crate::naming::normalize_view_argument;
use crate::splitter::Segment;
use crate::template::TemplateOptions;

const INDENT: &str = "    ";

/// One line of generated code. An empty fragment is a declaration slot
/// that has not been filled.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub indent: usize,
    pub code: String,
}

/// Result of the generation pass, before free-variable resolution
#[derive(Debug, Clone)]
pub struct GeneratedBody {
    /// Statements of the procedure body, one indentation level in
    pub code: String,
    /// Every accumulator name introduced
    pub accumulators: Vec<String>,
    /// Blocks in the order they closed
    pub blocks: Vec<NamedBlock>,
    /// Parent template named by the first `extend`
    pub extend_target: Option<String>,
    /// Compound statements still open at the end of the template
    pub unclosed: usize,
}

/// JavaScript code generator for a single template
pub struct CodeGenerator<'a> {
    pub(crate) options: &'a TemplateOptions,
    /// Output buffer
    pub(crate) fragments: Vec<Fragment>,
    /// Cosmetic indentation of the next line
    pub(crate) indent: usize,
    /// Number of compound statements currently open
    pub(crate) depth: usize,
    pub(crate) accumulators: Vec<Accumulator>,
    /// Index of the accumulator receiving output
    pub(crate) active: usize,
    pub(crate) blocks: Vec<OpenBlock>,
    pub(crate) closed_blocks: Vec<NamedBlock>,
    pub(crate) extend_target: Option<String>,
}

impl<'a> CodeGenerator<'a> {
    /// Create a new code generator
    pub fn new(options: &'a TemplateOptions) -> Self {
        let mut generator = Self {
            options,
            fragments: Vec::new(),
            indent: 0,
            depth: 0,
            accumulators: Vec::new(),
            active: 0,
            blocks: Vec::new(),
            closed_blocks: Vec::new(),
            extend_target: None,
        };
        generator.active = generator.add_accumulator(DEFAULT_ACCUMULATOR.to_string());
        generator
    }

    /// Generate the procedure body for a sequence of segments
    pub fn generate(mut self, segments: &[Segment]) -> GeneratedBody {
        for segment in segments {
            match segment {
                Segment::Literal(text) => self.emit_text(text),
                Segment::Directive { body, .. } => self.generate_directive(Directive::parse(body)),
            }
        }
        self.finish()
    }

    fn generate_directive(&mut self, directive: Directive) {
        match directive {
            Directive::Open { keyword, rest } => {
                if rest.is_empty() {
                    self.push_line(format!("{} {{", keyword));
                } else {
                    self.push_line(format!("{} {} {{", keyword, rest));
                }
                self.open_compound();
            }
            Directive::ElseIf(rest) => {
                self.push_line_at(self.indent.saturating_sub(1), format!("}} else if {} {{", rest));
            }
            Directive::Else => {
                self.push_line_at(self.indent.saturating_sub(1), "} else {".to_string());
            }
            Directive::Case(rest) => self.push_line(format!("case {}:", rest)),
            Directive::Default => self.push_line("default:".to_string()),
            Directive::Break => {
                self.push_line("break;".to_string());
                self.indent = self.indent.saturating_sub(1);
            }
            Directive::End => self.generate_end(),
            Directive::Block(name) => self.open_block(&name),
            Directive::Extend(name) => {
                if self.extend_target.is_none() {
                    self.extend_target = Some(name);
                }
            }
            Directive::Call { name, args } => self.generate_call(&name, &args),
            Directive::Statement(body) => self.generate_statement(body),
        }
    }

    /// `end` closes the innermost block when it balances that block's
    /// compound statements, and otherwise closes a compound statement.
    fn generate_end(&mut self) {
        if let Some(block) = self.blocks.last_mut() {
            block.depth = block.depth.saturating_sub(1);
            if block.depth == 0 {
                self.close_block();
                return;
            }
        }
        self.indent = self.indent.saturating_sub(1);
        self.depth = self.depth.saturating_sub(1);
        self.push_line("}".to_string());
    }

    fn generate_statement(&mut self, body: String) {
        if body.starts_with('}') {
            self.close_compound();
        }
        if body.ends_with('{') {
            self.push_line(body);
            self.open_compound();
        } else if body.ends_with(';') || body.ends_with('}') {
            self.push_line(body);
        } else {
            self.push_line(format!("{};", body));
        }
    }

    /// Append the result of `name(args)` to the active accumulator
    fn generate_call(&mut self, name: &str, args: &str) {
        let context = &self.options.context_name;
        let expr = match name {
            "escape" => format!("{}.escape({})", context, args),
            "render" => format!("({}.render({}) || '')", context, render_arguments(args)),
            _ if is_builtin(name) || self.options.bare_calls => format!("({}({}) || '')", name, args),
            _ => format!("({}.helpers.{}({}) || '')", context, name, args),
        };
        self.append(&expr);
    }

    fn open_compound(&mut self) {
        self.indent += 1;
        self.depth += 1;
        if let Some(block) = self.blocks.last_mut() {
            block.depth += 1;
        }
    }

    fn close_compound(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.depth = self.depth.saturating_sub(1);
        if let Some(block) = self.blocks.last_mut() {
            block.depth = block.depth.saturating_sub(1);
        }
    }

    /// Close dangling blocks and make sure the output accumulator exists
    fn finish(mut self) -> GeneratedBody {
        while !self.blocks.is_empty() {
            self.close_block();
        }
        self.declare_if_unused(0);

        let mut code = String::new();
        for fragment in &self.fragments {
            if fragment.code.is_empty() {
                continue;
            }
            for _ in 0..=fragment.indent {
                code.push_str(INDENT);
            }
            code.push_str(&fragment.code);
            code.push('\n');
        }

        let mut accumulators: Vec<String> = Vec::new();
        for accumulator in &self.accumulators {
            if !accumulators.contains(&accumulator.name) {
                accumulators.push(accumulator.name.clone());
            }
        }

        GeneratedBody {
            code,
            accumulators,
            blocks: self.closed_blocks,
            extend_target: self.extend_target,
            unclosed: self.depth,
        }
    }

    pub(crate) fn push_line(&mut self, code: String) {
        self.push_line_at(self.indent, code);
    }

    fn push_line_at(&mut self, indent: usize, code: String) {
        self.fragments.push(Fragment { indent, code });
    }

    /// Reserve an empty fragment at the current position
    pub(crate) fn push_slot(&mut self) -> usize {
        self.fragments.push(Fragment {
            indent: self.indent,
            code: String::new(),
        });
        self.fragments.len() - 1
    }

    pub(crate) fn fill_slot(&mut self, slot: usize, code: String) {
        self.fragments[slot].code = code;
    }
}

/// Normalize a literal view name passed as the first argument of `render`
fn render_arguments(args: &str) -> String {
    let (view, rest) = split_first_argument(args);
    let view = normalize_view_argument(view);
    match rest {
        Some(rest) => format!("{}, {}", view, rest.trim()),
        None => view,
    }
}

/// Split an argument list at its first top-level comma
fn split_first_argument(args: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in args.char_indices() {
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
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return (&args[..i], Some(&args[i + 1..])),
            _ => {}
        }
    }
    (args, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::{split, Delimiters};

    fn generate(source: &str) -> GeneratedBody {
        let options = TemplateOptions::default();
        let segments = split(source, &Delimiters::default());
        CodeGenerator::new(&options).generate(&segments)
    }

    fn lines(source: &str) -> Vec<String> {
        generate(source).code.lines().map(|l| l.trim().to_string()).collect()
    }

    #[test]
    fn test_literal_declares_output() {
        assert_eq!(generate("<h1>Hello</h1>").code, "    var __out = '<h1>Hello</h1>';\n");
    }

    #[test]
    fn test_empty_template_declares_output() {
        assert_eq!(lines(""), vec!["var __out = '';"]);
    }

    #[test]
    fn test_if_else() {
        let code = generate("{% if (name) %}Craig{% else %}Person{% end %}").code;
        assert_eq!(
            code,
            "    var __out = '';\n    if (name) {\n        __out += 'Craig';\n    } else {\n        __out += 'Person';\n    }\n"
        );
    }

    #[test]
    fn test_elseif_forms_match() {
        let a = lines("{% if (a) %}A{% elseif (b) %}B{% end %}");
        let b = lines("{% if (a) %}A{% else if (b) %}B{% end %}");
        assert_eq!(a, b);
        assert!(a.contains(&"} else if (b) {".to_string()));
    }

    #[test]
    fn test_first_use_at_top_level_declares_inline() {
        assert_eq!(lines("Hi{% if (x) %}!{% end %}"), vec![
            "var __out = 'Hi';",
            "if (x) {",
            "__out += '!';",
            "}",
        ]);
    }

    #[test]
    fn test_switch_arms() {
        assert_eq!(lines("{% switch (x) %}{% case 'a': %}A{% break %}{% default: %}D{% end %}"), vec![
            "var __out = '';",
            "switch (x) {",
            "case 'a':",
            "__out += 'A';",
            "break;",
            "default:",
            "__out += 'D';",
            "}",
        ]);
    }

    #[test]
    fn test_raw_statements() {
        assert_eq!(lines("{% var a = 1 %}{% b = 2; %}{% if (x) { y = 1; } %}"), vec![
            "var __out = '';",
            "var a = 1;",
            "b = 2;",
            "if (x) { y = 1; }",
        ]);
    }

    #[test]
    fn test_open_brace_statement_is_closed_by_end() {
        let body = generate("{% items.forEach(function (item) { %}{{ item }}{% }); %}");
        assert_eq!(body.unclosed, 0);
        let code: Vec<&str> = body.code.lines().collect();
        assert_eq!(code[1], "    items.forEach(function (item) {");
        assert_eq!(code[2], "        __out += '' + item + '';");
        assert_eq!(code[3], "    });");
    }

    #[test]
    fn test_end_clamps_at_zero() {
        let body = generate("{% end %}{% end %}A");
        assert_eq!(body.unclosed, 0);
        assert!(body.code.lines().all(|l| l.starts_with(INDENT)));
    }

    #[test]
    fn test_calls() {
        let code = lines("{% escape(name) %}{% render('footer.html', data) %}{% format(d) %}{% parseInt(n) %}");
        assert_eq!(code, vec![
            "var __out = ctx.escape(name);",
            "__out += (ctx.render('footer', data) || '');",
            "__out += (ctx.helpers.format(d) || '');",
            "__out += (parseInt(n) || '');",
        ]);
    }

    #[test]
    fn test_bare_calls_option() {
        let options = TemplateOptions::default().bare_calls(true);
        let segments = split("{% format(d) %}", &Delimiters::default());
        let body = CodeGenerator::new(&options).generate(&segments);
        assert_eq!(body.code.trim(), "var __out = (format(d) || '');");
    }

    #[test]
    fn test_render_arguments() {
        assert_eq!(render_arguments("\"footer\""), "'footer'");
        assert_eq!(render_arguments("'helper/tip.phtml', {message: message}"), "'helper/tip', {message: message}");
        assert_eq!(render_arguments("getView(a, b)"), "getView(a, b)");
        assert_eq!(render_arguments("name, f(a, 'x,y')"), "name, f(a, 'x,y')");
    }

    #[test]
    fn test_unclosed_compound_is_reported() {
        assert_eq!(generate("{% for (var i = 0; i < 3; i++) %}x").unclosed, 1);
    }
}
