/// Single-template compilation
///
/// Runs the full pipeline for one template source: split, generate,
/// resolve free variables, then append the inheritance tail and wrap the
/// body as a render procedure.

use crate::codegen::CodeGenerator;
use crate::error::Result;
use crate::inherit::{self, NamedBlock};
use crate::resolver::resolve;
use crate::splitter::{split, Delimiters};
use tracing::{debug, warn};

/// Options for compiling a single template
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    /// Parameter name of the data record
    pub data_name: String,
    /// Parameter name of the render context
    pub context_name: String,
    pub delimiters: Delimiters,
    /// Leave free calls unqualified instead of routing them through helpers
    pub bare_calls: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            data_name: "args".to_string(),
            context_name: "ctx".to_string(),
            delimiters: Delimiters::default(),
            bare_calls: false,
        }
    }
}

impl TemplateOptions {
    pub fn data_name(mut self, name: impl Into<String>) -> Self {
        self.data_name = name.into();
        self
    }

    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = name.into();
        self
    }

    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn bare_calls(mut self, bare_calls: bool) -> Self {
        self.bare_calls = bare_calls;
        self
    }
}

/// A compiled render procedure and what it needs from its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    /// `function(args, ctx) { ... }` source
    pub code: String,
    /// Parent template, when the template extends one
    pub extends: Option<String>,
    /// Names of the blocks the template defines
    pub blocks: Vec<String>,
    /// Data record fields the template reads
    pub free_variables: Vec<String>,
    /// Helpers the template calls
    pub helpers: Vec<String>,
    pub uses_escape: bool,
}

/// Compile template source into a render procedure
pub fn compile_template(source: &str, options: &TemplateOptions) -> Result<CompiledTemplate> {
    let segments = split(source, &options.delimiters);
    let body = CodeGenerator::new(options).generate(&segments);
    if body.unclosed > 0 {
        warn!("{} compound statement(s) left open at end of template", body.unclosed);
    }

    let resolution = resolve(&body.code, body.accumulators.iter().cloned(), options)?;

    let mut code = format!("function({}, {}) {{\n", options.data_name, options.context_name);
    code.push_str(&resolution.code);
    for line in inherit::tail(body.extend_target.as_deref(), &body.blocks, options) {
        code.push_str("    ");
        code.push_str(&line);
        code.push('\n');
    }
    code.push('}');

    debug!(
        "Compiled template: {} segments, {} blocks, {} free variables, {} helpers",
        segments.len(),
        body.blocks.len(),
        resolution.free_variables.len(),
        resolution.helpers.len()
    );

    Ok(CompiledTemplate {
        code,
        extends: body.extend_target,
        blocks: body.blocks.into_iter().map(|NamedBlock { name, .. }| name).collect(),
        free_variables: resolution.free_variables,
        helpers: resolution.helpers,
        uses_escape: resolution.uses_escape,
    })
}
