/// Template inheritance
///
/// `block` directives capture output into their own accumulator. A template
/// that extends a parent hands every captured block to the parent by name;
/// any other template renders its blocks in place, unless the caller passed
/// an override for it in the reserved `__blocks` record. Plain data fields
/// never override a block, so a block may read a field of its own name.

use crate::accumulator::{BLOCK_SUFFIX, DEFAULT_ACCUMULATOR};
use crate::codegen::CodeGenerator;
use crate::naming::{quote_name, sanitize_identifier};
use crate::template::TemplateOptions;

/// Data field that carries block overrides from a child to its parent
pub const BLOCKS_FIELD: &str = "__blocks";

/// A block whose `end` has not been reached yet
#[derive(Debug, Clone)]
pub struct OpenBlock {
    pub name: String,
    /// Compound statements open inside the block, counting the block itself
    pub depth: usize,
    /// Index of the block's accumulator
    pub accumulator: usize,
    /// Accumulator that was active when the block opened
    pub parent: usize,
}

/// A block as seen by the parent template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlock {
    /// Field name the block is passed under
    pub name: String,
    pub accumulator: String,
}

impl NamedBlock {
    pub fn new(name: &str) -> Self {
        let name = sanitize_identifier(name);
        let accumulator = format!("{}{}", name, BLOCK_SUFFIX);
        Self { name, accumulator }
    }
}

impl CodeGenerator<'_> {
    pub(crate) fn open_block(&mut self, name: &str) {
        let named = NamedBlock::new(name);
        let accumulator = self.add_accumulator(named.accumulator);
        self.blocks.push(OpenBlock {
            name: name.to_string(),
            depth: 1,
            accumulator,
            parent: self.active,
        });
        self.active = accumulator;
    }

    /// Close the innermost block and fold it into the enclosing output.
    ///
    /// Top-level blocks of an extending template are left for the parent.
    pub(crate) fn close_block(&mut self) {
        let Some(block) = self.blocks.pop() else {
            return;
        };
        self.declare_if_unused(block.accumulator);
        self.active = block.parent;

        let named = NamedBlock::new(&block.name);
        if !self.blocks.is_empty() || self.extend_target.is_none() {
            let record = format!("{}.{}", self.options.data_name, BLOCKS_FIELD);
            let field = format!("{}.{}", record, named.name);
            let merged = format!(
                "({} && {} !== undefined ? {} : {})",
                record, field, field, named.accumulator
            );
            self.append(&merged);
        }
        if !self.closed_blocks.contains(&named) {
            self.closed_blocks.push(named);
        }
    }
}

/// Closing statements of the procedure body.
///
/// An extending template returns whatever its parent renders from the data
/// record plus the captured blocks, both as plain fields and under
/// `__blocks`.
pub fn tail(extend_target: Option<&str>, blocks: &[NamedBlock], options: &TemplateOptions) -> Vec<String> {
    let Some(parent) = extend_target else {
        return vec![format!("return {};", DEFAULT_ACCUMULATOR)];
    };

    let context = &options.context_name;
    let data = &options.data_name;
    let parent = quote_name(parent);
    if blocks.is_empty() {
        return vec![format!("return {}.render({}, {});", context, parent, data)];
    }

    let fields: Vec<String> = blocks
        .iter()
        .map(|block| format!("{}: {}", block.name, block.accumulator))
        .collect();
    let fields = fields.join(", ");
    vec![
        format!(
            "{} = {}.render({}, Object.assign({{}}, {}, {{{}, {}: {{{}}}}}));",
            DEFAULT_ACCUMULATOR, context, parent, data, fields, BLOCKS_FIELD, fields
        ),
        format!("return {};", DEFAULT_ACCUMULATOR),
    ]
}
