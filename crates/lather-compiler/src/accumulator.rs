/// Output accumulators
///
/// Rendered text is built up in string variables. Each accumulator owns a
/// declaration slot at the point where it comes into scope, so that a first
/// use nested inside a compound statement still declares it where every
/// later use can see it.

use crate::codegen::CodeGenerator;
use crate::splitter::{BACKSLASH_PLACEHOLDER, QUOTE_PLACEHOLDER};

/// Accumulator of the template's own output
pub const DEFAULT_ACCUMULATOR: &str = "__out";
/// Suffix appended to a block name to form its accumulator
pub const BLOCK_SUFFIX: &str = "__block";

/// A string variable receiving rendered output
#[derive(Debug, Clone)]
pub struct Accumulator {
    pub name: String,
    /// Index of the declaration slot fragment
    slot: usize,
    /// Nesting depth at which the accumulator came into scope
    home_depth: usize,
    declared: bool,
}

impl Accumulator {
    pub fn new(name: impl Into<String>, slot: usize, home_depth: usize) -> Self {
        Self {
            name: name.into(),
            slot,
            home_depth,
            declared: false,
        }
    }
}

/// Quote literal template text as a single-quoted JavaScript string.
///
/// Output expressions folded into the text by the splitter come back out
/// unescaped, turning the literal into a concatenation.
pub fn quote_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' | '\r' => {}
            '\u{2028}' => quoted.push_str("\\u2028"),
            '\u{2029}' => quoted.push_str("\\u2029"),
            QUOTE_PLACEHOLDER => quoted.push('\''),
            BACKSLASH_PLACEHOLDER => quoted.push('\\'),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

impl CodeGenerator<'_> {
    /// Register a new accumulator scoped at the current position
    pub(crate) fn add_accumulator(&mut self, name: String) -> usize {
        let slot = self.push_slot();
        self.accumulators.push(Accumulator::new(name, slot, self.depth));
        self.accumulators.len() - 1
    }

    /// Emit literal text into the active accumulator
    pub(crate) fn emit_text(&mut self, text: &str) {
        let quoted = quote_literal(text);
        self.append(&quoted);
    }

    /// Append an expression to the active accumulator, declaring it on first
    /// use.
    pub(crate) fn append(&mut self, expr: &str) {
        let depth = self.depth;
        let accumulator = &mut self.accumulators[self.active];
        let name = accumulator.name.clone();

        if !accumulator.declared {
            accumulator.declared = true;
            if depth == accumulator.home_depth {
                self.push_line(format!("var {} = {};", name, expr));
                return;
            }
            let slot = accumulator.slot;
            self.fill_slot(slot, format!("var {} = '';", name));
        }
        self.push_line(format!("{} += {};", name, expr));
    }

    /// Declare an accumulator as empty if nothing was ever appended to it
    pub(crate) fn declare_if_unused(&mut self, index: usize) {
        let accumulator = &mut self.accumulators[index];
        if accumulator.declared {
            return;
        }
        accumulator.declared = true;
        let slot = accumulator.slot;
        let line = format!("var {} = '';", accumulator.name);
        self.fill_slot(slot, line);
    }
}
