/// Lather template compiler
///
/// Compiles text templates with `{{ output }}` expressions and `{% control %}`
/// directives into JavaScript render procedures, and bundles compiled
/// templates into a single module.

pub mod accumulator;
pub mod builtins;
pub mod codegen;
pub mod directive;
pub mod driver;
pub mod error;
pub mod inherit;
pub mod naming;
pub mod patch;
pub mod resolver;
pub mod runtime;
pub mod splitter;
pub mod template;

pub use driver::{BundledTemplate, Compiler, CompileOptions, CompileOutput};
pub use error::{CompileError, Result};
pub use codegen::CodeGenerator;
pub use resolver::{resolve, Resolution};
pub use splitter::{split, Delimiters, Segment};
pub use template::{compile_template, CompiledTemplate, TemplateOptions};
