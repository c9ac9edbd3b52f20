/// Error types for the lather compiler

use std::path::PathBuf;
use lather_lexer::LexError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokenization error in generated code: {0}")]
    Tokenize(#[from] LexError),

    #[error("Failed to compile template {file}: {source}")]
    Template {
        file: PathBuf,
        #[source]
        source: LexError,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("No output file specified for {0} inputs")]
    NoOutput(usize),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("No templates to process")]
    NoTemplates,

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl CompileError {
    /// Attach the template file to a tokenization failure
    pub fn in_file(self, file: impl Into<PathBuf>) -> Self {
        match self {
            CompileError::Tokenize(source) => CompileError::Template {
                file: file.into(),
                source,
            },
            other => other,
        }
    }
}
