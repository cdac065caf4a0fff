//! Error model (C8): the two fatal error kinds described in SPEC_FULL.md
//! §7, one per phase. Neither recovers locally — callers handle them at
//! the `compile` or `render` boundary.

use thiserror::Error;

/// Up to 20 characters of source text at the point an error was raised,
/// used to give the caller something to grep for.
pub fn peek(source: &str, byte_offset: usize) -> String {
    source[byte_offset..].chars().take(20).collect()
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{message} (line {line}, file {file:?}): near {peek:?}")]
    Syntax { message: String, peek: String, line: usize, file: String },

    #[error("unbalanced 'if' at line {line}, file {file:?}")]
    UnbalancedIf { line: usize, file: String },

    #[error("unbalanced 'for' at line {line}, file {file:?}")]
    UnbalancedFor { line: usize, file: String },

    #[error("'continue' outside of any 'for' at line {line}, file {file:?}")]
    ContinueOutsideFor { line: usize, file: String },

    #[error("'endfor' without matching 'for' at line {line}, file {file:?}")]
    EndForWithoutFor { line: usize, file: String },

    #[error("'endif'/'else' without matching 'if' at line {line}, file {file:?}")]
    EndIfWithoutIf { line: usize, file: String },

    #[error("duplicate 'extends' in {file:?}")]
    DuplicateExtends { file: String },

    #[error("'extends' is not allowed inside a parent template ({file:?})")]
    ExtendsInParentTemplate { file: String },

    #[error("duplicate block {name:?} in layout {file:?}")]
    DuplicateBlock { name: String, file: String },

    #[error("nested 'block' at line {line}, file {file:?}")]
    NestedBlock { line: usize, file: String },

    #[error("'for' iterator name {name:?} shadows its own data source at line {line}, file {file:?}")]
    IteratorShadowsSource { name: String, line: usize, file: String },

    #[error("couldn't resolve {path:?} referenced from {referrer:?}: {source}")]
    UnresolvedInclude { path: String, referrer: String, #[source] source: std::io::Error },

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("filter {filter:?} failed: {message}")]
    Filter { filter: String, message: String },

    #[error("invalid comparand for filter {filter:?}: {message}")]
    InvalidComparand { filter: String, message: String },

    #[error("unsupported nullable type in {context}")]
    UnsupportedNullable { context: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt token stream: {0}")]
    Corrupt(String),
}
