//! Error taxonomy for the rewrite engine.
//!
//! Config-time errors abort the whole load and always carry enough context
//! (file, line, offending token) to point a rule author at the mistake.
//! Runtime errors never reach the caller as `Result::Err` — they are logged
//! once and the affected condition/operator is treated as non-matching /
//! no-op, per spec.md §7.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while compiling a rule file into a [`crate::engine::RulesConfig`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("rule file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("{file}:{line}:{col}: {msg}")]
    SyntaxError {
        file: PathBuf,
        line: usize,
        col: usize,
        msg: String,
    },

    #[error("{file}:{line}: unknown condition `{name}`")]
    UnknownCondition {
        file: PathBuf,
        line: usize,
        name: String,
    },

    #[error("{file}:{line}: unknown operator `{name}`")]
    UnknownOperator {
        file: PathBuf,
        line: usize,
        name: String,
    },

    #[error("{file}:{line}: `{name}` is not legal in hook {hook:?}")]
    HookMismatch {
        file: PathBuf,
        line: usize,
        name: String,
        hook: crate::model::resources::Hook,
    },

    #[error("{file}:{line}: conflicting modifiers on the same statement: {msg}")]
    ModifierConflict {
        file: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("failed to run external DSL compiler `{path}`: {msg}")]
    DslCompilerFailed { path: PathBuf, msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the header heap's allocator / marshal / unmarshal paths.
///
/// These are internal-invariant-violation errors (spec.md §7): the heap
/// never panics on malformed input, it refuses to deserialize.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("allocation of {requested} bytes exceeds the maximum object size of {max}")]
    AllocTooBig { requested: usize, max: usize },

    #[error("marshalled image has a bad magic number")]
    BadMagic,

    #[error("marshalled image is truncated: expected at least {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("unknown object type tag {0}")]
    UnknownObjectType(u8),

    #[error("object at offset {0} reports zero length")]
    ZeroLengthObject(usize),

    #[error("marshal target buffer overflowed (needed more than {0} bytes)")]
    BufferOverflow(usize),
}

/// Errors surfaced while parsing a single MIME header block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MimeParseError {
    #[error("embedded NUL byte in header block")]
    EmbeddedNul,

    #[error("whitespace between field name and colon is not allowed (RFC 7230 3.2.4)")]
    WhitespaceBeforeColon,

    #[error("field line exceeds the 64KB limit")]
    FieldTooLong,

    #[error("header block ended before the terminating blank line")]
    TruncatedInput,
}
