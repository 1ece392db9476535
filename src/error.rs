//! Error types.
//!
//! `TraceError` is fatal for a whole run (extraction or decoding). The other
//! types describe a single table row or log line and are contained by the
//! caller, which logs them and moves on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal, file-level failures surfaced to the invoker.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("cannot read source directory {path}: {source}")]
    SourceRoot { path: PathBuf, source: io::Error },

    #[error("cannot write trace table {path}: {source}")]
    TableWrite { path: PathBuf, source: io::Error },

    #[error("cannot read trace table {path}: {source}")]
    TableRead { path: PathBuf, source: io::Error },

    #[error("failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("log stream I/O failed: {0}")]
    Stream(#[from] io::Error),
}

/// A table row that cannot become a mapping entry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RowError {
    #[error("expected 2 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid hash {0:?}")]
    InvalidHash(String),

    #[error("unterminated quoted field")]
    UnterminatedQuote,
}

/// Placeholder language failures while rendering a template.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("placeholder {index} has no argument ({supplied} supplied)")]
    MissingArgument { index: usize, supplied: usize },

    #[error("{supplied} arguments supplied but only {consumed} used")]
    UnusedArguments { consumed: usize, supplied: usize },

    #[error("unclosed '{{' at byte {0}")]
    UnclosedBrace(usize),

    #[error("single '}}' at byte {0}")]
    SingleClosingBrace(usize),

    #[error("cannot mix automatic and manual field numbering")]
    MixedNumbering,

    #[error("invalid field name {0:?}")]
    InvalidField(String),

    #[error("unsupported format spec {0:?}")]
    UnsupportedSpec(String),

    #[error("{0} is not a valid character")]
    InvalidChar(i128),
}

/// Why a hash-prefixed log line could not be decoded.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid hex argument {0:?}")]
    InvalidArgument(String),

    #[error("hash token {0:?} is not followed by a space")]
    MalformedHashToken(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}
