//! Typed errors for each fallible subsystem: `thiserror`-derived enums
//! that wire an `io::Error` (or other upstream error) into a
//! domain-specific variant via `#[source]`/`#[from]`.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} no longer resolves to the expected dev/inode")]
    InodeMismatch { path: PathBuf },

    #[error("invalid multiline pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ImporterError {
    #[error("failed to enumerate files in {dir}: {source}")]
    Enumerate {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid glob pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SplError {
    #[error("syntax error at position {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("arity mismatch in {stage}: expected {expected}, got {got}")]
    Arity {
        stage: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("unknown binding '${0}'")]
    UnknownBinding(String),

    #[error("regex in parse-regexp has zero capture groups")]
    NoCaptureGroups,
}
