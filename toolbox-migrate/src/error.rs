//! Error types for the migration pipeline

use toolbox_core::StoreError;

/// Per-line rewrite failure. Never fatal: the line is dropped and counted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("Line starts with INSERT INTO but has no (columns) VALUES (values) shape")]
    Malformed,
}

/// Cross-store instruction generation errors
#[derive(Debug, thiserror::Error)]
pub enum InstructionError {
    #[error("Relational store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to write instruction script: {0}")]
    Io(#[from] std::io::Error),
}
