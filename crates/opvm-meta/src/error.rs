//! Errors for loading, compiling and decompiling opcode tables

use crate::validator::ValidationReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("invalid opcode metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid compression level {0}: must be 0-9")]
    InvalidCompressionLevel(u32),

    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),

    #[error("decompression failed: {0}")]
    Decompression(#[source] std::io::Error),

    #[error("invalid hex string: {0}")]
    Hex(String),

    #[error(transparent)]
    Validation(#[from] ValidationReport),
}
