// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.

use thiserror::Error;

use crate::types::ItemId;

/// Top-level error type for all Bildwerk operations.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Intake errors --
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("input is {size} bytes, the limit is {limit} bytes")]
    OversizedInput { size: u64, limit: u64 },

    #[error("failed to decode image: {0}")]
    DecodeError(String),

    // -- Transform errors --
    #[error("failed to encode image: {0}")]
    EncodeError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- External collaborators --
    #[error("format conversion library unavailable")]
    ConversionUnavailable,

    #[error("format conversion failed: {0}")]
    ConversionFailed(String),

    #[error("archiving library unavailable")]
    ArchiverUnavailable,

    #[error("archiving failed: {0}")]
    ArchiveFailed(String),

    // -- Batch / session state --
    #[error("no compressed items to export")]
    NoCompressedItems,

    #[error("batch item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("no image selected")]
    NothingSelected,

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;
