// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait definitions for the optional external collaborators.
//
// Both collaborators may be missing at runtime. Callers hold them as
// `Option<Arc<dyn ...>>` and turn `None` into `ConversionUnavailable` /
// `ArchiverUnavailable` before attempting any work.

use async_trait::async_trait;
use bildwerk_core::error::Result;

/// Converts an image the built-in decoder cannot read (HEIC/HEIF) into one
/// it can.
#[async_trait]
pub trait FormatConverter: Send + Sync {
    /// Convert `blob` to `target_mime` with the given quality hint (0.0-1.0).
    ///
    /// Multi-image containers may yield several blobs; callers use the first.
    async fn convert(&self, blob: &[u8], target_mime: &str, quality: f32)
    -> Result<Vec<Vec<u8>>>;
}

/// Packs named blobs into a single downloadable archive.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Produce one archive containing every entry, in order.
    async fn archive(&self, entries: Vec<ArchiveEntry>) -> Result<Vec<u8>>;

    /// MIME type of the produced archive.
    fn mime_type(&self) -> &'static str {
        "application/zip"
    }
}

/// One named file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}
