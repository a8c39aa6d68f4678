// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZIP archiver backed by the `zip` crate.

use std::io::{Cursor, Write};

use async_trait::async_trait;
use bildwerk_core::error::{BildwerkError, Result};
use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::traits::{ArchiveEntry, Archiver};

/// Writes entries uncompressed: the payloads are already JPEG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl ZipArchiver {
    fn write(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for entry in entries {
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| BildwerkError::ArchiveFailed(format!("{}: {e}", entry.name)))?;
            writer.write_all(&entry.bytes)?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| BildwerkError::ArchiveFailed(format!("finish: {e}")))?;
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    #[instrument(skip_all, fields(entries = entries.len()))]
    async fn archive(&self, entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
        let bytes = Self::write(&entries)?;
        debug!(archive_len = bytes.len(), "zip archive written");
        Ok(bytes)
    }
}
