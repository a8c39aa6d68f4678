// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-bridge: Interfaces to the optional external collaborators.
//
// HEIC/HEIF conversion and archive packaging are delegated to outside
// libraries. This crate defines the narrow traits they are reached through
// and detects which ones are present.

pub mod traits;

#[cfg(feature = "zip")]
pub mod zip_archive;

use std::sync::Arc;

pub use traits::{ArchiveEntry, Archiver, FormatConverter};

#[cfg(feature = "zip")]
pub use zip_archive::ZipArchiver;

/// The collaborators available to a session. Either may be absent.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub converter: Option<Arc<dyn FormatConverter>>,
    pub archiver: Option<Arc<dyn Archiver>>,
}

impl Collaborators {
    /// No collaborators at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whatever this build can provide on its own: the ZIP archiver when the
    /// `zip` feature is enabled. No converter is bundled.
    pub fn detect() -> Self {
        #[cfg(feature = "zip")]
        let archiver: Option<Arc<dyn Archiver>> = Some(Arc::new(ZipArchiver));
        #[cfg(not(feature = "zip"))]
        let archiver: Option<Arc<dyn Archiver>> = None;

        tracing::debug!(
            archiver = archiver.is_some(),
            converter = false,
            "collaborators detected"
        );
        Self {
            converter: None,
            archiver,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("converter", &self.converter.is_some())
            .field("archiver", &self.archiver.is_some())
            .finish()
    }
}
