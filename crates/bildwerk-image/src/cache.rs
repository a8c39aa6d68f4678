// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoded rasters keyed by source content hash. A miss falls back to a full
// decode, so results are the same with the cache on or off.

use std::collections::HashMap;

use crate::normalize::DecodedRaster;

#[derive(Debug, Default)]
pub struct RasterCache {
    entries: HashMap<String, DecodedRaster>,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap clone of the cached raster (the pixels are shared).
    pub fn get(&self, content_hash: &str) -> Option<DecodedRaster> {
        self.entries.get(content_hash).cloned()
    }

    pub fn insert(&mut self, content_hash: impl Into<String>, raster: DecodedRaster) {
        self.entries.insert(content_hash.into(), raster);
    }

    /// Returns whether an entry was dropped.
    pub fn invalidate(&mut self, content_hash: &str) -> bool {
        self.entries.remove(content_hash).is_some()
    }

    /// Drop everything, returning how many entries were held.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
