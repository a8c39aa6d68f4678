// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tuning for the target-size quality search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeSearchConfig {
    /// Lowest quality probed; also the fallback when nothing fits.
    pub min_quality: f32,
    /// Highest quality probed; tried first.
    pub max_quality: f32,
    /// Upper bound on binary-search probes (excluding the first and fallback).
    pub max_iterations: u32,
    /// Stop once the quality window is this narrow.
    pub tolerance: f32,
}

impl Default for SizeSearchConfig {
    fn default() -> Self {
        Self {
            min_quality: 0.1,
            max_quality: 1.0,
            max_iterations: 15,
            tolerance: 0.01,
        }
    }
}

/// Settings for a session. Supplied by the host; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inputs larger than this are rejected before decoding.
    pub max_input_bytes: u64,
    /// Encoder quality for pixel-bound compression.
    pub pixel_bound_quality: f32,
    /// Encoder quality for ID photos.
    pub id_photo_quality: f32,
    pub size_search: SizeSearchConfig,
    /// Quiescence window before a reconfiguration is recomputed.
    pub debounce_ms: u64,
    /// File name of the bulk-export archive.
    pub archive_name: String,
    /// Keep decoded rasters keyed by content hash between passes.
    pub cache_rasters: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 20 * 1024 * 1024,
            pixel_bound_quality: 0.85,
            id_photo_quality: 0.95,
            size_search: SizeSearchConfig::default(),
            debounce_ms: 300,
            archive_name: "compressed-images.zip".into(),
            cache_rasters: false,
        }
    }
}

impl EngineConfig {
    /// Parse overrides handed in by an embedding host. Missing fields keep
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}
