// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression engine: fixed quality, pixel bounds, and target file size.
//
// All three modes emit baseline JPEG. The target-size mode binary-searches
// the encoder quality for the largest value whose output fits the budget.

use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

use bildwerk_core::config::{EngineConfig, SizeSearchConfig};
use bildwerk_core::error::Result;
use bildwerk_core::types::{
    CompressionConfig, CompressionResult, Dimensions, quality_fraction, target_bytes,
};

use crate::image::processor::{ImageProcessor, bounded_dimensions, encode_jpeg, encode_rgb_jpeg};

/// One trial encode during size fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    pub quality: f32,
    pub size: u64,
    /// `size <= target`
    pub accepted: bool,
}

/// Outcome of [`fit_to_size`].
#[derive(Debug, Clone)]
pub struct SizeFit {
    pub bytes: Vec<u8>,
    pub quality: f32,
    /// False only when the minimum-quality fallback still overshoots.
    pub met_target: bool,
    /// Every probe in the order it ran.
    pub probes: Vec<Probe>,
}

/// Find the highest quality whose encoding is at most `target_bytes`.
///
/// Probes `max_quality` first and returns it if it already fits. Otherwise
/// bisects `[min_quality, max_quality]` until the window is no wider than
/// `tolerance` or `max_iterations` probes have run. If nothing fitted, the
/// image is encoded at `min_quality` and returned regardless of size.
pub fn fit_to_size<F>(target_bytes: u64, search: &SizeSearchConfig, mut encode: F) -> Result<SizeFit>
where
    F: FnMut(f32) -> Result<Vec<u8>>,
{
    let mut probes = Vec::new();

    let top = encode(search.max_quality)?;
    let top_size = top.len() as u64;
    let fits = top_size <= target_bytes;
    probes.push(Probe {
        quality: search.max_quality,
        size: top_size,
        accepted: fits,
    });
    debug!(quality = search.max_quality, size = top_size, target_bytes, fits, "probe");
    if fits {
        return Ok(SizeFit {
            bytes: top,
            quality: search.max_quality,
            met_target: true,
            probes,
        });
    }

    let (mut low, mut high) = (search.min_quality, search.max_quality);
    let mut best: Option<(Vec<u8>, f32)> = None;
    let mut iterations = 0;

    while iterations < search.max_iterations && high - low > search.tolerance {
        let mid = (low + high) / 2.0;
        let bytes = encode(mid)?;
        let size = bytes.len() as u64;
        let fits = size <= target_bytes;
        debug!(quality = mid, size, target_bytes, fits, "probe");
        probes.push(Probe {
            quality: mid,
            size,
            accepted: fits,
        });

        if fits {
            best = Some((bytes, mid));
            low = mid;
        } else {
            high = mid;
        }
        iterations += 1;
    }

    if let Some((bytes, quality)) = best {
        return Ok(SizeFit {
            bytes,
            quality,
            met_target: true,
            probes,
        });
    }

    let bytes = encode(search.min_quality)?;
    let size = bytes.len() as u64;
    let fits = size <= target_bytes;
    if !fits {
        warn!(size, target_bytes, "target size unreachable, returning minimum quality");
    }
    probes.push(Probe {
        quality: search.min_quality,
        size,
        accepted: fits,
    });
    Ok(SizeFit {
        bytes,
        quality: search.min_quality,
        met_target: fits,
        probes,
    })
}

/// Stateless apart from its tuning; cheap to copy onto a blocking task.
#[derive(Debug, Clone, Copy)]
pub struct CompressionEngine {
    pixel_bound_quality: f32,
    search: SizeSearchConfig,
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl CompressionEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pixel_bound_quality: config.pixel_bound_quality,
            search: config.size_search,
        }
    }

    /// Run whichever mode `config` selects.
    #[instrument(
        skip(self, image, config),
        fields(mode = config.mode_name(), width = image.width(), height = image.height())
    )]
    pub fn compress(
        &self,
        image: &DynamicImage,
        config: &CompressionConfig,
    ) -> Result<CompressionResult> {
        config.validate()?;
        let result = match *config {
            CompressionConfig::Quality { percent } => {
                self.compress_at_quality(image, quality_fraction(percent))
            }
            CompressionConfig::TargetSize { kb } => {
                self.compress_to_size(image, target_bytes(kb))
            }
            CompressionConfig::PixelBounds {
                max_width,
                max_height,
            } => self.compress_within(image, max_width, max_height),
        }?;
        info!(
            size = result.size(),
            quality = result.quality,
            dimensions = %result.dimensions,
            "Compression complete"
        );
        Ok(result)
    }

    /// Re-encode at the original dimensions.
    pub fn compress_at_quality(
        &self,
        image: &DynamicImage,
        quality: f32,
    ) -> Result<CompressionResult> {
        let bytes = encode_jpeg(image, quality)?;
        Ok(result(bytes, dimensions_of(image), quality))
    }

    /// Scale down (never up) to fit the bounds, then encode at the
    /// pixel-bound quality.
    pub fn compress_within(
        &self,
        image: &DynamicImage,
        max_width: u32,
        max_height: u32,
    ) -> Result<CompressionResult> {
        let target = bounded_dimensions(dimensions_of(image), max_width, max_height);
        if target == dimensions_of(image) {
            return self.compress_at_quality(image, self.pixel_bound_quality);
        }
        let processor = ImageProcessor::from_dynamic(image.clone()).fit_within(max_width, max_height);
        let bytes = processor.to_jpeg_bytes(self.pixel_bound_quality)?;
        Ok(result(bytes, processor.dimensions(), self.pixel_bound_quality))
    }

    /// Highest quality whose output is at most `target_bytes`, falling back
    /// to the minimum quality when nothing fits.
    pub fn compress_to_size(
        &self,
        image: &DynamicImage,
        target_bytes: u64,
    ) -> Result<CompressionResult> {
        let rgb = image.to_rgb8();
        let fit = fit_to_size(target_bytes, &self.search, |quality| {
            encode_rgb_jpeg(&rgb, quality)
        })?;
        debug!(
            probes = fit.probes.len(),
            met_target = fit.met_target,
            "size search finished"
        );
        Ok(result(fit.bytes, dimensions_of(image), fit.quality))
    }
}

fn dimensions_of(image: &DynamicImage) -> Dimensions {
    Dimensions::new(image.width(), image.height())
}

fn result(bytes: Vec<u8>, dimensions: Dimensions, quality: f32) -> CompressionResult {
    CompressionResult {
        bytes: Arc::from(bytes),
        dimensions,
        quality,
    }
}
