// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format normalizer: turns a user-selected file into a decoded raster.
//
// Validation order is fixed: byte size first, then media type. An oversized
// file is rejected without looking at its type or bytes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::DynamicImage;
use tracing::{debug, info, instrument};

use bildwerk_bridge::FormatConverter;
use bildwerk_core::config::EngineConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{Dimensions, MediaType, SourceFile};

use crate::cache::RasterCache;
use crate::image::processor::ImageProcessor;

/// MIME type requested from the format converter.
const CONVERSION_TARGET: &str = "image/jpeg";

/// A decoded image with known, non-zero dimensions.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    media_type: MediaType,
    dimensions: Dimensions,
    image: Arc<DynamicImage>,
}

impl DecodedRaster {
    pub fn new(media_type: MediaType, image: DynamicImage) -> Self {
        Self {
            media_type,
            dimensions: Dimensions::new(image.width(), image.height()),
            image: Arc::new(image),
        }
    }

    /// The type the source was accepted as (before any conversion).
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Shared handle to the pixels, for moving onto a blocking task.
    pub fn shared_image(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.image)
    }
}

pub struct FormatNormalizer {
    max_input_bytes: u64,
    converter: Option<Arc<dyn FormatConverter>>,
    cache: Option<Mutex<RasterCache>>,
}

impl FormatNormalizer {
    pub fn new(config: &EngineConfig, converter: Option<Arc<dyn FormatConverter>>) -> Self {
        Self {
            max_input_bytes: config.max_input_bytes,
            converter,
            cache: config
                .cache_rasters
                .then(|| Mutex::new(RasterCache::new())),
        }
    }

    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Check size and type without touching the pixel data.
    ///
    /// The declared MIME type wins when it is on the allow-list; otherwise
    /// the file name's extension decides.
    pub fn validate(&self, file: &SourceFile) -> Result<MediaType> {
        if file.size() > self.max_input_bytes {
            return Err(BildwerkError::OversizedInput {
                size: file.size(),
                limit: self.max_input_bytes,
            });
        }

        MediaType::from_mime(file.declared_type())
            .or_else(|| file.extension().and_then(MediaType::from_extension))
            .ok_or_else(|| {
                let declared = match file.declared_type() {
                    "" => "no declared type",
                    other => other,
                };
                BildwerkError::UnsupportedFormat(format!("{} ({declared})", file.name()))
            })
    }

    /// Validate and decode. HEIC/HEIF inputs go through the converter first.
    #[instrument(skip(self, file), fields(name = file.name(), size = file.size()))]
    pub async fn decode(&self, file: &SourceFile) -> Result<DecodedRaster> {
        let media_type = self.validate(file)?;

        if let Some(hit) = self.cached(file.content_hash()) {
            debug!(hash = file.content_hash(), "raster cache hit");
            return Ok(hit);
        }

        let encoded: Arc<[u8]> = if self.must_convert(file, media_type) {
            Arc::from(self.convert(file).await?)
        } else {
            file.shared_bytes()
        };

        let image = tokio::task::spawn_blocking(move || {
            ImageProcessor::from_bytes(&encoded).map(ImageProcessor::into_dynamic)
        })
        .await
        .map_err(|err| BildwerkError::DecodeError(format!("decode task failed: {err}")))??;

        let raster = DecodedRaster::new(media_type, image);
        info!(
            media_type = media_type.mime_type(),
            dimensions = %raster.dimensions(),
            "Image decoded"
        );

        if let Some(cache) = &self.cache {
            lock(cache).insert(file.content_hash(), raster.clone());
        }
        Ok(raster)
    }

    /// Drop the cached raster for one source, if caching is enabled.
    pub fn invalidate(&self, content_hash: &str) {
        if let Some(cache) = &self.cache {
            if lock(cache).invalidate(content_hash) {
                debug!(hash = content_hash, "raster cache entry dropped");
            }
        }
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            let dropped = lock(cache).clear();
            debug!(dropped, "raster cache cleared");
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| lock(cache).len())
    }

    // -- Internal -------------------------------------------------------------

    fn cached(&self, content_hash: &str) -> Option<DecodedRaster> {
        self.cache
            .as_ref()
            .and_then(|cache| lock(cache).get(content_hash))
    }

    /// A `.heic` name with a mislabelled declared type still converts.
    fn must_convert(&self, file: &SourceFile, media_type: MediaType) -> bool {
        media_type.needs_conversion()
            || file
                .extension()
                .and_then(MediaType::from_extension)
                .is_some_and(|ext| ext.needs_conversion())
    }

    async fn convert(&self, file: &SourceFile) -> Result<Vec<u8>> {
        let converter = self
            .converter
            .as_ref()
            .ok_or(BildwerkError::ConversionUnavailable)?;

        debug!(name = file.name(), "converting via external converter");
        let blobs = converter
            .convert(file.bytes(), CONVERSION_TARGET, 1.0)
            .await
            .map_err(|err| match err {
                BildwerkError::ConversionFailed(_) => err,
                other => BildwerkError::ConversionFailed(other.to_string()),
            })?;

        blobs
            .into_iter()
            .next()
            .filter(|blob| !blob.is_empty())
            .ok_or_else(|| BildwerkError::ConversionFailed("converter returned no image".into()))
    }
}

impl std::fmt::Debug for FormatNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatNormalizer")
            .field("max_input_bytes", &self.max_input_bytes)
            .field("converter", &self.converter.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

fn lock(cache: &Mutex<RasterCache>) -> MutexGuard<'_, RasterCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}
