// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ID-photo compositor: scale-to-cover onto a fixed white canvas.

use std::sync::Arc;

use image::DynamicImage;
use tracing::{info, instrument};

use bildwerk_core::config::EngineConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{Dimensions, IdPhotoSpec};

use crate::image::processor::{
    CoverPlacement, ImageProcessor, JPEG_MAX_DIMENSION, WHITE, cover_placement,
};

/// An encoded ID photo.
#[derive(Debug, Clone)]
pub struct IdPhoto {
    pub bytes: Arc<[u8]>,
    /// Always the requested canvas size.
    pub dimensions: Dimensions,
    pub placement: CoverPlacement,
}

impl IdPhoto {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IdPhotoCompositor {
    quality: f32,
}

impl Default for IdPhotoCompositor {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl IdPhotoCompositor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            quality: config.id_photo_quality,
        }
    }

    /// Fill the canvas with white, draw the image scaled to cover it and
    /// centred, and encode the result as JPEG.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn compose(&self, image: &DynamicImage, spec: &IdPhotoSpec) -> Result<IdPhoto> {
        let canvas = spec.validate()?;
        if canvas.width > JPEG_MAX_DIMENSION || canvas.height > JPEG_MAX_DIMENSION {
            return Err(BildwerkError::EncodeError(format!(
                "canvas {canvas} exceeds the JPEG limit of {JPEG_MAX_DIMENSION} px per side"
            )));
        }
        let source = Dimensions::new(image.width(), image.height());
        let placement = cover_placement(source, canvas);

        let framed = ImageProcessor::from_dynamic(image.clone()).cover(canvas, WHITE);
        let bytes = framed.to_jpeg_bytes(self.quality)?;

        info!(canvas = %canvas, size = bytes.len(), "ID photo composed");
        Ok(IdPhoto {
            bytes: Arc::from(bytes),
            dimensions: canvas,
            placement,
        })
    }
}
