// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, proportional downscale, scale-to-cover placement,
// and JPEG encoding. Operates on in-memory images using the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use tracing::{debug, info, instrument};

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::Dimensions;

/// Largest side a baseline JPEG can encode.
pub const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

/// Opaque white, used as the ID-photo background.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Image processing pipeline operating on a single in-memory image.
///
/// Transformations consume `self` and return a new `ImageProcessor` wrapping
/// the result, so calls chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_bytes(&bytes)?
///     .fit_within(1920, 1080)
///     .to_jpeg_bytes(0.85)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, WebP, ...). The format is sniffed
    /// from the content, not taken from any declared type.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| BildwerkError::DecodeError(err.to_string()))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(BildwerkError::DecodeError(format!(
                "decoded image has no pixels ({}x{})",
                img.width(),
                img.height()
            )));
        }
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Scale down uniformly to fit inside `max_width` x `max_height`. Never
    /// scales up; an image already inside the bounds is returned untouched.
    #[instrument(skip(self))]
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        let target = bounded_dimensions(self.dimensions(), max_width, max_height);
        if target == self.dimensions() {
            debug!("already within bounds");
            return self;
        }
        info!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            to_w = target.width,
            to_h = target.height,
            "Downscaling image"
        );
        self.resize_exact(target.width, target.height)
    }

    /// Resize the image to exactly `width` x `height`, ignoring aspect ratio.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        let resized = self
            .image
            .resize_exact(width, height, FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Scale to cover a `canvas`-sized frame, centre it, and flatten it onto
    /// an opaque background. Edges that overflow the frame are cropped.
    ///
    /// Only the visible source rectangle is resampled, so the working set
    /// never exceeds the source plus the canvas.
    #[instrument(skip(self), fields(canvas = %canvas))]
    pub fn cover(self, canvas: Dimensions, background: Rgba<u8>) -> Self {
        let placement = cover_placement(self.dimensions(), canvas);
        info!(
            scale = placement.scale,
            scaled = %placement.scaled,
            offset_x = placement.offset_x,
            offset_y = placement.offset_y,
            "Placing image on canvas"
        );

        let (x, width) =
            visible_span(placement.offset_x, canvas.width, self.width(), placement.scale);
        let (y, height) =
            visible_span(placement.offset_y, canvas.height, self.height(), placement.scale);
        debug!(x, y, width, height, "Cropping visible region");

        let visible = self
            .image
            .crop_imm(x, y, width, height)
            .resize_exact(canvas.width, canvas.height, FilterType::Lanczos3)
            .to_rgba8();

        let mut frame = RgbaImage::from_pixel(canvas.width, canvas.height, background);
        imageops::overlay(&mut frame, &visible, 0, 0);

        Self {
            image: DynamicImage::ImageRgba8(frame),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as baseline JPEG with a quality fraction in 0.0-1.0.
    pub fn to_jpeg_bytes(&self, quality: f32) -> Result<Vec<u8>> {
        encode_jpeg(&self.image, quality)
    }
}

/// Map a 0.0-1.0 quality fraction to the encoder's 1-100 scale.
pub fn jpeg_quality(fraction: f32) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode any image as JPEG. Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    encode_rgb_jpeg(&image.to_rgb8(), quality)
}

/// Encode an RGB buffer as JPEG. The size search calls this once per probe.
pub fn encode_rgb_jpeg(rgb: &RgbImage, quality: f32) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));
    rgb.write_with_encoder(encoder)
        .map_err(|err| BildwerkError::EncodeError(format!("JPEG encoding failed: {err}")))?;
    if buffer.is_empty() {
        return Err(BildwerkError::EncodeError(
            "encoder produced an empty blob".into(),
        ));
    }
    Ok(buffer)
}

/// Proportional bounds: scale = min(max_w / w, max_h / h), applied only when
/// it shrinks the image. Rounded to the nearest pixel, never below 1.
pub fn bounded_dimensions(source: Dimensions, max_width: u32, max_height: u32) -> Dimensions {
    let ratio = (f64::from(max_width) / f64::from(source.width))
        .min(f64::from(max_height) / f64::from(source.height));
    if ratio >= 1.0 {
        return source;
    }
    Dimensions::new(
        ((f64::from(source.width) * ratio).round() as u32).clamp(1, source.width),
        ((f64::from(source.height) * ratio).round() as u32).clamp(1, source.height),
    )
}

/// Source-space start and length of the part of one axis that lands on the
/// canvas. Always inside `0..source_len` and at least one pixel long.
fn visible_span(offset: i64, canvas_len: u32, source_len: u32, scale: f64) -> (u32, u32) {
    let start = ((-offset) as f64 / scale).floor().max(0.0) as u32;
    let start = start.min(source_len.saturating_sub(1));
    let len = (f64::from(canvas_len) / scale).round() as u32;
    (start, len.clamp(1, source_len - start))
}

/// Where a scaled-to-cover image lands on its canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPlacement {
    /// max(canvas.w / img.w, canvas.h / img.h)
    pub scale: f64,
    /// Image size after scaling; at least the canvas size on both axes.
    pub scaled: Dimensions,
    /// (canvas.w - scaled.w) / 2, zero or negative.
    pub offset_x: i64,
    /// (canvas.h - scaled.h) / 2, zero or negative.
    pub offset_y: i64,
}

pub fn cover_placement(source: Dimensions, canvas: Dimensions) -> CoverPlacement {
    let scale = (f64::from(canvas.width) / f64::from(source.width))
        .max(f64::from(canvas.height) / f64::from(source.height));
    let scaled = Dimensions::new(
        ((f64::from(source.width) * scale).round() as u32).max(canvas.width),
        ((f64::from(source.height) * scale).round() as u32).max(canvas.height),
    );
    CoverPlacement {
        scale,
        scaled,
        offset_x: (i64::from(canvas.width) - i64::from(scaled.width)) / 2,
        offset_y: (i64::from(canvas.height) - i64::from(scaled.height)) / 2,
    }
}
