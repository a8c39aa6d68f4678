// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Bildwerk.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BildwerkError, Result};
use crate::integrity::hash_bytes;

/// Unique identifier for a batch item.
///
/// Backed by a random v4 UUID, so identifiers are never reused within a
/// process even after the item they named has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Selected, no current result. Also the state after a failed attempt.
    Pending,
    /// A compression pass is running.
    Compressing,
    /// Holds a current result; download is enabled.
    Compressed,
    /// Deleted from the batch (terminal).
    Removed,
}

/// Supported input image types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
    Avif,
    Heic,
    Heif,
}

impl MediaType {
    /// Every accepted input type, in allow-list order.
    pub const ALL: [MediaType; 6] = [
        Self::Jpeg,
        Self::Png,
        Self::Webp,
        Self::Avif,
        Self::Heic,
        Self::Heif,
    ];

    /// Canonical MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Heic => "image/heic",
            Self::Heif => "image/heif",
        }
    }

    /// Match a declared MIME type against the allow-list.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.mime_type().eq_ignore_ascii_case(mime))
    }

    /// Infer the media type from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Whether the type has to go through the external format converter
    /// before the decoder can read it.
    pub fn needs_conversion(&self) -> bool {
        matches!(self, Self::Heic | Self::Heif)
    }
}

/// A user-selected input file. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    declared_type: String,
    bytes: Arc<[u8]>,
    content_hash: String,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        let content_hash = hash_bytes(&bytes);
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes,
            content_hash,
        }
    }

    /// File name as selected by the user, including its extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type declared by the host. May be empty or wrong.
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap shared handle to the raw bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// SHA-256 of the raw bytes, lowercase hex. Identifies the content for
    /// raster caching.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Extension of the file name (text after the final dot), if any.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if ext.is_empty() || ext.contains('/') || stem.ends_with('/') {
            return None;
        }
        Some(ext)
    }
}

/// Pixel dimensions of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How to compress. Exactly one mode is active at a time; the host builds
/// one of these from its controls and passes it in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompressionConfig {
    /// Re-encode at the original size with a fixed quality (0-100).
    Quality { percent: f32 },
    /// Search for the highest quality that fits in `kb` kilobytes.
    TargetSize { kb: f64 },
    /// Scale down (never up) to fit inside the bounds.
    PixelBounds { max_width: u32, max_height: u32 },
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::Quality { percent: 100.0 }
    }
}

impl CompressionConfig {
    /// Short name of the active mode, for logging.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Quality { .. } => "quality",
            Self::TargetSize { .. } => "size",
            Self::PixelBounds { .. } => "pixel",
        }
    }

    /// Reject values the engine cannot act on.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Quality { percent } if !percent.is_finite() => Err(
                BildwerkError::InvalidConfig(format!("quality must be a number, got {percent}")),
            ),
            Self::Quality { .. } => Ok(()),
            Self::TargetSize { kb } if !kb.is_finite() || kb <= 0.0 => Err(
                BildwerkError::InvalidConfig(format!("target size must be positive, got {kb} KB")),
            ),
            Self::TargetSize { .. } => Ok(()),
            Self::PixelBounds {
                max_width,
                max_height,
            } if max_width == 0 || max_height == 0 => Err(BildwerkError::InvalidConfig(format!(
                "pixel bounds must be positive, got {max_width}x{max_height}"
            ))),
            Self::PixelBounds { .. } => Ok(()),
        }
    }

    /// Keep the active mode but reset its values to the defaults offered
    /// for a freshly selected image: full quality, the source's own size in
    /// KB, or the source's own dimensions.
    pub fn reset_for(&self, source_size: u64, dimensions: Dimensions) -> Self {
        match self {
            Self::Quality { .. } => Self::Quality { percent: 100.0 },
            Self::TargetSize { .. } => Self::TargetSize {
                kb: (source_size as f64 / 1024.0).round().max(1.0),
            },
            Self::PixelBounds { .. } => Self::PixelBounds {
                max_width: dimensions.width,
                max_height: dimensions.height,
            },
        }
    }
}

/// Convert a quality percentage into the 0.0-1.0 fraction the encoder uses,
/// clamping out-of-range input.
pub fn quality_fraction(percent: f32) -> f32 {
    (percent / 100.0).clamp(0.0, 1.0)
}

/// Size budget in bytes for a target given in kilobytes.
pub fn target_bytes(kb: f64) -> u64 {
    (kb * 1024.0).floor().max(0.0) as u64
}

/// Standard ID-photo sizes in pixels at 300 DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdPhotoPreset {
    #[serde(rename = "1inch")]
    OneInch,
    #[serde(rename = "small1inch")]
    SmallOneInch,
    #[serde(rename = "large1inch")]
    LargeOneInch,
    #[serde(rename = "2inch")]
    TwoInch,
    #[serde(rename = "small2inch")]
    SmallTwoInch,
    #[serde(rename = "large2inch")]
    LargeTwoInch,
}

impl IdPhotoPreset {
    pub const ALL: [IdPhotoPreset; 6] = [
        Self::OneInch,
        Self::SmallOneInch,
        Self::LargeOneInch,
        Self::TwoInch,
        Self::SmallTwoInch,
        Self::LargeTwoInch,
    ];

    /// Output size in pixels.
    pub fn dimensions(&self) -> Dimensions {
        match self {
            Self::OneInch => Dimensions::new(295, 413),
            Self::SmallOneInch => Dimensions::new(260, 378),
            Self::LargeOneInch => Dimensions::new(390, 567),
            Self::TwoInch => Dimensions::new(413, 579),
            Self::SmallTwoInch => Dimensions::new(390, 567),
            Self::LargeTwoInch => Dimensions::new(413, 626),
        }
    }

    /// Stable key used by hosts to name the preset.
    pub fn key(&self) -> &'static str {
        match self {
            Self::OneInch => "1inch",
            Self::SmallOneInch => "small1inch",
            Self::LargeOneInch => "large1inch",
            Self::TwoInch => "2inch",
            Self::SmallTwoInch => "small2inch",
            Self::LargeTwoInch => "large2inch",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// Target canvas for an ID photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPhotoSpec {
    Preset(IdPhotoPreset),
    Custom { width: u32, height: u32 },
}

impl Default for IdPhotoSpec {
    fn default() -> Self {
        Self::Preset(IdPhotoPreset::OneInch)
    }
}

impl IdPhotoSpec {
    pub fn dimensions(&self) -> Dimensions {
        match *self {
            Self::Preset(preset) => preset.dimensions(),
            Self::Custom { width, height } => Dimensions::new(width, height),
        }
    }

    /// Custom sizes must be non-zero. There is no upper bound.
    pub fn validate(&self) -> Result<Dimensions> {
        let dims = self.dimensions();
        if dims.width == 0 || dims.height == 0 {
            return Err(BildwerkError::InvalidConfig(format!(
                "ID photo size must be non-zero, got {dims}"
            )));
        }
        Ok(dims)
    }
}

/// Output of one compression pass.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// Encoded JPEG bytes.
    pub bytes: Arc<[u8]>,
    /// Dimensions of the encoded raster.
    pub dimensions: Dimensions,
    /// Quality fraction (0.0-1.0) the bytes were encoded with.
    pub quality: f32,
}

impl CompressionResult {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Percentage saved relative to `original_size`. Negative when the
    /// output is larger than the input.
    pub fn savings_percent(&self, original_size: u64) -> f64 {
        if original_size == 0 {
            return 0.0;
        }
        (original_size as f64 - self.size() as f64) / original_size as f64 * 100.0
    }
}

/// A named blob ready to be offered to the user as a download.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}
