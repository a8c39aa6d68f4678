// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the single message slot a host shows.
//
// Every technical error is mapped to plain language with a suggestion. No
// error here is retried automatically; the suggestion tells the user what to
// re-trigger.

use crate::error::BildwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The user can fix it by changing input or settings and trying again.
    ActionRequired,
    /// Retrying the same thing will fail the same way.
    Permanent,
}

/// A human-readable error with a plain message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Drives icon/colour in the host UI.
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            severity,
        }
    }
}

/// Convert a `BildwerkError` into a `HumanError`.
pub fn humanize_error(err: &BildwerkError) -> HumanError {
    match err {
        BildwerkError::UnsupportedFormat(detail) => HumanError::new(
            "This image format isn't supported.",
            format!("Use a JPEG, PNG, WebP, AVIF or HEIC image. ({detail})"),
            Severity::Permanent,
        ),

        BildwerkError::OversizedInput { limit, .. } => HumanError::new(
            "This image is too large.",
            format!("Images up to {} MB are supported.", limit / (1024 * 1024)),
            Severity::Permanent,
        ),

        BildwerkError::DecodeError(_) => HumanError::new(
            "This image couldn't be read.",
            "The file may be damaged or incomplete. Try exporting it again from the original app.",
            Severity::Permanent,
        ),

        BildwerkError::EncodeError(_) => HumanError::new(
            "Compression failed.",
            "Try different settings, or click compress again.",
            Severity::ActionRequired,
        ),

        BildwerkError::InvalidConfig(detail) => HumanError::new(
            "These settings can't be used.",
            format!("Enter a positive value and try again. ({detail})"),
            Severity::ActionRequired,
        ),

        BildwerkError::ConversionUnavailable => HumanError::new(
            "HEIC images need a conversion library.",
            "The converter hasn't loaded. Reload and try again, or convert the photo to JPEG first.",
            Severity::ActionRequired,
        ),

        BildwerkError::ConversionFailed(_) => HumanError::new(
            "This HEIC image couldn't be converted.",
            "Try converting the photo to JPEG on the device that took it.",
            Severity::Permanent,
        ),

        BildwerkError::ArchiverUnavailable => HumanError::new(
            "The ZIP library isn't loaded.",
            "Download images one at a time, or reload and try again.",
            Severity::ActionRequired,
        ),

        BildwerkError::ArchiveFailed(_) => HumanError::new(
            "Packing the ZIP file failed.",
            "Try downloading again, or download images one at a time.",
            Severity::ActionRequired,
        ),

        BildwerkError::NoCompressedItems => HumanError::new(
            "There are no compressed images yet.",
            "Compress at least one image, then download.",
            Severity::ActionRequired,
        ),

        BildwerkError::ItemNotFound(_) => HumanError::new(
            "That image is no longer in the list.",
            "It may have been removed. Select another image.",
            Severity::ActionRequired,
        ),

        BildwerkError::NothingSelected => HumanError::new(
            "No image selected.",
            "Choose an image first.",
            Severity::ActionRequired,
        ),

        BildwerkError::Io(_) => HumanError::new(
            "The file couldn't be read.",
            "Check the file still exists and select it again.",
            Severity::ActionRequired,
        ),

        BildwerkError::Serialization(_) => HumanError::new(
            "The settings couldn't be read.",
            "Defaults will be used instead.",
            Severity::Permanent,
        ),
    }
}
