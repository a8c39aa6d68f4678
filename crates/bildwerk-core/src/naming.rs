// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Download file names.

use crate::types::Dimensions;

/// Extension of every encoded output.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Strip the final `.ext` from a file name. Names without an extension are
/// returned unchanged; a leading-dot name such as `.hidden` strips to "".
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx)
            if idx + 1 < file_name.len() && !file_name[idx + 1..].contains('/') =>
        {
            &file_name[..idx]
        }
        _ => file_name,
    }
}

/// `{base}-compressed.jpg`
pub fn compressed_file_name(original: &str) -> String {
    format!("{}-compressed.{OUTPUT_EXTENSION}", base_name(original))
}

/// `{base}-{width}x{height}.jpg`
pub fn id_photo_file_name(original: &str, dimensions: Dimensions) -> String {
    format!(
        "{}-{}x{}.{OUTPUT_EXTENSION}",
        base_name(original),
        dimensions.width,
        dimensions.height
    )
}

/// Make `name` unique against `taken` by appending `-2`, `-3`, ... before the
/// extension.
pub fn dedupe_name(name: &str, taken: &std::collections::HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_owned();
    }
    let stem = base_name(name);
    let ext = &name[stem.len()..];
    (2u32..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_owned())
}
