// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-image: Decoding, compression, and ID-photo composition.
//
// Everything here is synchronous except `FormatNormalizer::decode`, which may
// await the external format converter.

pub mod cache;
pub mod compress;
pub mod idphoto;
pub mod image;
pub mod normalize;

pub use cache::RasterCache;
pub use compress::{CompressionEngine, Probe, SizeFit, fit_to_size};
pub use idphoto::{IdPhoto, IdPhotoCompositor};
pub use normalize::{DecodedRaster, FormatNormalizer};
