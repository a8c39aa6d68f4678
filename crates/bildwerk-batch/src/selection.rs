// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The image currently shown in the single-item view.

use bildwerk_core::types::{CompressionResult, Dimensions, ItemId, SourceFile};

use crate::preview::{PreviewHandle, PreviewStore, release_slot};

/// Context for the single-item view: which source is active, its pixel
/// size, the latest result, and the preview handles this view owns. Pixels
/// are not held here; recompression decodes the source again.
///
/// A selection that came from the batch carries the item's id and does not
/// own a source preview (the batch item does).
#[derive(Debug, Default)]
pub struct ActiveSelection {
    item_id: Option<ItemId>,
    source: Option<SourceFile>,
    dimensions: Option<Dimensions>,
    result: Option<CompressionResult>,
    result_preview: Option<PreviewHandle>,
    source_preview: Option<PreviewHandle>,
}

impl ActiveSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `source` the active image, releasing everything the previous
    /// selection owned.
    pub fn replace(
        &mut self,
        previews: &mut PreviewStore,
        item_id: Option<ItemId>,
        source: SourceFile,
        dimensions: Dimensions,
        source_preview: Option<PreviewHandle>,
    ) {
        self.clear(previews);
        self.item_id = item_id;
        self.source = Some(source);
        self.dimensions = Some(dimensions);
        self.source_preview = source_preview;
    }

    /// Swap in a new result (or none), releasing the old result preview.
    pub fn replace_result(
        &mut self,
        previews: &mut PreviewStore,
        result: Option<CompressionResult>,
    ) {
        release_slot(previews, &mut self.result_preview);
        self.result_preview = result
            .as_ref()
            .map(|r| previews.allocate(r.bytes.clone()));
        self.result = result;
    }

    /// Drop the selection. Returns how many handles were released.
    pub fn clear(&mut self, previews: &mut PreviewStore) -> usize {
        let released = usize::from(release_slot(previews, &mut self.result_preview))
            + usize::from(release_slot(previews, &mut self.source_preview));
        self.item_id = None;
        self.source = None;
        self.dimensions = None;
        self.result = None;
        released
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    /// True when the active image is the batch item `id`.
    pub fn is_item(&self, id: ItemId) -> bool {
        self.item_id == Some(id)
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn result(&self) -> Option<&CompressionResult> {
        self.result.as_ref()
    }

    pub fn result_preview(&self) -> Option<&PreviewHandle> {
        self.result_preview.as_ref()
    }

    pub fn source_preview(&self) -> Option<&PreviewHandle> {
        self.source_preview.as_ref()
    }
}
