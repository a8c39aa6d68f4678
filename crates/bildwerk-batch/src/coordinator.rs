// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch coordinator: an ordered collection of images compressed with one
// shared configuration.
//
// Item lifecycle:
//
//   Pending ──compress──▶ Compressing ──ok──▶ Compressed ──remove──▶ Removed
//      ▲                       │                   │
//      └───────── error ───────┘◀──── recompress ──┘
//
// Compression runs on the blocking pool; items are processed one at a time.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use bildwerk_bridge::{ArchiveEntry, Archiver};
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::naming::{compressed_file_name, dedupe_name};
use bildwerk_core::types::{
    CompressionConfig, CompressionResult, Dimensions, Download, ItemId, ItemStatus, SourceFile,
};
use bildwerk_image::{CompressionEngine, FormatNormalizer};

use crate::preview::{PreviewHandle, PreviewStore, release_slot};
use crate::selection::ActiveSelection;

// -- Items ------------------------------------------------------------------

/// One image in the batch.
#[derive(Debug)]
pub struct BatchItem {
    id: ItemId,
    source: SourceFile,
    dimensions: Dimensions,
    status: ItemStatus,
    result: Option<CompressionResult>,
    preview: Option<PreviewHandle>,
    added_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BatchItem {
    fn new(source: SourceFile, dimensions: Dimensions, preview: PreviewHandle) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            source,
            dimensions,
            status: ItemStatus::Pending,
            result: None,
            preview: Some(preview),
            added_at: now,
            updated_at: now,
        }
    }

    fn set_status(&mut self, status: ItemStatus) {
        debug!(item = %self.id, from = ?self.status, to = ?status, "item status");
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn result(&self) -> Option<&CompressionResult> {
        self.result.as_ref()
    }

    /// Source preview. `None` once the item has been removed.
    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Only compressed items can be downloaded.
    pub fn can_download(&self) -> bool {
        self.status == ItemStatus::Compressed && self.result.is_some()
    }

    pub fn download_name(&self) -> String {
        compressed_file_name(self.source.name())
    }
}

// -- Operation outcomes -----------------------------------------------------

/// What happened to a set of selected files.
#[derive(Debug)]
pub enum Intake {
    /// Nothing usable; the batch is untouched. `last_rejection` is the
    /// reason the last file was turned away.
    Empty {
        skipped: usize,
        last_rejection: Option<BildwerkError>,
    },
    /// Exactly one usable file. The batch is untouched and the caller opens
    /// it in the single-item view.
    Single(SourceFile),
    /// The batch was replaced with `added` new items.
    Batch { added: usize, skipped: usize },
}

/// Per-item outcome of [`BatchCoordinator::compress_all`].
#[derive(Debug, Default)]
pub struct CompressAllReport {
    pub compressed: Vec<ItemId>,
    /// Already compressed before the run.
    pub skipped: Vec<ItemId>,
    pub failed: Vec<(ItemId, BildwerkError)>,
}

impl CompressAllReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The bulk-export archive.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub download: Download,
    pub mime_type: &'static str,
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

// -- Coordinator ------------------------------------------------------------

pub struct BatchCoordinator {
    items: Vec<BatchItem>,
    previews: PreviewStore,
    normalizer: Arc<FormatNormalizer>,
    engine: CompressionEngine,
    archiver: Option<Arc<dyn Archiver>>,
    archive_name: String,
}

impl BatchCoordinator {
    pub fn new(
        normalizer: Arc<FormatNormalizer>,
        engine: CompressionEngine,
        archiver: Option<Arc<dyn Archiver>>,
        archive_name: impl Into<String>,
    ) -> Self {
        Self {
            items: Vec::new(),
            previews: PreviewStore::new(),
            normalizer,
            engine,
            archiver,
            archive_name: archive_name.into(),
        }
    }

    /// Validate each file independently. Two or more valid files replace
    /// the batch; a single one is handed back for the single-item view.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn add_items(&mut self, files: Vec<SourceFile>) -> Intake {
        let mut skipped = 0;
        let mut last_rejection = None;
        let mut valid = Vec::with_capacity(files.len());
        for file in files {
            match self.normalizer.validate(&file) {
                Ok(_) => valid.push(file),
                Err(err) => {
                    warn!(name = file.name(), error = %err, "skipping file");
                    skipped += 1;
                    last_rejection = Some(err);
                }
            }
        }

        if valid.len() < 2 {
            return match valid.pop() {
                Some(file) => Intake::Single(file),
                None => Intake::Empty {
                    skipped,
                    last_rejection,
                },
            };
        }

        let released = self.release_items();
        debug!(released, "previous batch released");

        for file in valid {
            match self.normalizer.decode(&file).await {
                Ok(raster) => {
                    let preview = self.previews.allocate(file.shared_bytes());
                    self.items
                        .push(BatchItem::new(file, raster.dimensions(), preview));
                }
                Err(err) => {
                    warn!(name = file.name(), error = %err, "skipping undecodable file");
                    skipped += 1;
                }
            }
        }

        info!(added = self.items.len(), skipped, "batch replaced");
        Intake::Batch {
            added: self.items.len(),
            skipped,
        }
    }

    /// Compress one item with `config`. On failure the item goes back to
    /// `Pending` and loses any earlier result.
    #[instrument(skip(self, config), fields(item = %id, mode = config.mode_name()))]
    pub async fn compress_item(
        &mut self,
        id: ItemId,
        config: &CompressionConfig,
    ) -> Result<CompressionResult> {
        let idx = self.index_of(id)?;
        self.items[idx].set_status(ItemStatus::Compressing);

        let source = self.items[idx].source.clone();
        let outcome = self.run_compression(&source, *config).await;

        let item = &mut self.items[idx];
        match outcome {
            Ok(result) => {
                item.result = Some(result.clone());
                item.set_status(ItemStatus::Compressed);
                info!(item = %id, size = result.size(), "item compressed");
                Ok(result)
            }
            Err(err) => {
                item.result = None;
                item.set_status(ItemStatus::Pending);
                warn!(item = %id, error = %err, "item compression failed");
                Err(err)
            }
        }
    }

    /// Compress every item not already compressed, in order. A failure is
    /// recorded and the loop moves on.
    #[instrument(skip(self, config), fields(items = self.items.len()))]
    pub async fn compress_all(&mut self, config: &CompressionConfig) -> CompressAllReport {
        let mut report = CompressAllReport::default();
        let ids: Vec<ItemId> = self.items.iter().map(BatchItem::id).collect();

        for id in ids {
            let already = self
                .get(id)
                .is_some_and(|item| item.status == ItemStatus::Compressed);
            if already {
                report.skipped.push(id);
                continue;
            }
            match self.compress_item(id, config).await {
                Ok(_) => report.compressed.push(id),
                Err(err) => report.failed.push((id, err)),
            }
        }

        info!(
            compressed = report.compressed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "batch pass finished"
        );
        report
    }

    /// Remove one item and release its preview. Clears `selection` if it was
    /// showing this item.
    #[instrument(skip(self, selection), fields(item = %id))]
    pub fn remove_item(&mut self, id: ItemId, selection: &mut ActiveSelection) -> Result<BatchItem> {
        let idx = self.index_of(id)?;
        let mut item = self.items.remove(idx);

        release_slot(&mut self.previews, &mut item.preview);
        self.normalizer.invalidate(item.source.content_hash());
        if selection.is_item(id) {
            selection.clear(&mut self.previews);
        }

        item.set_status(ItemStatus::Removed);
        info!(remaining = self.items.len(), "item removed");
        Ok(item)
    }

    /// Empty the batch and reset `selection`. Returns the number of item
    /// previews released.
    #[instrument(skip(self, selection), fields(items = self.items.len()))]
    pub fn clear_all(&mut self, selection: &mut ActiveSelection) -> usize {
        let released = self.release_items();
        selection.clear(&mut self.previews);
        self.normalizer.clear_cache();
        info!(released, "batch cleared");
        released
    }

    /// Pack every compressed item into one archive.
    #[instrument(skip(self))]
    pub async fn export_all(&self) -> Result<ExportBundle> {
        let archiver = self
            .archiver
            .as_ref()
            .ok_or(BildwerkError::ArchiverUnavailable)?;

        let mut taken = HashSet::new();
        let mut names = Vec::new();
        let mut entries = Vec::new();
        for item in &self.items {
            let Some(result) = item.result.as_ref().filter(|_| item.can_download()) else {
                continue;
            };
            let name = dedupe_name(&item.download_name(), &taken);
            taken.insert(name.clone());
            names.push(name.clone());
            entries.push(ArchiveEntry::new(name, result.bytes.to_vec()));
        }
        if entries.is_empty() {
            return Err(BildwerkError::NoCompressedItems);
        }

        let bytes = archiver.archive(entries).await?;
        info!(entries = names.len(), size = bytes.len(), "batch exported");
        Ok(ExportBundle {
            download: Download {
                file_name: self.archive_name.clone(),
                bytes: Arc::from(bytes),
            },
            mime_type: archiver.mime_type(),
            entries: names,
        })
    }

    /// The per-item download.
    pub fn download_item(&self, id: ItemId) -> Result<Download> {
        let item = self.get(id).ok_or(BildwerkError::ItemNotFound(id))?;
        let result = item
            .result
            .as_ref()
            .filter(|_| item.can_download())
            .ok_or(BildwerkError::NoCompressedItems)?;
        Ok(Download {
            file_name: item.download_name(),
            bytes: result.bytes.clone(),
        })
    }

    // -- Accessors ----------------------------------------------------------

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&BatchItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn compressed_count(&self) -> usize {
        self.items.iter().filter(|item| item.can_download()).count()
    }

    /// Bulk download is offered once an archiver exists and at least one
    /// item is compressed.
    pub fn can_export(&self) -> bool {
        self.archiver.is_some() && self.compressed_count() > 0
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn previews_mut(&mut self) -> &mut PreviewStore {
        &mut self.previews
    }

    pub fn normalizer(&self) -> &Arc<FormatNormalizer> {
        &self.normalizer
    }

    // -- Internal -----------------------------------------------------------

    fn index_of(&self, id: ItemId) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(BildwerkError::ItemNotFound(id))
    }

    fn release_items(&mut self) -> usize {
        let mut released = 0;
        for mut item in self.items.drain(..) {
            if release_slot(&mut self.previews, &mut item.preview) {
                released += 1;
            }
            self.normalizer.invalidate(item.source.content_hash());
        }
        released
    }

    async fn run_compression(
        &self,
        source: &SourceFile,
        config: CompressionConfig,
    ) -> Result<CompressionResult> {
        config.validate()?;
        let raster = self.normalizer.decode(source).await?;
        let image = raster.shared_image();
        let engine = self.engine;
        tokio::task::spawn_blocking(move || engine.compress(&image, &config))
            .await
            .map_err(|err| BildwerkError::EncodeError(format!("compression task failed: {err}")))?
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("items", &self.items.len())
            .field("live_previews", &self.previews.live_count())
            .field("archiver", &self.archiver.is_some())
            .field("archive_name", &self.archive_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bildwerk_core::config::EngineConfig;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    fn png(name: &str, width: u32, height: u32) -> SourceFile {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7) as u8, (y * 13) as u8, (x ^ y) as u8])
        }));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        SourceFile::new(name, "image/png", bytes)
    }

    /// Records entry names instead of building an archive.
    #[derive(Default)]
    struct RecordingArchiver {
        names: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Archiver for RecordingArchiver {
        async fn archive(&self, entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
            let mut names = self.names.lock().expect("lock");
            names.extend(entries.iter().map(|e| e.name.clone()));
            Ok(b"archive".to_vec())
        }
    }

    fn coordinator(archiver: Option<Arc<dyn Archiver>>) -> BatchCoordinator {
        let config = EngineConfig::default();
        BatchCoordinator::new(
            Arc::new(FormatNormalizer::new(&config, None)),
            CompressionEngine::new(&config),
            archiver,
            config.archive_name,
        )
    }

    async fn loaded(count: usize) -> BatchCoordinator {
        let mut batch = coordinator(None);
        let files = (0..count)
            .map(|i| png(&format!("img{i}.png"), 16 + i as u32, 12))
            .collect();
        let intake = batch.add_items(files).await;
        assert!(matches!(intake, Intake::Batch { added, .. } if added == count));
        batch
    }

    const QUALITY: CompressionConfig = CompressionConfig::Quality { percent: 70.0 };

    // -- Intake ---------------------------------------------------------------

    #[tokio::test]
    async fn intake_routes_by_valid_count() {
        let mut batch = coordinator(None);

        let intake = batch
            .add_items(vec![SourceFile::new("a.gif", "image/gif", vec![1u8])])
            .await;
        assert!(matches!(
            intake,
            Intake::Empty {
                skipped: 1,
                last_rejection: Some(BildwerkError::UnsupportedFormat(_)),
            }
        ));

        let intake = batch
            .add_items(vec![
                png("one.png", 4, 4),
                SourceFile::new("b.txt", "text/plain", vec![1u8]),
            ])
            .await;
        assert!(matches!(intake, Intake::Single(ref f) if f.name() == "one.png"));
        assert!(batch.is_empty());

        let intake = batch
            .add_items(vec![png("x.png", 4, 4), png("y.png", 5, 5)])
            .await;
        assert!(matches!(intake, Intake::Batch { added: 2, skipped: 0 }));
        assert_eq!(batch.len(), 2);
        assert!(batch.items().iter().all(|i| i.status() == ItemStatus::Pending));
        assert_eq!(batch.items()[1].dimensions(), Dimensions::new(5, 5));
    }

    #[tokio::test]
    async fn undecodable_files_are_skipped() {
        let mut batch = coordinator(None);
        let intake = batch
            .add_items(vec![
                png("ok1.png", 3, 3),
                SourceFile::new("broken.jpg", "image/jpeg", vec![0u8; 10]),
                png("ok2.png", 3, 3),
            ])
            .await;
        assert!(matches!(intake, Intake::Batch { added: 2, skipped: 1 }));
        assert_eq!(batch.previews().live_count(), 2);
    }

    #[tokio::test]
    async fn new_batch_replaces_old_and_releases_previews() {
        let mut batch = loaded(3).await;
        let old: Vec<ItemId> = batch.items().iter().map(BatchItem::id).collect();

        batch
            .add_items(vec![png("n1.png", 2, 2), png("n2.png", 2, 2)])
            .await;
        assert_eq!(batch.len(), 2);
        assert!(old.iter().all(|id| batch.get(*id).is_none()));
        assert_eq!(batch.previews().released_count(), 3);
        assert_eq!(batch.previews().live_count(), 2);
    }

    // -- Compression ----------------------------------------------------------

    #[tokio::test]
    async fn compress_item_transitions_to_compressed() {
        let mut batch = loaded(2).await;
        let id = batch.items()[0].id();

        let result = batch.compress_item(id, &QUALITY).await.expect("compress");
        let item = batch.get(id).expect("item");
        assert_eq!(item.status(), ItemStatus::Compressed);
        assert_eq!(item.result().map(CompressionResult::size), Some(result.size()));
        assert!(item.can_download());
        assert_eq!(batch.compressed_count(), 1);
    }

    #[tokio::test]
    async fn failed_compression_reverts_to_pending() {
        let mut batch = loaded(2).await;
        let id = batch.items()[0].id();
        batch.compress_item(id, &QUALITY).await.expect("compress");

        let bad = CompressionConfig::PixelBounds {
            max_width: 0,
            max_height: 10,
        };
        let err = batch.compress_item(id, &bad).await.err().expect("fail");
        assert!(matches!(err, BildwerkError::InvalidConfig(_)));

        let item = batch.get(id).expect("item");
        assert_eq!(item.status(), ItemStatus::Pending);
        assert!(item.result().is_none());
        assert!(!item.can_download());
    }

    #[tokio::test]
    async fn compress_all_skips_already_compressed() {
        let mut batch = loaded(3).await;
        let first = batch.items()[0].id();
        batch.compress_item(first, &QUALITY).await.expect("compress");

        let report = batch.compress_all(&QUALITY).await;
        assert!(report.is_complete());
        assert_eq!(report.skipped, vec![first]);
        assert_eq!(report.compressed.len(), 2);
        assert_eq!(batch.compressed_count(), 3);
    }

    #[tokio::test]
    async fn compress_all_collects_failures_and_keeps_going() {
        let mut batch = loaded(3).await;
        let invalid = CompressionConfig::PixelBounds {
            max_width: 0,
            max_height: 100,
        };

        let report = batch.compress_all(&invalid).await;
        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 3);
        assert!(report.compressed.is_empty());
        assert!(
            report
                .failed
                .iter()
                .all(|(_, err)| matches!(err, BildwerkError::InvalidConfig(_)))
        );
        assert!(batch.items().iter().all(|i| i.status() == ItemStatus::Pending));
        assert!(batch.items().iter().all(|i| i.result().is_none()));
        assert!(!batch.can_export());
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let mut batch = loaded(2).await;
        let ghost = ItemId::new();
        let err = batch.compress_item(ghost, &QUALITY).await.err().expect("fail");
        assert!(matches!(err, BildwerkError::ItemNotFound(id) if id == ghost));
        assert!(batch.download_item(ghost).is_err());
    }

    // -- Removal --------------------------------------------------------------

    #[tokio::test]
    async fn remove_item_removes_exactly_one() {
        let mut batch = loaded(4).await;
        let mut selection = ActiveSelection::new();
        let ids: Vec<ItemId> = batch.items().iter().map(BatchItem::id).collect();

        let removed = batch.remove_item(ids[1], &mut selection).expect("remove");
        assert_eq!(removed.status(), ItemStatus::Removed);
        assert!(removed.preview().is_none());

        let remaining: Vec<ItemId> = batch.items().iter().map(BatchItem::id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[3]]);
        assert_eq!(batch.previews().released_count(), 1);
    }

    #[tokio::test]
    async fn removing_the_active_item_clears_the_selection() {
        let mut batch = loaded(2).await;
        let id = batch.items()[0].id();
        let result = batch.compress_item(id, &QUALITY).await.expect("compress");

        let source = batch.get(id).expect("item").source().clone();
        let raster = batch.normalizer().decode(&source).await.expect("decode");
        let mut selection = ActiveSelection::new();
        selection.replace(
            batch.previews_mut(),
            Some(id),
            source,
            raster.dimensions(),
            None,
        );
        selection.replace_result(batch.previews_mut(), Some(result));

        batch.remove_item(id, &mut selection).expect("remove");
        assert!(selection.is_empty());
        // One item preview remains for the other item.
        assert_eq!(batch.previews().live_count(), 1);
    }

    #[tokio::test]
    async fn clear_all_releases_every_preview() {
        let mut batch = loaded(5).await;
        let mut selection = ActiveSelection::new();
        assert_eq!(batch.clear_all(&mut selection), 5);
        assert!(batch.is_empty());
        assert_eq!(batch.previews().live_count(), 0);
        assert_eq!(batch.previews().released_count(), 5);
    }

    // -- Export ---------------------------------------------------------------

    #[tokio::test]
    async fn export_checks_archiver_before_contents() {
        let batch = loaded(2).await;
        let err = batch.export_all().await.err().expect("fail");
        assert!(matches!(err, BildwerkError::ArchiverUnavailable));

        let archiver = Arc::new(RecordingArchiver::default());
        let batch = coordinator(Some(archiver));
        let err = batch.export_all().await.err().expect("fail");
        assert!(matches!(err, BildwerkError::NoCompressedItems));
        assert!(!batch.can_export());
    }

    #[tokio::test]
    async fn export_names_and_dedupes_entries() {
        let archiver = Arc::new(RecordingArchiver::default());
        let mut batch = coordinator(Some(archiver.clone()));
        batch
            .add_items(vec![
                png("holiday.png", 8, 8),
                png("holiday.jpeg", 9, 9),
                png("other.png", 10, 10),
            ])
            .await;
        let ids: Vec<ItemId> = batch.items().iter().map(BatchItem::id).collect();
        batch.compress_item(ids[0], &QUALITY).await.expect("compress");
        batch.compress_item(ids[1], &QUALITY).await.expect("compress");
        assert!(batch.can_export());

        let bundle = batch.export_all().await.expect("export");
        assert_eq!(bundle.download.file_name, "compressed-images.zip");
        assert_eq!(bundle.mime_type, "application/zip");
        assert_eq!(
            bundle.entries,
            vec!["holiday-compressed.jpg", "holiday-compressed-2.jpg"]
        );
        assert_eq!(*archiver.names.lock().expect("lock"), bundle.entries);
    }

    #[tokio::test]
    async fn download_item_requires_a_result() {
        let mut batch = loaded(2).await;
        let id = batch.items()[0].id();
        assert!(matches!(
            batch.download_item(id),
            Err(BildwerkError::NoCompressedItems)
        ));

        batch.compress_item(id, &QUALITY).await.expect("compress");
        let download = batch.download_item(id).expect("download");
        assert_eq!(download.file_name, "img0-compressed.jpg");
        assert!(!download.bytes.is_empty());
    }
}
