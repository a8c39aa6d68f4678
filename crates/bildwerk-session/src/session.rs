// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session: the facade a host UI drives.
//
// Owns everything a single user session touches: configuration, the batch,
// the active selection, the ID-photo state, and the one user-visible error
// slot. Every public operation that can fail stores its humanized error in
// the slot and also returns it; a successful operation empties the slot.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use bildwerk_batch::{
    ActiveSelection, BatchCoordinator, BatchItem, CompressAllReport, ExportBundle, Intake,
    PreviewHandle, PreviewStore,
};
use bildwerk_bridge::Collaborators;
use bildwerk_core::config::EngineConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::human_errors::{HumanError, humanize_error};
use bildwerk_core::naming::{compressed_file_name, id_photo_file_name};
use bildwerk_core::types::{
    CompressionConfig, CompressionResult, Download, IdPhotoSpec, ItemId, SourceFile,
};
use bildwerk_image::{
    CompressionEngine, DecodedRaster, FormatNormalizer, IdPhoto, IdPhotoCompositor,
};

use crate::generation::{RequestGeneration, RequestToken};

// -- Recompression jobs -----------------------------------------------------

/// A recompression detached from the session so it can run while the
/// session keeps accepting input. Produced by
/// [`Session::prepare_recompression`].
///
/// The job carries the source file, not pixels: running it decodes again
/// through the normalizer, which serves a cached raster only when
/// `cache_rasters` is on.
pub struct RecompressJob {
    token: RequestToken,
    source: SourceFile,
    normalizer: Arc<FormatNormalizer>,
    config: CompressionConfig,
    engine: CompressionEngine,
}

impl RecompressJob {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Decode the source, then encode on the blocking pool.
    pub async fn run(self) -> RecompressOutcome {
        let decoded = self.normalizer.decode(&self.source).await;
        match decoded {
            Ok(raster) => self.run_on(raster).await,
            Err(err) => RecompressOutcome {
                token: self.token,
                result: Err(err),
            },
        }
    }

    /// Encode an already decoded copy of the source.
    async fn run_on(self, raster: DecodedRaster) -> RecompressOutcome {
        let Self {
            token,
            config,
            engine,
            ..
        } = self;
        let image = raster.shared_image();
        let result = tokio::task::spawn_blocking(move || engine.compress(&image, &config))
            .await
            .unwrap_or_else(|err| {
                Err(BildwerkError::EncodeError(format!(
                    "compression task failed: {err}"
                )))
            });
        RecompressOutcome { token, result }
    }
}

/// A finished [`RecompressJob`], ready for [`Session::apply_recompression`].
pub struct RecompressOutcome {
    token: RequestToken,
    result: Result<CompressionResult>,
}

impl RecompressOutcome {
    pub fn token(&self) -> RequestToken {
        self.token
    }
}

/// What applying an outcome did.
#[derive(Debug, Clone)]
pub enum Applied {
    /// The result is now the active one.
    Current(CompressionResult),
    /// A newer request superseded this one; the result was dropped.
    Stale,
}

impl Applied {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn into_result(self) -> Option<CompressionResult> {
        match self {
            Self::Current(result) => Some(result),
            Self::Stale => None,
        }
    }
}

// -- ID photo state ---------------------------------------------------------

#[derive(Debug, Default)]
struct IdPhotoState {
    source: Option<SourceFile>,
    spec: IdPhotoSpec,
    photo: Option<IdPhoto>,
    preview: Option<PreviewHandle>,
}

// -- Session ----------------------------------------------------------------

pub struct Session {
    config: EngineConfig,
    compression: CompressionConfig,
    normalizer: Arc<FormatNormalizer>,
    engine: CompressionEngine,
    compositor: IdPhotoCompositor,
    batch: BatchCoordinator,
    selection: ActiveSelection,
    id_photo: IdPhotoState,
    generation: RequestGeneration,
    error: Option<HumanError>,
}

impl Session {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let normalizer = Arc::new(FormatNormalizer::new(&config, collaborators.converter));
        let engine = CompressionEngine::new(&config);
        let batch = BatchCoordinator::new(
            Arc::clone(&normalizer),
            engine,
            collaborators.archiver,
            config.archive_name.clone(),
        );
        info!(
            converter = normalizer.has_converter(),
            cache = config.cache_rasters,
            "session created"
        );
        Self {
            compositor: IdPhotoCompositor::new(&config),
            config,
            compression: CompressionConfig::default(),
            normalizer,
            engine,
            batch,
            selection: ActiveSelection::new(),
            id_photo: IdPhotoState::default(),
            generation: RequestGeneration::new(),
            error: None,
        }
    }

    /// Default configuration with whatever collaborators this build bundles.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default(), Collaborators::detect())
    }

    // -- Error slot -----------------------------------------------------------

    /// The message currently shown to the user, if any.
    pub fn last_error(&self) -> Option<&HumanError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.error = None,
            Err(err) => {
                warn!(error = %err, "operation failed");
                self.error = Some(humanize_error(err));
            }
        }
        result
    }

    // -- Configuration --------------------------------------------------------

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compression_config(&self) -> &CompressionConfig {
        &self.compression
    }

    /// Replace the shared compression settings. Does not recompress; call
    /// [`Session::recompress`] or schedule a job.
    pub fn set_config(&mut self, config: CompressionConfig) -> Result<()> {
        let checked = config.validate().map(|()| {
            debug!(mode = config.mode_name(), "compression config updated");
            self.compression = config;
        });
        self.settle(checked)
    }

    // -- Intake ---------------------------------------------------------------

    /// Add user-selected files. One usable file opens the single-item view;
    /// two or more replace the batch.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn add_files(&mut self, files: Vec<SourceFile>) -> Result<Intake> {
        if files.is_empty() {
            return Ok(Intake::Empty {
                skipped: 0,
                last_rejection: None,
            });
        }

        match self.batch.add_items(files).await {
            Intake::Single(file) => {
                self.open_single(file.clone()).await?;
                Ok(Intake::Single(file))
            }
            Intake::Empty {
                skipped,
                last_rejection,
            } => {
                let err = last_rejection.unwrap_or_else(|| {
                    BildwerkError::UnsupportedFormat(format!(
                        "none of the {skipped} selected files can be used"
                    ))
                });
                self.settle(Err(err))
            }
            intake @ Intake::Batch { .. } => {
                if let Some(id) = self.selection.item_id() {
                    if self.batch.get(id).is_none() {
                        self.selection.clear(self.batch.previews_mut());
                        self.generation.next();
                    }
                }
                self.settle(Ok(intake))
            }
        }
    }

    /// Show `file` in the single-item view and compress it with freshly
    /// reset settings.
    #[instrument(skip(self, file), fields(name = file.name(), size = file.size()))]
    pub async fn open_single(&mut self, file: SourceFile) -> Result<CompressionResult> {
        let opened = self.open_single_inner(file).await;
        self.settle(opened)
    }

    async fn open_single_inner(&mut self, file: SourceFile) -> Result<CompressionResult> {
        let raster = self.normalizer.decode(&file).await?;
        let dimensions = raster.dimensions();
        let size = file.size();

        let previews = self.batch.previews_mut();
        let preview = previews.allocate(file.shared_bytes());
        self.selection
            .replace(previews, None, file, dimensions, Some(preview));
        self.compression = self.compression.reset_for(size, dimensions);
        info!(dimensions = %dimensions, mode = self.compression.mode_name(), "single image opened");

        self.recompress_inner(Some(raster)).await
    }

    // -- Recompression --------------------------------------------------------

    /// Compress the active image with the current settings and make the
    /// result current.
    pub async fn recompress(&mut self) -> Result<CompressionResult> {
        let outcome = self.recompress_inner(None).await;
        self.settle(outcome)
    }

    /// `decoded` is a raster of the active source decoded in this same
    /// operation, if the caller already has one.
    async fn recompress_inner(
        &mut self,
        decoded: Option<DecodedRaster>,
    ) -> Result<CompressionResult> {
        let job = self.build_job()?;
        let outcome = match decoded {
            Some(raster) => job.run_on(raster).await,
            None => job.run().await,
        };
        let result = outcome.result?;
        self.install_result(result.clone());
        Ok(result)
    }

    /// Snapshot the active source and settings into a job that can run
    /// without borrowing the session. Supersedes every earlier job.
    pub fn prepare_recompression(&mut self) -> Result<RecompressJob> {
        let job = self.build_job();
        self.settle(job)
    }

    fn build_job(&mut self) -> Result<RecompressJob> {
        self.compression.validate()?;
        let source = self
            .selection
            .source()
            .cloned()
            .ok_or(BildwerkError::NothingSelected)?;
        Ok(RecompressJob {
            token: self.generation.next(),
            source,
            normalizer: Arc::clone(&self.normalizer),
            config: self.compression,
            engine: self.engine,
        })
    }

    /// Apply a finished job if nothing newer has been requested since.
    pub fn apply_recompression(&mut self, outcome: RecompressOutcome) -> Result<Applied> {
        if !self.generation.is_current(outcome.token) {
            warn!(token = outcome.token.value(), "dropping stale recompression result");
            return Ok(Applied::Stale);
        }
        let applied = outcome.result.map(|result| {
            self.install_result(result.clone());
            Applied::Current(result)
        });
        self.settle(applied)
    }

    fn install_result(&mut self, result: CompressionResult) {
        debug!(size = result.size(), quality = result.quality, "result installed");
        self.selection
            .replace_result(self.batch.previews_mut(), Some(result));
    }

    // -- Single-item view -----------------------------------------------------

    pub fn selection(&self) -> &ActiveSelection {
        &self.selection
    }

    pub fn current_result(&self) -> Option<&CompressionResult> {
        self.selection.result()
    }

    /// Clear the single-item view.
    pub fn delete_current(&mut self) {
        let released = self.selection.clear(self.batch.previews_mut());
        self.generation.next();
        self.error = None;
        debug!(released, "single-item view cleared");
    }

    /// `{base}-compressed.jpg` for the active result.
    pub fn download_current(&mut self) -> Result<Download> {
        let download = match (self.selection.source(), self.selection.result()) {
            (Some(source), Some(result)) => Ok(Download {
                file_name: compressed_file_name(source.name()),
                bytes: result.bytes.clone(),
            }),
            _ => Err(BildwerkError::NothingSelected),
        };
        self.settle(download)
    }

    // -- Batch ----------------------------------------------------------------

    pub fn batch(&self) -> &BatchCoordinator {
        &self.batch
    }

    /// Show a batch item in the single-item view.
    #[instrument(skip(self), fields(item = %id))]
    pub async fn select_item(&mut self, id: ItemId) -> Result<()> {
        let selected = self.select_item_inner(id).await;
        self.settle(selected)
    }

    async fn select_item_inner(&mut self, id: ItemId) -> Result<()> {
        let item = self.batch.get(id).ok_or(BildwerkError::ItemNotFound(id))?;
        let source = item.source().clone();
        let result = item.result().cloned();

        let raster = self.normalizer.decode(&source).await?;
        let dimensions = raster.dimensions();
        let size = source.size();

        let previews = self.batch.previews_mut();
        self.selection
            .replace(previews, Some(id), source, dimensions, None);
        self.selection.replace_result(previews, result);
        self.compression = self.compression.reset_for(size, dimensions);
        self.generation.next();
        Ok(())
    }

    pub async fn compress_item(&mut self, id: ItemId) -> Result<CompressionResult> {
        let compressed = self.batch.compress_item(id, &self.compression).await;
        self.sync_selection(id);
        self.settle(compressed)
    }

    /// Compress every pending item. Per-item failures are reported, and the
    /// last one is shown in the error slot.
    pub async fn compress_all(&mut self) -> CompressAllReport {
        let report = self.batch.compress_all(&self.compression).await;
        if let Some(id) = self.selection.item_id() {
            self.sync_selection(id);
        }
        self.error = report.failed.last().map(|(_, err)| humanize_error(err));
        report
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<BatchItem> {
        let was_active = self.selection.is_item(id);
        let removed = self.batch.remove_item(id, &mut self.selection);
        if was_active {
            self.generation.next();
        }
        self.settle(removed)
    }

    /// Empty the batch and the single-item view.
    pub fn clear_all(&mut self) -> usize {
        let released = self.batch.clear_all(&mut self.selection);
        self.generation.next();
        self.error = None;
        released
    }

    pub async fn export_all(&mut self) -> Result<ExportBundle> {
        let exported = self.batch.export_all().await;
        self.settle(exported)
    }

    pub fn download_item(&mut self, id: ItemId) -> Result<Download> {
        let download = self.batch.download_item(id);
        self.settle(download)
    }

    /// Mirror a batch item's result into the selection when it is the
    /// active one. Supersedes any in-flight recompression of it.
    fn sync_selection(&mut self, id: ItemId) {
        if !self.selection.is_item(id) {
            return;
        }
        let result = self.batch.get(id).and_then(BatchItem::result).cloned();
        self.selection
            .replace_result(self.batch.previews_mut(), result);
        self.generation.next();
    }

    // -- ID photo -------------------------------------------------------------

    /// Load a photo for ID-photo cropping and render it at `spec`.
    #[instrument(skip(self, file), fields(name = file.name()))]
    pub async fn open_id_photo(&mut self, file: SourceFile, spec: IdPhotoSpec) -> Result<IdPhoto> {
        let opened = self.open_id_photo_inner(file, spec).await;
        self.settle(opened)
    }

    async fn open_id_photo_inner(&mut self, file: SourceFile, spec: IdPhotoSpec) -> Result<IdPhoto> {
        spec.validate()?;
        let raster = self.normalizer.decode(&file).await?;
        self.release_id_photo();
        self.id_photo.source = Some(file);
        self.id_photo.spec = spec;
        self.render_id_photo(raster).await
    }

    /// Change the target size. Re-renders when a photo is loaded.
    pub async fn set_id_photo_spec(&mut self, spec: IdPhotoSpec) -> Result<Option<IdPhoto>> {
        let updated = match spec.validate() {
            Err(err) => Err(err),
            Ok(_) => {
                self.id_photo.spec = spec;
                if self.id_photo.source.is_some() {
                    self.compose_inner().await.map(Some)
                } else {
                    Ok(None)
                }
            }
        };
        self.settle(updated)
    }

    pub async fn compose_id_photo(&mut self) -> Result<IdPhoto> {
        let composed = self.compose_inner().await;
        self.settle(composed)
    }

    async fn compose_inner(&mut self) -> Result<IdPhoto> {
        let source = self
            .id_photo
            .source
            .clone()
            .ok_or(BildwerkError::NothingSelected)?;
        let raster = self.normalizer.decode(&source).await?;
        self.render_id_photo(raster).await
    }

    async fn render_id_photo(&mut self, raster: DecodedRaster) -> Result<IdPhoto> {
        let image = raster.shared_image();
        let spec = self.id_photo.spec;
        let compositor = self.compositor;

        let photo = tokio::task::spawn_blocking(move || compositor.compose(&image, &spec))
            .await
            .map_err(|err| BildwerkError::EncodeError(format!("composition task failed: {err}")))??;

        let previews = self.batch.previews_mut();
        if let Some(old) = self.id_photo.preview.take() {
            previews.release(old);
        }
        self.id_photo.preview = Some(previews.allocate(photo.bytes.clone()));
        self.id_photo.photo = Some(photo.clone());
        Ok(photo)
    }

    pub fn id_photo(&self) -> Option<&IdPhoto> {
        self.id_photo.photo.as_ref()
    }

    pub fn id_photo_spec(&self) -> IdPhotoSpec {
        self.id_photo.spec
    }

    pub fn id_photo_preview(&self) -> Option<&PreviewHandle> {
        self.id_photo.preview.as_ref()
    }

    /// `{base}-{w}x{h}.jpg` for the rendered ID photo.
    pub fn download_id_photo(&mut self) -> Result<Download> {
        let download = match (&self.id_photo.source, &self.id_photo.photo) {
            (Some(source), Some(photo)) => Ok(Download {
                file_name: id_photo_file_name(source.name(), photo.dimensions),
                bytes: photo.bytes.clone(),
            }),
            _ => Err(BildwerkError::NothingSelected),
        };
        self.settle(download)
    }

    /// Drop the loaded ID photo and its preview.
    pub fn clear_id_photo(&mut self) {
        self.release_id_photo();
        self.id_photo.source = None;
    }

    fn release_id_photo(&mut self) {
        if let Some(handle) = self.id_photo.preview.take() {
            self.batch.previews_mut().release(handle);
        }
        self.id_photo.photo = None;
    }

    // -- Previews -------------------------------------------------------------

    pub fn previews(&self) -> &PreviewStore {
        self.batch.previews()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("compression", &self.compression)
            .field("batch", &self.batch)
            .field("selection", &self.selection.item_id())
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bildwerk_bridge::{ArchiveEntry, Archiver, FormatConverter};
    use bildwerk_core::human_errors::Severity;
    use bildwerk_core::types::{Dimensions, ItemStatus};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noisy_png(name: &str, width: u32, height: u32) -> SourceFile {
        let mut state: u32 = width.wrapping_mul(31) ^ height;
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let v = state.to_be_bytes();
            Rgb([v[0], v[1], v[2]])
        }));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        SourceFile::new(name, "image/png", bytes)
    }

    struct NullArchiver;

    #[async_trait]
    impl Archiver for NullArchiver {
        async fn archive(&self, entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
            Ok(entries.into_iter().flat_map(|e| e.bytes).collect())
        }
    }

    fn session() -> Session {
        Session::new(
            EngineConfig::default(),
            Collaborators::none().with_archiver(Arc::new(NullArchiver)),
        )
    }

    // -- Single-item flow -----------------------------------------------------

    #[tokio::test]
    async fn single_file_opens_and_compresses() {
        let mut s = session();
        let intake = s
            .add_files(vec![noisy_png("beach.png", 40, 30)])
            .await
            .expect("add");
        assert!(matches!(intake, Intake::Single(_)));
        assert!(s.batch().is_empty());

        let result = s.current_result().expect("result");
        assert_eq!(result.dimensions, Dimensions::new(40, 30));
        assert_eq!(result.quality, 1.0);
        assert!(s.last_error().is_none());

        let download = s.download_current().expect("download");
        assert_eq!(download.file_name, "beach-compressed.jpg");
    }

    #[tokio::test]
    async fn opening_resets_active_mode_values() {
        let mut s = session();
        s.set_config(CompressionConfig::PixelBounds {
            max_width: 10,
            max_height: 10,
        })
        .expect("config");
        s.open_single(noisy_png("a.png", 64, 48)).await.expect("open");

        assert_eq!(
            *s.compression_config(),
            CompressionConfig::PixelBounds {
                max_width: 64,
                max_height: 48
            }
        );
        assert_eq!(
            s.current_result().expect("result").dimensions,
            Dimensions::new(64, 48)
        );
    }

    #[tokio::test]
    async fn target_size_recompression_fits() {
        let mut s = session();
        s.open_single(noisy_png("noise.png", 128, 128)).await.expect("open");
        let full = s.current_result().expect("result").size();

        let kb = (full as f64 / 2.0 / 1024.0).floor().max(1.0);
        s.set_config(CompressionConfig::TargetSize { kb }).expect("config");
        let result = s.recompress().await.expect("recompress");
        assert!(result.size() <= (kb * 1024.0) as u64);
        assert!(result.quality < 1.0);
    }

    #[tokio::test]
    async fn stale_recompression_is_not_applied() {
        let mut s = session();
        s.open_single(noisy_png("race.png", 48, 48)).await.expect("open");

        s.set_config(CompressionConfig::Quality { percent: 10.0 }).expect("config");
        let older = s.prepare_recompression().expect("job");
        s.set_config(CompressionConfig::Quality { percent: 90.0 }).expect("config");
        let newer = s.prepare_recompression().expect("job");
        assert!(newer.token() > older.token());

        let newer_done = newer.run().await;
        let older_done = older.run().await;

        let applied = s.apply_recompression(newer_done).expect("apply");
        assert!(!applied.is_stale());
        let applied = s.apply_recompression(older_done).expect("apply");
        assert!(applied.is_stale());

        assert_eq!(s.current_result().expect("result").quality, 0.9);
    }

    #[tokio::test]
    async fn previews_are_released_when_superseded() {
        let mut s = session();
        s.open_single(noisy_png("a.png", 8, 8)).await.expect("open");
        s.recompress().await.expect("recompress");
        s.open_single(noisy_png("b.png", 9, 9)).await.expect("open");
        // One source preview and one result preview.
        assert_eq!(s.previews().live_count(), 2);

        s.delete_current();
        assert_eq!(s.previews().live_count(), 0);
        assert!(s.selection().is_empty());
        assert!(matches!(s.download_current(), Err(BildwerkError::NothingSelected)));
    }

    // -- Decoding -------------------------------------------------------------

    /// Turns any HEIC into a fixed PNG and counts how often it is asked to.
    struct CountingConverter {
        png: Vec<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FormatConverter for CountingConverter {
        async fn convert(&self, _: &[u8], _: &str, _: f32) -> Result<Vec<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.png.clone()])
        }
    }

    fn heic_session(cache_rasters: bool) -> (Session, Arc<CountingConverter>) {
        let converter = Arc::new(CountingConverter {
            png: noisy_png("decoded.png", 24, 18).bytes().to_vec(),
            calls: AtomicUsize::new(0),
        });
        let config = EngineConfig {
            cache_rasters,
            ..EngineConfig::default()
        };
        let session = Session::new(
            config,
            Collaborators::none().with_converter(converter.clone()),
        );
        (session, converter)
    }

    fn heic(name: &str) -> SourceFile {
        SourceFile::new(name, "image/heic", vec![3u8; 64])
    }

    #[tokio::test]
    async fn recompression_decodes_the_source_again() {
        let (mut s, converter) = heic_session(false);
        s.open_single(heic("IMG_10.HEIC")).await.expect("open");
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);

        s.set_config(CompressionConfig::Quality { percent: 40.0 })
            .expect("config");
        let result = s.recompress().await.expect("recompress");
        assert_eq!(result.dimensions, Dimensions::new(24, 18));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cached_rasters_skip_the_second_decode() {
        let (mut s, converter) = heic_session(true);
        s.open_single(heic("IMG_11.HEIC")).await.expect("open");
        s.recompress().await.expect("recompress");
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn id_photo_respec_decodes_the_source_again() {
        let (mut s, converter) = heic_session(false);
        s.open_id_photo(heic("IMG_12.HEIC"), IdPhotoSpec::default())
            .await
            .expect("open");
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);

        s.compose_id_photo().await.expect("compose");
        assert_eq!(converter.calls.load(Ordering::SeqCst), 2);
    }

    // -- Error slot -----------------------------------------------------------

    #[tokio::test]
    async fn oversized_file_fills_the_error_slot() {
        let mut s = session();
        let huge = SourceFile::new("huge.bmp", "image/bmp", vec![0u8; 25 * 1024 * 1024]);
        let err = s.add_files(vec![huge]).await.err().expect("fail");
        assert!(matches!(err, BildwerkError::OversizedInput { .. }));

        let shown = s.last_error().expect("slot filled");
        assert_eq!(shown.severity, Severity::Permanent);
        assert!(shown.suggestion.contains("20 MB"));

        s.clear_error();
        assert!(s.last_error().is_none());
    }

    #[tokio::test]
    async fn all_rejected_files_report_the_last_reason() {
        let mut s = session();
        let files = (0..2)
            .map(|i| {
                SourceFile::new(
                    format!("huge{i}.jpg"),
                    "image/jpeg",
                    vec![0u8; 21 * 1024 * 1024],
                )
            })
            .collect();
        let err = s.add_files(files).await.err().expect("fail");
        assert!(matches!(err, BildwerkError::OversizedInput { .. }));
        assert!(s.last_error().is_some());
        assert!(s.batch().is_empty());
    }

    #[tokio::test]
    async fn heic_without_converter_is_reported() {
        let mut s = session();
        let heic = SourceFile::new("IMG_1.HEIC", "image/heic", vec![0u8; 128]);
        let err = s.open_single(heic).await.err().expect("fail");
        assert!(matches!(err, BildwerkError::ConversionUnavailable));
        assert!(s.last_error().is_some());
        assert!(s.selection().is_empty());
    }

    #[tokio::test]
    async fn success_clears_the_previous_error() {
        let mut s = session();
        assert!(s.set_config(CompressionConfig::TargetSize { kb: -1.0 }).is_err());
        assert!(s.last_error().is_some());
        // The rejected config was not stored.
        assert_eq!(*s.compression_config(), CompressionConfig::default());

        s.open_single(noisy_png("ok.png", 8, 8)).await.expect("open");
        assert!(s.last_error().is_none());
    }

    #[tokio::test]
    async fn recompress_without_selection_fails() {
        let mut s = session();
        let err = s.recompress().await.err().expect("fail");
        assert!(matches!(err, BildwerkError::NothingSelected));
    }

    // -- Batch flow -----------------------------------------------------------

    async fn batch_session(count: usize) -> (Session, Vec<ItemId>) {
        let mut s = session();
        let files = (0..count)
            .map(|i| noisy_png(&format!("p{i}.png"), 20, 10 + i as u32))
            .collect();
        s.add_files(files).await.expect("add");
        let ids = s.batch().items().iter().map(BatchItem::id).collect();
        (s, ids)
    }

    #[tokio::test]
    async fn selecting_a_compressed_item_shows_its_result() {
        let (mut s, ids) = batch_session(3).await;
        s.set_config(CompressionConfig::Quality { percent: 60.0 }).expect("config");
        let compressed = s.compress_item(ids[1]).await.expect("compress");

        s.select_item(ids[1]).await.expect("select");
        assert!(s.selection().is_item(ids[1]));
        assert_eq!(
            s.current_result().expect("result").size(),
            compressed.size()
        );
        // Values reset for the item, mode kept.
        assert_eq!(
            *s.compression_config(),
            CompressionConfig::Quality { percent: 100.0 }
        );
    }

    #[tokio::test]
    async fn compressing_the_active_item_updates_the_view() {
        let (mut s, ids) = batch_session(2).await;
        s.select_item(ids[0]).await.expect("select");
        assert!(s.current_result().is_none());

        s.compress_item(ids[0]).await.expect("compress");
        assert!(s.current_result().is_some());
        assert_eq!(
            s.batch().get(ids[0]).expect("item").status(),
            ItemStatus::Compressed
        );
    }

    #[tokio::test]
    async fn removing_the_active_item_clears_the_view() {
        let (mut s, ids) = batch_session(3).await;
        s.select_item(ids[2]).await.expect("select");
        let removed = s.remove_item(ids[2]).expect("remove");
        assert_eq!(removed.status(), ItemStatus::Removed);
        assert!(s.selection().is_empty());
        assert_eq!(s.batch().len(), 2);

        let err = s.remove_item(ids[2]).err().expect("gone");
        assert!(matches!(err, BildwerkError::ItemNotFound(_)));
        assert!(s.last_error().is_some());
    }

    #[tokio::test]
    async fn compress_all_then_export() {
        let (mut s, _) = batch_session(3).await;
        let report = s.compress_all().await;
        assert_eq!(report.compressed.len(), 3);
        assert!(s.batch().can_export());

        let bundle = s.export_all().await.expect("export");
        assert_eq!(bundle.download.file_name, "compressed-images.zip");
        assert_eq!(bundle.entries.len(), 3);
    }

    #[tokio::test]
    async fn failed_items_fill_the_error_slot_until_a_clean_pass() {
        let (mut s, ids) = batch_session(3).await;
        s.compression = CompressionConfig::PixelBounds {
            max_width: 0,
            max_height: 10,
        };
        let report = s.compress_all().await;
        assert_eq!(report.failed.len(), 3);
        assert!(report.compressed.is_empty());
        assert!(s.last_error().is_some());
        assert!(ids.iter().all(|id| {
            s.batch().get(*id).is_some_and(|item| item.status() == ItemStatus::Pending)
        }));

        s.set_config(CompressionConfig::Quality { percent: 80.0 })
            .expect("config");
        let report = s.compress_all().await;
        assert!(report.is_complete());
        assert_eq!(report.compressed.len(), 3);
        assert!(s.last_error().is_none());
    }

    #[tokio::test]
    async fn export_without_archiver_reports_it() {
        let mut s = Session::new(EngineConfig::default(), Collaborators::none());
        let err = s.export_all().await.err().expect("fail");
        assert!(matches!(err, BildwerkError::ArchiverUnavailable));
    }

    #[tokio::test]
    async fn clear_all_releases_everything() {
        let (mut s, ids) = batch_session(4).await;
        s.select_item(ids[0]).await.expect("select");
        s.compress_item(ids[0]).await.expect("compress");

        assert_eq!(s.clear_all(), 4);
        assert!(s.batch().is_empty());
        assert!(s.selection().is_empty());
        assert_eq!(s.previews().live_count(), 0);
    }

    // -- ID photo flow --------------------------------------------------------

    #[tokio::test]
    async fn id_photo_flow_produces_named_download() {
        let mut s = session();
        let spec = IdPhotoSpec::Custom {
            width: 400,
            height: 600,
        };
        let photo = s
            .open_id_photo(noisy_png("portrait.jpeg", 80, 40), spec)
            .await
            .expect("compose");
        assert_eq!(photo.dimensions, Dimensions::new(400, 600));

        let download = s.download_id_photo().expect("download");
        assert_eq!(download.file_name, "portrait-400x600.jpg");

        let resized = s
            .set_id_photo_spec(IdPhotoSpec::default())
            .await
            .expect("respec")
            .expect("photo loaded");
        assert_eq!(resized.dimensions, Dimensions::new(295, 413));
        assert_eq!(s.previews().live_count(), 1);

        s.clear_id_photo();
        assert_eq!(s.previews().live_count(), 0);
        assert!(s.download_id_photo().is_err());
    }

    #[tokio::test]
    async fn oversized_id_photo_canvas_is_reported_not_fatal() {
        let mut s = session();
        s.open_id_photo(noisy_png("face.png", 10, 10), IdPhotoSpec::default())
            .await
            .expect("open");

        let err = s
            .set_id_photo_spec(IdPhotoSpec::Custom {
                width: 70_000,
                height: 1,
            })
            .await
            .err()
            .expect("fail");
        assert!(matches!(err, BildwerkError::EncodeError(_)));
        assert!(s.last_error().is_some());
        // The earlier render is still the one on show.
        let photo = s.id_photo().expect("previous photo");
        assert_eq!(photo.dimensions, Dimensions::new(295, 413));
    }

    #[tokio::test]
    async fn id_photo_spec_without_photo_is_stored() {
        let mut s = session();
        let spec = IdPhotoSpec::Custom {
            width: 100,
            height: 120,
        };
        assert!(s.set_id_photo_spec(spec).await.expect("store").is_none());
        assert_eq!(s.id_photo_spec(), spec);

        let err = s
            .set_id_photo_spec(IdPhotoSpec::Custom { width: 0, height: 1 })
            .await
            .err()
            .expect("fail");
        assert!(matches!(err, BildwerkError::InvalidConfig(_)));
        assert_eq!(s.id_photo_spec(), spec);
    }
}
