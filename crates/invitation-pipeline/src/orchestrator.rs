//! Invitation batch orchestration
//!
//! One call to [`InvitationPipeline::run_invitation_batch`] takes an
//! uploaded guest list through
//! `uploaded → parsed → guests_registered → images_generating → completed`.
//! Any failure moves the batch to `failed`, rolls back its guests and
//! deletes every file the run wrote.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, RgbImage};
use invitation_common::{BatchRecord, Error, Guest, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::compositor::{display_name, load_template, Compositor};
use crate::encoder::{payload_for, CodeEncoder};
use crate::file_store::{sanitize_file_component, validate_file_name, FileStore};
use crate::registrar::GuestRegistrar;
use crate::spreadsheet;
use crate::storage::GuestStore;

/// Runtime limits for a batch
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on one whole run
    pub timeout: Duration,

    /// Images rendered concurrently
    pub render_workers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            render_workers: 4,
        }
    }
}

/// Result of a completed batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub run_id: String,

    /// File name of the updated spreadsheet
    pub spreadsheet_name: String,

    /// Updated spreadsheet with `event_name` and `id` columns
    pub spreadsheet: Vec<u8>,

    pub guest_count: usize,
}

/// Longest guest-name part of an image file name, in bytes
pub const MAX_FILE_NAME_BYTES: usize = 150;

/// Image file name for a guest: `<code>-<name>_<id>.png`
///
/// The name part is cut to [`MAX_FILE_NAME_BYTES`] so the whole name stays
/// under the usual 255-byte file system limit. The QR payload keeps the
/// full name.
pub fn image_file_name(guest: &Guest) -> String {
    let name = sanitize_file_component(&guest.name);
    format!(
        "{}.png",
        payload_for(guest.code, truncate_bytes(&name, MAX_FILE_NAME_BYTES), &guest.id)
    )
}

fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Invitation batch pipeline
pub struct InvitationPipeline {
    store: Arc<dyn GuestStore>,
    registrar: GuestRegistrar,
    files: FileStore,
    encoder: CodeEncoder,
    compositor: Arc<Compositor>,
    settings: PipelineSettings,
}

impl InvitationPipeline {
    pub fn new(
        store: Arc<dyn GuestStore>,
        files: FileStore,
        compositor: Compositor,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registrar: GuestRegistrar::new(store.clone()),
            store,
            files,
            encoder: CodeEncoder::new(),
            compositor: Arc::new(compositor),
            settings,
        }
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// Run one batch end to end and return the updated spreadsheet
    pub async fn run_invitation_batch(
        &self,
        file_bytes: &[u8],
        invitation_name: &str,
    ) -> Result<BatchOutcome> {
        let invitation_name = invitation_name.trim();
        validate_file_name(invitation_name)
            .map_err(|_| Error::MalformedInput(format!("Invalid invitation name: {:?}", invitation_name)))?;
        self.files.ensure_directories()?;

        let run_id = Uuid::new_v4().simple().to_string();
        let spreadsheet_path = self.files.spreadsheet_path(invitation_name, &run_id);
        let images_dir = self.files.batch_dir(&run_id);
        let mut batch = BatchRecord::new(
            run_id.clone(),
            invitation_name.to_string(),
            spreadsheet_path.to_string_lossy().to_string(),
            images_dir.to_string_lossy().to_string(),
        );

        info!("Starting batch {} for invitation '{}'", run_id, invitation_name);

        let result =
            match tokio::time::timeout(self.settings.timeout, self.process(&mut batch, file_bytes))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Processing(format!(
                    "Batch timed out after {}s",
                    self.settings.timeout.as_secs_f64()
                ))),
            };

        if let Err(e) = result {
            let e = e.into_pipeline_error();
            self.fail(&mut batch, &e).await;
            return Err(e);
        }

        let spreadsheet = match fs::read(&spreadsheet_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let e = Error::Processing(format!("Failed to read updated spreadsheet: {}", e));
                self.fail(&mut batch, &e).await;
                return Err(e);
            }
        };

        batch.mark_completed()?;
        if let Err(e) = self.store.save_batch(&batch).await {
            warn!("Failed to record completion of batch {}: {}", run_id, e);
        }

        info!("Batch {} completed with {} invitations", run_id, batch.guest_count);

        Ok(BatchOutcome {
            spreadsheet_name: FileStore::spreadsheet_name(invitation_name, &run_id),
            guest_count: batch.guest_count,
            run_id,
            spreadsheet,
        })
    }

    async fn process(&self, batch: &mut BatchRecord, file_bytes: &[u8]) -> Result<()> {
        let spreadsheet_path = PathBuf::from(&batch.spreadsheet_path);
        let images_dir = PathBuf::from(&batch.images_dir);

        fs::write(&spreadsheet_path, file_bytes)
            .map_err(|e| Error::Processing(format!("Failed to save upload: {}", e)))?;
        self.store.save_batch(batch).await?;

        let sheet = spreadsheet::read_sheet(file_bytes)?;
        let rows = sheet.guest_rows()?;
        batch.mark_parsed(rows.len())?;
        self.store.save_batch(batch).await?;
        debug!("Batch {} parsed {} rows", batch.run_id, rows.len());

        // template must load before any guest is written
        let template = Arc::new(load_template(&self.files.template_path)?);

        let guests = self
            .registrar
            .register(&batch.run_id, &rows, &batch.invitation_name)
            .await?;
        batch.mark_registered(guests.iter().map(|g| g.id.clone()).collect())?;
        self.store.save_batch(batch).await?;

        let updated = sheet
            .with_generated_columns(&batch.invitation_name, &batch.guest_ids)?
            .to_xlsx()?;
        fs::write(&spreadsheet_path, updated)
            .map_err(|e| Error::Processing(format!("Failed to save updated spreadsheet: {}", e)))?;

        batch.mark_generating()?;
        self.store.save_batch(batch).await?;

        let written = self
            .render_images(&batch.run_id, &images_dir, guests, template)
            .await?;
        if written != batch.guest_count {
            return Err(Error::Processing(format!(
                "Wrote {} invitations for {} guests",
                written, batch.guest_count
            )));
        }
        Ok(())
    }

    /// Render every guest's invitation on the blocking pool
    async fn render_images(
        &self,
        run_id: &str,
        images_dir: &Path,
        guests: Vec<Guest>,
        template: Arc<RgbImage>,
    ) -> Result<usize> {
        fs::create_dir_all(images_dir).map_err(|e| {
            Error::Processing(format!("Failed to create {}: {}", images_dir.display(), e))
        })?;

        let semaphore = Arc::new(Semaphore::new(self.settings.render_workers.max(1)));
        let cancel = CancelOnDrop::default();
        let mut tasks = JoinSet::new();

        for guest in guests {
            let job = RenderJob {
                payload: payload_for(guest.code, &guest.name, &guest.id),
                display_name: display_name(guest.code, &guest.name),
                temp_path: self.files.temp_image_path(run_id, &guest.id),
                output_path: images_dir.join(image_file_name(&guest)),
            };
            let semaphore = semaphore.clone();
            let encoder = self.encoder;
            let compositor = self.compositor.clone();
            let template = template.clone();
            let cancelled = cancel.flag();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Processing(format!("Render pool closed: {}", e)))?;
                tokio::task::spawn_blocking(move || {
                    job.run(&encoder, &compositor, &template, &cancelled)
                })
                .await
                .map_err(|e| Error::Processing(format!("Render task failed: {}", e)))?
            });
        }

        // Returning early drops the JoinSet, which aborts the rest
        let mut written = 0;
        while let Some(joined) = tasks.join_next().await {
            let path =
                joined.map_err(|e| Error::Processing(format!("Render task failed: {}", e)))??;
            debug!("Wrote {}", path.display());
            written += 1;
        }

        Ok(written)
    }

    async fn fail(&self, batch: &mut BatchRecord, err: &Error) {
        error!("Batch {} failed: {}", batch.run_id, err);

        if let Err(e) = self.registrar.rollback(&batch.run_id).await {
            error!("Failed to roll back guests of batch {}: {}", batch.run_id, e);
        }
        self.files
            .remove_run_artifacts(&batch.run_id, Path::new(&batch.spreadsheet_path));

        if batch.mark_failed(err.to_string()).is_ok() {
            if let Err(e) = self.store.save_batch(batch).await {
                warn!("Failed to record failure of batch {}: {}", batch.run_id, e);
            }
        }
    }

    pub async fn get_batch(&self, run_id: &str) -> Result<BatchRecord> {
        self.store
            .get_batch(run_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Batch not found: {}", run_id)))
    }

    pub async fn list_batches(&self) -> Result<Vec<BatchRecord>> {
        self.store.list_batches().await
    }

    /// File names of a batch's invitation images
    pub async fn get_batch_images(&self, run_id: &str) -> Result<Vec<String>> {
        let batch = self.get_batch(run_id).await?;
        self.files.list_images(Path::new(&batch.images_dir))
    }

    /// PNG bytes of one invitation image
    pub async fn get_image(&self, run_id: &str, image_name: &str) -> Result<Vec<u8>> {
        validate_file_name(image_name)?;
        let batch = self.get_batch(run_id).await?;
        self.files.read_image(Path::new(&batch.images_dir), image_name)
    }

    pub fn list_spreadsheets(&self) -> Result<Vec<String>> {
        self.files.list_spreadsheets()
    }

    pub fn get_spreadsheet(&self, name: &str) -> Result<Vec<u8>> {
        self.files.read_spreadsheet(name)
    }

    pub async fn get_guest(&self, guest_id: &str) -> Result<Guest> {
        self.store
            .get_guest(guest_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Guest not found: {}", guest_id)))
    }
}

/// Flag raised when the render loop is dropped, so blocking tasks that are
/// still running stop before touching the file system.
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Encode, compose and write one guest's invitation
struct RenderJob {
    payload: String,
    display_name: String,
    temp_path: PathBuf,
    output_path: PathBuf,
}

impl RenderJob {
    fn run(
        self,
        encoder: &CodeEncoder,
        compositor: &Compositor,
        template: &RgbImage,
        cancelled: &AtomicBool,
    ) -> Result<PathBuf> {
        let barcode = encoder.encode(&self.payload)?;
        let invitation = compositor.compose(template, &barcode, &self.display_name);

        if cancelled.load(Ordering::SeqCst) {
            return Err(Error::Processing("Batch cancelled".to_string()));
        }

        invitation
            .save_with_format(&self.temp_path, ImageFormat::Png)
            .map_err(|e| {
                Error::Processing(format!("Failed to write {}: {}", self.temp_path.display(), e))
            })?;

        let moved = if cancelled.load(Ordering::SeqCst) {
            Err(Error::Processing("Batch cancelled".to_string()))
        } else {
            move_file(&self.temp_path, &self.output_path)
        };
        if moved.is_err() {
            let _ = fs::remove_file(&self.temp_path);
        }
        moved.map(|_| self.output_path)
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // temp and image dirs may be on different file systems
    fs::copy(from, to)
        .and_then(|_| fs::remove_file(from))
        .map_err(|e| Error::Processing(format!("Failed to move {}: {}", from.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::tests::{small_layout, BlockRenderer};
    use crate::memory_store::MemoryGuestStore;
    use crate::spreadsheet::tests::{guest_list, workbook_bytes};
    use crate::spreadsheet::{read_sheet, Cell};
    use async_trait::async_trait;
    use invitation_common::BatchStatus;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        store: Arc<MemoryGuestStore>,
        pipeline: InvitationPipeline,
    }

    fn file_store(root: &Path) -> FileStore {
        FileStore::new(
            root.join("excel"),
            root.join("images"),
            root.join("temp"),
            root.join("asset.png"),
        )
    }

    fn harness_with(
        store: Arc<MemoryGuestStore>,
        pipeline_store: Arc<dyn GuestStore>,
        settings: PipelineSettings,
        with_template: bool,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let files = file_store(dir.path());
        if with_template {
            RgbImage::from_pixel(320, 400, image::Rgb([240, 230, 200]))
                .save(&files.template_path)
                .unwrap();
        }
        let compositor = Compositor::new(small_layout(), Arc::new(BlockRenderer::default()));
        let pipeline = InvitationPipeline::new(pipeline_store, files, compositor, settings);

        Harness {
            _dir: dir,
            store,
            pipeline,
        }
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryGuestStore::new());
        harness_with(store.clone(), store, PipelineSettings::default(), true)
    }

    fn image_count(h: &Harness) -> usize {
        let images = &h.pipeline.files().images_dir;
        if !images.exists() {
            return 0;
        }
        fs::read_dir(images)
            .unwrap()
            .flatten()
            .map(|run| fs::read_dir(run.path()).unwrap().count())
            .sum()
    }

    fn guest_id_from_file(name: &str) -> &str {
        name.trim_end_matches(".png").rsplit_once('_').unwrap().1
    }

    #[tokio::test]
    async fn test_batch_creates_one_guest_and_image_per_row() {
        let h = harness();
        let upload = guest_list(&[("Jane Doe", 4821), ("John Roe", 17), ("Ana Li", 4821)]);

        let outcome = h
            .pipeline
            .run_invitation_batch(&upload, "Summer Gala")
            .await
            .unwrap();

        assert_eq!(outcome.guest_count, 3);
        assert_eq!(
            outcome.spreadsheet_name,
            format!("Summer Gala_{}.xlsx", outcome.run_id)
        );
        assert_eq!(h.store.guest_count().await, 3);

        let images = h.pipeline.get_batch_images(&outcome.run_id).await.unwrap();
        assert_eq!(images.len(), 3);
        let ids: HashSet<&str> = images.iter().map(|n| guest_id_from_file(n)).collect();
        assert_eq!(ids.len(), 3);

        // every image resolves back to the guest it was drawn for
        for name in &images {
            let guest = h.pipeline.get_guest(guest_id_from_file(name)).await.unwrap();
            assert_eq!(name, &format!("{}-{}_{}.png", guest.code, guest.name, guest.id));
            assert_eq!(guest.event_name, "Summer Gala");
            assert_eq!(guest.run_id, outcome.run_id);
        }

        let batch = h.pipeline.get_batch(&outcome.run_id).await.unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.guest_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_returned_spreadsheet_carries_ids_in_row_order() {
        let h = harness();
        let upload = guest_list(&[("Jane Doe", 4821), ("John Roe", 17)]);

        let outcome = h
            .pipeline
            .run_invitation_batch(&upload, "Summer Gala")
            .await
            .unwrap();
        let sheet = read_sheet(&outcome.spreadsheet).unwrap();
        let batch = h.pipeline.get_batch(&outcome.run_id).await.unwrap();

        assert_eq!(sheet.headers, vec!["name", "code", "event_name", "id"]);
        for (row, id) in sheet.rows.iter().zip(&batch.guest_ids) {
            assert_eq!(row[2], Cell::Text("Summer Gala".to_string()));
            assert_eq!(row[3], Cell::Text(id.clone()));
        }
        let first = h.pipeline.get_guest(&batch.guest_ids[0]).await.unwrap();
        assert_eq!((first.name.as_str(), first.code), ("Jane Doe", 4821));

        // the stored copy is the updated one
        let stored = h.pipeline.get_spreadsheet(&outcome.spreadsheet_name).unwrap();
        assert_eq!(stored, outcome.spreadsheet);
    }

    #[tokio::test]
    async fn test_image_is_readable_png() {
        let h = harness();
        let outcome = h
            .pipeline
            .run_invitation_batch(&guest_list(&[("Jane Doe", 4821)]), "Gala")
            .await
            .unwrap();
        let images = h.pipeline.get_batch_images(&outcome.run_id).await.unwrap();

        let bytes = h.pipeline.get_image(&outcome.run_id, &images[0]).await.unwrap();
        let img = image::load_from_memory(&bytes).unwrap();

        assert_eq!((img.width(), img.height()), (320, 400));
    }

    #[tokio::test]
    async fn test_image_encodes_guest_payload() {
        let h = harness();
        let outcome = h
            .pipeline
            .run_invitation_batch(&guest_list(&[("Jane Doe", 4821)]), "Gala")
            .await
            .unwrap();
        let images = h.pipeline.get_batch_images(&outcome.run_id).await.unwrap();
        let guest = h
            .pipeline
            .get_guest(guest_id_from_file(&images[0]))
            .await
            .unwrap();
        let written = image::load_from_memory(
            &h.pipeline.get_image(&outcome.run_id, &images[0]).await.unwrap(),
        )
        .unwrap()
        .to_rgb8();

        let template = load_template(&h.pipeline.files().template_path).unwrap();
        let render = |payload: &str| {
            let barcode = h.pipeline.encoder.encode(payload).unwrap();
            h.pipeline
                .compositor
                .compose(&template, &barcode, &display_name(guest.code, &guest.name))
        };

        assert_eq!(written, render(&payload_for(guest.code, &guest.name, &guest.id)));
        assert_ne!(written, render(&payload_for(guest.code, &guest.name, "someone-else")));
    }

    #[tokio::test]
    async fn test_dotted_names_are_served() {
        let h = harness();
        let outcome = h
            .pipeline
            .run_invitation_batch(&guest_list(&[("John Smith Jr..", 7), ("A...B", 8)]), "Gala..2026")
            .await
            .unwrap();

        let images = h.pipeline.get_batch_images(&outcome.run_id).await.unwrap();
        assert_eq!(images.len(), 2);
        for name in &images {
            let bytes = h.pipeline.get_image(&outcome.run_id, name).await.unwrap();
            assert!(image::load_from_memory(&bytes).is_ok(), "{}", name);
        }
        assert!(h.pipeline.get_spreadsheet(&outcome.spreadsheet_name).is_ok());
    }

    #[tokio::test]
    async fn test_long_names_get_short_file_names() {
        let h = harness();
        let long = "Ødegård-Łukasiewicz ".repeat(12);
        let outcome = h
            .pipeline
            .run_invitation_batch(&guest_list(&[(long.as_str(), 4821)]), "Gala")
            .await
            .unwrap();

        let images = h.pipeline.get_batch_images(&outcome.run_id).await.unwrap();
        assert!(images[0].len() <= 255);
        assert!(h.pipeline.get_image(&outcome.run_id, &images[0]).await.is_ok());

        let guest = h
            .pipeline
            .get_guest(guest_id_from_file(&images[0]))
            .await
            .unwrap();
        assert_eq!(guest.name, long.trim());
    }

    #[test]
    fn test_image_file_name_cuts_on_char_boundary() {
        let row = invitation_common::GuestRow::new("é".repeat(100), 1);
        let guest = Guest::new("g-001".to_string(), &row, "Gala", "run");

        let name = image_file_name(&guest);

        let stem = name.strip_prefix("1-").unwrap().strip_suffix("_g-001.png").unwrap();
        assert_eq!(stem, "é".repeat(MAX_FILE_NAME_BYTES / 2));

        let row = invitation_common::GuestRow::new("AC/DC", 2);
        let guest = Guest::new("g-002".to_string(), &row, "Gala", "run");
        assert_eq!(image_file_name(&guest), "2-AC-DC_g-002.png");
    }

    #[tokio::test]
    async fn test_runs_with_same_name_do_not_collide() {
        let h = harness();
        let upload = guest_list(&[("Jane Doe", 4821)]);

        let first = h.pipeline.run_invitation_batch(&upload, "Gala").await.unwrap();
        let second = h.pipeline.run_invitation_batch(&upload, "Gala").await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_ne!(first.spreadsheet_name, second.spreadsheet_name);
        assert_eq!(h.pipeline.list_spreadsheets().unwrap().len(), 2);
        assert_eq!(h.pipeline.list_batches().await.unwrap().len(), 2);
        assert_eq!(image_count(&h), 2);
    }

    #[tokio::test]
    async fn test_missing_code_column_leaves_nothing_behind() {
        let h = harness();
        let upload = workbook_bytes(&["name", "table"], &[vec![
            Cell::Text("Jane Doe".to_string()),
            Cell::Number(1.0),
        ]]);

        let err = h
            .pipeline
            .run_invitation_batch(&upload, "Gala")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedInput(_)));
        assert_eq!(h.store.guest_count().await, 0);
        assert_eq!(image_count(&h), 0);
        assert!(h.pipeline.list_spreadsheets().unwrap().is_empty());

        let batches = h.pipeline.list_batches().await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].status, BatchStatus::Failed);
        assert!(batches[0].error.as_deref().unwrap().contains("code"));
    }

    #[tokio::test]
    async fn test_missing_template_fails_before_registration() {
        let store = Arc::new(MemoryGuestStore::new());
        let h = harness_with(store.clone(), store, PipelineSettings::default(), false);

        let err = h
            .pipeline
            .run_invitation_batch(&guest_list(&[("Jane Doe", 4821)]), "Gala")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Render(_)));
        assert_eq!(h.store.guest_count().await, 0);
        assert_eq!(image_count(&h), 0);
    }

    #[tokio::test]
    async fn test_render_failure_rolls_back_guests_and_files() {
        let h = harness();
        // too long for any QR symbol
        let huge = "x".repeat(3000);
        let upload = guest_list(&[("Jane Doe", 4821), (huge.as_str(), 1)]);

        let err = h
            .pipeline
            .run_invitation_batch(&upload, "Gala")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Processing(_)));
        assert_eq!(h.store.guest_count().await, 0);
        assert_eq!(image_count(&h), 0);
        assert!(h.pipeline.list_spreadsheets().unwrap().is_empty());

        let batches = h.pipeline.list_batches().await.unwrap();
        let batch = &batches[0];
        assert_eq!(batch.status, BatchStatus::Failed);
        assert!(batch.guest_ids.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_batch() {
        let store = Arc::new(MemoryGuestStore::new());
        let settings = PipelineSettings {
            timeout: Duration::ZERO,
            render_workers: 1,
        };
        let h = harness_with(store.clone(), store, settings, true);

        let err = h
            .pipeline
            .run_invitation_batch(&guest_list(&[("Jane Doe", 4821), ("John Roe", 17)]), "Gala")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert_eq!(h.store.guest_count().await, 0);
        let batches = h.pipeline.list_batches().await.unwrap();
        let batch = &batches[0];
        assert_eq!(batch.status, BatchStatus::Failed);
    }

    #[tokio::test]
    async fn test_empty_guest_list_completes() {
        let h = harness();
        let outcome = h
            .pipeline
            .run_invitation_batch(&guest_list(&[]), "Gala")
            .await
            .unwrap();

        assert_eq!(outcome.guest_count, 0);
        assert!(h.pipeline.get_batch_images(&outcome.run_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_invitation_name() {
        let h = harness();
        let upload = guest_list(&[("Jane Doe", 4821)]);

        for name in ["", "   ", "../escape", "a/b"] {
            let err = h.pipeline.run_invitation_batch(&upload, name).await.unwrap_err();
            assert!(matches!(err, Error::MalformedInput(_)), "{:?}", name);
        }
        assert!(h.pipeline.list_batches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_errors() {
        let h = harness();
        let outcome = h
            .pipeline
            .run_invitation_batch(&guest_list(&[("Jane Doe", 4821)]), "Gala")
            .await
            .unwrap();

        assert!(matches!(
            h.pipeline.get_batch_images("unknown").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            h.pipeline.get_image(&outcome.run_id, "../secret.png").await,
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            h.pipeline.get_image(&outcome.run_id, "missing.png").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            h.pipeline.get_guest("nobody").await,
            Err(Error::NotFound(_))
        ));
    }

    /// Store whose batch writes always fail
    struct FailingStore(Arc<MemoryGuestStore>);

    #[async_trait]
    impl GuestStore for FailingStore {
        async fn create_guests(&self, _run_id: &str, _guests: &[Guest]) -> Result<()> {
            Err(Error::Persistence("connection reset".to_string()))
        }
        async fn delete_batch_guests(&self, run_id: &str) -> Result<usize> {
            self.0.delete_batch_guests(run_id).await
        }
        async fn get_guest(&self, guest_id: &str) -> Result<Option<Guest>> {
            self.0.get_guest(guest_id).await
        }
        async fn list_batch_guests(&self, run_id: &str) -> Result<Vec<Guest>> {
            self.0.list_batch_guests(run_id).await
        }
        async fn save_batch(&self, batch: &BatchRecord) -> Result<()> {
            self.0.save_batch(batch).await
        }
        async fn get_batch(&self, run_id: &str) -> Result<Option<BatchRecord>> {
            self.0.get_batch(run_id).await
        }
        async fn list_batches(&self) -> Result<Vec<BatchRecord>> {
            self.0.list_batches().await
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported() {
        let store = Arc::new(MemoryGuestStore::new());
        let failing = Arc::new(FailingStore(store.clone()));
        let h = harness_with(store, failing, PipelineSettings::default(), true);

        let err = h
            .pipeline
            .run_invitation_batch(&guest_list(&[("Jane Doe", 4821)]), "Gala")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(h.store.guest_count().await, 0);
        assert_eq!(image_count(&h), 0);
        assert_eq!(
            h.pipeline.list_batches().await.unwrap()[0].status,
            BatchStatus::Failed
        );
    }
}
