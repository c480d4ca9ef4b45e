//! Working directories for uploads, generated images and temporary files

use std::fs;
use std::path::{Path, PathBuf};

use invitation_common::{Error, Result};
use tracing::{debug, warn};

/// Directory layout used by the pipeline
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Uploaded (and updated) spreadsheets
    pub uploads_dir: PathBuf,

    /// One sub-directory of invitation images per run
    pub images_dir: PathBuf,

    /// Scratch space for images being written
    pub temp_dir: PathBuf,

    /// Background image every invitation is drawn on
    pub template_path: PathBuf,
}

/// Reject anything that is not a single plain file name
pub fn validate_file_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(Error::MalformedInput(format!("Invalid file name: {:?}", name)));
    }
    Ok(())
}

/// Make a guest-supplied name safe to use inside a file name
pub fn sanitize_file_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            c => c,
        })
        .collect()
}

impl FileStore {
    pub fn new(
        uploads_dir: impl Into<PathBuf>,
        images_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        template_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            images_dir: images_dir.into(),
            temp_dir: temp_dir.into(),
            template_path: template_path.into(),
        }
    }

    /// Create the working directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.uploads_dir, &self.images_dir, &self.temp_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                Error::Processing(format!("Failed to create directory {}: {}", dir.display(), e))
            })?;
        }

        if !self.template_path.exists() {
            warn!("Template asset does not exist: {}", self.template_path.display());
        }
        Ok(())
    }

    /// `<invitation_name>_<run_id>.xlsx`
    pub fn spreadsheet_name(invitation_name: &str, run_id: &str) -> String {
        format!("{}_{}.xlsx", invitation_name, run_id)
    }

    pub fn spreadsheet_path(&self, invitation_name: &str, run_id: &str) -> PathBuf {
        self.uploads_dir
            .join(Self::spreadsheet_name(invitation_name, run_id))
    }

    pub fn batch_dir(&self, run_id: &str) -> PathBuf {
        self.images_dir.join(run_id)
    }

    /// Temp path for one guest's image while it is being written
    pub fn temp_image_path(&self, run_id: &str, guest_id: &str) -> PathBuf {
        self.temp_dir.join(format!("{}_{}.png", run_id, guest_id))
    }

    /// Names of all stored spreadsheets
    pub fn list_spreadsheets(&self) -> Result<Vec<String>> {
        list_entries(&self.uploads_dir, |p| p.is_file())
    }

    /// Names of the image files in `dir`, sorted
    pub fn list_images(&self, dir: &Path) -> Result<Vec<String>> {
        list_entries(dir, |p| p.is_file())
    }

    pub fn read_spreadsheet(&self, name: &str) -> Result<Vec<u8>> {
        validate_file_name(name)?;
        read_existing(&self.uploads_dir.join(name), name)
    }

    pub fn read_image(&self, dir: &Path, name: &str) -> Result<Vec<u8>> {
        validate_file_name(name)?;
        read_existing(&dir.join(name), name)
    }

    /// Delete everything a run wrote: its spreadsheet, its image directory,
    /// and its temp files. Errors are logged, not returned.
    pub fn remove_run_artifacts(&self, run_id: &str, spreadsheet_path: &Path) {
        if spreadsheet_path.exists() {
            if let Err(e) = fs::remove_file(spreadsheet_path) {
                warn!("Failed to remove {}: {}", spreadsheet_path.display(), e);
            }
        }

        let batch_dir = self.batch_dir(run_id);
        if batch_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&batch_dir) {
                warn!("Failed to remove {}: {}", batch_dir.display(), e);
            }
        }

        let prefix = format!("{}_", run_id);
        if let Ok(entries) = fs::read_dir(&self.temp_dir) {
            for entry in entries.flatten() {
                let is_ours = entry
                    .file_name()
                    .to_str()
                    .map(|n| n.starts_with(&prefix))
                    .unwrap_or(false);
                if is_ours {
                    if let Err(e) = fs::remove_file(entry.path()) {
                        warn!("Failed to remove {}: {}", entry.path().display(), e);
                    }
                }
            }
        }

        debug!("Removed artifacts of run: {}", run_id);
    }
}

fn list_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("Folder not found: {}", dir.display())));
    }

    let mut names: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .filter(|entry| keep(&entry.path()))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

fn read_existing(path: &Path, name: &str) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("File not found: {}", name)));
    }
    Ok(fs::read(path)?)
}
