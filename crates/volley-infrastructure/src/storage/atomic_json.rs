//! Atomic JSON file writes.
//!
//! Output files are either the complete previous content or the complete new
//! content, never a half-written mix.

use serde::Serialize;
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use uuid::Uuid;
use volley_core::error::{Result, VolleyError};

/// A handle to a JSON file that is replaced atomically on save.
///
/// Provides:
/// - **Atomicity**: tmp file + atomic rename
/// - **Durability**: explicit fsync before rename
pub struct AtomicJsonFile {
    path: PathBuf,
}

impl AtomicJsonFile {
    /// Creates a new handle for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes `data` as pretty JSON (2-space indent) and replaces the file.
    ///
    /// Parent directories are created as needed.
    pub fn save<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let parent = self.parent_dir();
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(&parent)?;
        }

        let json = serde_json::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let write_result = (|| -> Result<()> {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(json.as_bytes())?;
            tmp_file.write_all(b"\n")?;
            tmp_file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        fs::rename(&tmp_path, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            VolleyError::io(format!(
                "failed to move results into {}: {err}",
                self.path.display()
            ))
        })
    }

    fn parent_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Temporary sibling path for atomic writes, unique per save so
    /// concurrent writers to one target never share a temp file.
    fn temp_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| VolleyError::io(format!("{} has no file name", self.path.display())))?;

        let tmp_name = format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            Uuid::new_v4().simple()
        );
        Ok(self.parent_dir().join(tmp_name))
    }
}
