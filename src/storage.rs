use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;
use uuid::Uuid;

use crate::utils::{ensure_dirs_exist, sanitize_file_name};

pub const DEFAULT_RESULTS_KEEP: usize = 100;

/// The raw upload and rendered output directories.
///
/// Every write gets a fresh name, so concurrent requests never see each
/// other's files. Only the newest `results_keep` outputs are retained.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    results_dir: PathBuf,
    results_keep: usize,
}

impl Storage {
    pub async fn open(upload_dir: &Path, results_dir: &Path) -> std::io::Result<Self> {
        ensure_dirs_exist(&[upload_dir, results_dir]).await?;
        Ok(Storage {
            upload_dir: upload_dir.to_path_buf(),
            results_dir: results_dir.to_path_buf(),
            results_keep: DEFAULT_RESULTS_KEEP,
        })
    }

    /// Caps the results directory at `keep` files, counting the newest one.
    pub fn with_results_keep(mut self, keep: usize) -> Self {
        self.results_keep = keep.max(1);
        self
    }

    pub async fn save_upload(&self, file_name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        let name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.upload_dir.join(name);
        fs::write(&path, data).await?;
        Ok(path)
    }

    /// Stores a rendered image and returns the name it is served under.
    pub async fn save_result(&self, extension: &str, data: &[u8]) -> std::io::Result<String> {
        let name = format!("{}.{}", Uuid::new_v4(), extension);
        write_atomically(&self.results_dir, &name, data).await?;

        if let Err(e) = self.evict_old_results(&name).await {
            tracing::warn!("Could not prune {}: {}", self.results_dir.display(), e);
        }
        Ok(name)
    }

    /// Removes the oldest results beyond the retention cap. `current` is
    /// never removed.
    async fn evict_old_results(&self, current: &str) -> std::io::Result<()> {
        let mut entries = fs::read_dir(&self.results_dir).await?;
        let mut older: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == current || !is_result_name(&name) {
                continue;
            }
            // Another request may have pruned it already.
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            older.push((modified, entry.path()));
        }

        if older.len() < self.results_keep {
            return Ok(());
        }
        older.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in older.into_iter().skip(self.results_keep - 1) {
            match fs::remove_file(&path).await {
                Ok(()) => tracing::debug!("Evicted result {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub async fn read_result(&self, name: &str) -> std::io::Result<Option<Vec<u8>>> {
        if !is_result_name(name) {
            return Ok(None);
        }
        match fs::read(self.results_dir.join(name)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Writes `data` under a hidden staging name and renames it into place, so
/// readers never see a partial file.
async fn write_atomically(dir: &Path, name: &str, data: &[u8]) -> std::io::Result<()> {
    let staging = dir.join(format!(".{}.tmp", name));
    fs::write(&staging, data).await?;
    if let Err(e) = fs::rename(&staging, dir.join(name)).await {
        fs::remove_file(&staging).await.ok();
        return Err(e);
    }
    Ok(())
}

fn is_result_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

pub fn content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
