use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;

/// Sub-directories of the data tree, one per pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Upload,
    Load,
    Chunk,
    Embedding,
    Db,
}

impl Area {
    pub const ALL: [Area; 5] = [Area::Upload, Area::Load, Area::Chunk, Area::Embedding, Area::Db];

    fn dir_name(self) -> &'static str {
        match self {
            Area::Upload => "upload",
            Area::Load => "load",
            Area::Chunk => "chunk",
            Area::Embedding => "embedding",
            Area::Db => "db",
        }
    }
}

/// A JSON file found in one of the areas
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    pub stem: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

/// Shareable handle to the on-disk data tree
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Arc<PathBuf>,
}

/// Whether `name` can be used as a single path component.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && !name.contains('\0')
}

impl FileStore {
    /// Open the data tree rooted at `FILES_DIR`, creating every area
    /// directory that does not exist yet.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::open(&config.files_dir).await
    }

    pub async fn open(root: &Path) -> Result<Self> {
        tracing::info!("Preparing data directory: {}", root.display());
        for area in Area::ALL {
            let dir = root.join(area.dir_name());
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        Ok(Self {
            root: Arc::new(root.to_path_buf()),
        })
    }

    pub fn dir(&self, area: Area) -> PathBuf {
        self.root.join(area.dir_name())
    }

    pub fn path(&self, area: Area, file_name: &str) -> PathBuf {
        self.dir(area).join(file_name)
    }

    /// Write `bytes` to `path` through a temporary sibling file, so readers
    /// never observe a partially written file.
    pub async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    pub async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize JSON data")?;
        self.write_bytes(path, &bytes).await
    }

    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))
    }

    /// Every `*.json` file of an area, sorted by file name.
    pub async fn list_json(&self, area: Area) -> Result<Vec<StoredFile>> {
        let dir = self.dir(area);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Directory does not exist: {}", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()));
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = file_name.strip_suffix(".json") else {
                continue;
            };
            let metadata = entry
                .metadata()
                .await
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push(StoredFile {
                stem: stem.to_string(),
                file_name,
                path: entry.path(),
                size_bytes: metadata.len(),
                modified: DateTime::<Local>::from(modified),
            });
        }

        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(files)
    }

    /// Look up a JSON file by id: an exact stem match wins, otherwise the
    /// first file whose name starts with `id`.
    pub async fn find_by_id(&self, area: Area, id: &str) -> Result<Option<StoredFile>> {
        let files = self.list_json(area).await?;

        if let Some(exact) = files.iter().find(|f| f.stem == id) {
            return Ok(Some(exact.clone()));
        }
        Ok(files.into_iter().find(|f| f.file_name.starts_with(id)))
    }

    /// Verify every area directory is present.
    pub async fn health_check(&self) -> Result<()> {
        for area in Area::ALL {
            let dir = self.dir(area);
            let metadata = tokio::fs::metadata(&dir)
                .await
                .with_context(|| format!("Directory {} is not accessible", dir.display()))?;
            if !metadata.is_dir() {
                anyhow::bail!("{} is not a directory", dir.display());
            }
        }

        tracing::debug!("Storage health check passed");
        Ok(())
    }
}
