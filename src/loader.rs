//! Upload handling and text extraction into load records.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::storage::{Area, FileStore, is_safe_name};

/// Extensions accepted for upload (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "log"];

const PREVIEW_CHARS: usize = 200;

/// Extracted text of an uploaded file, persisted in `load/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub file_name: String,
    pub content: String,
    pub load_method: String,
    #[serde(default)]
    pub loaded_at: Option<String>,
}

/// Where an upload was stored and where its load record goes
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub id: String,
    pub original_filename: String,
    pub filename: String,
    pub upload_path: PathBuf,
    pub load_path: PathBuf,
    pub timestamp: String,
    pub file_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub file: UploadedFile,
    pub content_length: usize,
    pub content_preview: String,
}

/// Entry of the loaded-files listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoadedFileInfo {
    pub id: String,
    pub filename: String,
    pub path: String,
}

pub fn allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an upload as UTF-8 text and normalise it into blank-line
/// separated elements.
pub fn extract_text(bytes: &[u8]) -> Result<String, ServiceError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ServiceError::NotText(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut elements = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                elements.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        elements.push(current.join("\n").trim().to_string());
    }

    Ok(elements.join("\n\n"))
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    store: FileStore,
}

impl DocumentLoader {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    /// Store the raw upload under a timestamped name.
    pub async fn save_upload(
        &self,
        original_filename: &str,
        bytes: &[u8],
        file_type: Option<&str>,
    ) -> Result<UploadedFile, ServiceError> {
        if !is_safe_name(original_filename) {
            return Err(ServiceError::UnsafeFilename(original_filename.to_string()));
        }
        if !allowed_file(original_filename) {
            return Err(ServiceError::FileTypeNotAllowed(original_filename.to_string()));
        }

        let path = Path::new(original_filename);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ServiceError::UnsafeFilename(original_filename.to_string()))?;
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default();

        let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let id = format!("{}_{}", stem, timestamp);
        let filename = format!("{}.{}", id, extension);

        let upload_path = self.store.path(Area::Upload, &filename);
        self.store.write_bytes(&upload_path, bytes).await?;

        tracing::info!("Saved upload '{}' as {}", original_filename, upload_path.display());

        Ok(UploadedFile {
            load_path: self.store.path(Area::Load, &format!("{}.json", id)),
            id,
            original_filename: original_filename.to_string(),
            filename,
            upload_path,
            timestamp,
            file_type: file_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("auto")
                .to_string(),
        })
    }

    /// Write the load record of a saved upload.
    pub async fn process(
        &self,
        file: &UploadedFile,
        content: String,
    ) -> Result<String, ServiceError> {
        let document = LoadedDocument {
            file_name: file.filename.clone(),
            content,
            load_method: file.file_type.clone(),
            loaded_at: Some(Local::now().to_rfc3339()),
        };
        self.store.write_json(&file.load_path, &document).await?;

        tracing::info!(
            "Loaded {} ({} characters) into {}",
            file.filename,
            document.content.chars().count(),
            file.load_path.display()
        );
        Ok(document.content)
    }

    pub async fn handle_upload(
        &self,
        original_filename: &str,
        bytes: &[u8],
        file_type: Option<&str>,
    ) -> Result<UploadOutcome, ServiceError> {
        let content = extract_text(bytes)?;
        let file = self.save_upload(original_filename, bytes, file_type).await?;
        let content = self.process(&file, content).await?;

        Ok(UploadOutcome {
            content_length: content.chars().count(),
            content_preview: content.chars().take(PREVIEW_CHARS).collect(),
            file,
        })
    }

    pub async fn loaded_files(&self) -> Result<Vec<LoadedFileInfo>, ServiceError> {
        let files = self.store.list_json(Area::Load).await?;

        let mut loaded = Vec::with_capacity(files.len());
        for file in files {
            let filename = match self.store.read_json::<LoadedDocument>(&file.path).await {
                Ok(document) => document.file_name,
                Err(e) => {
                    tracing::warn!("Could not read load record {}: {:#}", file.path.display(), e);
                    file.file_name.clone()
                }
            };
            loaded.push(LoadedFileInfo {
                id: file.stem,
                filename,
                path: file.path.display().to_string(),
            });
        }

        Ok(loaded)
    }

    pub async fn read(&self, file_id: &str) -> Result<LoadedDocument, ServiceError> {
        let not_found = || ServiceError::NotFound {
            kind: "load",
            id: file_id.to_string(),
        };
        if !is_safe_name(file_id) {
            return Err(not_found());
        }

        let file = self
            .store
            .find_by_id(Area::Load, file_id)
            .await?
            .ok_or_else(not_found)?;
        Ok(self.store.read_json(&file.path).await?)
    }
}
