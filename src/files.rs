use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::task::UploadedFile;
use crate::AppState;

/// File types a translation job can reference.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "md", "srt", "vtt", "ass", "json", "csv", "docx", "pdf", "mp3", "wav", "mp4",
];

/// Declared content types accepted alongside the extension check. Clients
/// that cannot classify a file send application/octet-stream, so that stays
/// allowed.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/csv",
    "text/vtt",
    "text/x-ssa",
    "application/x-subrip",
    "application/json",
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "video/mp4",
    "application/octet-stream",
];

/// Per-file cap, matching the request body cap.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// POST /api/v1/files/upload
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Envelope<UploadedFile>, ApiError> {
    // A request that is not multipart at all still gets the error envelope.
    let mut multipart =
        multipart.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    let upload_dir = state.config.upload_dir.clone();

    // Ensure upload dir exists
    if !fs::try_exists(&upload_dir).await.unwrap_or(false) {
        fs::create_dir_all(&upload_dir).await.map_err(|e| {
            tracing::error!("Failed to create upload dir: {}", e);
            ApiError::Internal("Could not prepare upload directory".to_string())
        })?;
    }

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        ApiError::Validation("Invalid or oversized multipart body".to_string())
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let file_name = field.file_name().unwrap_or("unknown_file").to_string();
            // Sanitize filename to prevent directory traversal
            let file_name = Path::new(&file_name)
                .file_name()
                .ok_or_else(|| ApiError::Validation("File name is missing".to_string()))?
                .to_string_lossy()
                .to_string();

            let extension = Path::new(&file_name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_ascii_lowercase())
                .unwrap_or_default();
            if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
                return Err(ApiError::UnsupportedMedia(format!(
                    "File type \"{}\" is not supported",
                    if extension.is_empty() { &file_name } else { &extension }
                )));
            }

            let content_type = field
                .content_type()
                .map(|ct| ct.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();
            if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
                return Err(ApiError::UnsupportedMedia(format!(
                    "Content type \"{mime}\" is not supported"
                )));
            }

            let data = field.bytes().await.map_err(|e| {
                tracing::error!("Failed to read file bytes: {}", e);
                ApiError::Validation("File exceeds the 10MB upload limit or is unreadable".to_string())
            })?;
            if data.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::Validation(
                    "File exceeds the 10MB upload limit".to_string(),
                ));
            }

            let file_path = PathBuf::from(&upload_dir).join(&file_name);
            let mut file = File::create(&file_path).await.map_err(|e| {
                tracing::error!("Failed to create file {}: {}", file_path.display(), e);
                ApiError::Internal("Could not store uploaded file".to_string())
            })?;
            file.write_all(&data).await.map_err(|e| {
                tracing::error!("Failed to write to file {}: {}", file_path.display(), e);
                ApiError::Internal("Could not store uploaded file".to_string())
            })?;

            let record = UploadedFile {
                id: Uuid::new_v4().to_string(),
                file_name: file_name.clone(),
                content_type,
                size: data.len() as u64,
                uploaded_at: Utc::now().to_rfc3339(),
            };
            state.engine.store().put_upload(record.clone()).await;

            tracing::info!("File uploaded successfully: {}", file_name);
            return Ok(Envelope::new("File uploaded successfully", record));
        }
    }

    Err(ApiError::Validation(
        "Multipart field \"file\" is required".to_string(),
    ))
}
