//! Bug payloads sent as JSON or `multipart/form-data`, and image storage.
//!
//! # Key invariants
//! - Uploaded images land in `<media_root>/bugs/` under a generated name; the
//!   client's file name never reaches the filesystem.
//! - Only files whose leading bytes match a known image format are accepted.
//! - The stored value is the media-relative path served under `/media`.
use crate::api::error::{ApiError, api_internal_message, api_validation_error};
use crate::api::extract::ValidJson;
use crate::api::types::BugRequest;
use crate::app::AppState;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use std::path::Path;

/// Directory below the media root that receives bug images.
pub const UPLOAD_DIR: &str = "bugs";

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";

/// Image part of a multipart bug payload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// File extension for the detected image format.
    pub fn extension(&self) -> Option<&'static str> {
        sniff_image(&self.bytes)
    }
}

/// A bug request plus the uploaded image, if the client sent one.
#[derive(Debug)]
pub struct BugPayload {
    pub request: BugRequest,
    pub image: Option<ImageUpload>,
}

#[axum::async_trait]
impl FromRequest<AppState> for BugPayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));
        if !multipart {
            let ValidJson(request) = ValidJson::<BugRequest>::from_request(req, state).await?;
            return Ok(Self {
                request,
                image: None,
            });
        }

        let mut form = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| api_validation_error(&rejection.body_text()))?;
        let mut fields = Map::new();
        let mut image = None;
        while let Some(field) = form
            .next_field()
            .await
            .map_err(|err| api_validation_error(&err.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            if name == "image" {
                if let Some(file_name) = file_name {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| api_validation_error(&err.body_text()))?;
                    // Browsers send an empty part when no file was chosen.
                    if !(file_name.is_empty() && bytes.is_empty()) {
                        image = Some(ImageUpload { file_name, bytes });
                    }
                    continue;
                }
            }
            let text = field
                .text()
                .await
                .map_err(|err| api_validation_error(&err.body_text()))?;
            let value = form_value(&name, text);
            fields.insert(name, value);
        }
        let request = serde_json::from_value(Value::Object(fields))
            .map_err(|err| api_validation_error(&err.to_string()))?;
        Ok(Self { request, image })
    }
}

/// Form fields are all text; coerce the typed ones so they deserialize.
fn form_value(name: &str, text: String) -> Value {
    match name {
        "project" | "department" => match text.trim().parse::<i64>() {
            Ok(id) => Value::from(id),
            Err(_) => Value::String(text),
        },
        "is_current_project" => match text.trim() {
            "true" | "True" | "1" | "on" => Value::Bool(true),
            "false" | "False" | "0" | "off" => Value::Bool(false),
            _ => Value::String(text),
        },
        "url_bug" | "image" | "assigned_to" if text.is_empty() => Value::Null,
        _ => Value::String(text),
    }
}

fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else if bytes.starts_with(b"BM") && bytes.len() > 14 {
        Some("bmp")
    } else {
        None
    }
}

/// Writes `upload` below `media_root` and returns its media-relative path.
pub async fn store_image(
    media_root: &Path,
    upload: &ImageUpload,
    extension: &str,
) -> Result<String, ApiError> {
    let dir = media_root.join(UPLOAD_DIR);
    tokio::fs::create_dir_all(&dir).await.map_err(|err| {
        tracing::error!(error = %err, dir = %dir.display(), "failed to create upload directory");
        api_internal_message("failed to store image")
    })?;
    let file_name = format!("{}.{extension}", uuid::Uuid::new_v4().simple());
    tokio::fs::write(dir.join(&file_name), &upload.bytes)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "failed to write uploaded image");
            api_internal_message("failed to store image")
        })?;
    let relative = format!("{UPLOAD_DIR}/{file_name}");
    tracing::info!(original = %upload.file_name, path = %relative, bytes = upload.bytes.len(), "bug image stored");
    Ok(relative)
}

/// Removes an image stored for a request that then failed.
pub async fn discard_image(media_root: &Path, relative: &str) {
    if let Err(err) = tokio::fs::remove_file(media_root.join(relative)).await {
        tracing::warn!(error = %err, path = relative, "failed to remove orphaned image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_image_formats() {
        assert_eq!(sniff_image(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), Some("png"));
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]), Some("jpg"));
        assert_eq!(sniff_image(b"GIF89a\x01\0\x01\0"), Some("gif"));
        assert_eq!(sniff_image(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_image(b"plain text, not an image"), None);
        assert_eq!(sniff_image(b""), None);
    }

    #[test]
    fn form_values_are_coerced_by_field() {
        assert_eq!(form_value("project", " 12 ".to_string()), Value::from(12));
        assert_eq!(
            form_value("project", "twelve".to_string()),
            Value::String("twelve".to_string())
        );
        assert_eq!(form_value("is_current_project", "on".to_string()), Value::Bool(true));
        assert_eq!(form_value("is_current_project", "0".to_string()), Value::Bool(false));
        assert_eq!(form_value("assigned_to", String::new()), Value::Null);
        assert_eq!(
            form_value("bug_type", "bug".to_string()),
            Value::String("bug".to_string())
        );
    }

    #[tokio::test]
    async fn stored_images_get_generated_names() {
        let root = std::env::temp_dir().join(format!("bugtracker-upload-{}", uuid::Uuid::new_v4()));
        let upload = ImageUpload {
            file_name: "../../escape.png".to_string(),
            bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        };
        let relative = store_image(&root, &upload, "png").await.expect("store");
        assert!(relative.starts_with("bugs/"));
        assert!(relative.ends_with(".png"));
        assert!(!relative.contains("escape"));
        let written = std::fs::read(root.join(&relative)).expect("written");
        assert_eq!(written, upload.bytes.to_vec());

        discard_image(&root, &relative).await;
        assert!(!root.join(&relative).exists());
        let _ = std::fs::remove_dir_all(root);
    }
}
