//! Multipart image uploads to local disk.
//!
//! Files land under `UPLOAD_DIR/<folder>/` with uuid names and are served
//! back at `/uploads/...`. Concurrent uploads to the same folder are
//! last-write-wins; uuid names keep them from colliding.

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

const ALLOWED_FOLDERS: &[&str] = &["products", "categories"];
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub async fn upload(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(folder): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    if !ALLOWED_FOLDERS.contains(&folder.as_str()) {
        return Err(ApiError::Validation(format!("unknown upload folder: {folder}")));
    }

    let dir = s.config.upload_dir.join(&folder);
    tokio::fs::create_dir_all(&dir).await?;

    let mut urls = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let ext = extension(&file_name)
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| ApiError::Validation(format!("unsupported image type: {file_name}")))?;
        let data = field.bytes().await.map_err(|e| ApiError::Validation(e.to_string()))?;
        if data.is_empty() {
            return Err(ApiError::Validation(format!("empty upload: {file_name}")));
        }

        let name = format!("{}.{ext}", Uuid::new_v4());
        tokio::fs::write(dir.join(&name), &data).await?;
        urls.push(format!("/uploads/{folder}/{name}"));
    }

    if urls.is_empty() {
        return Err(ApiError::Validation("no image field in request".into()));
    }
    tracing::info!(folder = %folder, count = urls.len(), "images uploaded");
    Ok(Json(json!({ "urls": urls })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_whitelist() {
        assert_eq!(extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension(".hidden"), None);
    }
}
