use std::path::Path as FsPath;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_typed_multipart::{BaseMultipart, FieldData};
use facereg_core::extractor::IMAGE_EXTENSIONS;
use facereg_core::ImageSource;
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::engine::{DeleteOutcome, IdentityPage, IdentityRecord, SearchOutcome};

/// Uploaded images written to a private temporary directory. The directory
/// and its files are removed when this value is dropped.
struct Staged {
    _dir: TempDir,
    source: ImageSource,
}

/// One uploaded image as received.
struct Upload<'a> {
    file_name: Option<&'a str>,
    contents: &'a [u8],
}

impl<'a> From<&'a FieldData<Bytes>> for Upload<'a> {
    fn from(field: &'a FieldData<Bytes>) -> Self {
        Self {
            file_name: field.metadata.file_name.as_deref(),
            contents: &field.contents,
        }
    }
}

/// Write uploads to disk. One image is passed on as its file; several are
/// passed as the directory so their descriptors are averaged.
async fn stage(images: &[Upload<'_>]) -> Result<Staged> {
    if images.is_empty() {
        return Err(AppError::invalid("at least one image is required"));
    }

    let dir = tempfile::Builder::new().prefix("facereg-upload-").tempdir()?;
    let mut files = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        let ext = upload_extension(image.file_name);
        let path = dir.path().join(format!("image-{i:03}.{ext}"));
        tokio::fs::write(&path, image.contents).await?;
        files.push(path);
    }

    let source = match files.as_slice() {
        [single] => ImageSource::Path(single.clone()),
        _ => ImageSource::Path(dir.path().to_path_buf()),
    };
    Ok(Staged { _dir: dir, source })
}

/// Extension kept from the client's file name when it is a known image type.
fn upload_extension(file_name: Option<&str>) -> &'static str {
    file_name
        .and_then(|n| FsPath::new(n).extension())
        .and_then(|e| e.to_str())
        .and_then(|e| {
            IMAGE_EXTENSIONS
                .iter()
                .copied()
                .find(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or("jpg")
}

/// Register a new identity.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    form: BaseMultipart<CreateForm, AppError>,
) -> Result<Json<IdentityRecord>> {
    let form = form.data;
    let uploads: Vec<Upload> = form.image.iter().map(Upload::from).collect();
    let staged = stage(&uploads).await?;
    tracing::info!(name = %form.name, images = form.image.len(), "create identity");
    let record = state.engine.create(&form.name, staged.source.clone()).await?;
    Ok(Json(record))
}

/// Delete an identity by id.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(identity_id): Path<String>,
) -> Result<Json<Value>> {
    let Ok(id) = Uuid::parse_str(&identity_id) else {
        return Err(AppError::not_found(format!("identity {identity_id} not found")));
    };

    match state.engine.delete(id).await {
        DeleteOutcome::Confirmed => Ok(Json(json!({
            "message": format!("identity {id} deleted"),
        }))),
        DeleteOutcome::NotFound => Err(AppError::not_found(format!("identity {id} not found"))),
        DeleteOutcome::NotConfirmed => Err(AppError::not_found(format!(
            "deletion of identity {id} could not be confirmed"
        ))),
    }
}

/// Best match for the face in one image.
pub async fn search_user(
    State(state): State<Arc<AppState>>,
    form: BaseMultipart<ImageForm, AppError>,
) -> Result<Response> {
    let staged = stage(&[Upload::from(&form.data.image)]).await?;
    let response = match state.engine.search(staged.source.clone()).await? {
        SearchOutcome::Match(m) => Json(m).into_response(),
        SearchOutcome::NoMatch => Json(json!({ "message": "no match" })).into_response(),
    };
    Ok(response)
}

/// Every face in one image, each matched independently.
pub async fn detect_faces(
    State(state): State<Arc<AppState>>,
    form: BaseMultipart<ImageForm, AppError>,
) -> Result<Json<Value>> {
    let staged = stage(&[Upload::from(&form.data.image)]).await?;
    let faces = state.engine.detect_and_match(staged.source.clone()).await?;
    if faces.is_empty() {
        return Ok(Json(json!({ "message": "no face" })));
    }
    Ok(Json(json!({ "faces": faces })))
}

/// All identities.
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<IdentityRecord>>> {
    Ok(Json(state.engine.list().await?))
}

/// Largest page a single request may ask for.
const MAX_PAGE_SIZE: usize = 1000;

fn page_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
}

/// One page of identities; pass `next_cursor` back as `cursor` to continue.
pub async fn list_users_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<IdentityPage>> {
    let cursor = match query.cursor.as_deref().filter(|c| !c.is_empty()) {
        Some(c) => Some(
            Uuid::parse_str(c).map_err(|_| AppError::invalid(format!("invalid cursor '{c}'")))?,
        ),
        None => None,
    };
    let limit = page_limit(query.limit, state.engine.options().page_size);
    let page = state.engine.list_page(cursor, limit).await?;
    Ok(Json(page))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let index = state.engine.index();
    let spec = index.spec();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "backend": index.backend(),
        "collection": spec.name,
        "dimension": spec.dimension,
        "metric": spec.metric.to_string(),
    }))
}
