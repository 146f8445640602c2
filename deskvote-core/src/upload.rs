//! Upload pipeline: multipart form -> validation -> transform -> blob store -> image record.
//!
//! Each stage returns early on failure. A record is only written after the blob
//! store accepted the file; a blob whose record could not be written stays orphaned.

use std::future::Future;

use deskvote_dependencies::axum::extract::multipart::{Field, Multipart};
use deskvote_dependencies::chrono::Utc;
use deskvote_dependencies::mime::{self, Mime};
use deskvote_dependencies::tokio::time::timeout;
use deskvote_models::{Image, NewImage};

use crate::blob::blob_key;
use crate::config::Configuration;
use crate::error::{DeskError, DeskResult};
use crate::state::DeskState;

pub const IMAGE_FIELD: &str = "image";
pub const HANDLE_FIELD: &str = "instagramHandle";

/// A file part that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub bytes: Vec<u8>,
    pub mime: Mime,
    pub file_name: Option<String>,
}

/// Checks the declared content type of a file part.
pub fn validate_mime(content_type: Option<&str>) -> DeskResult<Mime> {
    let mime: Mime = content_type
        .ok_or_else(|| DeskError::Validation("Couldn't tell what you uploaded".to_string()))?
        .parse()
        .map_err(|_| DeskError::Validation("Couldn't tell what you uploaded".to_string()))?;
    if mime.type_() != mime::IMAGE {
        return Err(DeskError::Validation(format!(
            "Only images can be uploaded, got {}",
            mime.essence_str()
        )));
    }
    if mime.subtype() == mime::SVG {
        return Err(DeskError::Validation(
            "SVG uploads are not supported".to_string(),
        ));
    }
    Ok(mime)
}

/// Byte count in the largest unit it fills, rounded down.
fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    if bytes >= MIB {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}

fn too_large(max_bytes: usize) -> DeskError {
    DeskError::Validation(format!(
        "File too large, the maximum is {}",
        human_size(max_bytes)
    ))
}

/// Reads a file part, stopping as soon as it grows past `max_bytes`.
pub async fn read_file_field(mut field: Field<'_>, max_bytes: usize) -> DeskResult<IncomingFile> {
    let mime = validate_mime(field.content_type())?;
    let file_name = field.file_name().map(str::to_string);
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if bytes.len() + chunk.len() > max_bytes {
            warn!("Rejecting upload {:?}, larger than {} bytes", file_name, max_bytes);
            return Err(too_large(max_bytes));
        }
        bytes.extend_from_slice(&chunk);
    }
    if bytes.is_empty() {
        return Err(DeskError::Validation("Uploaded file is empty".to_string()));
    }
    Ok(IncomingFile {
        bytes,
        mime,
        file_name,
    })
}

/// Trimmed text value, `None` when blank.
pub fn non_blank(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Fields of `POST /api/upload`.
#[derive(Debug)]
pub struct UploadForm {
    pub image: IncomingFile,
    pub instagram_handle: Option<String>,
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart, max_bytes: usize) -> DeskResult<Self> {
        let mut image = None;
        let mut instagram_handle = None;
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(IMAGE_FIELD) => image = Some(read_file_field(field, max_bytes).await?),
                Some(HANDLE_FIELD) => instagram_handle = non_blank(field.text().await?),
                other => trace!("ignoring form field {:?}", other),
            }
        }
        let image =
            image.ok_or_else(|| DeskError::Validation("No image was uploaded".to_string()))?;
        Ok(Self {
            image,
            instagram_handle,
        })
    }
}

/// Transforms the file and hands it to the blob store, returning its URL.
#[instrument(skip(state, file), fields(len = file.bytes.len(), mime = %file.mime))]
pub async fn store_file(state: &DeskState, file: IncomingFile) -> DeskResult<String> {
    let prepared = state.transform().transform(file.bytes, &file.mime).await?;
    let key = blob_key(&prepared.bytes, &prepared.ext, Utc::now());
    let url = state
        .blobs()
        .put(&key, prepared.bytes, &prepared.mime)
        .await
        .map_err(|e| match e {
            e @ DeskError::Upstream(_) => e,
            e => DeskError::Upstream(e.to_string()),
        })?;
    debug!("Stored upload as {}", url);
    Ok(url)
}

/// Runs the storage stages and creates the image record.
pub async fn process_upload(state: &DeskState, form: UploadForm) -> DeskResult<Image> {
    let image_url = store_file(state, form.image).await?;
    let image = state
        .store()
        .insert_image(NewImage {
            image_url,
            instagram_handle: form.instagram_handle,
        })
        .await?;
    info!("New image {} uploaded", image.id);
    Ok(image)
}

/// Bounds an upload by the configured timeout.
pub async fn with_upload_timeout<T, F>(config: &Configuration, fut: F) -> DeskResult<T>
where
    F: Future<Output = DeskResult<T>>,
{
    match timeout(config.upload_timeout(), fut).await {
        Ok(res) => res,
        Err(_) => {
            warn!("Upload exceeded {:?}", config.upload_timeout());
            Err(DeskError::Timeout)
        }
    }
}
