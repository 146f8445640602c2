use std::path::{Component, Path, PathBuf};

use deskvote_dependencies::async_trait::async_trait;
use deskvote_dependencies::chrono::{DateTime, Utc};
use deskvote_dependencies::hex;
use deskvote_dependencies::mime::Mime;
use deskvote_dependencies::reqwest::{self, header::CONTENT_TYPE};
use deskvote_dependencies::sha3::{Digest, Sha3_256};
use deskvote_dependencies::url::Url;

use crate::error::{DeskError, DeskResult};

/// Object storage for uploaded files: put bytes under a key, get back a durable URL.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &Mime) -> DeskResult<String>;

    /// Filesystem location of a stored key if this store keeps files on local disk.
    fn local_path(&self, _key: &str) -> Option<PathBuf> {
        None
    }
}

/// Storage key of an upload: `images/YYYY/MM/DD/<hash><ext>`.
///
/// The hash is the first 16 hex characters of the SHA3-256 of the stored bytes,
/// so repeated uploads of the same file on the same day share one object.
pub fn blob_key(bytes: &[u8], ext: &str, now: DateTime<Utc>) -> String {
    let hash = hex::encode(Sha3_256::digest(bytes));
    format!("images/{}/{}{}", now.format("%Y/%m/%d"), &hash[0..(128 / 8)], ext)
}

/// Rejects keys that would escape the storage root.
fn relative_key(key: &str) -> Option<&Path> {
    let path = Path::new(key);
    if key.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        None
    } else {
        Some(path)
    }
}

/// Writes uploads below `data_root` and serves them under `url_root`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    url_root: String,
}

impl LocalBlobStore {
    pub fn new<P: Into<PathBuf>>(root: P, url_root: &str) -> Self {
        Self {
            root: root.into(),
            url_root: url_root.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    #[instrument(skip(bytes), fields(len = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &Mime) -> DeskResult<String> {
        let path = self
            .local_path(key)
            .ok_or_else(|| DeskError::Other(format!("invalid blob key {:?}", key)))?;
        if tokio::fs::try_exists(&path).await? {
            debug!("{} already stored, keeping existing file", path.display());
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            debug!("persisting file to {}", path.display());
            tokio::fs::write(&path, bytes).await?;
        }
        Ok(format!("{}/{}", self.url_root, key))
    }

    fn local_path(&self, key: &str) -> Option<PathBuf> {
        relative_key(key).map(|rel| self.root.join(rel))
    }
}

#[derive(serde::Deserialize)]
struct PutResponse {
    url: String,
}

/// Uploads to an HTTP object store with `PUT {base}/{key}` and a bearer token.
/// The service answers with `{"url": ...}`, the public address of the object.
#[derive(Clone, securefmt::Debug)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    base: Url,
    #[sensitive]
    token: String,
}

impl HttpBlobStore {
    pub fn new(client: reqwest::Client, base: Url, token: String) -> Self {
        Self {
            client,
            base,
            token,
        }
    }

    fn object_url(&self, key: &str) -> DeskResult<Url> {
        let base = self.base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, key))?)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(bytes), fields(len = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &Mime) -> DeskResult<String> {
        let url = self.object_url(key)?;
        let resp = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, content_type.as_ref())
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DeskError::Upstream(format!(
                "blob store answered {} for {}",
                status, key
            )));
        }
        let body: PutResponse = resp.json().await?;
        debug!("Stored {} at {}", key, body.url);
        Ok(body.url)
    }
}
