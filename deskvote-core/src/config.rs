use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use deskvote_dependencies::sqlx::{self, postgres::PgConnectOptions, PgPool};
use deskvote_dependencies::url::Url;

use crate::error::{DeskError, DeskResult};
use crate::media::ResolutionLimit;

const MIB: usize = 1024 * 1024;

/// Runtime configuration, read from flags or the environment (`.env` is loaded first).
#[derive(clap::Args, serde::Serialize, Clone, securefmt::Debug)]
pub struct Configuration {
    /// Postgres connection string. When unset all data is kept in memory and lost on exit
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<Url>,
    #[clap(long, env = "LISTEN_ON", default_value = "127.0.0.1:3000")]
    pub listen_on: SocketAddr,
    /// Directory uploaded files are written to when no blob service is configured
    #[clap(long, env = "DATA_ROOT", default_value = "./data")]
    pub data_root: PathBuf,
    /// URL prefix under which locally stored uploads are served
    #[clap(long, env = "IMAGE_URL_ROOT", default_value = "/uploads")]
    pub image_url_root: String,
    /// Base URL of an HTTP blob service. Used together with the blob token
    #[clap(long, env = "BLOB_BASE_URL")]
    pub blob_base_url: Option<Url>,
    #[clap(long, env = "BLOB_TOKEN", hide_env_values = true)]
    #[serde(skip_serializing)]
    #[sensitive]
    pub blob_token: Option<String>,
    #[clap(long, env = "MAX_UPLOAD_BYTES", default_value_t = 5 * MIB)]
    pub max_upload_bytes: usize,
    #[clap(long, env = "UPLOAD_TIMEOUT_SECS", default_value_t = 30)]
    pub upload_timeout_secs: u64,
    /// Resize and re-encode uploads before storing them
    #[clap(
        long,
        env = "TRANSFORM_IMAGES",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::value_parser!(bool)
    )]
    pub transform_images: bool,
    #[clap(long, env = "MAX_IMAGE_WIDTH", default_value_t = 2048)]
    pub max_image_width: u32,
    #[clap(long, env = "MAX_IMAGE_HEIGHT", default_value_t = 2048)]
    pub max_image_height: u32,
    /// Vote requests admitted per IP and window, 0 disables the limit
    #[clap(long, env = "VOTE_RATE_LIMIT", default_value_t = 60)]
    pub vote_rate_limit: usize,
    /// Upload requests admitted per IP and window, 0 disables the limit
    #[clap(long, env = "UPLOAD_RATE_LIMIT", default_value_t = 10)]
    pub upload_rate_limit: usize,
    #[clap(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 60)]
    pub rate_limit_window_secs: u64,
    /// Take the caller IP from X-Forwarded-For / X-Real-IP. Only enable behind a proxy
    #[clap(
        long,
        env = "TRUST_FORWARDED_FOR",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::value_parser!(bool)
    )]
    pub trust_forwarded_for: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            database_url: None,
            listen_on: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_root: PathBuf::from("./data"),
            image_url_root: "/uploads".to_string(),
            blob_base_url: None,
            blob_token: None,
            max_upload_bytes: 5 * MIB,
            upload_timeout_secs: 30,
            transform_images: true,
            max_image_width: 2048,
            max_image_height: 2048,
            vote_rate_limit: 60,
            upload_rate_limit: 10,
            rate_limit_window_secs: 60,
            trust_forwarded_for: true,
        }
    }
}

impl Configuration {
    /// Opens the Postgres pool if a database is configured.
    pub async fn db_conn(&self) -> DeskResult<Option<PgPool>> {
        let url = match &self.database_url {
            Some(v) => v,
            None => return Ok(None),
        };
        let opts =
            PgConnectOptions::from_str(url.as_str())?.application_name(&crate::package_full());
        let conn = sqlx::PgPool::connect_with(opts).await?;
        Ok(Some(conn))
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Maximum request body on upload routes, leaves room for the multipart framing
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes + MIB
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn resolution_limit(&self) -> ResolutionLimit {
        ResolutionLimit::new(self.max_image_height, self.max_image_width)
    }

    /// URL prefix local uploads are served under, without the trailing slash.
    /// Must be an absolute path below `/`.
    pub fn local_url_root(&self) -> DeskResult<&str> {
        let root = self.image_url_root.trim_end_matches('/');
        if !root.starts_with('/') || root.contains('*') || root.contains(':') {
            return Err(DeskError::InvalidConfiguration(format!(
                "image_url_root must be a path like /uploads, got {:?}",
                self.image_url_root
            )));
        }
        Ok(root)
    }

    /// Base URL and token of the HTTP blob service, if both are set.
    pub fn blob_service(&self) -> Option<(&Url, &str)> {
        match (&self.blob_base_url, &self.blob_token) {
            (Some(base), Some(token)) => Some((base, token.as_str())),
            _ => None,
        }
    }
}
