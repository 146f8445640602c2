use deskvote_dependencies::{
    axum::{
        extract::multipart::MultipartError,
        http::{header::RETRY_AFTER, HeaderValue, StatusCode},
        response::{IntoResponse, Response},
        Json,
    },
    image, reqwest, serde_json, sqlx, url,
};
use deskvote_models::DeskModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("No votes left")]
    QuotaExceeded,
    #[error("{0}")]
    Upstream(String),
    #[error("Method {0} Not Allowed")]
    MethodNotAllowed(String),
    #[error("Too many requests, try again in {retry_after} seconds")]
    RateLimited { retry_after: u64 },
    #[error("Request timed out")]
    Timeout,
    #[error("Database Error: {0}")]
    Database(DeskModelError),
    #[error("SQLx Error: {0}")]
    SQLx(#[from] sqlx::Error),
    #[error("SQL Migration Error: {0}")]
    SQLMigration(#[from] sqlx::migrate::MigrateError),
    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Serde: JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Could not join thread: {0}")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("Could not parse URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Could not process image: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("Could not read request: {0}")]
    MultipartError(#[from] MultipartError),
    #[error("Configuration Variable Unset: {0}")]
    ConfigurationUnset(String),
    #[error("Invalid Configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Other Error: {0:?}")]
    Other(String),
}

pub type DeskResult<T> = std::result::Result<T, DeskError>;

impl From<DeskModelError> for DeskError {
    fn from(e: DeskModelError) -> Self {
        match e {
            DeskModelError::ImageNotFound(_) => DeskError::NotFound(e.to_string()),
            DeskModelError::QuotaExceeded => DeskError::QuotaExceeded,
            e => DeskError::Database(e),
        }
    }
}

impl DeskError {
    pub fn status(&self) -> StatusCode {
        use DeskError::*;
        match self {
            Validation(_) | QuotaExceeded | MultipartError(_) => StatusCode::BAD_REQUEST,
            NotFound(_) => StatusCode::NOT_FOUND,
            MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Timeout => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Internal failures are not spelled out.
    fn public_message(&self) -> String {
        match self {
            DeskError::Upstream(_) => "Could not store the upload, please try again".to_string(),
            e if e.status().is_server_error() => "An internal error occurred".to_string(),
            e => e.to_string(),
        }
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Error presented to user: {:?}", self);
        } else {
            debug!("Rejected request with {}: {}", status, self);
        }
        let body = Json(serde_json::json!({ "error": self.public_message() }));
        let mut resp = (status, body).into_response();
        if let DeskError::RateLimited { retry_after } = self {
            resp.headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        }
        resp
    }
}
