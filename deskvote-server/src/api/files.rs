use axum::{
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
    Router,
};
use deskvote_core::{
    config::Configuration,
    error::{DeskError, DeskResult},
    state::DeskState,
};
use deskvote_dependencies::new_mime_guess;

use super::method_not_allowed;

/// Serves uploads kept by the local blob store under the configured URL root.
/// Nothing is mounted when the root is not a usable path.
pub fn file_routes(r: Router<DeskState>, config: &Configuration) -> Router<DeskState> {
    let root = match config.local_url_root() {
        Ok(root) => root,
        Err(e) => {
            warn!("Not serving local uploads: {}", e);
            return r;
        }
    };
    r.route(
        &format!("{}/*path", root),
        get(serve_file).fallback(method_not_allowed),
    )
}

#[instrument(skip(state))]
pub async fn serve_file(
    State(state): State<DeskState>,
    Path(path): Path<String>,
) -> DeskResult<impl IntoResponse> {
    let not_found = || DeskError::NotFound(format!("File {} not found", path));
    let file = state
        .blobs()
        .local_path(path.trim_start_matches('/'))
        .ok_or_else(not_found)?;
    let bytes = match tokio::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    let mime = new_mime_guess::from_path(&file).first_or_octet_stream();
    trace!("serving {} as {}", file.display(), mime);
    Ok(([(CONTENT_TYPE, mime.to_string())], bytes))
}
