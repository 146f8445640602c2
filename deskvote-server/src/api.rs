use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use deskvote_core::{
    error::{DeskError, DeskResult},
    rate_limit::admit_request,
    state::DeskState,
};

pub mod files;
pub mod images;
pub mod submit_setup;
pub mod upload;
pub mod votes;

/// Fallback of every API route for verbs it does not serve.
pub async fn method_not_allowed(method: Method) -> DeskError {
    DeskError::MethodNotAllowed(method.to_string())
}

pub async fn not_found(uri: Uri) -> DeskError {
    DeskError::NotFound(format!("Nothing found at {}", uri.path()))
}

pub async fn vote_admission(
    State(state): State<DeskState>,
    req: Request<Body>,
    next: Next<Body>,
) -> DeskResult<Response> {
    admit_request(
        state.vote_limiter(),
        state.config().trust_forwarded_for,
        req,
        next,
    )
    .await
}

pub async fn upload_admission(
    State(state): State<DeskState>,
    req: Request<Body>,
    next: Next<Body>,
) -> DeskResult<Response> {
    admit_request(
        state.upload_limiter(),
        state.config().trust_forwarded_for,
        req,
        next,
    )
    .await
}
