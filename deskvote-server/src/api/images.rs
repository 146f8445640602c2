use axum::{extract::State, routing::get, Json, Router};
use axum_extra::routing::TypedPath;
use deskvote_core::{error::DeskResult, state::DeskState};
use deskvote_models::{APIImage, SafeSerialize};

use super::method_not_allowed;

#[derive(TypedPath)]
#[typed_path("/api/images")]
pub struct PathImages;

pub fn image_routes(r: Router<DeskState>) -> Router<DeskState> {
    r.route(
        PathImages::PATH,
        get(list_images).fallback(method_not_allowed),
    )
}

/// The voting feed, most voted first.
#[instrument(skip(state))]
pub async fn list_images(State(state): State<DeskState>) -> DeskResult<Json<Vec<APIImage>>> {
    let images = state.store().feed().await?;
    Ok(Json(images.iter().map(SafeSerialize::into_safe).collect()))
}
