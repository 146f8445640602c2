use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    middleware,
    routing::post,
    Json, Router,
};
use axum_extra::routing::TypedPath;
use deskvote_core::{
    error::{DeskError, DeskResult},
    state::DeskState,
    upload::{process_upload, with_upload_timeout, UploadForm},
};

use super::{method_not_allowed, upload_admission};

#[derive(TypedPath)]
#[typed_path("/api/upload")]
pub struct PathUpload;

pub fn upload_routes(r: Router<DeskState>, state: &DeskState) -> Router<DeskState> {
    r.route(
        PathUpload::PATH,
        post(upload)
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                upload_admission,
            ))
            .fallback(method_not_allowed)
            .layer(DefaultBodyLimit::max(state.config().body_limit())),
    )
}

#[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: i32,
    pub url: String,
    pub instagram_handle: Option<String>,
}

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<DeskState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> DeskResult<Json<UploadResponse>> {
    let multipart = multipart.map_err(|e| DeskError::Validation(e.body_text()))?;
    let max_bytes = state.config().max_upload_bytes;
    let image = with_upload_timeout(state.config(), async {
        let form = UploadForm::from_multipart(multipart, max_bytes).await?;
        process_upload(&state, form).await
    })
    .await?;
    Ok(Json(UploadResponse {
        id: image.id,
        url: image.image_url,
        instagram_handle: image.instagram_handle,
    }))
}
