use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::routing::TypedPath;
use deskvote_core::{
    error::{DeskError, DeskResult},
    request_helper::ClientIp,
    state::DeskState,
};
use deskvote_models::{UserVotesSummary, VoteToggle};

use super::{method_not_allowed, vote_admission};

#[derive(TypedPath)]
#[typed_path("/api/vote")]
pub struct PathVote;

#[derive(TypedPath)]
#[typed_path("/api/user-votes")]
pub struct PathUserVotes;

pub fn vote_routes(r: Router<DeskState>, state: &DeskState) -> Router<DeskState> {
    r.route(
        PathVote::PATH,
        post(vote)
            .route_layer(middleware::from_fn_with_state(state.clone(), vote_admission))
            .fallback(method_not_allowed),
    )
    .route(
        PathUserVotes::PATH,
        get(user_votes).fallback(method_not_allowed),
    )
}

#[derive(serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub image_id: i32,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub message: String,
    pub votes: i32,
    pub votes_left: i32,
    pub has_voted: bool,
}

impl From<VoteToggle> for VoteResponse {
    fn from(t: VoteToggle) -> Self {
        Self {
            message: t.outcome.message().to_string(),
            votes: t.votes,
            votes_left: t.votes_left,
            has_voted: t.has_voted(),
        }
    }
}

#[instrument(skip(state))]
pub async fn user_votes(
    State(state): State<DeskState>,
    ip: ClientIp,
) -> DeskResult<Json<UserVotesSummary>> {
    Ok(Json(state.store().user_votes(ip.as_str()).await?))
}

/// Casts the caller's vote for an image, or takes it back if already cast.
#[instrument(skip(state, body))]
pub async fn vote(
    State(state): State<DeskState>,
    ip: ClientIp,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> DeskResult<Json<VoteResponse>> {
    let Json(req) = body.map_err(|e| DeskError::Validation(e.body_text()))?;
    let toggle = state.store().toggle_vote(req.image_id, ip.as_str()).await?;
    Ok(Json(toggle.into()))
}
