use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware,
    routing::post,
    Json, Router,
};
use axum_extra::routing::TypedPath;
use deskvote_core::{
    error::{DeskError, DeskResult},
    state::DeskState,
    upload::{non_blank, read_file_field, store_file, with_upload_timeout, IncomingFile, IMAGE_FIELD},
};
use deskvote_models::NewSetupSubmission;

use super::{method_not_allowed, upload_admission};

#[derive(TypedPath)]
#[typed_path("/api/submit-setup")]
pub struct PathSubmitSetup;

pub fn submit_routes(r: Router<DeskState>, state: &DeskState) -> Router<DeskState> {
    r.route(
        PathSubmitSetup::PATH,
        post(submit_setup)
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                upload_admission,
            ))
            .fallback(method_not_allowed)
            .layer(DefaultBodyLimit::max(state.config().body_limit())),
    )
}

#[derive(Debug, Default)]
struct SetupForm {
    name: Option<String>,
    email: Option<String>,
    setup_description: Option<String>,
    social_link: Option<String>,
    image: Option<IncomingFile>,
}

fn required(value: Option<String>, field: &str) -> DeskResult<String> {
    value.ok_or_else(|| DeskError::Validation(format!("{} is required", field)))
}

impl SetupForm {
    async fn from_multipart(mut multipart: Multipart, max_bytes: usize) -> DeskResult<Self> {
        let mut form = SetupForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(IMAGE_FIELD) => {
                    // browsers send an empty part when no file was picked
                    if field.file_name() == Some("") {
                        continue;
                    }
                    form.image = Some(read_file_field(field, max_bytes).await?);
                }
                Some("name") => form.name = non_blank(field.text().await?),
                Some("email") => form.email = non_blank(field.text().await?),
                Some("setupDescription") => {
                    form.setup_description = non_blank(field.text().await?)
                }
                Some("socialLink") => form.social_link = non_blank(field.text().await?),
                other => trace!("ignoring form field {:?}", other),
            }
        }
        Ok(form)
    }

    /// Checks the text fields. The image URL is filled in once the file is stored.
    fn validate(self) -> DeskResult<(NewSetupSubmission, Option<IncomingFile>)> {
        let email = required(self.email, "email")?;
        if !email.contains('@') {
            return Err(DeskError::Validation(
                "email must be a valid address".to_string(),
            ));
        }
        let submission = NewSetupSubmission {
            name: required(self.name, "name")?,
            email,
            setup_description: required(self.setup_description, "setupDescription")?,
            social_link: required(self.social_link, "socialLink")?,
            image_url: String::new(),
        };
        Ok((submission, self.image))
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq, Eq)]
pub struct SubmitResponse {
    pub message: String,
    pub id: i32,
}

#[instrument(skip(state, multipart))]
pub async fn submit_setup(
    State(state): State<DeskState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> DeskResult<(StatusCode, Json<SubmitResponse>)> {
    let multipart = multipart.map_err(|e| DeskError::Validation(e.body_text()))?;
    let max_bytes = state.config().max_upload_bytes;
    let submission = with_upload_timeout(state.config(), async {
        let form = SetupForm::from_multipart(multipart, max_bytes).await?;
        let (mut submission, image) = form.validate()?;
        if let Some(image) = image {
            submission.image_url = store_file(&state, image).await?;
        }
        Ok::<_, DeskError>(state.store().insert_submission(submission).await?)
    })
    .await?;
    info!("Setup submission {} received", submission.id);
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Setup submitted successfully".to_string(),
            id: submission.id,
        }),
    ))
}
