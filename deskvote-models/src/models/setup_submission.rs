use deskvote_dependencies::chrono::NaiveDateTime;
use deskvote_dependencies::sqlx::query_as;

use crate::{Client, DeskModelError};

pub const SUBMISSION_PENDING: &str = "pending";

/// A setup sent in for moderation. Not part of the voting feed.
#[derive(sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
pub struct SetupSubmission {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub setup_description: String,
    pub social_link: String,
    pub image_url: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSetupSubmission {
    pub name: String,
    pub email: String,
    pub setup_description: String,
    pub social_link: String,
    /// Empty when no image was attached.
    pub image_url: String,
}

impl SetupSubmission {
    #[instrument(skip(client, submission), fields(name = %submission.name))]
    pub async fn insert_new(
        client: &Client,
        submission: NewSetupSubmission,
    ) -> Result<Self, DeskModelError> {
        Ok(query_as(
            "INSERT INTO setup_submissions (
                name, email, setup_description, social_link, image_url, status
             ) VALUES (
                $1, $2, $3, $4, $5, $6
             ) RETURNING *",
        )
        .bind(submission.name)
        .bind(submission.email)
        .bind(submission.setup_description)
        .bind(submission.social_link)
        .bind(submission.image_url)
        .bind(SUBMISSION_PENDING)
        .fetch_one(client.pool())
        .await?)
    }
}
