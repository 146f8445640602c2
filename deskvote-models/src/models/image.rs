use deskvote_dependencies::chrono::NaiveDateTime;
use deskvote_dependencies::sqlx::query_as;

use crate::{Client, DeskModelError, SafeSerialize};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct APIImage {
    pub id: i32,
    pub image_url: String,
    pub instagram_handle: Option<String>,
    pub votes: i32,
}

impl SafeSerialize for Image {
    type Target = APIImage;

    fn into_safe(&self) -> Self::Target {
        APIImage {
            id: self.id,
            image_url: self.image_url.clone(),
            instagram_handle: self.instagram_handle.clone(),
            votes: self.votes,
        }
    }
}

#[derive(sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub id: i32,
    pub image_url: String,
    pub instagram_handle: Option<String>,
    pub votes: i32,
    pub created_at: NaiveDateTime,
}

/// An image record that has not been written yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewImage {
    pub image_url: String,
    pub instagram_handle: Option<String>,
}

impl Image {
    #[instrument(skip(client))]
    pub async fn get(client: &Client, id: i32) -> Result<Option<Self>, DeskModelError> {
        Ok(query_as("SELECT * FROM images WHERE id = $1")
            .bind(id)
            .fetch_optional(client.pool())
            .await?)
    }

    /// All images, most voted first. Equal vote counts keep upload order.
    #[instrument(skip(client))]
    pub async fn feed(client: &Client) -> Result<Vec<Self>, DeskModelError> {
        Ok(query_as("SELECT * FROM images ORDER BY votes DESC, id ASC")
            .fetch_all(client.pool())
            .await?)
    }

    #[instrument(skip(client))]
    pub async fn insert_new(client: &Client, image: NewImage) -> Result<Self, DeskModelError> {
        let image: Image = query_as(
            "INSERT INTO images (image_url, instagram_handle) VALUES ($1, $2) RETURNING *",
        )
        .bind(image.image_url)
        .bind(image.instagram_handle)
        .fetch_one(client.pool())
        .await?;
        debug!("Inserted image {}", image.id);
        Ok(image)
    }
}
