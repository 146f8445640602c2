use deskvote_dependencies::sqlx::{query, query_as, query_scalar};

use crate::{Client, DeskModelError, Image, UserVote, VoteOutcome, VoteToggle};

/// An active vote of one IP for one image. At most one exists per (image, ip).
#[derive(sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub id: i32,
    pub image_id: i32,
    pub ip: String,
}

impl Vote {
    #[instrument(skip(client))]
    pub async fn image_ids_for(client: &Client, ip: &str) -> Result<Vec<i32>, DeskModelError> {
        Ok(
            query_scalar("SELECT image_id FROM votes WHERE ip = $1 ORDER BY image_id")
                .bind(ip)
                .fetch_all(client.pool())
                .await?,
        )
    }

    /// Casts or retracts the vote of `ip` for `image_id`.
    ///
    /// Runs as one transaction. The ledger row of the IP is locked first, then the
    /// image row, so concurrent toggles from the same IP are serialized and the
    /// budget can never be overdrawn. Any error rolls the whole toggle back.
    #[instrument(skip(client))]
    pub async fn toggle(
        client: &Client,
        image_id: i32,
        ip: &str,
    ) -> Result<VoteToggle, DeskModelError> {
        let mut tx = client.begin().await?;

        let ledger = UserVote::get_or_create(&mut *tx, ip).await?;

        let image: Option<Image> = query_as("SELECT * FROM images WHERE id = $1 FOR UPDATE")
            .bind(image_id)
            .fetch_optional(&mut *tx)
            .await?;
        let image = match image {
            Some(image) => image,
            None => return Err(DeskModelError::ImageNotFound(image_id)),
        };

        let existing: Option<Vote> =
            query_as("SELECT * FROM votes WHERE image_id = $1 AND ip = $2")
                .bind(image.id)
                .bind(ip)
                .fetch_optional(&mut *tx)
                .await?;

        let transition = ledger.toggle(existing.is_some())?;

        match (&transition.outcome, existing) {
            (VoteOutcome::Removed, Some(existing)) => {
                query("DELETE FROM votes WHERE id = $1")
                    .bind(existing.id)
                    .execute(&mut *tx)
                    .await?;
            }
            (VoteOutcome::Added, None) => {
                query("INSERT INTO votes (image_id, ip) VALUES ($1, $2)")
                    .bind(image.id)
                    .bind(ip)
                    .execute(&mut *tx)
                    .await?;
            }
            (outcome, existing) => {
                return Err(DeskModelError::Other(format!(
                    "inconsistent toggle {:?} with existing vote {:?}",
                    outcome, existing
                )))
            }
        }

        query("UPDATE user_votes SET votes_left = $1 WHERE id = $2")
            .bind(transition.votes_left)
            .bind(ledger.id)
            .execute(&mut *tx)
            .await?;

        let votes: i32 = query_scalar("UPDATE images SET votes = $1 WHERE id = $2 RETURNING votes")
            .bind(transition.apply_to(image.votes))
            .bind(image.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            "Vote toggle for image {} from {:?}: {:?}",
            image.id, ip, transition.outcome
        );

        Ok(VoteToggle {
            outcome: transition.outcome,
            votes,
            votes_left: transition.votes_left,
        })
    }
}
