use deskvote_dependencies::async_trait::async_trait;

use crate::{
    Client, DeskModelError, Image, NewImage, NewSetupSubmission, SetupSubmission, UserVote,
    UserVotesSummary, Vote, VoteToggle,
};

/// Everything the request handlers need from the backing datastore.
///
/// Implementations must make [`Store::toggle_vote`] atomic per IP: the
/// ledger, the vote table and the image counter change together or not at all.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// All images, highest vote count first, ties in upload order.
    async fn feed(&self) -> Result<Vec<Image>, DeskModelError>;

    async fn image(&self, id: i32) -> Result<Option<Image>, DeskModelError>;

    async fn insert_image(&self, image: NewImage) -> Result<Image, DeskModelError>;

    /// Remaining budget and voted images of `ip`. Creates the ledger entry if needed.
    async fn user_votes(&self, ip: &str) -> Result<UserVotesSummary, DeskModelError>;

    async fn toggle_vote(&self, image_id: i32, ip: &str) -> Result<VoteToggle, DeskModelError>;

    async fn insert_submission(
        &self,
        submission: NewSetupSubmission,
    ) -> Result<SetupSubmission, DeskModelError>;

    /// Releases the underlying resources. Called once on shutdown.
    async fn close(&self);
}

#[async_trait]
impl Store for Client {
    async fn feed(&self) -> Result<Vec<Image>, DeskModelError> {
        Image::feed(self).await
    }

    async fn image(&self, id: i32) -> Result<Option<Image>, DeskModelError> {
        Image::get(self, id).await
    }

    async fn insert_image(&self, image: NewImage) -> Result<Image, DeskModelError> {
        Image::insert_new(self, image).await
    }

    async fn user_votes(&self, ip: &str) -> Result<UserVotesSummary, DeskModelError> {
        UserVote::summary(self, ip).await
    }

    async fn toggle_vote(&self, image_id: i32, ip: &str) -> Result<VoteToggle, DeskModelError> {
        Vote::toggle(self, image_id, ip).await
    }

    async fn insert_submission(
        &self,
        submission: NewSetupSubmission,
    ) -> Result<SetupSubmission, DeskModelError> {
        SetupSubmission::insert_new(self, submission).await
    }

    async fn close(&self) {
        info!("Closing database pool");
        self.pool().close().await;
    }
}
