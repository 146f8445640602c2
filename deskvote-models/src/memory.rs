use std::collections::BTreeMap;

use deskvote_dependencies::async_trait::async_trait;
use deskvote_dependencies::chrono::Utc;
use deskvote_dependencies::tokio::sync::Mutex;

use crate::{
    DeskModelError, Image, NewImage, NewSetupSubmission, SetupSubmission, Store, UserVote,
    UserVotesSummary, Vote, VoteToggle, SUBMISSION_PENDING, VOTE_BUDGET,
};

#[derive(Debug, Default)]
struct Tables {
    images: Vec<Image>,
    user_votes: BTreeMap<String, UserVote>,
    votes: Vec<Vote>,
    submissions: Vec<SetupSubmission>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn ledger(&mut self, ip: &str) -> UserVote {
        if let Some(entry) = self.user_votes.get(ip) {
            return entry.clone();
        }
        let entry = UserVote {
            id: self.next_id(),
            ip: ip.to_string(),
            votes_left: VOTE_BUDGET,
        };
        self.user_votes.insert(ip.to_string(), entry.clone());
        entry
    }
}

/// Process local store used when no database is configured and in tests.
///
/// Every operation takes the one table lock, which trivially serializes vote
/// toggles. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn feed(&self) -> Result<Vec<Image>, DeskModelError> {
        let tables = self.tables.lock().await;
        let mut images = tables.images.clone();
        // stable sort, images are kept in insertion order
        images.sort_by(|a, b| b.votes.cmp(&a.votes));
        Ok(images)
    }

    async fn image(&self, id: i32) -> Result<Option<Image>, DeskModelError> {
        let tables = self.tables.lock().await;
        Ok(tables.images.iter().find(|x| x.id == id).cloned())
    }

    async fn insert_image(&self, image: NewImage) -> Result<Image, DeskModelError> {
        let mut tables = self.tables.lock().await;
        let image = Image {
            id: tables.next_id(),
            image_url: image.image_url,
            instagram_handle: image.instagram_handle,
            votes: 0,
            created_at: Utc::now().naive_utc(),
        };
        tables.images.push(image.clone());
        Ok(image)
    }

    async fn user_votes(&self, ip: &str) -> Result<UserVotesSummary, DeskModelError> {
        let mut tables = self.tables.lock().await;
        let entry = tables.ledger(ip);
        let mut voted_image_ids: Vec<i32> = tables
            .votes
            .iter()
            .filter(|x| x.ip == ip)
            .map(|x| x.image_id)
            .collect();
        voted_image_ids.sort_unstable();
        Ok(UserVotesSummary {
            votes_left: entry.votes_left,
            voted_image_ids,
        })
    }

    async fn toggle_vote(&self, image_id: i32, ip: &str) -> Result<VoteToggle, DeskModelError> {
        let mut tables = self.tables.lock().await;
        let ledger = tables.ledger(ip);
        let image_idx = tables
            .images
            .iter()
            .position(|x| x.id == image_id)
            .ok_or(DeskModelError::ImageNotFound(image_id))?;
        let existing = tables
            .votes
            .iter()
            .position(|x| x.image_id == image_id && x.ip == ip);

        let transition = ledger.toggle(existing.is_some())?;

        match existing {
            Some(idx) => {
                tables.votes.remove(idx);
            }
            None => {
                let vote = Vote {
                    id: tables.next_id(),
                    image_id,
                    ip: ip.to_string(),
                };
                tables.votes.push(vote);
            }
        }
        if let Some(entry) = tables.user_votes.get_mut(ip) {
            entry.votes_left = transition.votes_left;
        }
        let image = &mut tables.images[image_idx];
        image.votes = transition.apply_to(image.votes);

        Ok(VoteToggle {
            outcome: transition.outcome,
            votes: image.votes,
            votes_left: transition.votes_left,
        })
    }

    async fn insert_submission(
        &self,
        submission: NewSetupSubmission,
    ) -> Result<SetupSubmission, DeskModelError> {
        let mut tables = self.tables.lock().await;
        let submission = SetupSubmission {
            id: tables.next_id(),
            name: submission.name,
            email: submission.email,
            setup_description: submission.setup_description,
            social_link: submission.social_link,
            image_url: submission.image_url,
            status: SUBMISSION_PENDING.to_string(),
            created_at: Utc::now().naive_utc(),
        };
        tables.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn close(&self) {
        debug!("Dropping in-memory store contents");
        *self.tables.lock().await = Tables::default();
    }
}
