use deskvote_dependencies::sqlx::{query_as, Executor, Postgres};

use crate::{Client, DeskModelError};

/// Number of votes every IP starts out with. Active votes plus the remaining
/// budget of an IP always add up to this.
pub const VOTE_BUDGET: i32 = 25;

/// Ledger entry of a single IP.
#[derive(sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
pub struct UserVote {
    pub id: i32,
    pub ip: String,
    pub votes_left: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Added,
    Removed,
}

impl VoteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            VoteOutcome::Added => "Vote added",
            VoteOutcome::Removed => "Vote removed",
        }
    }
}

/// State change a toggle applies to the ledger, the vote table and the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub outcome: VoteOutcome,
    pub votes_left: i32,
    pub image_delta: i32,
}

impl Transition {
    /// New vote count of the image, never below zero.
    pub fn apply_to(&self, votes: i32) -> i32 {
        (votes + self.image_delta).max(0)
    }
}

impl UserVote {
    /// Decides what toggling a vote does, given whether this IP currently votes for the image.
    ///
    /// Retracting always succeeds and refunds one vote, capped at [`VOTE_BUDGET`].
    /// Casting needs at least one vote left.
    pub fn toggle(&self, has_voted: bool) -> Result<Transition, DeskModelError> {
        if has_voted {
            Ok(Transition {
                outcome: VoteOutcome::Removed,
                votes_left: (self.votes_left + 1).min(VOTE_BUDGET),
                image_delta: -1,
            })
        } else if self.votes_left <= 0 {
            Err(DeskModelError::QuotaExceeded)
        } else {
            Ok(Transition {
                outcome: VoteOutcome::Added,
                votes_left: self.votes_left - 1,
                image_delta: 1,
            })
        }
    }

    /// Fetches the ledger entry of `ip`, creating it with a full budget on first sight.
    ///
    /// Inside a transaction the returned row stays locked until commit.
    pub async fn get_or_create<'e, E>(executor: E, ip: &str) -> Result<Self, DeskModelError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Ok(query_as(
            "INSERT INTO user_votes (ip, votes_left) VALUES ($1, $2)
             ON CONFLICT (ip) DO UPDATE SET ip = EXCLUDED.ip
             RETURNING *",
        )
        .bind(ip)
        .bind(VOTE_BUDGET)
        .fetch_one(executor)
        .await?)
    }

    pub async fn get<'e, E>(executor: E, ip: &str) -> Result<Option<Self>, DeskModelError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Ok(query_as("SELECT * FROM user_votes WHERE ip = $1")
            .bind(ip)
            .fetch_optional(executor)
            .await?)
    }

    /// Read path: only writes when `ip` has no ledger entry yet.
    #[instrument(skip(client))]
    pub async fn summary(client: &Client, ip: &str) -> Result<UserVotesSummary, DeskModelError> {
        let entry = match Self::get(client.pool(), ip).await? {
            Some(entry) => entry,
            None => Self::get_or_create(client.pool(), ip).await?,
        };
        let voted_image_ids = crate::Vote::image_ids_for(client, ip).await?;
        Ok(UserVotesSummary {
            votes_left: entry.votes_left,
            voted_image_ids,
        })
    }
}

/// What an IP sees of its own ledger.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserVotesSummary {
    pub votes_left: i32,
    pub voted_image_ids: Vec<i32>,
}

/// Result of a vote toggle, as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteToggle {
    pub outcome: VoteOutcome,
    pub votes: i32,
    pub votes_left: i32,
}

impl VoteToggle {
    pub fn has_voted(&self) -> bool {
        self.outcome == VoteOutcome::Added
    }
}
