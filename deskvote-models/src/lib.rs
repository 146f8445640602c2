#[macro_use]
extern crate tracing;

mod memory;
mod models;
mod store;

pub use memory::MemoryStore;
pub use models::*;
pub use store::Store;

use deskvote_dependencies::sqlx::{self, PgPool, Postgres};

pub type Tx = sqlx::Transaction<'static, Postgres>;

#[derive(thiserror::Error, Debug)]
pub enum DeskModelError {
    #[error("Other error: {}", .0)]
    Other(String),
    #[error("Error in underlying datamodel: {}", .0)]
    SQLx(#[from] sqlx::Error),
    #[error("Could not migrate database: {}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Image {} not found", .0)]
    ImageNotFound(i32),
    #[error("No votes left")]
    QuotaExceeded,
}

/// Handle on the Postgres backed store.
///
/// Constructed once at startup and handed to request handlers through the
/// server state. Cloning is cheap, all clones share the same pool.
#[derive(Clone)]
pub struct Client {
    db: PgPool,
}

impl Client {
    pub fn new(db: PgPool) -> Self {
        debug!("Creating new Database Client");
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    pub async fn begin(&self) -> Result<Tx, DeskModelError> {
        Ok(self.db.begin().await?)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("db", &self.db).finish()
    }
}

impl From<PgPool> for Client {
    fn from(p: PgPool) -> Self {
        Client::new(p)
    }
}

/// This trait must only be implemented if *ALL* fields of the target can be pushed into the public API as a response
pub trait SafeSerialize {
    type Target: serde::Serialize;

    fn into_safe(&self) -> Self::Target;
}
