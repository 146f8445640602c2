//! Central pin for the third-party stack of the workspace.
//!
//! Member crates depend on this crate and import through it so that versions and
//! feature sets only need to be touched in one place. Derive macros that expand
//! to absolute paths (serde, sqlx, thiserror, clap) are still declared directly
//! by the crates using them.

pub use async_trait;
pub use axum;
pub use better_panic;
pub use chrono;
pub use hex;
pub use image;
pub use kankyo;
pub use mime;
pub use moka;
pub use new_mime_guess;
pub use reqwest;
pub use serde_json;
pub use sha3;
pub use sqlx;
pub use tempfile;
pub use tokio;
pub use tower;
pub use tracing_subscriber;
pub use url;
