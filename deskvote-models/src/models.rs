/*
 * This module links all the various SQL Tables to the appropriate models and exports them for ease of use.
*/

mod image;
pub use image::*;
mod user_vote;
pub use user_vote::*;
mod vote;
pub use vote::*;
mod setup_submission;
pub use setup_submission::*;
