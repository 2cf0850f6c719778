//! # placestory-shared
//!
//! Types shared by the capture, playback and client crates: the story data
//! model, typed identifiers, fixed timing constants and the user-facing
//! error taxonomy.

pub mod constants;
pub mod error;
pub mod models;
pub mod types;

pub use error::{Presentation, StoryError};
pub use models::*;
pub use types::*;
