//! Shared types for the Google service broker workspace

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
