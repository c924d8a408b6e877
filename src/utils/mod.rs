//! The `utils` module provides the pieces shared by every other module of
//! `topicbus`: the crate-wide error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{MessagingError, Result};
