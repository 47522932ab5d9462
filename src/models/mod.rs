pub mod comment;
pub mod follow;
pub mod group;
pub mod post;
pub mod user;

use thiserror::Error;

/// Rejections raised by the storage layer that callers are expected to handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("A user with that username already exists.")]
    UsernameTaken,

    #[error("A group with that slug already exists.")]
    SlugTaken,

    #[error("You cannot follow yourself.")]
    SelfFollow,

    #[error("{0} not found")]
    NotFound(&'static str),
}
