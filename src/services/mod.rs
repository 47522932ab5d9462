pub mod comments;
pub mod follows;
pub mod groups;
pub mod memory;
pub mod posts;
pub mod users;

use diesel_async::pooled_connection::deadpool;
use diesel_async::AsyncPgConnection;

pub use comments::CommentService;
pub use follows::FollowService;
pub use groups::GroupService;
pub use memory::MemoryStore;
pub use posts::PostService;
pub use users::UserService;

pub type Pool = deadpool::Pool<AsyncPgConnection>;

/// Marker for services that can be shared as axum state.
pub trait Svc: Clone + Send + Sync + 'static {}

/// Everything the views need from storage.
pub trait Store:
    UserService + GroupService + PostService + CommentService + FollowService
{
}

impl<T> Store for T where
    T: UserService + GroupService + PostService + CommentService + FollowService
{
}

/// PostgreSQL-backed storage, one pooled connection per call.
#[derive(Clone)]
pub struct PgStore {
    db: Pool,
}

impl Svc for PgStore {}

impl PgStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

/// Map a unique-constraint violation to a domain error, pass everything else through.
pub(crate) fn unique_violation(
    err: diesel::result::Error,
    on_conflict: crate::models::ModelError,
) -> anyhow::Error {
    use diesel::result::{DatabaseErrorKind, Error};

    match err {
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => on_conflict.into(),
        other => other.into(),
    }
}
