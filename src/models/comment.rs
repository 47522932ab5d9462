use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use super::user::User;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone)]
pub struct CommentView {
    pub id: i32,
    pub post_id: i32,
    pub text: String,
    pub created: DateTime<Utc>,
    pub author: User,
}

impl From<(Comment, User)> for CommentView {
    fn from((comment, author): (Comment, User)) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            text: comment.text,
            created: comment.created,
            author,
        }
    }
}
