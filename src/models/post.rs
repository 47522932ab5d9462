use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use super::{group::Group, user::User};

/// How many characters of the text a post displays as.
pub const DISPLAY_LEN: usize = 15;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPost {
    pub text: String,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// Editable fields of a post.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: ImageChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(String),
}

#[derive(Serialize, Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
    pub created: DateTime<Utc>,
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short: String = self.text.chars().take(DISPLAY_LEN).collect();
        f.write_str(&short)
    }
}

/// A post together with its author and group, the shape every listing renders.
#[derive(Serialize, Debug, Clone)]
pub struct PostView {
    pub id: i32,
    pub text: String,
    pub image: Option<String>,
    pub created: DateTime<Utc>,
    pub author: User,
    pub group: Option<Group>,
}

impl From<(Post, User, Option<Group>)> for PostView {
    fn from((post, author, group): (Post, User, Option<Group>)) -> Self {
        Self {
            id: post.id,
            text: post.text,
            image: post.image,
            created: post.created,
            author,
            group,
        }
    }
}

/// Conditions narrowing a post listing. Every set field must hold.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub group_id: Option<i32>,
    pub author_id: Option<i32>,
    /// only posts by authors this user follows
    pub followed_by: Option<i32>,
    pub text_contains: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
}

impl PostFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn group(group_id: i32) -> Self {
        Self {
            group_id: Some(group_id),
            ..Self::default()
        }
    }

    pub fn author(author_id: i32) -> Self {
        Self {
            author_id: Some(author_id),
            ..Self::default()
        }
    }

    pub fn followed_by(user_id: i32) -> Self {
        Self {
            followed_by: Some(user_id),
            ..Self::default()
        }
    }
}
