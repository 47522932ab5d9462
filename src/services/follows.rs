use std::collections::HashMap;

use axum::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::follow::*;
use crate::models::user::User;
use crate::models::ModelError;
use crate::schema::{follows, users};

use super::{PgStore, Svc};

#[async_trait]
pub trait FollowService<E = anyhow::Error>: Svc {
    async fn is_following(&self, user_id: i32, author_id: i32) -> Result<bool, E>;
    /// Returns whether a new subscription was created. Following yourself is an error.
    async fn follow(&self, user_id: i32, author_id: i32) -> Result<bool, E>;
    /// Returns whether a subscription was removed.
    async fn unfollow(&self, user_id: i32, author_id: i32) -> Result<bool, E>;
    async fn follow_stats(&self, user_id: i32) -> Result<FollowStats, E>;
    async fn count_follows(&self) -> Result<i64, E>;
    async fn list_follows(&self, offset: i64, limit: i64) -> Result<Vec<FollowView>, E>;
}

#[async_trait]
impl FollowService<anyhow::Error> for PgStore {
    async fn is_following(&self, user: i32, author: i32) -> anyhow::Result<bool> {
        let mut conn = self.db.get().await?;
        let found = diesel::select(diesel::dsl::exists(
            follows::table
                .filter(follows::user_id.eq(user))
                .filter(follows::author_id.eq(author)),
        ))
        .get_result(&mut conn)
        .await?;
        Ok(found)
    }

    #[tracing::instrument(skip(self))]
    async fn follow(&self, user: i32, author: i32) -> anyhow::Result<bool> {
        if user == author {
            return Err(ModelError::SelfFollow.into());
        }
        let mut conn = self.db.get().await?;
        let inserted = diesel::insert_into(follows::table)
            .values(NewFollow {
                user_id: user,
                author_id: author,
            })
            .on_conflict((follows::user_id, follows::author_id))
            .do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn unfollow(&self, user: i32, author: i32) -> anyhow::Result<bool> {
        let mut conn = self.db.get().await?;
        let deleted = diesel::delete(
            follows::table
                .filter(follows::user_id.eq(user))
                .filter(follows::author_id.eq(author)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted > 0)
    }

    async fn follow_stats(&self, user: i32) -> anyhow::Result<FollowStats> {
        let mut conn = self.db.get().await?;
        let followers = follows::table
            .filter(follows::author_id.eq(user))
            .count()
            .get_result(&mut conn)
            .await?;
        let following = follows::table
            .filter(follows::user_id.eq(user))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(FollowStats {
            followers,
            following,
        })
    }

    async fn count_follows(&self) -> anyhow::Result<i64> {
        let mut conn = self.db.get().await?;
        let n = follows::table.count().get_result(&mut conn).await?;
        Ok(n)
    }

    async fn list_follows(&self, offset: i64, limit: i64) -> anyhow::Result<Vec<FollowView>> {
        let mut conn = self.db.get().await?;
        let rows: Vec<Follow> = follows::table
            .order(follows::id.desc())
            .offset(offset)
            .limit(limit)
            .select(Follow::as_select())
            .load(&mut conn)
            .await?;

        // both ends point at users, resolve them in one query
        let ids: Vec<i32> = rows
            .iter()
            .flat_map(|f| [f.user_id, f.author_id])
            .collect();
        let people: HashMap<i32, User> = users::table
            .filter(users::id.eq_any(ids))
            .select(User::as_select())
            .load(&mut conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let views = rows
            .into_iter()
            .filter_map(|f| {
                Some(FollowView {
                    id: f.id,
                    user: people.get(&f.user_id)?.clone(),
                    author: people.get(&f.author_id)?.clone(),
                })
            })
            .collect();
        Ok(views)
    }
}
