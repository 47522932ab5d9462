use axum::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::comment::*;
use crate::models::user::User;
use crate::schema::{comments, users};

use super::{PgStore, Svc};

#[async_trait]
pub trait CommentService<E = anyhow::Error>: Svc {
    /// Comments under a post, newest first.
    async fn comments_for_post(&self, post_id: i32) -> Result<Vec<CommentView>, E>;
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, E>;
    async fn count_comments(&self) -> Result<i64, E>;
    async fn list_comments(&self, offset: i64, limit: i64) -> Result<Vec<CommentView>, E>;
}

#[async_trait]
impl CommentService<anyhow::Error> for PgStore {
    async fn comments_for_post(&self, post: i32) -> anyhow::Result<Vec<CommentView>> {
        let mut conn = self.db.get().await?;
        let rows: Vec<(Comment, User)> = comments::table
            .inner_join(users::table)
            .filter(comments::post_id.eq(post))
            .order((comments::created.desc(), comments::id.desc()))
            .select((Comment::as_select(), User::as_select()))
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    #[tracing::instrument(skip_all, fields(post_id = c.post_id, author_id = c.author_id))]
    async fn create_comment(&self, c: &NewComment) -> anyhow::Result<Comment> {
        let mut conn = self.db.get().await?;
        let comment = diesel::insert_into(comments::table)
            .values(c)
            .returning(Comment::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(comment)
    }

    async fn count_comments(&self) -> anyhow::Result<i64> {
        let mut conn = self.db.get().await?;
        let n = comments::table.count().get_result(&mut conn).await?;
        Ok(n)
    }

    async fn list_comments(&self, offset: i64, limit: i64) -> anyhow::Result<Vec<CommentView>> {
        let mut conn = self.db.get().await?;
        let rows: Vec<(Comment, User)> = comments::table
            .inner_join(users::table)
            .order((comments::created.desc(), comments::id.desc()))
            .offset(offset)
            .limit(limit)
            .select((Comment::as_select(), User::as_select()))
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(CommentView::from).collect())
    }
}
