use axum::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::group::Group;
use crate::models::post::*;
use crate::models::user::User;
use crate::models::ModelError;
use crate::pagination::{Page, Paginator};
use crate::schema::{follows, groups, posts, users};

use super::{PgStore, Svc};

#[async_trait]
pub trait PostService<E = anyhow::Error>: Svc {
    async fn count_posts(&self, filter: &PostFilter) -> Result<i64, E>;
    /// Newest first.
    async fn list_posts(
        &self,
        filter: &PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<PostView>, E>;
    async fn get_post(&self, id: i32) -> Result<Option<PostView>, E>;
    async fn create_post(&self, post: &NewPost) -> Result<Post, E>;
    async fn update_post(&self, id: i32, changes: &PostChanges) -> Result<Post, E>;
    /// Comments go with the post.
    async fn delete_post(&self, id: i32) -> Result<bool, E>;
    async fn set_post_group(&self, id: i32, group_id: Option<i32>) -> Result<(), E>;
}

/// Count, resolve the requested page and load it.
pub async fn paginate_posts<S: PostService>(
    store: &S,
    filter: &PostFilter,
    raw_page: Option<&str>,
    per_page: i64,
) -> anyhow::Result<Page<PostView>> {
    let paginator = Paginator::new(store.count_posts(filter).await?, per_page);
    let number = paginator.get_page(raw_page);
    let items = store
        .list_posts(filter, paginator.offset(number), paginator.per_page())
        .await?;
    Ok(paginator.page(items, number))
}

pub(crate) fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// Works on any boxed query over `posts`, joined or not.
macro_rules! filter_posts {
    ($query:expr, $filter:expr) => {{
        let filter: &PostFilter = $filter;
        let mut query = $query;
        if let Some(g) = filter.group_id {
            query = query.filter(posts::group_id.eq(g));
        }
        if let Some(a) = filter.author_id {
            query = query.filter(posts::author_id.eq(a));
        }
        if let Some(u) = filter.followed_by {
            query = query.filter(
                posts::author_id.eq_any(
                    follows::table
                        .filter(follows::user_id.eq(u))
                        .select(follows::author_id),
                ),
            );
        }
        if let Some(needle) = &filter.text_contains {
            query = query.filter(posts::text.ilike(format!("%{}%", escape_like(needle))));
        }
        if let Some(since) = filter.created_since {
            query = query.filter(posts::created.ge(since));
        }
        query
    }};
}

#[async_trait]
impl PostService<anyhow::Error> for PgStore {
    async fn count_posts(&self, filter: &PostFilter) -> anyhow::Result<i64> {
        let mut conn = self.db.get().await?;
        let query = posts::table
            .select(diesel::dsl::count_star())
            .into_boxed();
        let n = filter_posts!(query, filter)
            .get_result::<i64>(&mut conn)
            .await?;
        Ok(n)
    }

    #[tracing::instrument(skip(self))]
    async fn list_posts(
        &self,
        filter: &PostFilter,
        offset: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<PostView>> {
        let mut conn = self.db.get().await?;
        let query = posts::table
            .inner_join(users::table)
            .left_join(groups::table)
            .select((
                Post::as_select(),
                User::as_select(),
                groups::all_columns.nullable(),
            ))
            .into_boxed();
        let rows: Vec<(Post, User, Option<Group>)> = filter_posts!(query, filter)
            .order((posts::created.desc(), posts::id.desc()))
            .offset(offset)
            .limit(limit)
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(PostView::from).collect())
    }

    async fn get_post(&self, post_id: i32) -> anyhow::Result<Option<PostView>> {
        let mut conn = self.db.get().await?;
        let row: Option<(Post, User, Option<Group>)> = posts::table
            .inner_join(users::table)
            .left_join(groups::table)
            .filter(posts::id.eq(post_id))
            .select((
                Post::as_select(),
                User::as_select(),
                groups::all_columns.nullable(),
            ))
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(PostView::from))
    }

    #[tracing::instrument(skip_all, fields(author_id = p.author_id))]
    async fn create_post(&self, p: &NewPost) -> anyhow::Result<Post> {
        let mut conn = self.db.get().await?;

        let post = diesel::insert_into(posts::table)
            .values(p)
            .returning(Post::as_returning())
            .get_result(&mut conn)
            .await?;

        Ok(post)
    }

    #[tracing::instrument(skip(self, changes))]
    async fn update_post(&self, post_id: i32, changes: &PostChanges) -> anyhow::Result<Post> {
        let mut conn = self.db.get().await?;
        let target = diesel::update(posts::table.find(post_id));
        let post = match &changes.image {
            ImageChange::Keep => {
                target
                    .set((posts::text.eq(&changes.text), posts::group_id.eq(changes.group_id)))
                    .returning(Post::as_returning())
                    .get_result(&mut conn)
                    .await
            }
            ImageChange::Clear => {
                target
                    .set((
                        posts::text.eq(&changes.text),
                        posts::group_id.eq(changes.group_id),
                        posts::image.eq(None::<String>),
                    ))
                    .returning(Post::as_returning())
                    .get_result(&mut conn)
                    .await
            }
            ImageChange::Replace(path) => {
                target
                    .set((
                        posts::text.eq(&changes.text),
                        posts::group_id.eq(changes.group_id),
                        posts::image.eq(Some(path.as_str())),
                    ))
                    .returning(Post::as_returning())
                    .get_result(&mut conn)
                    .await
            }
        }
        .optional()?;

        post.ok_or_else(|| ModelError::NotFound("post").into())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_post(&self, post_id: i32) -> anyhow::Result<bool> {
        let mut conn = self.db.get().await?;
        let deleted = diesel::delete(posts::table.find(post_id))
            .execute(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn set_post_group(&self, post_id: i32, new_group: Option<i32>) -> anyhow::Result<()> {
        let mut conn = self.db.get().await?;
        let updated = diesel::update(posts::table.find(post_id))
            .set(posts::group_id.eq(new_group))
            .execute(&mut conn)
            .await?;
        if updated == 0 {
            return Err(ModelError::NotFound("post").into());
        }
        Ok(())
    }
}
