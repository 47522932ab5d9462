use axum::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::group::*;
use crate::models::ModelError;
use crate::schema;

use super::{unique_violation, PgStore, Svc};

#[async_trait]
pub trait GroupService<E = anyhow::Error>: Svc {
    async fn get_group(&self, id: i32) -> Result<Option<Group>, E>;
    async fn get_group_by_slug(&self, slug: &str) -> Result<Option<Group>, E>;
    /// All groups ordered by title.
    async fn list_groups(&self) -> Result<Vec<Group>, E>;
    async fn create_group(&self, group: &NewGroup) -> Result<Group, E>;
}

#[async_trait]
impl GroupService<anyhow::Error> for PgStore {
    async fn get_group(&self, group_id: i32) -> anyhow::Result<Option<Group>> {
        use schema::groups::dsl::*;

        let mut conn = self.db.get().await?;
        let group = groups
            .find(group_id)
            .select(Group::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(group)
    }

    async fn get_group_by_slug(&self, s: &str) -> anyhow::Result<Option<Group>> {
        use schema::groups::dsl::*;

        let mut conn = self.db.get().await?;
        let group = groups
            .filter(slug.eq(s))
            .select(Group::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(group)
    }

    async fn list_groups(&self) -> anyhow::Result<Vec<Group>> {
        use schema::groups::dsl::*;

        let mut conn = self.db.get().await?;
        let gs = groups
            .order((title.asc(), id.asc()))
            .select(Group::as_select())
            .load(&mut conn)
            .await?;
        Ok(gs)
    }

    #[tracing::instrument(skip_all, fields(slug = %g.slug))]
    async fn create_group(&self, g: &NewGroup) -> anyhow::Result<Group> {
        use schema::groups::dsl::*;

        let mut conn = self.db.get().await?;
        let group = diesel::insert_into(groups)
            .values(g)
            .returning(Group::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| unique_violation(e, ModelError::SlugTaken))?;
        Ok(group)
    }
}
