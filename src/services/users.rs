use axum::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::user::*;
use crate::models::ModelError;
use crate::schema;

use super::{unique_violation, PgStore, Svc};

#[async_trait]
pub trait UserService<E = anyhow::Error>: Svc {
    async fn get_user(&self, id: i32) -> Result<Option<User>, E>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, E>;
    async fn create_user(&self, user: &NewUser) -> Result<User, E>;
    async fn set_password_hash(&self, id: i32, hash: &str) -> Result<(), E>;
}

#[async_trait]
impl UserService<anyhow::Error> for PgStore {
    async fn get_user(&self, user_id: i32) -> anyhow::Result<Option<User>> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;
        let user = users
            .find(user_id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn get_user_by_username(&self, name: &str) -> anyhow::Result<Option<User>> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;
        let user = users
            .filter(username.eq(name))
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    #[tracing::instrument(skip_all, fields(username = %u.username))]
    async fn create_user(&self, u: &NewUser) -> anyhow::Result<User> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;

        let user = diesel::insert_into(users)
            .values(u)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| unique_violation(e, ModelError::UsernameTaken))?;

        Ok(user)
    }

    async fn set_password_hash(&self, user_id: i32, hash: &str) -> anyhow::Result<()> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;
        let updated = diesel::update(users.find(user_id))
            .set(password_hash.eq(hash))
            .execute(&mut conn)
            .await?;
        if updated == 0 {
            return Err(ModelError::NotFound("user").into());
        }
        Ok(())
    }
}
