mod auth;
mod config;
mod error;
mod forms;
mod helpers;
mod media;
mod middleware;
mod models;
mod pagination;
mod routes;
mod schema;
mod services;
mod state;
mod templates;

use anyhow::anyhow;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::*;

use config::Settings;
use services::{MemoryStore, PgStore, Store};
use state::AppState;
use templates::Templates;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    config::tracing::init();

    let templates = Templates::load(&settings.templates)?;
    // keeps watching for as long as it is alive
    let _watcher = if settings.template_autoreload {
        Some(templates.watch(&settings.templates)?)
    } else {
        None
    };
    tokio::fs::create_dir_all(&settings.media_dir).await?;

    match settings.database_url.clone() {
        Some(url) => {
            run_migrations(&url).await?;

            let mgr = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&url);
            info!(size = settings.db_pool_size, "Starting DB pool");
            let pool = Pool::builder(mgr)
                .max_size(settings.db_pool_size)
                .build()?;
            serve(PgStore::new(pool), templates, settings).await
        }
        None => {
            warn!("no database_url configured, data is kept in memory");
            serve(MemoryStore::new(), templates, settings).await
        }
    }
}

async fn run_migrations(url: &str) -> anyhow::Result<()> {
    let url = url.to_owned();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        use diesel::Connection;

        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&url)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("migrations failed: {e}"))?;
        for version in applied {
            info!(%version, "migration applied");
        }
        Ok(())
    })
    .await?
}

async fn serve<S: Store>(store: S, templates: Templates, settings: Settings) -> anyhow::Result<()> {
    let addr = settings.bind_addr.clone();
    let app = routes::app(AppState::new(store, templates, settings)?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("starting listening at {}", addr);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
