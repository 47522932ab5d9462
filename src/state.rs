use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use moka::future::Cache;

use crate::config::Settings;
use crate::templates::Templates;

/// Rendered index pages by requested page number and viewer id.
pub type IndexCache = Cache<(i64, Option<i32>), String>;

#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub templates: Templates,
    pub settings: Arc<Settings>,
    pub cookie_key: Key,
    pub index_cache: IndexCache,
}

impl<S> AppState<S> {
    pub fn new(store: S, templates: Templates, settings: Settings) -> anyhow::Result<Self> {
        let cookie_key = Key::try_from(settings.secret_key.as_bytes())
            .map_err(|e| anyhow::anyhow!("secret_key: {e}"))?;
        let index_cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(Duration::from_secs(settings.index_cache_seconds))
            .build();
        Ok(Self {
            store,
            templates,
            settings: Arc::new(settings),
            cookie_key,
            index_cache,
        })
    }
}

impl<S> FromRef<AppState<S>> for Key {
    fn from_ref(state: &AppState<S>) -> Self {
        state.cookie_key.clone()
    }
}
