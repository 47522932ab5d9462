pub mod tracing;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,
    /// Without it everything lives in memory and is gone on restart.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "defaults::db_pool_size")]
    pub db_pool_size: usize,
    /// Keys the session cookie; at least 64 bytes.
    pub secret_key: String,
    /// Posts per page.
    #[serde(default = "defaults::post_count")]
    pub post_count: i64,
    #[serde(default = "defaults::index_cache_seconds")]
    pub index_cache_seconds: u64,
    #[serde(default = "defaults::media_dir")]
    pub media_dir: String,
    #[serde(default = "defaults::static_dir")]
    pub static_dir: String,
    #[serde(default = "defaults::templates")]
    pub templates: String,
    #[serde(default)]
    pub template_autoreload: bool,
    /// Usernames allowed into /admin/.
    #[serde(default)]
    pub admin_users: Vec<String>,
}

mod defaults {
    pub fn bind_addr() -> String {
        "0.0.0.0:3000".into()
    }
    pub fn db_pool_size() -> usize {
        10
    }
    pub fn post_count() -> i64 {
        10
    }
    pub fn index_cache_seconds() -> u64 {
        20
    }
    pub fn media_dir() -> String {
        "media".into()
    }
    pub fn static_dir() -> String {
        "static".into()
    }
    pub fn templates() -> String {
        "src/templates/**/*".into()
    }
}

impl Settings {
    /// `appsettings.json`, overridden by `APP_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Json::file("appsettings.json"))
                .merge(Env::prefixed("APP_")),
        )
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let settings: Settings = figment.extract()?;
        Ok(settings)
    }

    pub fn is_admin(&self, username: &str) -> bool {
        self.admin_users.iter().any(|u| u == username)
    }
}
