use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::response::Html;
use notify::{RecursiveMode, Watcher};
use tera::{Context, Tera};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::AppError;

#[derive(Clone)]
pub struct Templates {
    tera: Arc<RwLock<Tera>>,
}

impl Templates {
    pub fn load(glob: &str) -> anyhow::Result<Self> {
        let tera = Tera::new(glob)?;
        info!(count = tera.get_template_names().count(), "templates loaded");
        Ok(Self {
            tera: Arc::new(RwLock::new(tera)),
        })
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn render(&self, name: &str, ctx: &Context) -> Result<Html<String>, AppError> {
        let html = self.tera.read().await.render(name, ctx)?;
        Ok(Html(html))
    }

    pub async fn reload(&self) -> anyhow::Result<()> {
        self.tera.write().await.full_reload()?;
        Ok(())
    }

    /// Reload every template whenever something under the glob's directory changes.
    /// The returned watcher stops watching when dropped.
    pub fn watch(&self, glob: &str) -> anyhow::Result<notify::RecommendedWatcher> {
        let dir = glob_root(glob);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = tx.send(());
            }
        })?;
        watcher.watch(&dir, RecursiveMode::Recursive)?;

        let templates = self.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                match templates.reload().await {
                    Ok(()) => info!("templates reloaded"),
                    Err(e) => error!(%e, "template reload failed"),
                }
            }
        });
        info!(dir = %dir.display(), "watching templates");
        Ok(watcher)
    }
}

/// The static directory prefix of a glob such as `src/templates/**/*`.
fn glob_root(glob: &str) -> PathBuf {
    let cut = glob.find(['*', '?', '[']).unwrap_or(glob.len());
    let prefix = &glob[..cut];
    let root = if prefix.ends_with('/') {
        Path::new(prefix)
    } else {
        Path::new(prefix).parent().unwrap_or(Path::new("."))
    };
    if root.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        root.to_path_buf()
    }
}
