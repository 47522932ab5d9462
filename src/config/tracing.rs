use tracing_forest::ForestLayer;
use tracing_subscriber::{filter, prelude::*, EnvFilter};

/// Falls back to `info` for our code and the HTTP layer when `RUST_LOG` is unset.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ForestLayer::default())
        .with_http_tracing()
        .init();
}

pub trait HttpTracingExt: tracing::Subscriber {
    fn with_http_tracing(self) -> tracing_subscriber::layer::Layered<filter::Targets, Self>
    where
        Self: Sized,
    {
        self.with(
            filter::Targets::new()
                .with_target("tower_http", tracing::Level::INFO)
                .with_target("diesel_migrations", tracing::Level::WARN)
                .with_default(tracing::Level::TRACE),
        )
    }
}

impl<S: tracing::Subscriber> HttpTracingExt for S {}
