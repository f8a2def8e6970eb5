//! Keyward API Server
//!
//! REST API server for credential registration and bearer-token sessions.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use keyward_api::{create_router, state::AppState};
use keyward_core::{
    AppConfig, IdentityRepository, InMemoryIdentityRepository, LoggingConfig,
    PgIdentityRepository,
};
use std::sync::Arc;

/// Optional path to a TOML configuration file
const CONFIG_PATH_ENV: &str = "KEYWARD_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    config.validate()?;

    let repository = build_repository(&config).await?;
    let addr = config.server.bind_address();

    // Create application state
    let state = Arc::new(AppState::new(config, repository)?);

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Keyward API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("keyward_api={0},keyward_core={0},tower_http=debug", logging.level).into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn IdentityRepository>> {
    match config.database.url.as_deref() {
        Some(url) => {
            let repository = PgIdentityRepository::connect(url, config.database.pool_size)
                .await
                .context("Failed to connect to database")?;
            repository
                .ensure_schema()
                .await
                .context("Failed to prepare identity schema")?;
            tracing::info!("Using PostgreSQL identity store");
            Ok(Arc::new(repository))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, identities are kept in memory only");
            Ok(Arc::new(InMemoryIdentityRepository::new()))
        }
    }
}
