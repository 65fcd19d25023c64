mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use companion_api::auth::AuthConfig;
use companion_api::{AppState, AppStateInner};
use companion_llm::{CannedClient, ReplicateClient, ReplicateConfig, SharedInference};

use crate::config::{Config, LlmProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "companion=debug,companion_api=debug,companion_db=info,companion_llm=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {:#}", e);
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = companion_db::Database::open(&config.db_path)?;
    info!("Database ready at {}", config.db_path.display());

    let llm: SharedInference = match &config.llm {
        LlmProvider::Replicate {
            api_key,
            model,
            base_url,
        } => {
            info!("Using Replicate model {}", model);
            Arc::new(ReplicateClient::new(
                ReplicateConfig::new(api_key.clone())
                    .with_model(model.clone())
                    .with_base_url(base_url.clone()),
            ))
        }
        LlmProvider::Canned => {
            info!("Using canned replies");
            Arc::new(CannedClient)
        }
    };

    let mut auth = AuthConfig::new(config.jwt_secret.clone());
    auth.issuer = config.jwt_issuer.clone();

    let state: AppState = Arc::new(AppStateInner {
        db,
        auth,
        llm,
        retry: config.retry,
        history_limit: config.history_limit,
    });

    let app = companion_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Companion server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
