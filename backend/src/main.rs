use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use family_budget_backend::config::Config;
use family_budget_backend::rest::{self, AppState};
use family_budget_backend::storage::json::JsonConnection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!("Initializing JSON store in {}", config.data_dir.display());
    let connection = JsonConnection::new(&config.data_dir)?;

    let state = AppState::new(&connection, &config);
    let seeded = state.categories.seed_defaults()?;
    if seeded > 0 {
        info!("Seeded {} default categories", seeded);
    }

    // Credentialed CORS needs a concrete origin; the cookie carries the
    // session.
    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = Router::new()
        .nest("/api", rest::router())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
