mod cache;
mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod testutil;
mod ws;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use std::panic;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cache::RoomCache;
use config::Config;
use db::{PgRoomRegistry, RoomRegistry};
use docs::ApiDoc;
use routes::create_api_routes;
use ws::{groups::RoomGroups, presence_index::PresenceIndex};

/// Shared handles every request handler and realtime session works with.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn RoomRegistry>,
    pub cache: RoomCache,
    pub groups: Arc<RoomGroups>,
    pub presence: Arc<PresenceIndex>,
}

fn cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "roomsync=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    config::init_config(config.clone());

    if config.auth_jwt_secret.is_none() {
        warn!("No JWT secret configured - every handshake will be rejected");
    }

    // The durable registry is not optional: without it there are no rooms,
    // no memberships and no identities to authenticate against.
    let Some(db_url) = &config.db_url else {
        error!("No database URL configured");
        std::process::exit(1);
    };
    let registry: Arc<dyn RoomRegistry> = match PgRoomRegistry::connect(db_url).await {
        Ok(registry) => {
            info!("Database initialized successfully");
            Arc::new(registry)
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState {
        registry,
        cache: RoomCache::new(),
        groups: Arc::new(RoomGroups::new()),
        presence: Arc::new(PresenceIndex::new()),
    };

    // Combine all routes
    let app = Router::new()
        // Mount API routes
        .nest("/api", create_api_routes())
        // Realtime endpoint; authenticates at the handshake
        .route("/ws", get(ws::handler::ws_handler))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("Server running on http://{}", config.server_address());
    info!("Realtime endpoint at ws://{}/ws", config.server_address());
    info!(
        "Swagger UI available at http://{}/swagger",
        config.server_address()
    );

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
