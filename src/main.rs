use axum::{
    Router,
    routing::{get, post, delete},
    middleware::from_fn_with_state,
    extract::DefaultBodyLimit,
};

use http::{Method, header, HeaderValue};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
    cors::CorsLayer,
};

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod state;
mod db;
mod gateway;

mod models {
    pub mod user;
    pub mod session;
    pub mod chat;
    pub mod message;
    pub mod memory;
}

mod repositories {
    pub mod user;
    pub mod session;
    pub mod chat;
    pub mod message;
    pub mod memory;
}

mod services {
    pub mod auth;
    pub mod chat;
    pub mod responder;
}

mod handlers {
    pub mod auth;
    pub mod chats;
    pub mod memories;
    pub mod webhook;
    pub mod health;
}

mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

mod validation {
    pub mod auth;
    pub mod markdown;
}

mod ws {
    pub mod broker;
    pub mod connection;
    pub mod events;
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let state = AppState::new(&config).await?;
    tracing::info!("AppState initialized");

    let allowed_origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400));

    let auth_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(10)
            .use_headers()
            .finish()
            .unwrap(),
    );

    let protected_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10_000)
            .burst_size(50_000)
            .use_headers()
            .finish()
            .unwrap(),
    );

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/messages", post(handlers::webhook::handle_webhook))
        .route("/ws", get(ws::connection::ws_handler))
        .with_state(state.clone());

    let signup_routes = Router::new()
        .route("/api/auth/signup", post(handlers::auth::signup))
        .layer(tower_governor::GovernorLayer::new(auth_governor_conf.clone()))
        .with_state(state.clone());

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(tower_governor::GovernorLayer::new(auth_governor_conf.clone()))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/api/auth/session/device",
            delete(handlers::auth::sign_out_device),
        )
        .route("/chats", get(handlers::chats::list_chats))
        .route("/chats", post(handlers::chats::create_chat))
        .route("/chats/{chat_id}", get(handlers::chats::get_chat))
        .route(
            "/chats/{chat_id}/messages",
            get(handlers::chats::get_chat_messages),
        )
        .route(
            "/chats/{chat_id}/messages",
            post(handlers::chats::create_chat_message),
        )
        .route(
            "/chats/{chat_id}/memories",
            get(handlers::memories::list_memories),
        )
        .route(
            "/chats/{chat_id}/memories",
            post(handlers::memories::create_memory),
        )
        .route(
            "/chats/{chat_id}/memories/{memory_id}",
            delete(handlers::memories::delete_memory),
        )
        .layer(tower_governor::GovernorLayer::new(
            protected_governor_conf.clone(),
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(signup_routes)
        .merge(login_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors);

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            match repositories::session::delete_expired(&cleanup_state.db).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "expired sessions cleaned up");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Session cleanup failed: {}", e);
                }
            }
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 8000));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
