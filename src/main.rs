pub mod admin;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod err;
pub mod guard;
pub mod models;
pub mod password;
pub mod token;

use axum::handler::Handler;
use axum::{routing::get, routing::post, Extension, Json, Router};

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::err::Error;
use crate::token::Tokens;

pub type Payload<T> = Result<Json<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(value))
}

pub fn app(pg: PgPool, tokens: Tokens) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(auth::register_student))
        .route("/auth/login", post(auth::login_student))
        .route("/admin/students", get(admin::list_students))
        .route("/admin/attendance", get(admin::list_attendance))
        .route("/admin/attendance/:student_id", get(admin::student_attendance))
        .fallback(err::handler404.into_service())
        .layer(Extension(pg))
        .layer(Extension(tokens))
        .layer(cors)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let pg = db::connect(&config).await?;
    db::prepare_db(&pg).await?;
    let tokens = Tokens::new(config.secret_key.as_bytes(), config.token_ttl);

    log::info!("Starting Attendance Tracker HTTP Server on http://{}", config.addr);
    axum::Server::bind(&config.addr)
        .serve(app(pg, tokens).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                log::error!("Failed to install terminate handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to Attendance Tracker API" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
