use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use praygram_api::auth::{self, AppState, AppStateInner};
use praygram_api::groups;
use praygram_api::middleware::require_auth;
use praygram_api::prayers;
use praygram_api::reactions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "praygram=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PRAYGRAM_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PRAYGRAM_DB_PATH").unwrap_or_else(|_| "praygram.db".into());
    let host = std::env::var("PRAYGRAM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PRAYGRAM_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = praygram_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/groups", post(groups::create_group).get(groups::list_groups))
        .route("/groups/join", post(groups::join_group))
        .route("/groups/invite", post(groups::join_by_invite))
        .route("/groups/{group_id}", get(groups::get_group))
        .route("/prayers", post(prayers::create_prayer).get(prayers::list_prayers))
        .route(
            "/prayers/{prayer_id}",
            get(prayers::get_prayer)
                .put(prayers::update_prayer)
                .delete(prayers::delete_prayer),
        )
        .route(
            "/reactions",
            post(reactions::add_reaction).delete(reactions::remove_reaction),
        )
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Praygram server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
