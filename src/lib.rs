use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod service;
pub mod storage;
pub mod upload;

use crate::{
    config::Config,
    database::Database,
    handlers::{health, pages, users, AppState},
    service::UserService,
    storage::BlobStore,
};

/// Room on top of the file cap for the text fields and multipart framing,
/// wide enough that the intake's own size check fires before the transport
/// limit cuts the stream off.
const FORM_OVERHEAD: usize = 512 * 1024;

pub fn create_app(db: Database, blobs: BlobStore, config: Config) -> Router {
    let body_limit = config.max_file_size + FORM_OVERHEAD;
    let upload_dir = config.upload_dir.clone();

    let state = AppState {
        service: UserService::new(db, blobs),
        config,
        started_at: Instant::now(),
    };

    Router::new()
        .route("/", get(pages::index))
        .route("/users", get(pages::users))
        .route("/add", post(users::add_user))
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/health", get(health::health))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
