//! Account, session and todo backend over a single-item key-value store.

pub mod authentication;
pub mod config;
pub mod crud_ops;
pub mod entities;
pub mod error;
pub mod store;

use axum::{
    extract::{Extension, Request},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::Span;

pub use authentication::SessionManager;
pub use config::Settings;
pub use crud_ops::TodoRepository;
pub use error::{Error, Result, StoreError};
pub use store::{SqliteStore, Store};

/// Components shared by every request. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub todos: TodoRepository,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, settings: &config::BackendSettings) -> Self {
        let sessions = SessionManager::new(store.clone(), &settings.user_table_name);
        let todos = TodoRepository::new(store, &settings.todo_table_name, sessions.clone());
        Self { sessions, todos }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/register", post(authentication::sign_up))
        .route("/login", post(authentication::sign_in))
        .route("/logout", post(authentication::sign_out))
        .route("/todo", post(crud_ops::create_todo))
        .route("/todo/{id}", get(crud_ops::get_todo))
        .layer(Extension(state.sessions))
        .layer(Extension(state.todos))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CatchPanicLayer::new())
}

// the query string carries session tokens, so only the path is recorded
fn request_span(request: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = request.uri().path(),
    )
}

pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_api=info,tower_http=info".into()),
        )
        .init();
}
