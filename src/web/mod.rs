//! Web administration interface
//!
//! Every page except `/login` and `/static` requires a session cookie
//! obtained by posting the shared access token.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthConfig;
use crate::config::HttpConfig;
use crate::Alohomora;

pub mod extract;
pub mod handlers;
pub mod pages;
pub mod state;

pub use state::AppState;

/// Build the router for the administration interface
pub fn router(state: Arc<AppState>, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/", get(handlers::entries::index))
        .route(
            "/login",
            get(handlers::login::login_form).post(handlers::login::login),
        )
        .route("/logout", get(handlers::login::logout))
        .route("/add", post(handlers::entries::add))
        .route("/delete/{id}", get(handlers::entries::delete))
        .route("/allow.conf", get(handlers::conf::allow_conf))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the interface until `shutdown` resolves
pub async fn serve<F>(
    http: &HttpConfig,
    app: Arc<Alohomora>,
    auth: AuthConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = http
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address '{}': {}", http.listen, e))?;

    let state = Arc::new(AppState::new(app, auth, http));
    let router = router(state, &http.static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web interface listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("Web interface stopped");
    Ok(())
}
