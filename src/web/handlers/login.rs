use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{info, warn};

use crate::web::extract::{session_cookie, ClientAddr};
use crate::web::pages;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    token: String,
}

pub async fn login_form(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(pages::login_page(!state.auth.is_configured()))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientAddr(client): ClientAddr,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.auth.verify(&form.token) {
        warn!("Failed authentication from {}", client);
        return Redirect::to("/login").into_response();
    }

    let session_id = state.sessions.create();
    info!("Successfully authenticated from {}", client);

    (
        AppendHeaders([(header::SET_COOKIE, state.session_cookie(&session_id))]),
        Redirect::to("/"),
    )
        .into_response()
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Response {
    if let Some(session_id) = session_cookie(&headers, &state.cookie_name) {
        state.sessions.remove(&session_id);
    }

    (
        AppendHeaders([(header::SET_COOKIE, state.expired_cookie())]),
        Redirect::to("/login"),
    )
        .into_response()
}
