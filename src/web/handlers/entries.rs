use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, Redirect};
use axum::Form;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::duration;
use crate::validation::{sanitize_label, validate_ip};
use crate::web::extract::{Authenticated, ClientAddr, WebError};
use crate::web::pages;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddForm {
    #[serde(default)]
    ip: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    expiration: String,
}

pub async fn index(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    ClientAddr(client): ClientAddr,
) -> Result<Html<String>, WebError> {
    let entries = state.app.list()?;
    let page = pages::index_page(&entries, &client, Utc::now().timestamp())?;
    Ok(Html(page))
}

pub async fn add(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Form(form): Form<AddForm>,
) -> Result<Redirect, WebError> {
    let ip = form.ip.trim();
    let ip = match validate_ip(ip) {
        Ok(ip) => ip,
        Err(e) => {
            warn!("Rejected add request: {}", e);
            return Ok(Redirect::to("/"));
        }
    };

    let label = sanitize_label(&form.label);
    let expiration = duration::parse_now(&form.expiration);
    state.app.add(ip, &label, expiration)?;

    Ok(Redirect::to("/"))
}

pub async fn delete(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Redirect, WebError> {
    state.app.remove(id)?;
    Ok(Redirect::to("/"))
}
