use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::web::extract::{Authenticated, WebError};
use crate::web::state::AppState;

/// Current fragment text; `?dl` asks the browser to save it
pub async fn allow_conf(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, WebError> {
    let body = state.app.render()?;

    let response = if params.contains_key("dl") {
        (
            [
                (header::CONTENT_TYPE, "application/force-download"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"allow.conf\""),
            ],
            body,
        )
            .into_response()
    } else {
        (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    };

    Ok(response)
}
