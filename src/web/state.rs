use std::sync::Arc;

use crate::auth::{AuthConfig, SessionStore};
use crate::config::HttpConfig;
use crate::Alohomora;

pub struct AppState {
    pub app: Arc<Alohomora>,
    pub auth: AuthConfig,
    pub sessions: SessionStore,
    pub cookie_name: String,
}

impl AppState {
    pub fn new(app: Arc<Alohomora>, auth: AuthConfig, http: &HttpConfig) -> Self {
        Self {
            app,
            auth,
            sessions: SessionStore::new(http.session_ttl()),
            cookie_name: http.cookie_name.clone(),
        }
    }

    /// `Set-Cookie` value carrying a session id
    pub fn session_cookie(&self, session_id: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict",
            self.cookie_name, session_id
        )
    }

    /// `Set-Cookie` value that clears the session cookie
    pub fn expired_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
            self.cookie_name
        )
    }
}
