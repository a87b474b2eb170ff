//! Shared-secret authentication and server-side sessions.
//!
//! The secret comes from `ALOHOMORA_TOKEN`, read once at startup and passed
//! around as an [`AuthConfig`] value. Without it no login can succeed.

use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

pub const TOKEN_ENV: &str = "ALOHOMORA_TOKEN";

/// Process-wide shared secret
#[derive(Clone, Default)]
pub struct AuthConfig {
    token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl AuthConfig {
    /// Build from an explicit value; empty strings count as unset
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Read the secret from the process environment
    pub fn from_env() -> Self {
        Self::new(std::env::var(TOKEN_ENV).ok())
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Compare a candidate against the secret in constant time.
    /// Always false when no secret is configured.
    pub fn verify(&self, candidate: &str) -> bool {
        match &self.token {
            Some(token) => bool::from(token.as_bytes().ct_eq(candidate.as_bytes())),
            None => false,
        }
    }
}

struct SessionInfo {
    created_at: Instant,
}

/// In-memory session store keyed by random 64-char hex ids
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionInfo>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a new session and return its id
    pub fn create(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes);
        let id = hex::encode(bytes);

        let mut sessions = self.sessions.write();
        sessions.retain(|_, info| info.created_at.elapsed() < self.ttl);
        sessions.insert(
            id.clone(),
            SessionInfo {
                created_at: Instant::now(),
            },
        );

        id
    }

    /// Check that a session exists and has not outlived the TTL
    pub fn validate(&self, id: &str) -> bool {
        let valid = self
            .sessions
            .read()
            .get(id)
            .map(|info| info.created_at.elapsed() < self.ttl);

        match valid {
            Some(true) => true,
            Some(false) => {
                self.remove(id);
                false
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) {
        self.sessions.write().remove(id);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
