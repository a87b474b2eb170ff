use serde::Serialize;

/// Sentinel expiration for entries that never expire.
pub const NEVER: i64 = 0;

/// One allow-list record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub ip: String,
    pub label: String,
    /// Unix timestamp in seconds, or [`NEVER`]
    pub expiration: i64,
}

impl Entry {
    pub fn is_permanent(&self) -> bool {
        self.expiration == NEVER
    }

    /// An entry is expired once `now` is strictly past its expiration.
    /// Permanent entries never expire.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiration > NEVER && self.expiration < now
    }
}
