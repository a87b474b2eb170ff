use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timestamp {0} cannot be represented as a UTC date")]
    InvalidTimestamp(i64),

    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;
