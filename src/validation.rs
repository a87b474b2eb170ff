//! Input checks applied before anything reaches the store.
//!
//! The store trusts its callers, so every entry point (HTTP form, CLI)
//! runs operator input through these helpers first.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static IPV4_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}$").expect("static regex"));

static LABEL_REJECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.,# '-]+").expect("static regex"));

/// Dotted-quad syntax check. Octet ranges are not verified.
pub fn is_ipv4_shape(ip: &str) -> bool {
    IPV4_SHAPE.is_match(ip)
}

/// Return the address unchanged if it has dotted-quad shape
pub fn validate_ip(ip: &str) -> Result<&str> {
    if is_ipv4_shape(ip) {
        Ok(ip)
    } else {
        Err(Error::InvalidAddress(ip.to_string()))
    }
}

/// Drop every character outside letters, digits, space and `_ . , # ' -`
pub fn sanitize_label(label: &str) -> String {
    LABEL_REJECTED.replace_all(label, "").into_owned()
}
