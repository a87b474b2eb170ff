//! Duration phrases typed by the operator ("3 hours", "1 week", "forever")
//! turned into absolute expiration timestamps.
//!
//! Anything without a recognized unit keyword resolves to `now`, so the
//! resulting entry expires on the next sweep instead of being rejected.

use crate::models::NEVER;

pub const HOUR: i64 = 3600;
pub const DAY: i64 = 86_400;
pub const WEEK: i64 = 604_800;

/// Latest expiration the renderer can print with a four digit year
/// (9999-12-31 23:59:59 UTC).
pub const MAX_EXPIRATION: i64 = 253_402_300_799;

/// Parse a duration phrase relative to `now` (Unix seconds).
///
/// Returns [`NEVER`] when the whole phrase is `forever` (any case),
/// `now + n * unit` for phrases containing `hour`, `day` or `week`, and
/// `now` for anything else. `n` is built from every digit in the phrase;
/// a phrase without digits counts as zero.
pub fn parse(text: &str, now: i64) -> i64 {
    let lower = text.to_lowercase();

    // Exact match only: "not forever" or " forever" are not permanent
    if lower == "forever" {
        return NEVER;
    }

    let unit = if lower.contains("hour") {
        HOUR
    } else if lower.contains("day") {
        DAY
    } else if lower.contains("week") {
        WEEK
    } else {
        return now;
    };

    let amount = extract_number(text);
    let expiration = amount.saturating_mul(unit).saturating_add(now);
    expiration.min(MAX_EXPIRATION)
}

/// Parse a duration phrase relative to the current time
pub fn parse_now(text: &str) -> i64 {
    parse(text, chrono::Utc::now().timestamp())
}

/// Concatenate all ASCII digits in `text` into one number.
/// Saturates instead of overflowing on absurdly long input.
fn extract_number(text: &str) -> i64 {
    text.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i64::from(digit))
        })
}
