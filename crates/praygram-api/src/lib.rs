pub mod auth;
pub mod error;
pub mod groups;
pub mod middleware;
pub mod prayers;
pub mod reactions;

use tracing::warn;

/// Parse a SQLite timestamp column. SQLite's datetime('now') stores
/// "YYYY-MM-DD HH:MM:SS" without timezone; rows written elsewhere may carry
/// RFC 3339. Corrupt values are logged and defaulted rather than failing the
/// whole response.
pub(crate) fn parse_timestamp(raw: &str, context: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            chrono::DateTime::default()
        })
}
