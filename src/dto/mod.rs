use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod dartboard;
pub mod events;
pub mod game;
pub mod health;
pub mod lobby;
pub mod player;
pub mod validation;
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Current time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    format_system_time(SystemTime::now())
}
