use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds.
///
/// The store persists timestamps with microsecond precision, so values taken
/// from here compare equal after a round trip through the database.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
