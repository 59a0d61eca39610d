//! Small shared helpers

use chrono::Utc;

/// Current time as unix milliseconds.
///
/// All timestamps in the trade domain are i64 millis so they survive
/// JSON round-trips without precision games.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a new entity id (UUID v4, hyphenated)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn now_millis_is_positive() {
        assert!(now_millis() > 0);
    }
}
