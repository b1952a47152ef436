//! Human-readable formatting helpers

use chrono::{DateTime, Utc};

/// Compact age such as `42s`, `5m`, `3h` or `2d`.
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}

pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(5), now), "5s");
        assert_eq!(format_age(now - Duration::minutes(7), now), "7m");
        assert_eq!(format_age(now - Duration::hours(3), now), "3h");
        assert_eq!(format_age(now - Duration::days(2), now), "2d");
        assert_eq!(format_age(now + Duration::seconds(30), now), "0s");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some(42)), "42");
        assert_eq!(or_dash(None::<u32>), "-");
    }
}
