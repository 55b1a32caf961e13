use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

const GATEWAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a transaction time reported by the gateway. RFC 3339 timestamps are accepted as is; bare
/// `YYYY-MM-DD HH:MM:SS` values are taken to be UTC.
pub fn parse_gateway_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, GATEWAY_TIME_FORMAT).map(|t| Utc.from_utc_datetime(&t)))
        .ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gateway_times() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 10, 15, 30).unwrap();
        assert_eq!(parse_gateway_time("2024-03-09 10:15:30"), Some(expected));
        assert_eq!(parse_gateway_time("2024-03-09T10:15:30Z"), Some(expected));
        assert_eq!(parse_gateway_time("2024-03-09T17:15:30+07:00"), Some(expected));
        assert_eq!(parse_gateway_time(""), None);
        assert_eq!(parse_gateway_time("yesterday"), None);
    }
}
