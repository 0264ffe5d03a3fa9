use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Epoch values at or above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 100_000_000_000;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Coerces a JSON value into a UTC timestamp.
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DD[ T]HH:MM[:SS]` strings (read
/// as UTC), bare dates (midnight UTC) and numeric epoch values in seconds or
/// milliseconds.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_datetime_str(text.trim()),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64))
            .and_then(from_epoch),
        _ => None,
    }
}

fn parse_datetime_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() < EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp(value, 0)
    } else {
        DateTime::from_timestamp_millis(value)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_datetime;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn parses_supported_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_datetime(&json!("2024-03-01T12:30:00Z")), Some(expected));
        assert_eq!(parse_datetime(&json!("2024-03-01T14:30:00+02:00")), Some(expected));
        assert_eq!(parse_datetime(&json!("2024-03-01 12:30:00")), Some(expected));
        assert_eq!(parse_datetime(&json!(expected.timestamp())), Some(expected));
        assert_eq!(
            parse_datetime(&json!(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(
            parse_datetime(&json!("2024-03-01")),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_datetime(&json!("yesterday")), None);
        assert_eq!(parse_datetime(&json!(true)), None);
    }

    #[test]
    fn out_of_range_epochs_are_rejected() {
        assert_eq!(parse_datetime(&json!(i64::MIN)), None);
        assert_eq!(parse_datetime(&json!(i64::MAX)), None);
        assert_eq!(parse_datetime(&json!(-1e30)), None);
        assert_eq!(parse_datetime(&json!(u64::MAX)), None);
        assert_eq!(
            parse_datetime(&json!(-86_400)),
            Some(Utc.with_ymd_and_hms(1969, 12, 31, 0, 0, 0).unwrap())
        );
    }
}
