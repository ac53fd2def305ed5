//! Type inference for string-shaped leaves.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::value::Value;

const DATE_ONLY: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATE_TIME: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a string into the most specific value it spells.
///
/// Order: integer, float, boolean, date, quantity. Anything else stays a string.
pub fn parse_scalar(s: &str) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    if looks_numeric(s) {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }
    match s {
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if let Some(d) = parse_date(s) {
        return Value::Date(d);
    }
    if let Some(q) = parse_quantity(s) {
        return q;
    }
    Value::Str(s.to_string())
}

// `f64::from_str` accepts "inf" and "NaN"; resource names like that must stay strings.
fn looks_numeric(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() || c == '.' => {}
        Some('-') | Some('+') => {}
        _ => return false,
    }
    s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && s.chars().any(|c| c.is_ascii_digit())
}

/// RFC3339 first, then the date-only and date-time layouts, then RFC1123/RFC822.
/// Zone-less layouts are read as UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in DATE_TIME {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    for fmt in DATE_ONLY {
        if let Ok(nd) = NaiveDate::parse_from_str(s, fmt) {
            return nd.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt));
        }
    }
    if let Some(d) = parse_named_zone(s) {
        return Some(d);
    }
    DateTime::parse_from_rfc2822(s).ok().map(|d| d.with_timezone(&Utc))
}

// RFC1123 ("Mon, 02 Jan 2006 15:04:05 MST") and RFC822 ("02 Jan 06 15:04 MST").
fn parse_named_zone(s: &str) -> Option<DateTime<Utc>> {
    let (head, zone) = s.rsplit_once(' ')?;
    let offset_hours = match zone {
        "UTC" | "GMT" | "UT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    let offset = FixedOffset::east_opt(offset_hours * 3600)?;
    let ndt = ["%a, %d %b %Y %H:%M:%S", "%d %b %y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(head, fmt).ok())?;
    let local = offset.from_local_datetime(&ndt).single()?;
    Some(local.with_timezone(&Utc))
}

/// SI (`k`/`K`..`P`, powers of 1000) and IEC (`Ki`..`Pi`, powers of 1024) suffixed numbers.
pub fn parse_quantity(s: &str) -> Option<Value> {
    let (num, suffix) = split_suffix(s)?;
    let (base, exp): (u64, u32) = match suffix {
        "k" | "K" => (1000, 1),
        "M" => (1000, 2),
        "G" => (1000, 3),
        "T" => (1000, 4),
        "P" => (1000, 5),
        "Ki" => (1024, 1),
        "Mi" => (1024, 2),
        "Gi" => (1024, 3),
        "Ti" => (1024, 4),
        "Pi" => (1024, 5),
        _ => return None,
    };
    let factor = base.pow(exp);
    if let Ok(i) = num.parse::<i64>() {
        if let Some(v) = i.checked_mul(factor as i64) {
            return Some(Value::Int(v));
        }
    }
    if !looks_numeric(num) {
        return None;
    }
    num.parse::<f64>().ok().map(|f| Value::Float(f * factor as f64))
}

fn split_suffix(s: &str) -> Option<(&str, &str)> {
    let at = s.find(|c: char| c.is_ascii_alphabetic())?;
    let (num, suffix) = s.split_at(at);
    if num.is_empty() || suffix.len() > 2 {
        return None;
    }
    Some((num, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> Value {
        Value::Date(Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap())
    }

    #[test]
    fn numbers_and_bools() {
        assert_eq!(parse_scalar("3"), Value::Int(3));
        assert_eq!(parse_scalar("-12"), Value::Int(-12));
        assert_eq!(parse_scalar("1.5"), Value::Float(1.5));
        assert_eq!(parse_scalar("True"), Value::Bool(true));
        assert_eq!(parse_scalar("false"), Value::Bool(false));
    }

    #[test]
    fn inf_and_nan_words_stay_strings() {
        assert_eq!(parse_scalar("inf"), Value::Str("inf".into()));
        assert_eq!(parse_scalar("NaN"), Value::Str("NaN".into()));
    }

    #[test]
    fn date_layouts() {
        assert_eq!(parse_scalar("2024-01-02T00:00:00Z"), utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(parse_scalar("2024-01-02T03:00:00+02:00"), utc(2024, 1, 2, 1, 0, 0));
        assert_eq!(parse_scalar("2024-01-02"), utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(parse_scalar("2024-01-02 10:11:12"), utc(2024, 1, 2, 10, 11, 12));
        assert_eq!(parse_scalar("2024-01-02T10:11:12"), utc(2024, 1, 2, 10, 11, 12));
        assert_eq!(parse_scalar("2024/01/02"), utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(parse_scalar("01/02/2024"), utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(parse_scalar("Tue, 02 Jan 2024 10:00:00 GMT"), utc(2024, 1, 2, 10, 0, 0));
        assert_eq!(parse_scalar("02 Jan 24 10:00 UTC"), utc(2024, 1, 2, 10, 0, 0));
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_scalar("512Mi"), Value::Int(512 * 1024 * 1024));
        assert_eq!(parse_scalar("1G"), Value::Int(1_000_000_000));
        assert_eq!(parse_scalar("2Ki"), Value::Int(2048));
        assert_eq!(parse_scalar("100k"), Value::Int(100_000));
        assert_eq!(parse_scalar("100k"), parse_scalar("100K"));
        assert_eq!(parse_scalar("1.5Ki"), Value::Float(1536.0));
        assert_eq!(parse_scalar("5X"), Value::Str("5X".into()));
        assert_eq!(parse_scalar("Mi"), Value::Str("Mi".into()));
    }

    #[test]
    fn plain_strings_pass_through() {
        assert_eq!(parse_scalar("Running"), Value::Str("Running".into()));
        assert_eq!(parse_scalar("nginx:1.25"), Value::Str("nginx:1.25".into()));
        assert_eq!(parse_scalar(""), Value::Str(String::new()));
    }
}
