//! Defensive helpers for walking loosely-shaped upstream JSON. Every field is
//! optional until proven present; malformed records are the caller's cue to
//! skip, never to fail a batch.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// First present key that yields a usable string. Objects are unwrapped via
/// their `name`/`shortName` fields, since several feeds nest team names.
pub(crate) fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(s) = as_string(v) {
                return Some(s);
            }
        }
    }
    None
}

pub(crate) fn pick_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(num) = v.as_u64() {
                return Some(num as u32);
            }
            if let Some(s) = v.as_str() {
                if let Ok(num) = s.trim().parse::<u32>() {
                    return Some(num);
                }
            }
        }
    }
    None
}

/// Parse a kickoff instant from the formats seen across sources: RFC 3339
/// with offset, bare `YYYY-MM-DDTHH:MM[:SS]` treated as UTC, or epoch millis.
pub(crate) fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(ms) = value.as_i64() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            for key in ["name", "shortName"] {
                if let Some(Value::String(name)) = map.get(key) {
                    let trimmed = name.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    #[test]
    fn pick_string_unwraps_nested_team_objects() {
        let v = json!({"homeTeam": {"name": "Leinster Rugby"}, "alt": "x"});
        assert_eq!(
            pick_string(&v, &["home", "homeTeam"]),
            Some("Leinster Rugby".to_string())
        );
        assert_eq!(pick_string(&v, &["missing"]), None);
    }

    #[test]
    fn parse_instant_accepts_offsets_and_epochs() {
        let with_offset = parse_instant(&json!("2026-01-10T16:35:00+01:00")).unwrap();
        assert_eq!(with_offset.hour(), 15);
        let bare = parse_instant(&json!("2026-01-10T15:35")).unwrap();
        assert_eq!(bare, with_offset);
        let epoch = parse_instant(&json!(with_offset.timestamp_millis())).unwrap();
        assert_eq!(epoch, with_offset);
        assert!(parse_instant(&json!("not a date")).is_none());
        assert!(parse_instant(&json!(null)).is_none());
    }
}
