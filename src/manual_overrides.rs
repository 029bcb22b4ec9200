//! Operator-curated kickoff overrides: a bundled default file merged with a
//! user-editable one, user entries winning. Malformed entries are skipped
//! one at a time; a bad line never invalidates the rest of the file.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::game::KickoffOverride;

const BUNDLED_OVERRIDES: &str = include_str!("../data/manual_kickoffs.json");
const CONFIG_DIR: &str = "oval_terminal";
const USER_FILE: &str = "kickoff_overrides.json";

/// Load the merged manual override map.
pub fn load() -> HashMap<String, KickoffOverride> {
    let mut merged = parse_override_map(BUNDLED_OVERRIDES);
    if let Some(path) = user_path() {
        if let Ok(raw) = fs::read_to_string(path) {
            merged.extend(parse_override_map(&raw));
        }
    }
    merged
}

/// Parse a `match_id -> { kickoff, source }` JSON map, dropping entries that
/// do not decode.
pub fn parse_override_map(raw: &str) -> HashMap<String, KickoffOverride> {
    let Ok(root) = serde_json::from_str::<Value>(raw) else {
        return HashMap::new();
    };
    let Some(entries) = root.as_object() else {
        return HashMap::new();
    };

    let mut out = HashMap::new();
    for (match_id, entry) in entries {
        let Some(kickoff) = entry
            .get("kickoff")
            .and_then(|v| v.as_str())
            .and_then(parse_iso_instant)
        else {
            continue;
        };
        let source = entry
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("manual")
            .to_string();
        out.insert(match_id.clone(), KickoffOverride { kickoff, source });
    }
    out
}

fn parse_iso_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn user_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CONFIG_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CONFIG_DIR).join(USER_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(USER_FILE),
    )
}
