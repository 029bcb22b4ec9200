//! Shared contract for the official secondary sources used to corroborate
//! kickoff times. Each source is best-effort: it owns a short-TTL in-memory
//! cache, tolerates partial season-window failures, and fails closed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};

use crate::game::Game;

/// Repeated reconciliation passes within one process reuse fetched fixtures
/// for this long.
pub const OFFICIAL_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// One fixture as reported by an official source.
#[derive(Debug, Clone)]
pub struct OfficialFixture {
    pub source_id: String,
    pub home_name: String,
    pub away_name: String,
    pub kickoff: DateTime<Utc>,
    pub round: Option<u32>,
    pub league_id: String,
}

/// Per-league result of asking one source for fixtures. Failures are data,
/// not errors: the engine aggregates them and moves on.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Fetched(Vec<OfficialFixture>),
    Failed(String),
}

pub trait OfficialSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// League IDs this source is authoritative for.
    fn leagues(&self) -> &[&'static str];

    /// Fetch official fixtures for one league. `hint_games` drives the
    /// season windows to query; wall-clock date alone is not enough near
    /// season boundaries.
    fn fetch_official_fixtures(
        &self,
        league_id: &str,
        hint_games: &[Game],
    ) -> Result<Vec<OfficialFixture>>;
}

/// Season start years to query, derived from the kickoff years seen in the
/// games being reconciled. Each observed year contributes itself and the
/// preceding year, since northern-hemisphere seasons straddle the new year.
pub fn season_windows(hint_games: &[Game]) -> Vec<i32> {
    let mut years: Vec<i32> = hint_games
        .iter()
        .flat_map(|g| {
            let y = g.reported_kickoff.year();
            [y - 1, y]
        })
        .collect();
    if years.is_empty() {
        let y = Utc::now().year();
        years.extend([y - 1, y]);
    }
    years.sort_unstable();
    years.dedup();
    years
}

/// Extract an integer round from a label like "Round 17", "J17" or
/// "17ème journée". First digit run wins; no digits means unknown.
pub fn parse_round(label: &str) -> Option<u32> {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Process-local fixture cache keyed by league/season, shared by nothing
/// outside its owning source.
pub struct FixtureCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<OfficialFixture>)>>,
}

impl FixtureCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<OfficialFixture>> {
        let entries = self.entries.lock().expect("fixture cache lock poisoned");
        let (at, fixtures) = entries.get(key)?;
        if at.elapsed() >= self.ttl {
            return None;
        }
        Some(fixtures.clone())
    }

    pub fn put(&self, key: &str, fixtures: Vec<OfficialFixture>) {
        self.entries
            .lock()
            .expect("fixture cache lock poisoned")
            .insert(key.to_string(), (Instant::now(), fixtures));
    }
}

impl Default for FixtureCache {
    fn default() -> Self {
        Self::new(OFFICIAL_CACHE_TTL)
    }
}

/// Fold per-window results into one list. Any window succeeding is enough;
/// only when every window failed does the source as a whole fail.
pub fn merge_windows(
    results: Vec<(i32, Result<Vec<OfficialFixture>>)>,
) -> Result<Vec<OfficialFixture>> {
    let mut fixtures = Vec::new();
    let mut failures = Vec::new();
    let mut any_ok = false;
    for (season, result) in results {
        match result {
            Ok(batch) => {
                any_ok = true;
                fixtures.extend(batch);
            }
            Err(err) => failures.push(format!("season {season}: {err}")),
        }
    }
    if !any_ok && !failures.is_empty() {
        anyhow::bail!("all season windows failed: {}", failures.join("; "));
    }
    Ok(fixtures)
}
