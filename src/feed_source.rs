//! Official Premiership fixtures from the aggregator JSON feed. Read-only,
//! unauthenticated, queried per provider/competition/season with a generous
//! page size so one request covers a whole season.

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::game::Game;
use crate::http_client::http_client;
use crate::json_pick::{parse_instant, pick_string, pick_u32};
use crate::leagues::PREMIERSHIP_ID;
use crate::official::{
    merge_windows, parse_round, season_windows, FixtureCache, OfficialFixture, OfficialSource,
};

const FEED_BASE: &str = "https://rugby-feeds.incrowdsports.com/v1";
const FEED_PROVIDER: &str = "rugbyviz";
const PAGE_SIZE: u32 = 200;

pub struct PremiershipFeedSource {
    cache: FixtureCache,
}

impl PremiershipFeedSource {
    pub fn new() -> Self {
        Self {
            cache: FixtureCache::default(),
        }
    }

    fn fetch_season(&self, season: i32) -> Result<Vec<OfficialFixture>> {
        let url = format!(
            "{FEED_BASE}/matches?provider={FEED_PROVIDER}&competition=premiership&season={season}&pageSize={PAGE_SIZE}"
        );
        let client = http_client()?;
        let resp = client.get(&url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("http {status}"));
        }
        let body = resp.text()?;
        Ok(parse_feed_body(&body))
    }
}

impl Default for PremiershipFeedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OfficialSource for PremiershipFeedSource {
    fn source_name(&self) -> &'static str {
        "premiership-feed"
    }

    fn leagues(&self) -> &[&'static str] {
        &[PREMIERSHIP_ID]
    }

    fn fetch_official_fixtures(
        &self,
        league_id: &str,
        hint_games: &[Game],
    ) -> Result<Vec<OfficialFixture>> {
        if league_id != PREMIERSHIP_ID {
            return Ok(Vec::new());
        }
        let seasons = season_windows(hint_games);
        let cache_key = format!(
            "{league_id}:{}",
            seasons
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("-")
        );
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(hit);
        }

        let results = seasons
            .iter()
            .map(|&season| (season, self.fetch_season(season)))
            .collect();
        let fixtures = merge_windows(results)?;
        self.cache.put(&cache_key, fixtures.clone());
        Ok(fixtures)
    }
}

/// Decode one feed response. Malformed JSON means no fixtures, not an error.
pub fn parse_feed_body(raw: &str) -> Vec<OfficialFixture> {
    let Ok(root) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    let items = root
        .get("data")
        .or_else(|| root.get("matches"))
        .and_then(|v| v.as_array());
    let Some(items) = items else {
        return Vec::new();
    };
    items.iter().filter_map(parse_feed_match).collect()
}

fn parse_feed_match(item: &Value) -> Option<OfficialFixture> {
    let home = pick_string(item, &["homeTeam", "home"])?;
    let away = pick_string(item, &["awayTeam", "away"])?;
    let kickoff = parse_instant(item.get("date").or_else(|| item.get("kickOff"))?)?;
    let round = pick_u32(item, &["round"]).or_else(|| {
        pick_string(item, &["roundLabel", "roundName"])
            .as_deref()
            .and_then(parse_round)
    });
    let source_id = pick_string(item, &["id", "matchId"]).unwrap_or_default();
    Some(OfficialFixture {
        source_id,
        home_name: home,
        away_name: away,
        kickoff,
        round,
        league_id: PREMIERSHIP_ID.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_feed_matches() {
        let raw = r#"{"data":[
            {"id":"p1","homeTeam":{"name":"Leicester Tigers"},"awayTeam":{"name":"Bath Rugby"},
             "date":"2026-01-10T15:05:00Z","round":9},
            {"id":"p2","homeTeam":{"name":"Sale Sharks"},"awayTeam":{"name":"Saracens"},
             "date":"not a date"}
        ]}"#;
        let fixtures = parse_feed_body(raw);
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].home_name, "Leicester Tigers");
        assert_eq!(fixtures[0].round, Some(9));
        assert_eq!(
            fixtures[0].kickoff,
            Utc.with_ymd_and_hms(2026, 1, 10, 15, 5, 0).unwrap()
        );
    }

    #[test]
    fn malformed_body_yields_no_fixtures() {
        assert!(parse_feed_body("<!doctype html>").is_empty());
        assert!(parse_feed_body("{}").is_empty());
        assert!(parse_feed_body(r#"{"data": "nope"}"#).is_empty());
    }
}
