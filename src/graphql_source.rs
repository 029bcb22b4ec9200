//! Official United Rugby Championship fixtures from the federation GraphQL
//! endpoint. One POSTed query covers every derived season window at once.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::game::Game;
use crate::http_client::http_client;
use crate::json_pick::{parse_instant, pick_string, pick_u32};
use crate::leagues::URC_ID;
use crate::official::{
    parse_round, season_windows, FixtureCache, OfficialFixture, OfficialSource,
};

const URC_GRAPHQL: &str = "https://graph.unitedrugby.com/graphql";
const MATCH_LIMIT: u32 = 500;

const MATCHES_QUERY: &str = "\
query Matches($seasonIds: [Int!]!, $limit: Int!) {\
  matches(seasonIds: $seasonIds, limit: $limit) {\
    id round kickoffTime homeTeam { name } awayTeam { name }\
  }\
}";

pub struct UrcGraphqlSource {
    cache: FixtureCache,
}

impl UrcGraphqlSource {
    pub fn new() -> Self {
        Self {
            cache: FixtureCache::default(),
        }
    }

    fn run_query(&self, season_ids: &[i32]) -> Result<String> {
        let client = http_client()?;
        let body = json!({
            "query": MATCHES_QUERY,
            "variables": { "seasonIds": season_ids, "limit": MATCH_LIMIT },
        });
        let resp = client.post(URC_GRAPHQL).json(&body).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("http {status}"));
        }
        Ok(resp.text()?)
    }
}

impl Default for UrcGraphqlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OfficialSource for UrcGraphqlSource {
    fn source_name(&self) -> &'static str {
        "urc-graphql"
    }

    fn leagues(&self) -> &[&'static str] {
        &[URC_ID]
    }

    fn fetch_official_fixtures(
        &self,
        league_id: &str,
        hint_games: &[Game],
    ) -> Result<Vec<OfficialFixture>> {
        if league_id != URC_ID {
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

        let body = self.run_query(&seasons)?;
        let fixtures = parse_graphql_body(&body);
        if fixtures.is_empty() && serde_json::from_str::<Value>(&body).is_err() {
            return Err(anyhow!("unreadable graphql response"));
        }
        self.cache.put(&cache_key, fixtures.clone());
        Ok(fixtures)
    }
}

/// Decode a GraphQL response body. Anything unexpected yields no fixtures.
pub fn parse_graphql_body(raw: &str) -> Vec<OfficialFixture> {
    let Ok(root) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    let items = root
        .get("data")
        .and_then(|d| d.get("matches"))
        .and_then(|m| m.as_array());
    let Some(items) = items else {
        return Vec::new();
    };
    items.iter().filter_map(parse_graphql_match).collect()
}

fn parse_graphql_match(item: &Value) -> Option<OfficialFixture> {
    let home = pick_string(item, &["homeTeam"])?;
    let away = pick_string(item, &["awayTeam"])?;
    let kickoff = parse_instant(item.get("kickoffTime")?)?;
    let round = pick_u32(item, &["round"]).or_else(|| {
        pick_string(item, &["round"])
            .as_deref()
            .and_then(parse_round)
    });
    let source_id = pick_string(item, &["id"]).unwrap_or_default();
    Some(OfficialFixture {
        source_id,
        home_name: home,
        away_name: away,
        kickoff,
        round,
        league_id: URC_ID.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_graphql_matches() {
        let raw = r#"{"data":{"matches":[
            {"id":"u1","round":7,"kickoffTime":"2026-01-10T17:00:00Z",
             "homeTeam":{"name":"DHL Stormers"},"awayTeam":{"name":"Leinster Rugby"}},
            {"id":"u2","round":7,"kickoffTime":null,
             "homeTeam":{"name":"Munster Rugby"},"awayTeam":{"name":"Glasgow Warriors"}}
        ]}}"#;
        let fixtures = parse_graphql_body(raw);
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].home_name, "DHL Stormers");
        assert_eq!(fixtures[0].round, Some(7));
        assert_eq!(
            fixtures[0].kickoff,
            Utc.with_ymd_and_hms(2026, 1, 10, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn epoch_millis_kickoffs_are_accepted() {
        let raw = r#"{"data":{"matches":[
            {"id":"u3","round":8,"kickoffTime":1768064400000,
             "homeTeam":{"name":"Vodacom Bulls"},"awayTeam":{"name":"Ulster Rugby"}}
        ]}}"#;
        let fixtures = parse_graphql_body(raw);
        assert_eq!(fixtures.len(), 1);
    }

    #[test]
    fn malformed_body_yields_no_fixtures() {
        assert!(parse_graphql_body("oops").is_empty());
        assert!(parse_graphql_body(r#"{"data":{}}"#).is_empty());
        assert!(parse_graphql_body(r#"{"errors":[{"message":"boom"}]}"#).is_empty());
    }
}
