//! Decoding for the primary rugby upstream. The envelope's in-body error list
//! is already rejected by the fetch client; this module turns the `response`
//! array into normalized records, skipping anything malformed.

use serde_json::Value;

use crate::fetch_client::{CachePolicy, FetchClient, FetchError};
use crate::game::{Game, GameStatus};
use crate::json_pick::{parse_instant, pick_string, pick_u32};
use crate::normalize::similarity;
use crate::official::parse_round;

pub const DEFAULT_BASE_URL: &str = "https://v1.rugby.api-sports.io";

/// Fixtures or results for one league and season. `date` narrows to a single
/// day when present (the live-scores path).
pub fn fetch_games(
    client: &FetchClient,
    league_id: &str,
    season: i32,
    date: Option<&str>,
    policy: CachePolicy,
) -> Result<Vec<Game>, FetchError> {
    let season_s = season.to_string();
    let mut params: Vec<(&str, &str)> = vec![("league", league_id), ("season", &season_s)];
    if let Some(date) = date {
        params.push(("date", date));
    }
    let value = client.fetch("games", &params, policy)?;
    Ok(parse_games(&value))
}

/// Defensive decode of the upstream `response` array. Malformed records are
/// dropped individually, never the whole batch.
pub fn parse_games(value: &Value) -> Vec<Game> {
    let Some(items) = value.get("response").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    items.iter().filter_map(parse_game).collect()
}

fn parse_game(item: &Value) -> Option<Game> {
    let id = pick_string(item, &["id"])?;
    let teams = item.get("teams")?;
    let home_team = teams.get("home").and_then(|t| pick_string(t, &["name"]))?;
    let away_team = teams.get("away").and_then(|t| pick_string(t, &["name"]))?;
    let reported_kickoff = parse_instant(item.get("date")?)?;
    let league_id = item
        .get("league")
        .and_then(|l| pick_string(l, &["id"]))
        .unwrap_or_default();
    let status = item
        .get("status")
        .and_then(|s| pick_string(s, &["short"]))
        .map(|code| GameStatus::from_short(&code))
        .unwrap_or(GameStatus::Scheduled);
    let round = pick_u32(item, &["week"])
        .or_else(|| pick_string(item, &["week"]).as_deref().and_then(parse_round));
    let scores = item.get("scores");
    let home_score = scores.and_then(|s| s.get("home")).and_then(|v| v.as_u64());
    let away_score = scores.and_then(|s| s.get("away")).and_then(|v| v.as_u64());

    Some(Game {
        id,
        home_team,
        away_team,
        league_id,
        round,
        status,
        home_score: home_score.map(|v| v as u32),
        away_score: away_score.map(|v| v as u32),
        reported_kickoff,
    })
}

#[derive(Debug, Clone)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
}

/// Search the upstream team directory. Long-lived data, cached accordingly.
pub fn search_teams(client: &FetchClient, query: &str) -> Result<Vec<TeamRef>, FetchError> {
    let value = client.fetch("teams", &[("search", query)], CachePolicy::TEAM_SEARCH)?;
    let Some(items) = value.get("response").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(|item| {
            Some(TeamRef {
                id: pick_string(item, &["id"])?,
                name: pick_string(item, &["name"])?,
            })
        })
        .collect())
}

/// Best fuzzy match for a user-supplied team name, if any candidate clears
/// the plausibility bar.
pub fn best_team_match<'a>(query: &str, candidates: &'a [TeamRef]) -> Option<&'a TeamRef> {
    const MIN_SCORE: f64 = 0.55;
    candidates
        .iter()
        .map(|team| (similarity(query, &team.name), team))
        .filter(|(score, _)| *score >= MIN_SCORE)
        .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, team)| team)
}
