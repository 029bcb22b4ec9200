//! Cross-source kickoff reconciliation. Joins still-scheduled primary games
//! against official fixtures per league and emits an override map. Strictly
//! additive enrichment: any per-league or per-source failure contributes no
//! overrides and no errors.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::game::{Game, GameStatus, KickoffOverride};
use crate::leagues::{self, canonical_team};
use crate::official::{OfficialFixture, OfficialSource, SourceOutcome};

/// An official time within a minute of the upstream's is agreement, not a
/// correction; no override is written.
pub const MIN_OVERRIDE_DELTA_MS: i64 = 60_000;
/// Beyond this gap the nearest official fixture is coincidence, not
/// corroboration.
pub const MAX_KICKOFF_DELTA_MS: i64 = 31 * 24 * 60 * 60 * 1000;

/// What one source said (or failed to say) about one league.
#[derive(Debug, Clone)]
pub struct LeagueFetch {
    pub source: &'static str,
    pub outcome: SourceOutcome,
}

/// Resolve kickoff overrides for every verification-worthy scheduled game.
/// Leagues fan out concurrently; the merge is deterministic in league order,
/// later entries overwriting earlier ones for the same match ID.
pub fn resolve_overrides(
    games: &[Game],
    sources: &[&dyn OfficialSource],
) -> HashMap<String, KickoffOverride> {
    let mut by_league: BTreeMap<&str, Vec<&Game>> = BTreeMap::new();
    for game in games {
        if game.status != GameStatus::Scheduled {
            continue;
        }
        if !leagues::needs_kickoff_verification(&game.league_id) {
            continue;
        }
        by_league.entry(&game.league_id).or_default().push(game);
    }

    let leagues: Vec<(&str, Vec<&Game>)> = by_league.into_iter().collect();
    let per_league: Vec<HashMap<String, KickoffOverride>> = leagues
        .par_iter()
        .map(|(league_id, league_games)| {
            let fetches = league_outcomes(league_id, league_games, sources);
            let mut fixtures: Vec<(&'static str, OfficialFixture)> = Vec::new();
            for fetch in fetches {
                if let SourceOutcome::Fetched(batch) = fetch.outcome {
                    fixtures.extend(batch.into_iter().map(|f| (fetch.source, f)));
                }
            }
            overrides_for_league(league_id, league_games, &fixtures)
        })
        .collect();

    let mut merged = HashMap::new();
    for map in per_league {
        merged.extend(map);
    }
    merged
}

/// Ask every source that services `league_id` for official fixtures, folding
/// errors into `Failed` outcomes instead of propagating them.
pub fn league_outcomes(
    league_id: &str,
    league_games: &[&Game],
    sources: &[&dyn OfficialSource],
) -> Vec<LeagueFetch> {
    let hint: Vec<Game> = league_games.iter().map(|g| (*g).clone()).collect();
    sources
        .iter()
        .filter(|source| source.leagues().contains(&league_id))
        .map(|source| {
            let outcome = match source.fetch_official_fixtures(league_id, &hint) {
                Ok(fixtures) => SourceOutcome::Fetched(fixtures),
                Err(err) => SourceOutcome::Failed(err.to_string()),
            };
            LeagueFetch {
                source: source.source_name(),
                outcome,
            }
        })
        .collect()
}

/// Match games against official fixtures within one league and decide which
/// kickoffs to override.
pub fn overrides_for_league(
    league_id: &str,
    league_games: &[&Game],
    fixtures: &[(&'static str, OfficialFixture)],
) -> HashMap<String, KickoffOverride> {
    let mut buckets: HashMap<(String, String), Vec<&(&'static str, OfficialFixture)>> =
        HashMap::new();
    for entry in fixtures {
        let key = (
            canonical_team(league_id, &entry.1.home_name),
            canonical_team(league_id, &entry.1.away_name),
        );
        buckets.entry(key).or_default().push(entry);
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by_key(|(_, f)| f.kickoff);
    }

    let mut overrides = HashMap::new();
    for game in league_games {
        let key = (
            canonical_team(league_id, &game.home_team),
            canonical_team(league_id, &game.away_team),
        );
        let Some(bucket) = buckets.get(&key) else {
            continue;
        };
        let Some((source, fixture, delta)) = pick_candidate(game, bucket) else {
            continue;
        };
        if delta < MIN_OVERRIDE_DELTA_MS {
            // The official source agrees with the upstream; nothing to fix.
            continue;
        }
        overrides.insert(
            game.id.clone(),
            KickoffOverride {
                kickoff: fixture.kickoff,
                source: source.to_string(),
            },
        );
    }
    overrides
}

/// The official fixture closest in time to the game's reported kickoff,
/// after round disqualification and the plausibility window.
fn pick_candidate<'a>(
    game: &Game,
    bucket: &[&'a (&'static str, OfficialFixture)],
) -> Option<(&'static str, &'a OfficialFixture, i64)> {
    bucket
        .iter()
        .filter(|(_, fixture)| match (fixture.round, game.round) {
            // Round is a strong disambiguator for teams meeting twice a season.
            (Some(fr), Some(gr)) => fr == gr,
            _ => true,
        })
        .map(|(source, fixture)| {
            let delta = abs_delta_ms(fixture.kickoff, game.reported_kickoff);
            (*source, fixture, delta)
        })
        .filter(|(_, _, delta)| *delta <= MAX_KICKOFF_DELTA_MS)
        .min_by_key(|(_, _, delta)| *delta)
}

fn abs_delta_ms(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (a.timestamp_millis() - b.timestamp_millis()).abs()
}
