use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;
use chrono::{DateTime, Duration, TimeZone, Utc};

use oval_terminal::game::{Game, GameStatus, KickoffOverride};
use oval_terminal::leagues::{PREMIERSHIP_ID, TOP14_ID};
use oval_terminal::official::{OfficialFixture, OfficialSource, SourceOutcome};
use oval_terminal::reconcile::{league_outcomes, resolve_overrides};

struct FakeSource {
    name: &'static str,
    leagues: &'static [&'static str],
    fixtures: Vec<OfficialFixture>,
    fail: bool,
    calls: Mutex<u32>,
}

impl FakeSource {
    fn serving(name: &'static str, leagues: &'static [&'static str], fixtures: Vec<OfficialFixture>) -> Self {
        Self {
            name,
            leagues,
            fixtures,
            fail: false,
            calls: Mutex::new(0),
        }
    }

    fn failing(name: &'static str, leagues: &'static [&'static str]) -> Self {
        Self {
            name,
            leagues,
            fixtures: Vec::new(),
            fail: true,
            calls: Mutex::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().expect("call counter")
    }
}

impl OfficialSource for FakeSource {
    fn source_name(&self) -> &'static str {
        self.name
    }

    fn leagues(&self) -> &[&'static str] {
        self.leagues
    }

    fn fetch_official_fixtures(
        &self,
        league_id: &str,
        _hint_games: &[Game],
    ) -> anyhow::Result<Vec<OfficialFixture>> {
        *self.calls.lock().expect("call counter") += 1;
        if self.fail {
            return Err(anyhow!("feed unreachable"));
        }
        Ok(self
            .fixtures
            .iter()
            .filter(|f| f.league_id == league_id)
            .cloned()
            .collect())
    }
}

fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()
}

fn scheduled_game(id: &str, home: &str, away: &str, round: u32) -> Game {
    Game {
        id: id.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        league_id: TOP14_ID.to_string(),
        round: Some(round),
        status: GameStatus::Scheduled,
        home_score: None,
        away_score: None,
        reported_kickoff: kickoff(),
    }
}

fn official(home: &str, away: &str, round: Option<u32>, at: DateTime<Utc>) -> OfficialFixture {
    OfficialFixture {
        source_id: "of1".to_string(),
        home_name: home.to_string(),
        away_name: away.to_string(),
        kickoff: at,
        round,
        league_id: TOP14_ID.to_string(),
    }
}

#[test]
fn alias_spellings_reconcile_to_an_override() {
    let game = scheduled_game("48211", "Union Bordeaux-Bègles", "Castres Olympique", 17);
    let fixture = official(
        "Bordeaux Begles",
        "Castres Olympique",
        Some(17),
        kickoff() + Duration::minutes(30),
    );
    let source = FakeSource::serving("lnr", &[TOP14_ID], vec![fixture]);
    let sources: Vec<&dyn OfficialSource> = vec![&source];

    let overrides = resolve_overrides(&[game], &sources);
    let over = overrides.get("48211").expect("override expected");
    assert_eq!(over.kickoff, kickoff() + Duration::minutes(30));
    assert_eq!(over.source, "lnr");
}

#[test]
fn a_differing_round_disqualifies_the_candidate() {
    let game = scheduled_game("48211", "Union Bordeaux-Bègles", "Castres Olympique", 17);
    let fixture = official(
        "Bordeaux Begles",
        "Castres Olympique",
        Some(18),
        kickoff() + Duration::minutes(30),
    );
    let source = FakeSource::serving("lnr", &[TOP14_ID], vec![fixture]);
    let sources: Vec<&dyn OfficialSource> = vec![&source];

    assert!(resolve_overrides(&[game], &sources).is_empty());
}

#[test]
fn agreement_within_a_minute_produces_no_override() {
    let game = scheduled_game("48211", "Toulouse", "Pau", 17);
    let fixture = official(
        "Stade Toulousain",
        "Section Paloise",
        Some(17),
        kickoff() + Duration::seconds(30),
    );
    let source = FakeSource::serving("lnr", &[TOP14_ID], vec![fixture]);
    let sources: Vec<&dyn OfficialSource> = vec![&source];

    assert!(resolve_overrides(&[game], &sources).is_empty());
}

#[test]
fn implausibly_distant_fixtures_are_coincidence_not_corroboration() {
    let game = scheduled_game("48211", "Toulouse", "Pau", 17);
    let fixture = official(
        "Stade Toulousain",
        "Section Paloise",
        None,
        kickoff() + Duration::days(40),
    );
    let source = FakeSource::serving("lnr", &[TOP14_ID], vec![fixture]);
    let sources: Vec<&dyn OfficialSource> = vec![&source];

    assert!(resolve_overrides(&[game], &sources).is_empty());
}

#[test]
fn unknown_rounds_still_match_by_nearest_kickoff() {
    let game = scheduled_game("48211", "Toulouse", "Pau", 17);
    let near = official("Stade Toulousain", "Section Paloise", None, kickoff() + Duration::hours(4));
    let far = official("Stade Toulousain", "Section Paloise", None, kickoff() + Duration::days(20));
    let source = FakeSource::serving("lnr", &[TOP14_ID], vec![far, near]);
    let sources: Vec<&dyn OfficialSource> = vec![&source];

    let overrides = resolve_overrides(&[game], &sources);
    assert_eq!(
        overrides.get("48211").map(|o| o.kickoff),
        Some(kickoff() + Duration::hours(4))
    );
}

#[test]
fn a_failing_source_contributes_nothing_and_nothing_more() {
    let game = scheduled_game("48211", "Toulouse", "Pau", 17);
    let bad = FakeSource::failing("lnr", &[TOP14_ID]);
    let sources: Vec<&dyn OfficialSource> = vec![&bad];

    // Engine swallows the failure: no override, no panic, no error.
    assert!(resolve_overrides(std::slice::from_ref(&game), &sources).is_empty());

    // And the per-source outcome says exactly who failed.
    let outcomes = league_outcomes(TOP14_ID, &[&game], &sources);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].source, "lnr");
    assert!(matches!(
        outcomes[0].outcome,
        SourceOutcome::Failed(ref reason) if reason.contains("unreachable")
    ));
}

#[test]
fn one_healthy_source_carries_a_failing_one() {
    let game = scheduled_game("48211", "Toulouse", "Pau", 17);
    let bad = FakeSource::failing("club-site", &[TOP14_ID]);
    let good = FakeSource::serving(
        "lnr",
        &[TOP14_ID],
        vec![official(
            "Stade Toulousain",
            "Section Paloise",
            Some(17),
            kickoff() + Duration::hours(4),
        )],
    );
    let sources: Vec<&dyn OfficialSource> = vec![&bad, &good];

    let overrides = resolve_overrides(&[game], &sources);
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides["48211"].source, "lnr");
}

#[test]
fn leagues_without_candidates_are_never_fetched() {
    // A finished game and an unverified league: no secondary traffic at all.
    let mut finished = scheduled_game("1", "Toulouse", "Pau", 17);
    finished.status = GameStatus::Finished;
    let mut foreign = scheduled_game("2", "Someone", "Else", 3);
    foreign.league_id = "999".to_string();

    let source = FakeSource::serving("lnr", &[TOP14_ID], Vec::new());
    let prem = FakeSource::serving("premiership-feed", &[PREMIERSHIP_ID], Vec::new());
    let sources: Vec<&dyn OfficialSource> = vec![&source, &prem];

    let games = vec![finished, foreign];
    assert!(resolve_overrides(&games, &sources).is_empty());
    assert_eq!(source.call_count(), 0);
    assert_eq!(prem.call_count(), 0);
}

#[test]
fn manual_overrides_win_when_applied_after_secondary() {
    // Callers apply manual on top of secondary; later merges overwrite.
    let mut merged: HashMap<String, KickoffOverride> = HashMap::new();
    merged.insert(
        "48211".to_string(),
        KickoffOverride {
            kickoff: kickoff() + Duration::minutes(30),
            source: "lnr".to_string(),
        },
    );
    let manual = HashMap::from([(
        "48211".to_string(),
        KickoffOverride {
            kickoff: kickoff() + Duration::hours(2),
            source: "manual".to_string(),
        },
    )]);
    merged.extend(manual);
    assert_eq!(merged["48211"].source, "manual");
}
