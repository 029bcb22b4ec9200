use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};

use oval_terminal::fetch_client::{ApiAuth, CachePolicy, FetchClient, FetchError};
use oval_terminal::feed_source::PremiershipFeedSource;
use oval_terminal::game::{
    resolve_kickoff, Game, GameStatus, KickoffConfidence, KickoffOverride, KickoffSource,
};
use oval_terminal::graphql_source::UrcGraphqlSource;
use oval_terminal::leagues;
use oval_terminal::lnr_source::LnrSource;
use oval_terminal::manual_overrides;
use oval_terminal::official::OfficialSource;
use oval_terminal::reconcile::resolve_overrides;
use oval_terminal::response_cache::ResponseCache;
use oval_terminal::rugby_api::{self, DEFAULT_BASE_URL};

const CACHE_DIR: &str = "oval_terminal";
const DEFAULT_PROXY_URL: &str = "https://oval-proxy.fly.dev/v1";

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<FetchError>() {
        Some(FetchError::RateLimited { .. }) => 2,
        Some(FetchError::Unauthorized { .. }) => 3,
        Some(FetchError::Network { .. }) => 4,
        _ => 1,
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(|s| s.as_str()).unwrap_or("fixtures");
    let league_arg = args
        .get(1)
        .cloned()
        .or_else(|| env::var("OVAL_LEAGUE").ok().filter(|v| !v.trim().is_empty()));
    let league_id = league_arg
        .as_deref()
        .map(league_id_from_arg)
        .unwrap_or(leagues::TOP14_ID);
    let season = env::var("OVAL_SEASON")
        .ok()
        .and_then(|val| val.parse::<i32>().ok())
        .unwrap_or_else(current_season);

    let cache = ResponseCache::open(cache_root()?)?;
    let client = match env::var("RUGBY_API_KEY").ok().filter(|k| !k.trim().is_empty()) {
        Some(key) => FetchClient::new(DEFAULT_BASE_URL, ApiAuth::ApiKey(key), cache),
        None => {
            let proxy = env::var("RUGBY_PROXY_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROXY_URL.to_string());
            FetchClient::new(proxy, ApiAuth::SharedProxy, cache)
        }
    };

    match command {
        "scores" => {
            let today = Utc::now().format("%Y-%m-%d").to_string();
            let games =
                rugby_api::fetch_games(&client, league_id, season, Some(&today), CachePolicy::LIVE)?;
            print_scores(league_id, &games);
        }
        "fixtures" => {
            let games =
                rugby_api::fetch_games(&client, league_id, season, None, CachePolicy::FIXTURES)?;
            let scheduled: Vec<Game> = games
                .into_iter()
                .filter(|g| g.status == GameStatus::Scheduled)
                .collect();

            let lnr = LnrSource::new();
            let feed = PremiershipFeedSource::new();
            let urc = UrcGraphqlSource::new();
            let sources: Vec<&dyn OfficialSource> = vec![&lnr, &feed, &urc];
            let secondary = resolve_overrides(&scheduled, &sources);
            let manual = manual_overrides::load();
            print_fixtures(league_id, &scheduled, &manual, &secondary);
        }
        "results" => {
            let games =
                rugby_api::fetch_games(&client, league_id, season, None, CachePolicy::FIXTURES)?;
            let finished: Vec<Game> = games
                .into_iter()
                .filter(|g| g.status == GameStatus::Finished)
                .collect();
            print_scores(league_id, &finished);
        }
        other => anyhow::bail!("unknown command '{other}' (expected scores|fixtures|results)"),
    }

    let meta = client.drain_meta();
    if meta.stale_fallback {
        if let Some(at) = meta.oldest_stale_timestamp() {
            eprintln!("showing cached data from {}", at.format("%Y-%m-%d %H:%M UTC"));
        }
    }
    if env::var("OVAL_TRACE").is_ok() {
        if let Some(trace) = meta.last_trace_id() {
            eprintln!("trace id: {trace}");
        }
    }
    Ok(())
}

fn print_fixtures(
    league_id: &str,
    games: &[Game],
    manual: &HashMap<String, KickoffOverride>,
    secondary: &HashMap<String, KickoffOverride>,
) {
    println!("{} — upcoming fixtures", leagues::league_label(league_id));
    let now = Utc::now();
    let mut rows: Vec<(&Game, _)> = games
        .iter()
        .map(|game| (game, resolve_kickoff(game, manual, secondary, now)))
        .collect();
    rows.sort_by_key(|(_, resolved)| resolved.kickoff);

    for (game, resolved) in rows {
        let marker = match (resolved.confidence, resolved.source) {
            (KickoffConfidence::Pending, _) => "~",
            (_, KickoffSource::Manual) => "m",
            (_, KickoffSource::Secondary) => "s",
            _ => " ",
        };
        let round = game
            .round
            .map(|r| format!("R{r}"))
            .unwrap_or_else(|| "--".to_string());
        println!(
            "{} {} {:>4}  {:<26} v {:<26}",
            resolved.kickoff.format("%a %d %b %H:%M"),
            marker,
            round,
            game.home_team,
            game.away_team,
        );
    }
    if games.is_empty() {
        println!("  (no scheduled games)");
    }
}

fn print_scores(league_id: &str, games: &[Game]) {
    println!("{}", leagues::league_label(league_id));
    for game in games {
        let score = match (game.home_score, game.away_score) {
            (Some(h), Some(a)) => format!("{h:>3} - {a:<3}"),
            _ => "  -   -  ".to_string(),
        };
        println!(
            "{:<10} {:<26} {} {:<26}",
            game.status.label(),
            game.home_team,
            score,
            game.away_team,
        );
    }
    if games.is_empty() {
        println!("  (no games)");
    }
}

fn league_id_from_arg(raw: &str) -> &'static str {
    match raw.to_ascii_lowercase().as_str() {
        "prod2" | "pro-d2" | "pro_d2" => leagues::PRO_D2_ID,
        "premiership" | "prem" => leagues::PREMIERSHIP_ID,
        "urc" => leagues::URC_ID,
        _ => leagues::TOP14_ID,
    }
}

/// Season start year: a July-or-later date belongs to the season opening
/// that calendar year.
fn current_season() -> i32 {
    let now = Utc::now();
    if now.month() >= 7 {
        now.year()
    } else {
        now.year() - 1
    }
}

fn cache_root() -> Result<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Ok(PathBuf::from(base).join(CACHE_DIR).join("responses"));
        }
    }
    let home = env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home)
        .join(".cache")
        .join(CACHE_DIR)
        .join("responses"))
}
