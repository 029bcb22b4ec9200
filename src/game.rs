//! Primary-upstream match records and the derived kickoff view.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::leagues;

/// UTC hours the upstream is known to emit as scheduling placeholders.
/// Tuned against observed behaviour; changing them is a product decision.
pub const PLACEHOLDER_UTC_HOURS: [u32; 4] = [0, 10, 11, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl GameStatus {
    /// Map the upstream's short status codes. Codes we have not seen are
    /// in-play variants in practice.
    pub fn from_short(code: &str) -> Self {
        match code {
            "NS" | "TBD" => GameStatus::Scheduled,
            "FT" | "AET" | "PEN" => GameStatus::Finished,
            "PST" => GameStatus::Postponed,
            "CANC" | "ABD" => GameStatus::Cancelled,
            _ => GameStatus::Live,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Live => "live",
            GameStatus::Finished => "finished",
            GameStatus::Postponed => "postponed",
            GameStatus::Cancelled => "cancelled",
        }
    }
}

/// One match as reported by the primary upstream, post-normalization.
#[derive(Debug, Clone)]
pub struct Game {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub league_id: String,
    pub round: Option<u32>,
    pub status: GameStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub reported_kickoff: DateTime<Utc>,
}

/// A corrected kickoff for one match, with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickoffOverride {
    pub kickoff: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickoffSource {
    Provider,
    Secondary,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickoffConfidence {
    Exact,
    Pending,
}

/// The kickoff a caller should display, derived at read time.
#[derive(Debug, Clone)]
pub struct ResolvedKickoff {
    pub kickoff: DateTime<Utc>,
    pub source: KickoffSource,
    pub confidence: KickoffConfidence,
    /// Provenance detail from the winning override, when there is one.
    pub detail: Option<String>,
}

/// Apply the override precedence rule: manual wins, then secondary, then the
/// raw upstream value. A corroborated time is never flagged pending.
pub fn resolve_kickoff(
    game: &Game,
    manual: &HashMap<String, KickoffOverride>,
    secondary: &HashMap<String, KickoffOverride>,
    now: DateTime<Utc>,
) -> ResolvedKickoff {
    if let Some(over) = manual.get(&game.id) {
        return ResolvedKickoff {
            kickoff: over.kickoff,
            source: KickoffSource::Manual,
            confidence: KickoffConfidence::Exact,
            detail: Some(over.source.clone()),
        };
    }
    if let Some(over) = secondary.get(&game.id) {
        return ResolvedKickoff {
            kickoff: over.kickoff,
            source: KickoffSource::Secondary,
            confidence: KickoffConfidence::Exact,
            detail: Some(over.source.clone()),
        };
    }
    let confidence = if looks_like_placeholder_kickoff(game, now) {
        KickoffConfidence::Pending
    } else {
        KickoffConfidence::Exact
    };
    ResolvedKickoff {
        kickoff: game.reported_kickoff,
        source: KickoffSource::Provider,
        confidence,
        detail: None,
    }
}

/// Advisory heuristic: does the reported time look like a scheduling
/// placeholder rather than a confirmed kickoff? Only leagues known to emit
/// placeholders are considered, and only for still-scheduled games.
pub fn looks_like_placeholder_kickoff(game: &Game, now: DateTime<Utc>) -> bool {
    if game.status != GameStatus::Scheduled {
        return false;
    }
    if !leagues::placeholder_prone(&game.league_id) {
        return false;
    }
    let kickoff = game.reported_kickoff;
    if kickoff.minute() != 0 || kickoff.second() != 0 {
        return false;
    }
    PLACEHOLDER_UTC_HOURS.contains(&kickoff.hour())
        || kickoff - now > Duration::hours(24)
}
