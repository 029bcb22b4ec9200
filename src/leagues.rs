//! League registry and per-league team alias tables.
//!
//! Alias keys are already-normalized spellings as observed in the wild
//! (accents stripped by `normalize`, sponsor prefixes intact); values are the
//! one canonical name used for matching within that league. Lookups that miss
//! fall back to the normalized input, so unknown teams still match themselves.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::normalize::normalize;

pub const TOP14_ID: &str = "16";
pub const PRO_D2_ID: &str = "17";
pub const PREMIERSHIP_ID: &str = "13";
pub const URC_ID: &str = "76";

/// Leagues whose upstream kickoff times are unreliable enough to be worth
/// cross-checking against an official source.
pub fn needs_kickoff_verification(league_id: &str) -> bool {
    matches!(league_id, TOP14_ID | PRO_D2_ID | PREMIERSHIP_ID | URC_ID)
}

/// Leagues observed emitting round-hour placeholder kickoffs before the real
/// schedule is confirmed.
pub fn placeholder_prone(league_id: &str) -> bool {
    matches!(league_id, TOP14_ID | PRO_D2_ID | URC_ID)
}

pub fn league_label(league_id: &str) -> &'static str {
    match league_id {
        TOP14_ID => "Top 14",
        PRO_D2_ID => "Pro D2",
        PREMIERSHIP_ID => "Premiership",
        URC_ID => "United Rugby Championship",
        _ => "Unknown league",
    }
}

/// Canonical matching name for a raw team spelling within one league.
pub fn canonical_team(league_id: &str, raw: &str) -> String {
    let key = normalize(raw);
    if let Some(table) = alias_table(league_id) {
        if let Some(canonical) = table.get(key.as_str()) {
            return (*canonical).to_string();
        }
    }
    key
}

fn alias_table(league_id: &str) -> Option<&'static HashMap<&'static str, &'static str>> {
    match league_id {
        TOP14_ID => Some(&TOP14_ALIASES),
        PRO_D2_ID => Some(&PRO_D2_ALIASES),
        PREMIERSHIP_ID => Some(&PREMIERSHIP_ALIASES),
        URC_ID => Some(&URC_ALIASES),
        _ => None,
    }
}

static TOP14_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("union bordeaux begles", "bordeaux begles"),
        ("ubb", "bordeaux begles"),
        ("stade toulousain", "toulouse"),
        ("stade francais paris", "stade francais"),
        ("sf paris", "stade francais"),
        ("asm clermont auvergne", "clermont"),
        ("clermont auvergne", "clermont"),
        ("asm clermont", "clermont"),
        ("rc toulon", "toulon"),
        ("rugby club toulonnais", "toulon"),
        ("castres olympique", "castres"),
        ("montpellier herault rugby", "montpellier"),
        ("mhr", "montpellier"),
        ("usa perpignan", "perpignan"),
        ("usap", "perpignan"),
        ("stade rochelais", "la rochelle"),
        ("section paloise", "pau"),
        ("aviron bayonnais", "bayonne"),
        ("lou rugby", "lyon"),
        ("lyon olympique universitaire", "lyon"),
    ])
});

static PRO_D2_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("oyonnax rugby", "oyonnax"),
        ("us oyonnax", "oyonnax"),
        ("fc grenoble rugby", "grenoble"),
        ("as beziers herault", "beziers"),
        ("ca brive", "brive"),
        ("rc vannes", "vannes"),
        ("stade montois", "mont de marsan"),
        ("uson nevers", "nevers"),
        ("stade aurillacois", "aurillac"),
        ("su agen", "agen"),
        ("usm montauban", "montauban"),
        ("us colomiers", "colomiers"),
        ("colomiers rugby", "colomiers"),
        ("provence rugby", "provence"),
        ("us dax", "dax"),
        ("valence romans drome rugby", "valence romans"),
    ])
});

static PREMIERSHIP_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("leicester tigers", "leicester"),
        ("northampton saints", "northampton"),
        ("exeter chiefs", "exeter"),
        ("sale sharks", "sale"),
        ("bristol bears", "bristol"),
        ("gloucester rugby", "gloucester"),
        ("newcastle falcons", "newcastle"),
        ("newcastle red bulls", "newcastle"),
        ("bath rugby", "bath"),
        ("saracens fc", "saracens"),
        ("harlequin fc", "harlequins"),
        ("quins", "harlequins"),
    ])
});

static URC_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Sponsor-prefixed spellings used by the federation feed.
        ("dhl stormers", "stormers"),
        ("vodacom bulls", "bulls"),
        ("hollywoodbets sharks", "sharks"),
        ("emirates lions", "lions"),
        ("glasgow warriors", "glasgow"),
        ("leinster rugby", "leinster"),
        ("munster rugby", "munster"),
        ("ulster rugby", "ulster"),
        ("cardiff rugby", "cardiff"),
        ("cardiff blues", "cardiff"),
        ("dragons rfc", "dragons"),
        ("benetton rugby", "benetton"),
        ("benetton treviso", "benetton"),
        ("zebre parma", "zebre"),
        ("zebre rugby club", "zebre"),
        ("edinburgh rugby", "edinburgh"),
        ("connacht rugby", "connacht"),
    ])
});
