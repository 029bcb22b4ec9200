//! Official fixtures for the French leagues (Top 14, Pro D2), scraped from
//! the league calendar pages. Each page embeds its fixture list as a JSON
//! array inside a `data-fixtures` attribute; a page without a readable blob
//! simply contributes nothing.

use anyhow::{anyhow, Result};

use crate::game::Game;
use crate::http_client::http_client;
use crate::json_pick::{parse_instant, pick_string, pick_u32};
use crate::leagues::{PRO_D2_ID, TOP14_ID};
use crate::official::{
    merge_windows, parse_round, season_windows, FixtureCache, OfficialFixture, OfficialSource,
};

const LNR_BASE: &str = "https://www.lnr.fr";
const FIXTURES_ATTR: &str = "data-fixtures=\"";

pub struct LnrSource {
    cache: FixtureCache,
}

impl LnrSource {
    pub fn new() -> Self {
        Self {
            cache: FixtureCache::default(),
        }
    }

    fn fetch_page(&self, url: &str) -> Result<String> {
        let client = http_client()?;
        let resp = client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("http {status}"));
        }
        Ok(resp.text()?)
    }
}

impl Default for LnrSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OfficialSource for LnrSource {
    fn source_name(&self) -> &'static str {
        "lnr"
    }

    fn leagues(&self) -> &[&'static str] {
        &[TOP14_ID, PRO_D2_ID]
    }

    fn fetch_official_fixtures(
        &self,
        league_id: &str,
        hint_games: &[Game],
    ) -> Result<Vec<OfficialFixture>> {
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
            .map(|&season| {
                let result = page_url(league_id, season)
                    .ok_or_else(|| anyhow!("league {league_id} has no calendar page"))
                    .and_then(|url| self.fetch_page(&url))
                    .map(|html| parse_fixture_page(&html, league_id));
                (season, result)
            })
            .collect();

        let fixtures = merge_windows(results)?;
        self.cache.put(&cache_key, fixtures.clone());
        Ok(fixtures)
    }
}

fn page_url(league_id: &str, season: i32) -> Option<String> {
    let slug = match league_id {
        TOP14_ID => "rugby-top14",
        PRO_D2_ID => "rugby-prod2",
        _ => return None,
    };
    Some(format!(
        "{LNR_BASE}/{slug}/calendrier-et-resultats?saison={season}"
    ))
}

/// Pull the embedded fixture blob out of a calendar page. A missing or
/// malformed blob yields an empty list: the page is ignored, never fatal.
pub fn parse_fixture_page(html: &str, league_id: &str) -> Vec<OfficialFixture> {
    let Some(blob) = extract_attr(html, FIXTURES_ATTR) else {
        return Vec::new();
    };
    let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(&blob) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| parse_fixture(item, league_id))
        .collect()
}

fn parse_fixture(item: &serde_json::Value, league_id: &str) -> Option<OfficialFixture> {
    let home = pick_string(item, &["home", "equipeDomicile", "domicile"])?;
    let away = pick_string(item, &["away", "equipeExterieur", "exterieur"])?;
    let kickoff = parse_instant(item.get("date").or_else(|| item.get("dateMatch"))?)?;
    let round = pick_u32(item, &["journee", "round"]).or_else(|| {
        pick_string(item, &["journeeLabel", "roundLabel"])
            .as_deref()
            .and_then(parse_round)
    });
    let source_id = pick_string(item, &["id", "idMatch"]).unwrap_or_default();
    Some(OfficialFixture {
        source_id,
        home_name: home,
        away_name: away,
        kickoff,
        round,
        league_id: league_id.to_string(),
    })
}

/// Value of the first `attr` occurrence, HTML-entity-unescaped.
fn extract_attr(html: &str, attr: &str) -> Option<String> {
    let start = html.find(attr)? + attr.len();
    let rest = &html[start..];
    let end = rest.find('"')?;
    Some(unescape_entities(&rest[..end]))
}

fn unescape_entities(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const PAGE: &str = r#"<html><body>
<div class="calendar" data-fixtures="[{&quot;id&quot;:&quot;m1&quot;,&quot;home&quot;:&quot;Stade Toulousain&quot;,&quot;away&quot;:&quot;Castres Olympique&quot;,&quot;date&quot;:&quot;2026-01-10T16:35:00+01:00&quot;,&quot;journeeLabel&quot;:&quot;J17&quot;}]">
</div></body></html>"#;

    #[test]
    fn parses_embedded_fixture_blob() {
        let fixtures = parse_fixture_page(PAGE, TOP14_ID);
        assert_eq!(fixtures.len(), 1);
        let f = &fixtures[0];
        assert_eq!(f.home_name, "Stade Toulousain");
        assert_eq!(f.away_name, "Castres Olympique");
        assert_eq!(f.round, Some(17));
        assert_eq!(
            f.kickoff,
            Utc.with_ymd_and_hms(2026, 1, 10, 15, 35, 0).unwrap()
        );
    }

    #[test]
    fn missing_or_malformed_blob_is_ignored() {
        assert!(parse_fixture_page("<html><body>no blob</body></html>", TOP14_ID).is_empty());
        let broken = r#"<div data-fixtures="[{&quot;home&quot;: ]">"#;
        assert!(parse_fixture_page(broken, TOP14_ID).is_empty());
    }

    #[test]
    fn records_without_a_kickoff_are_skipped() {
        let page = r#"<div data-fixtures="[{&quot;home&quot;:&quot;Pau&quot;,&quot;away&quot;:&quot;Bayonne&quot;}]">"#;
        assert!(parse_fixture_page(page, TOP14_ID).is_empty());
    }
}
