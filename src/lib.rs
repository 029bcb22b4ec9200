//! Rugby scores and fixtures, aggregated from a rate-limited primary upstream
//! plus per-league official sources used to corroborate kickoff times.

pub mod fetch_client;
pub mod feed_source;
pub mod game;
pub mod graphql_source;
pub mod http_client;
mod json_pick;
pub mod leagues;
pub mod lnr_source;
pub mod manual_overrides;
pub mod normalize;
pub mod official;
pub mod reconcile;
pub mod response_cache;
pub mod rugby_api;
