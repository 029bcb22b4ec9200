//! Resilient fetch path for the primary upstream: cache-first reads, bounded
//! retries with jittered backoff, trace-ID bookkeeping, and stale-cache
//! degradation for everything except credential failures.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::http_client::http_client;
use crate::response_cache::{cache_key, CachedValue, ResponseCache};

pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 425, 500, 502, 503, 504];

const BACKOFF_BASE_MS: u64 = 150;
const BACKOFF_CAP_MS: u64 = 1000;
const BACKOFF_JITTER_MS: u64 = 120;

const TRACE_HEADER: &str = "x-trace-id";
const REQUEST_ID_HEADER: &str = "x-request-id";
const API_KEY_HEADER: &str = "x-apisports-key";

/// How long a cached response stays fresh, then stale-but-servable.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub stale_after: Duration,
    pub expires_after: Duration,
}

impl CachePolicy {
    pub const LIVE: Self = Self {
        stale_after: Duration::from_secs(30),
        expires_after: Duration::from_secs(60),
    };
    pub const FIXTURES: Self = Self {
        stale_after: Duration::from_secs(5 * 60),
        expires_after: Duration::from_secs(15 * 60),
    };
    pub const TEAM_SEARCH: Self = Self {
        stale_after: Duration::from_secs(60 * 60),
        expires_after: Duration::from_secs(24 * 60 * 60),
    };
    pub const STATIC: Self = Self {
        stale_after: Duration::from_secs(24 * 60 * 60),
        expires_after: Duration::from_secs(7 * 24 * 60 * 60),
    };
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited by {upstream}: {message}")]
    RateLimited {
        upstream: String,
        message: String,
        trace_id: Option<String>,
    },
    #[error("{upstream} rejected the configured credentials")]
    Unauthorized {
        upstream: String,
        trace_id: Option<String>,
    },
    #[error("network error talking to {upstream}: {message}")]
    Network {
        upstream: String,
        message: String,
        trace_id: Option<String>,
    },
    #[error("unreadable response from {upstream}: {message}")]
    Parse {
        upstream: String,
        message: String,
        trace_id: Option<String>,
    },
    #[error("request to {upstream} failed: {message}")]
    Unknown {
        upstream: String,
        message: String,
        trace_id: Option<String>,
    },
}

impl FetchError {
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            FetchError::RateLimited { trace_id, .. }
            | FetchError::Unauthorized { trace_id, .. }
            | FetchError::Network { trace_id, .. }
            | FetchError::Parse { trace_id, .. }
            | FetchError::Unknown { trace_id, .. } => trace_id.as_deref(),
        }
    }
}

/// How the primary upstream is reached.
#[derive(Debug, Clone)]
pub enum ApiAuth {
    /// Caller-supplied key, sent as a header on every request.
    ApiKey(String),
    /// Shared free-tier path through the rate-limiting proxy; no key, and 429
    /// means the shared budget ran out rather than ours.
    SharedProxy,
}

/// One outbound HTTP exchange, already collapsed to what the retry ladder
/// needs. The seam exists so tests can script response sequences.
pub trait Transport: Send + Sync {
    fn execute(&self, url: &str, headers: &[(String, String)])
        -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Upstream-assigned request ID, when the response carried one.
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
    /// Timeouts, resets, DNS failures. Transient errors are retried.
    pub transient: bool,
}

struct ReqwestTransport;

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, TransportError> {
        let client = http_client().map_err(|err| TransportError {
            message: err.to_string(),
            transient: false,
        })?;
        let mut req = client.get(url);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let resp = req.send().map_err(classify_reqwest)?;
        let status = resp.status().as_u16();
        let request_id = resp
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = resp.text().map_err(classify_reqwest)?;
        Ok(HttpResponse {
            status,
            body,
            request_id,
        })
    }
}

fn classify_reqwest(err: reqwest::Error) -> TransportError {
    TransportError {
        transient: err.is_timeout() || err.is_connect() || err.is_request(),
        message: err.to_string(),
    }
}

/// Diagnostics accumulated while serving one logical request. Write-many,
/// drained exactly once by the caller.
#[derive(Debug, Clone, Default)]
pub struct RuntimeMeta {
    pub trace_ids: Vec<String>,
    pub stale_fallback: bool,
    pub stale_fallback_timestamps: Vec<DateTime<Utc>>,
}

impl RuntimeMeta {
    pub fn last_trace_id(&self) -> Option<&str> {
        self.trace_ids.last().map(|s| s.as_str())
    }

    /// Timestamp of the stalest cache hit served during this operation.
    pub fn oldest_stale_timestamp(&self) -> Option<DateTime<Utc>> {
        self.stale_fallback_timestamps.iter().min().copied()
    }
}

pub struct FetchClient {
    transport: Box<dyn Transport>,
    cache: ResponseCache,
    auth: ApiAuth,
    base_url: String,
    meta: Mutex<RuntimeMeta>,
    skip_backoff: bool,
}

impl FetchClient {
    pub fn new(base_url: impl Into<String>, auth: ApiAuth, cache: ResponseCache) -> Self {
        Self::with_transport(Box::new(ReqwestTransport), base_url, auth, cache)
    }

    pub fn with_transport(
        transport: Box<dyn Transport>,
        base_url: impl Into<String>,
        auth: ApiAuth,
        cache: ResponseCache,
    ) -> Self {
        Self {
            transport,
            cache,
            auth,
            base_url: base_url.into(),
            meta: Mutex::new(RuntimeMeta::default()),
            skip_backoff: false,
        }
    }

    /// Disable retry delays. Tests only.
    pub fn without_backoff(mut self) -> Self {
        self.skip_backoff = true;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Read-and-reset the diagnostics accumulator. Call once per user-facing
    /// operation so earlier operations never leak into later ones.
    pub fn drain_meta(&self) -> RuntimeMeta {
        std::mem::take(&mut *self.meta.lock().expect("runtime meta lock poisoned"))
    }

    /// Fetch `endpoint` with `params`, serving fresh cache hits without any
    /// network traffic and degrading to stale cache on upstream failure.
    pub fn fetch(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        policy: CachePolicy,
    ) -> Result<Value, FetchError> {
        let key = cache_key(endpoint, params);
        let cached = self.cache.get(&key);
        if let Some(hit) = cached.as_ref() {
            if !hit.is_stale {
                return Ok(hit.data.clone());
            }
        }

        let url = self.build_url(endpoint, params);
        let mut last_err: Option<FetchError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                self.backoff(attempt);
            }
            let local_trace = new_trace_id();
            let headers = self.request_headers(&local_trace);

            let resp = match self.transport.execute(&url, &headers) {
                Ok(resp) => resp,
                Err(err) => {
                    self.record_trace(&local_trace);
                    let fetch_err = FetchError::Network {
                        upstream: self.base_url.clone(),
                        message: err.message,
                        trace_id: Some(local_trace),
                    };
                    if err.transient && attempt < MAX_ATTEMPTS {
                        last_err = Some(fetch_err);
                        continue;
                    }
                    return self.stale_or(cached.as_ref(), fetch_err);
                }
            };

            // Prefer the upstream's own request ID when it reports one.
            let trace = resp.request_id.clone().unwrap_or(local_trace);
            self.record_trace(&trace);

            match resp.status {
                status if (200..300).contains(&status) => {
                    let value: Value = match serde_json::from_str(&resp.body) {
                        Ok(v) => v,
                        Err(err) => {
                            return self.stale_or(
                                cached.as_ref(),
                                FetchError::Parse {
                                    upstream: self.base_url.clone(),
                                    message: err.to_string(),
                                    trace_id: Some(trace),
                                },
                            );
                        }
                    };
                    // Even HTTP 200 can carry an in-body error list.
                    if let Some(message) = envelope_error(&value) {
                        return self.stale_or(
                            cached.as_ref(),
                            FetchError::Unknown {
                                upstream: self.base_url.clone(),
                                message,
                                trace_id: Some(trace),
                            },
                        );
                    }
                    let _ = self
                        .cache
                        .set(&key, &value, policy.stale_after, policy.expires_after);
                    return Ok(value);
                }
                401 | 403 => {
                    // A credential problem is not fixed by old data.
                    return Err(FetchError::Unauthorized {
                        upstream: self.base_url.clone(),
                        trace_id: Some(trace),
                    });
                }
                429 => {
                    let message = match self.auth {
                        ApiAuth::SharedProxy => {
                            "shared request budget exhausted; retry in a minute".to_string()
                        }
                        ApiAuth::ApiKey(_) => {
                            "request quota exhausted for the configured api key".to_string()
                        }
                    };
                    return self.stale_or(
                        cached.as_ref(),
                        FetchError::RateLimited {
                            upstream: self.base_url.clone(),
                            message,
                            trace_id: Some(trace),
                        },
                    );
                }
                status if RETRYABLE_STATUSES.contains(&status) => {
                    let fetch_err = FetchError::Unknown {
                        upstream: self.base_url.clone(),
                        message: format!("http {status}"),
                        trace_id: Some(trace),
                    };
                    if attempt < MAX_ATTEMPTS {
                        last_err = Some(fetch_err);
                        continue;
                    }
                    return self.stale_or(cached.as_ref(), fetch_err);
                }
                status => {
                    return self.stale_or(
                        cached.as_ref(),
                        FetchError::Unknown {
                            upstream: self.base_url.clone(),
                            message: format!("http {status}"),
                            trace_id: Some(trace),
                        },
                    );
                }
            }
        }

        let err = last_err.unwrap_or_else(|| FetchError::Unknown {
            upstream: self.base_url.clone(),
            message: "retries exhausted".to_string(),
            trace_id: None,
        });
        self.stale_or(cached.as_ref(), err)
    }

    /// Serve the stale-but-unexpired entry if one exists, marking the
    /// diagnostics accumulator; otherwise propagate `err`.
    fn stale_or(
        &self,
        cached: Option<&CachedValue>,
        err: FetchError,
    ) -> Result<Value, FetchError> {
        let Some(hit) = cached else {
            return Err(err);
        };
        let mut meta = self.meta.lock().expect("runtime meta lock poisoned");
        meta.stale_fallback = true;
        meta.stale_fallback_timestamps.push(hit.cached_at);
        Ok(hit.data.clone())
    }

    fn record_trace(&self, trace: &str) {
        self.meta
            .lock()
            .expect("runtime meta lock poisoned")
            .trace_ids
            .push(trace.to_string());
    }

    fn request_headers(&self, trace: &str) -> Vec<(String, String)> {
        let mut headers = vec![(TRACE_HEADER.to_string(), trace.to_string())];
        if let ApiAuth::ApiKey(key) = &self.auth {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }
        headers
    }

    fn build_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        for (i, (name, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(name);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    fn backoff(&self, attempt: u32) {
        if self.skip_backoff {
            return;
        }
        let base = BACKOFF_BASE_MS * (1u64 << (attempt - 2));
        let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
        let delay = (base + jitter).min(BACKOFF_CAP_MS);
        std::thread::sleep(Duration::from_millis(delay));
    }
}

/// Non-empty `errors` in the response envelope, array- or object-shaped.
pub fn envelope_error(value: &Value) -> Option<String> {
    match value.get("errors") {
        Some(Value::Array(items)) if !items.is_empty() => Some(
            items
                .iter()
                .map(describe_error_item)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        Some(Value::Object(map)) if !map.is_empty() => Some(
            map.iter()
                .map(|(k, v)| format!("{k}: {}", describe_error_item(v)))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

fn describe_error_item(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn new_trace_id() -> String {
    format!("{:016x}", rand::thread_rng().r#gen::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_error_flags_both_shapes() {
        assert!(envelope_error(&json!({"errors": ["token invalid"], "response": []})).is_some());
        assert!(
            envelope_error(&json!({"errors": {"plan": "limit reached"}, "response": []}))
                .is_some()
        );
        assert!(envelope_error(&json!({"errors": [], "response": [1]})).is_none());
        assert!(envelope_error(&json!({"errors": {}, "response": [1]})).is_none());
        assert!(envelope_error(&json!({"response": [1]})).is_none());
    }

    #[test]
    fn trace_ids_are_hex_and_distinct() {
        let a = new_trace_id();
        let b = new_trace_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
