use crate::models::ApiError;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_LIMIT_PER_MIN: u32 = 120;
const WINDOW: Duration = Duration::from_secs(60);

/// API-key auth plus per-org rate limiting.
///
/// `LISTINGLIFT_API_KEYS` holds `org:key` pairs, comma separated. When the
/// variable is unset the API stays open and every caller counts against one
/// shared "public" budget; the hosted deployment fronts the API with its own
/// session auth in that mode.
pub struct Security {
    keys: HashMap<String, String>,
    limit_per_min: u32,
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    started: Instant,
    count: u32,
}

struct RateDecision {
    allowed: bool,
    remaining: u32,
    reset_secs: u64,
}

impl Security {
    pub fn from_env() -> Self {
        let keys = std::env::var("LISTINGLIFT_API_KEYS")
            .map(|raw| parse_keys(&raw))
            .unwrap_or_default();
        let limit_per_min = std::env::var("RATE_LIMIT_PER_MIN")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_LIMIT_PER_MIN);
        Self::new(keys, limit_per_min)
    }

    fn new(keys: HashMap<String, String>, limit_per_min: u32) -> Self {
        Self {
            keys,
            limit_per_min,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolve the caller's org. `None` means reject.
    fn authenticate(&self, presented: Option<&str>) -> Option<String> {
        if self.open() {
            return Some("public".into());
        }
        presented.and_then(|key| self.keys.get(key).cloned())
    }

    fn check_rate(&self, org: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = windows.entry(org.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= WINDOW {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;
        let allowed = window.count <= self.limit_per_min;
        let remaining = self.limit_per_min.saturating_sub(window.count);
        let reset_secs = WINDOW
            .saturating_sub(now.duration_since(window.started))
            .as_secs();
        RateDecision {
            allowed,
            remaining,
            reset_secs,
        }
    }
}

/// Middleware applied to every API route.
pub async fn guard(
    State(security): State<Arc<Security>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(org) = security.authenticate(presented) else {
        warn!(target = "listinglift.api", "rejected request with bad api key");
        let body = ApiError {
            error: "unauthorized".into(),
            detail: Some("invalid or missing api key".into()),
        };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    };

    let decision = security.check_rate(&org);
    if !decision.allowed {
        warn!(target = "listinglift.api", org = %org, "rate limit exceeded");
        let body = ApiError {
            error: "rate_limited".into(),
            detail: Some("too many requests".into()),
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        apply_rate_headers(&mut response, security.limit_per_min, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_headers(&mut response, security.limit_per_min, &decision);
    response
}

fn apply_rate_headers(response: &mut Response, limit: u32, decision: &RateDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert("x-ratelimit-reset", value);
    }
}

/// `org:key,org:key` -> key-indexed map. Malformed entries are skipped.
fn parse_keys(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (org, key) = entry.trim().split_once(':')?;
            if org.is_empty() || key.is_empty() {
                return None;
            }
            Some((key.to_string(), org.to_string()))
        })
        .collect()
}
