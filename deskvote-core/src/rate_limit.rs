use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use deskvote_dependencies::axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};
use deskvote_dependencies::moka::sync::Cache;

use crate::error::{DeskError, DeskResult};
use crate::request_helper::ClientIp;

type Log = Arc<Mutex<VecDeque<Instant>>>;

/// Sliding-window log limiter keyed by caller IP.
///
/// A request is admitted while fewer than `limit` requests of the same key were
/// admitted within the last `window`. Keys idle for a whole window are evicted.
pub struct SlidingWindow {
    name: &'static str,
    limit: usize,
    window: Duration,
    logs: Cache<String, Log>,
}

impl std::fmt::Debug for SlidingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindow")
            .field("name", &self.name)
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("keys", &self.logs.entry_count())
            .finish()
    }
}

impl SlidingWindow {
    /// A `limit` of zero admits everything.
    pub fn new(name: &'static str, limit: usize, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
            logs: Cache::builder().time_to_idle(window).build(),
        }
    }

    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    /// Admits or rejects a request made at `now`. On rejection returns how long
    /// until the oldest admitted request leaves the window.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        if self.limit == 0 {
            return Ok(());
        }
        let log = self
            .logs
            .get_with_by_ref(key, || Arc::new(Mutex::new(VecDeque::new())));
        let mut log = log.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }
        if log.len() < self.limit {
            log.push_back(now);
            return Ok(());
        }
        let oldest = log.front().copied().unwrap_or(now);
        Err(self
            .window
            .saturating_sub(now.saturating_duration_since(oldest)))
    }

    /// Same as [`SlidingWindow::check`] but as a request error.
    pub fn admit(&self, key: &str) -> DeskResult<()> {
        self.check(key).map_err(|wait| {
            warn!("{} limit hit for {:?}", self.name, key);
            DeskError::RateLimited {
                retry_after: retry_after_secs(wait),
            }
        })
    }
}

/// Whole seconds to wait, never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Middleware body shared by the admission layers of the router.
pub async fn admit_request(
    limiter: &SlidingWindow,
    trust_forwarded: bool,
    req: Request<Body>,
    next: Next<Body>,
) -> DeskResult<Response> {
    let ip = ClientIp::resolve(req.headers(), req.extensions(), trust_forwarded);
    limiter.admit(ip.as_str())?;
    Ok(next.run(req).await)
}
