use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sea_orm::DatabaseConnection;

/// Fixed-window request counter per client address, used on login and
/// register.
pub struct RateLimiter {
    windows: DashMap<IpAddr, Window>,
    max_requests: u32,
    window: Duration,
}

struct Window {
    started: Instant,
    hits: u32,
}

impl Default for RateLimiter {
    /// 10 requests per minute.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Counts one request from `client`. Over the limit, returns how long
    /// until its window reopens.
    pub fn hit(&self, client: IpAddr) -> Result<(), Duration> {
        self.hit_at(client, Instant::now())
    }

    fn hit_at(&self, client: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut window = self.windows.entry(client).or_insert(Window { started: now, hits: 0 });
        if now.saturating_duration_since(window.started) >= self.window {
            *window = Window { started: now, hits: 0 };
        }
        let elapsed = now.saturating_duration_since(window.started);
        if window.hits >= self.max_requests {
            return Err(self.window.saturating_sub(elapsed));
        }
        window.hits += 1;
        Ok(())
    }

    /// Forget clients whose window closed.
    pub fn prune(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// JWT signing secret
    pub jwt_secret: String,
    /// Host name accepted besides localhost
    pub external_host: String,
    /// Rate limiter for login/register
    pub auth_rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, jwt_secret: String, external_host: String) -> Self {
        Self {
            db,
            jwt_secret,
            external_host,
            auth_rate_limiter: Arc::new(RateLimiter::default()),
        }
    }

    pub fn with_auth_rate_limit(mut self, limiter: RateLimiter) -> Self {
        self.auth_rate_limiter = Arc::new(limiter);
        self
    }
}
