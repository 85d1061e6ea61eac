use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::ingestion::AssetRow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// An input row that resolved to a location. Rows missing either
/// coordinate never become one of these and drop out of the run.
#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub row: AssetRow,
    pub position: Coordinates,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ResolveStats {
    pub total_rows: usize,
    pub resolved: usize,
    pub missed: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveProgress {
    pub total_rows: usize,
    pub processed: usize,
    pub resolved: usize,
}

pub type ProgressObserver = Arc<dyn Fn(ResolveProgress) + Send + Sync>;

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-text place query. `Ok(None)` is a miss.
    async fn geocode(&self, query: &str) -> AppResult<Option<Coordinates>>;
}

pub fn build_query(city: &str, state: &str, country_suffix: Option<&str>) -> String {
    match country_suffix {
        Some(country) => format!("{city}, {state}, {country}"),
        None => format!("{city}, {state}"),
    }
}

/// Enforces the geocoder's minimum spacing between calls. Holds the
/// last-call instant; `wait` sleeps out whatever remains of the interval.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: AsyncMutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut guard = self.last_call.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

pub struct NominatimClient {
    http: reqwest::Client,
    endpoint: String,
}

impl NominatimClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.geocoder_user_agent.clone())
            .timeout(Duration::from_secs(config.geocode_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.geocoder_endpoint.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &str) -> AppResult<Option<Coordinates>> {
        // Nominatim serializes lat/lon as strings.
        #[derive(Deserialize)]
        struct SearchHit {
            lat: String,
            lon: String,
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?;

        let hits: Vec<SearchHit> = response.json().await?;
        Ok(hits.into_iter().next().and_then(|hit| {
            let lat = hit.lat.trim().parse().ok()?;
            let lon = hit.lon.trim().parse().ok()?;
            Some(Coordinates { lat, lon })
        }))
    }
}

pub struct CityResolver {
    lookup: Arc<dyn Geocoder>,
    rate_limiter: RateLimiter,
}

impl CityResolver {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let lookup = NominatimClient::new(config)?;
        Ok(Self::with_lookup(
            Arc::new(lookup),
            Duration::from_millis(config.geocode_min_interval_ms),
        ))
    }

    pub fn with_lookup(lookup: Arc<dyn Geocoder>, min_interval: Duration) -> Self {
        Self {
            lookup,
            rate_limiter: RateLimiter::new(min_interval),
        }
    }

    /// Resolve every row in order, one call at a time. Misses are dropped
    /// without a per-row error; a transport failure counts as a miss.
    pub async fn resolve_rows(
        &self,
        rows: Vec<AssetRow>,
        country_suffix: Option<&str>,
        observer: Option<ProgressObserver>,
    ) -> (Vec<ResolvedRow>, ResolveStats) {
        let mut stats = ResolveStats {
            total_rows: rows.len(),
            ..ResolveStats::default()
        };
        let mut resolved = Vec::with_capacity(rows.len());

        for (processed, row) in rows.into_iter().enumerate() {
            let query = build_query(&row.city, &row.state, country_suffix);
            self.rate_limiter.wait().await;
            match self.lookup.geocode(&query).await {
                Ok(Some(position)) => {
                    stats.resolved += 1;
                    resolved.push(ResolvedRow { row, position });
                }
                Ok(None) => {
                    debug!(%query, "no geocoding match; dropping row");
                    stats.missed += 1;
                }
                Err(err) => {
                    warn!(?err, %query, "geocoder call failed; treating as a miss");
                    stats.missed += 1;
                }
            }
            if let Some(callback) = &observer {
                callback(ResolveProgress {
                    total_rows: stats.total_rows,
                    processed: processed + 1,
                    resolved: stats.resolved,
                });
            }
        }

        (resolved, stats)
    }
}
