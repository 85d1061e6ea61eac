use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::geocode::{CityResolver, ProgressObserver, ResolveStats};
use crate::ingestion::{self, AssetRow};
use crate::map::{build_view, MapProfile, MapView};

pub const GEOCODING_NOTICE: &str = "Geocoding cities. This may take a while for large files.";
pub const NO_LOCATIONS_WARNING: &str = "No valid city locations found in your data.";

#[derive(Debug)]
pub enum RunOutcome {
    Mapped(MapView),
    NoLocations,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stats: ResolveStats,
}

#[derive(Debug)]
pub struct PipelineRun {
    pub outcome: RunOutcome,
    pub report: RunReport,
}

/// One upload, one run: validate, normalize, resolve sequentially, drop
/// misses, scale radii, emit the view. Nothing survives across runs.
pub struct MapperPipeline {
    resolver: CityResolver,
    profile: MapProfile,
}

impl MapperPipeline {
    pub fn new(config: &AppConfig, profile: MapProfile) -> AppResult<Self> {
        Ok(Self::with_resolver(CityResolver::new(config)?, profile))
    }

    pub fn with_resolver(resolver: CityResolver, profile: MapProfile) -> Self {
        Self { resolver, profile }
    }

    pub async fn run_file(
        &self,
        path: &Path,
        observer: Option<ProgressObserver>,
    ) -> AppResult<PipelineRun> {
        let rows = ingestion::read_rows(path)?;
        Ok(self.run_rows(rows, observer).await)
    }

    pub async fn run_rows(
        &self,
        rows: Vec<AssetRow>,
        observer: Option<ProgressObserver>,
    ) -> PipelineRun {
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(rows = rows.len(), "{GEOCODING_NOTICE}");
        let (resolved, stats) = self
            .resolver
            .resolve_rows(rows, self.profile.country_suffix.as_deref(), observer)
            .await;

        let outcome = match build_view(&resolved, &self.profile) {
            Some(view) => RunOutcome::Mapped(view),
            None => {
                warn!("{NO_LOCATIONS_WARNING}");
                RunOutcome::NoLocations
            }
        };

        let report = RunReport {
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            stats,
        };
        info!(
            resolved = report.stats.resolved,
            missed = report.stats.missed,
            duration_ms = report.duration_ms,
            "run complete"
        );

        PipelineRun { outcome, report }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::AppResult;
    use crate::geocode::{Coordinates, Geocoder};

    struct GridGeocoder;

    #[async_trait]
    impl Geocoder for GridGeocoder {
        async fn geocode(&self, query: &str) -> AppResult<Option<Coordinates>> {
            // Queries mentioning "Lost" never resolve.
            if query.contains("Lost") {
                return Ok(None);
            }
            let shift = query.len() as f64 / 10.0;
            Ok(Some(Coordinates {
                lat: 20.0 + shift,
                lon: 70.0 + shift,
            }))
        }
    }

    fn pipeline(profile: MapProfile) -> MapperPipeline {
        let resolver =
            CityResolver::with_lookup(Arc::new(GridGeocoder), Duration::from_millis(0));
        MapperPipeline::with_resolver(resolver, profile)
    }

    fn row(city: &str, state: &str, count: f64) -> AssetRow {
        AssetRow {
            state: state.into(),
            city: city.into(),
            count,
        }
    }

    #[tokio::test]
    async fn maps_resolved_rows_and_drops_the_rest() {
        let rows = vec![
            row("Springfield", "Illinois", 5.0),
            row("Lost Creek", "Illinois", 9.0),
            row("Chicago", "Illinois", 10.0),
        ];
        let run = pipeline(MapProfile::standard()).run_rows(rows, None).await;

        let view = match run.outcome {
            RunOutcome::Mapped(view) => view,
            RunOutcome::NoLocations => panic!("expected a mapped outcome"),
        };
        assert_eq!(view.markers.len(), 2);
        assert!(view.markers.len() <= run.report.stats.total_rows);
        assert_eq!(run.report.stats.missed, 1);

        for marker in &view.markers {
            assert!((5.0..=15.0).contains(&marker.radius));
        }
        // Chicago carries the batch maximum.
        assert_eq!(view.markers[1].radius, 15.0);
    }

    #[tokio::test]
    async fn zero_survivors_produce_a_warning_outcome() {
        let rows = vec![row("Lost Hollow", "Nowhere", 4.0)];
        let run = pipeline(MapProfile::standard()).run_rows(rows, None).await;

        assert!(matches!(run.outcome, RunOutcome::NoLocations));
        assert_eq!(run.report.stats.resolved, 0);
        assert_eq!(run.report.stats.missed, 1);
    }

    #[tokio::test]
    async fn single_row_takes_the_maximum_radius() {
        let rows = vec![row("Pune", "Maharashtra", 5.0)];
        let run = pipeline(MapProfile::india()).run_rows(rows, None).await;

        match run.outcome {
            RunOutcome::Mapped(view) => {
                assert_eq!(view.markers[0].radius, 16.0);
                assert!(view.lock_pan);
            }
            RunOutcome::NoLocations => panic!("expected a mapped outcome"),
        }
    }
}
