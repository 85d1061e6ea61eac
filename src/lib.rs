mod config;
mod errors;
mod geocode;
mod ingestion;
mod map;
mod pipeline;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use geocode::{
    build_query, CityResolver, Coordinates, Geocoder, NominatimClient, ProgressObserver,
    RateLimiter, ResolveProgress, ResolveStats, ResolvedRow,
};
pub use ingestion::{parse_rows, read_rows, AssetRow};
pub use map::{
    build_markers, build_view, scale_radius, MapBounds, MapProfile, MapView, Marker, RadiusRange,
};
pub use pipeline::{
    MapperPipeline, PipelineRun, RunOutcome, RunReport, GEOCODING_NOTICE, NO_LOCATIONS_WARNING,
};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,city_asset_mapper=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
