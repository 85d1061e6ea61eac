use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::geocode::{Coordinates, ResolvedRow};

const ZOOM_START: u8 = 5;
const VIEWPORT_WIDTH: u32 = 700;
const VIEWPORT_HEIGHT: u32 = 500;
const MARKER_COLOR: &str = "blue";

// Viewing window used when the dataset is pinned to the Indian
// subcontinent.
const INDIA_SOUTH_WEST: Coordinates = Coordinates { lat: 6.0, lon: 68.0 };
const INDIA_NORTH_EAST: Coordinates = Coordinates { lat: 37.0, lon: 97.5 };

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RadiusRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

/// Configuration-level pipeline variant: query qualifier, radius range,
/// and the optional fixed viewing window.
#[derive(Debug, Clone)]
pub struct MapProfile {
    pub country_suffix: Option<String>,
    pub radius_range: RadiusRange,
    pub view_window: Option<MapBounds>,
    pub lock_pan: bool,
}

impl MapProfile {
    pub fn standard() -> Self {
        Self {
            country_suffix: None,
            radius_range: RadiusRange { min: 5.0, max: 15.0 },
            view_window: None,
            lock_pan: false,
        }
    }

    pub fn india() -> Self {
        Self {
            country_suffix: Some("India".to_string()),
            radius_range: RadiusRange { min: 5.0, max: 16.0 },
            view_window: Some(MapBounds {
                south_west: INDIA_SOUTH_WEST,
                north_east: INDIA_NORTH_EAST,
            }),
            lock_pan: true,
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::standard()),
            "india" => Ok(Self::india()),
            _ => Err(AppError::Config(format!("unknown map profile: {value}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub position: Coordinates,
    pub radius: f64,
    pub label: String,
}

/// Everything the host's map widget needs: marker list plus the view
/// configuration. Serialized verbatim across the embedding boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center: Coordinates,
    pub zoom_start: u8,
    pub width: u32,
    pub height: u32,
    pub marker_color: &'static str,
    pub max_bounds: Option<MapBounds>,
    pub lock_pan: bool,
    pub markers: Vec<Marker>,
    pub generated_at: DateTime<Utc>,
}

/// Min-max scaling of `count` against the batch maximum. A batch whose
/// counts are all zero maps every radius to the range minimum.
pub fn scale_radius(count: f64, max_count: f64, range: RadiusRange) -> f64 {
    if max_count <= 0.0 {
        return range.min;
    }
    let radius = range.min + (range.max - range.min) * (count / max_count);
    radius.clamp(range.min, range.max)
}

pub fn build_markers(resolved: &[ResolvedRow], range: RadiusRange) -> Vec<Marker> {
    let max_count = resolved
        .iter()
        .map(|entry| entry.row.count)
        .fold(0.0_f64, f64::max);

    resolved
        .iter()
        .map(|entry| Marker {
            position: entry.position,
            radius: scale_radius(entry.row.count, max_count, range),
            label: format!(
                "{}, {}: {}",
                entry.row.city, entry.row.state, entry.row.count
            ),
        })
        .collect()
}

/// Build the widget-facing view. Returns `None` for an empty batch so the
/// caller can surface the no-locations warning instead of a map.
pub fn build_view(resolved: &[ResolvedRow], profile: &MapProfile) -> Option<MapView> {
    if resolved.is_empty() {
        return None;
    }

    let total = resolved.len() as f64;
    let center = Coordinates {
        lat: resolved.iter().map(|entry| entry.position.lat).sum::<f64>() / total,
        lon: resolved.iter().map(|entry| entry.position.lon).sum::<f64>() / total,
    };

    Some(MapView {
        center,
        zoom_start: ZOOM_START,
        width: VIEWPORT_WIDTH,
        height: VIEWPORT_HEIGHT,
        marker_color: MARKER_COLOR,
        max_bounds: profile.view_window,
        lock_pan: profile.lock_pan,
        markers: build_markers(resolved, profile.radius_range),
        generated_at: Utc::now(),
    })
}
