use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::error::LoadError;
use crate::core::constants::{messages, view};
use crate::params::is_tilejson_url;

/// The two resource formats the viewer knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    TileJson,
    Stac,
}

impl ResourceKind {
    /// Guess the kind from the URL alone. Anything that is not TileJSON is
    /// treated as STAC.
    pub fn detect(url: &str) -> Self {
        if is_tilejson_url(url) {
            Self::TileJson
        } else {
            Self::Stac
        }
    }

    /// Prefix used for activity event names.
    pub fn label(self) -> &'static str {
        match self {
            Self::TileJson => "tilejson",
            Self::Stac => "stac",
        }
    }

    pub fn loading_message(self) -> &'static str {
        match self {
            Self::TileJson => messages::LOADING_TILEJSON,
            Self::Stac => messages::LOADING_STAC,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TileJson => write!(f, "TileJSON"),
            Self::Stac => write!(f, "STAC"),
        }
    }
}

/// Bounding box in EPSG:4326 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Read a GeoJSON/STAC `bbox`: four numbers, or six for 3D boxes where
    /// the elevation components are dropped.
    pub fn from_bbox(value: &Value) -> Option<Self> {
        let numbers: Vec<f64> = value
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect::<Option<_>>()?;

        match numbers.as_slice() {
            [min_x, min_y, max_x, max_y] => Some(Self::new(*min_x, *min_y, *max_x, *max_y)),
            [min_x, min_y, _, max_x, max_y, _] => {
                Some(Self::new(*min_x, *min_y, *max_x, *max_y))
            }
            _ => None,
        }
    }

    pub fn union(self, other: Extent) -> Extent {
        Extent::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    fn around(x: f64, y: f64) -> Extent {
        Extent::new(x, y, x, y)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Center {
    pub lon: f64,
    pub lat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
}

/// Everything the map needs to show a loaded resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub kind: ResourceKind,
    pub source_url: String,
    pub extent: Option<Extent>,
    pub center: Option<Center>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
}

/// How the view is moved onto a newly added layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOptions {
    /// Top, right, bottom, left in pixels
    pub padding: [u32; 4],
    pub duration_ms: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding: [view::FIT_PADDING; 4],
            duration_ms: view::FIT_DURATION_MS,
        }
    }
}

/// Turn a fetched payload into a layer description.
pub fn build_layer(kind: ResourceKind, url: &str, payload: &Value) -> Result<LayerSpec, LoadError> {
    match kind {
        ResourceKind::TileJson => build_tilejson(url, payload),
        ResourceKind::Stac => build_stac(url, payload),
    }
}

fn build_tilejson(url: &str, payload: &Value) -> Result<LayerSpec, LoadError> {
    let object = payload.as_object().ok_or_else(|| {
        LoadError::LayerConstructionFailed("TileJSON document is not an object".to_string())
    })?;

    let has_tiles = object
        .get("tiles")
        .and_then(Value::as_array)
        .is_some_and(|tiles| tiles.iter().any(Value::is_string));
    if !has_tiles {
        return Err(LoadError::LayerConstructionFailed(
            "TileJSON document has no tile URLs".to_string(),
        ));
    }

    let center = object.get("center").and_then(Value::as_array).and_then(|c| {
        let lon = c.first()?.as_f64()?;
        let lat = c.get(1)?.as_f64()?;
        Some(Center {
            lon,
            lat,
            zoom: c.get(2).and_then(Value::as_f64),
        })
    });

    Ok(LayerSpec {
        kind: ResourceKind::TileJson,
        source_url: url.to_string(),
        extent: object.get("bounds").and_then(Extent::from_bbox),
        center,
        min_zoom: object.get("minzoom").and_then(Value::as_f64),
        max_zoom: object.get("maxzoom").and_then(Value::as_f64),
    })
}

fn build_stac(url: &str, payload: &Value) -> Result<LayerSpec, LoadError> {
    let kind = payload.get("type").and_then(Value::as_str).unwrap_or_default();

    let extent = match kind {
        "FeatureCollection" => {
            let features = payload
                .get("features")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if features.is_empty() {
                return Err(LoadError::EmptyResult(payload.clone()));
            }
            payload.get("bbox").and_then(Extent::from_bbox).or_else(|| {
                features
                    .iter()
                    .filter_map(feature_extent)
                    .reduce(Extent::union)
            })
        }
        "Feature" => feature_extent(payload),
        "Collection" => payload
            .pointer("/extent/spatial/bbox/0")
            .and_then(Extent::from_bbox),
        "Catalog" => None,
        "" => {
            return Err(LoadError::LayerConstructionFailed(
                "STAC document has no type".to_string(),
            ));
        }
        other => {
            return Err(LoadError::LayerConstructionFailed(format!(
                "Unsupported STAC type: {other}"
            )));
        }
    };

    Ok(LayerSpec {
        kind: ResourceKind::Stac,
        source_url: url.to_string(),
        extent,
        center: extent.map(|e| {
            let (lon, lat) = e.center();
            Center {
                lon,
                lat,
                zoom: None,
            }
        }),
        min_zoom: None,
        max_zoom: None,
    })
}

fn feature_extent(feature: &Value) -> Option<Extent> {
    feature
        .get("bbox")
        .and_then(Extent::from_bbox)
        .or_else(|| geometry_extent(feature.get("geometry")?.get("coordinates")?))
}

/// Extent of arbitrarily nested GeoJSON coordinate arrays.
fn geometry_extent(coordinates: &Value) -> Option<Extent> {
    let items = coordinates.as_array()?;
    if let [x, y, ..] = items.as_slice()
        && let (Some(x), Some(y)) = (x.as_f64(), y.as_f64())
    {
        return Some(Extent::around(x, y));
    }
    items
        .iter()
        .filter_map(geometry_extent)
        .reduce(Extent::union)
}
