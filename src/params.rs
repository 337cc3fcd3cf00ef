//! TileJSON query-parameter handling
//!
//! Tiler endpoints (titiler and friends) accept rendering options as query
//! parameters. The viewer lets users supply them separately and merges them
//! into the URL before loading.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static ASSET_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\n\r\t ,;]+").expect("asset separator pattern is valid"));

/// Whether the URL points at a TileJSON document rather than a STAC item.
pub fn is_tilejson_url(url: &str) -> bool {
    url.to_lowercase().contains("tilejson")
}

/// Advanced rendering options for TileJSON endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileJsonParams {
    /// Asset names, separated by commas, semicolons or whitespace
    pub assets: Option<String>,
    pub color_formula: Option<String>,
    pub tile_format: Option<String>,
    /// Raw query string appended verbatim, e.g. `rescale=0,3000&nodata=0`
    pub extra_params: Option<String>,
}

impl TileJsonParams {
    /// Fill unset fields from `other`.
    pub fn or(self, other: &TileJsonParams) -> TileJsonParams {
        TileJsonParams {
            assets: self.assets.or_else(|| other.assets.clone()),
            color_formula: self.color_formula.or_else(|| other.color_formula.clone()),
            tile_format: self.tile_format.or_else(|| other.tile_format.clone()),
            extra_params: self.extra_params.or_else(|| other.extra_params.clone()),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Merge `params` into the query of `url`.
///
/// - `assets` replaces every existing `assets` pair, one pair per asset;
/// - `color_formula` and `tile_format` replace existing values;
/// - `asset_as_band=True` is always set;
/// - `extra_params` pairs are appended as given.
///
/// An unparseable `url` is returned unchanged.
pub fn apply_tilejson_params(url: &str, params: &TileJsonParams) -> String {
    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Failed to apply TileJSON parameters to {url}: {e}");
            return url.to_string();
        }
    };

    let mut pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

    if let Some(assets) = non_blank(&params.assets) {
        pairs.retain(|(k, _)| k != "assets");
        pairs.extend(
            ASSET_SEPARATOR
                .split(assets)
                .filter(|a| !a.is_empty())
                .map(|a| ("assets".to_string(), a.to_string())),
        );
    }

    if let Some(formula) = non_blank(&params.color_formula) {
        set_pair(&mut pairs, "color_formula", formula);
    }

    set_pair(&mut pairs, "asset_as_band", "True");

    if let Some(format) = non_blank(&params.tile_format) {
        set_pair(&mut pairs, "tile_format", format);
    }

    if let Some(extra) = non_blank(&params.extra_params) {
        let extra = extra.trim_start_matches(['?', '&']);
        pairs.extend(url::form_urlencoded::parse(extra.as_bytes()).into_owned());
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    match pairs.iter().position(|(k, _)| k == key) {
        Some(first) => {
            pairs[first].1 = value.to_string();
            let mut index = 0;
            pairs.retain(|(k, _)| {
                let keep = k != key || index == first;
                index += 1;
                keep
            });
        }
        None => pairs.push((key.to_string(), value.to_string())),
    }
}
