//! Static route-preview map URLs.
//!
//! Builds a provider static-map URL with pickup marker "A", drop-off
//! marker "B" and a connecting path. Pure string construction: nothing is
//! fetched or validated against the provider.

use anyhow::{bail, Context, Result};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const DEFAULT_STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";

/// Fixed presentation of the preview image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StaticMapOptions {
    pub base_url: String,
    pub zoom: u8,
    /// "WIDTHxHEIGHT" in pixels.
    pub size: String,
    pub maptype: String,
    pub pickup_color: String,
    pub dropoff_color: String,
    /// 24-bit hex, e.g. "0x0000ff".
    pub path_color: String,
    pub path_weight: u8,
}

impl Default for StaticMapOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STATIC_MAP_URL.to_string(),
            zoom: 12,
            size: "600x300".to_string(),
            maptype: "roadmap".to_string(),
            pickup_color: "blue".to_string(),
            dropoff_color: "red".to_string(),
            path_color: "0x0000ff".to_string(),
            path_weight: 5,
        }
    }
}

pub struct StaticMapBuilder {
    options: StaticMapOptions,
    api_key: SecretString,
}

impl StaticMapBuilder {
    pub fn new(options: StaticMapOptions, api_key: SecretString) -> Result<Self> {
        let base = Url::parse(&options.base_url)
            .with_context(|| format!("Invalid static map base URL: {}", options.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!("Static map base URL must be http(s): {}", options.base_url);
        }
        if base.query().is_some() {
            bail!("Static map base URL must not carry a query: {}", options.base_url);
        }

        let valid_size = options
            .size
            .split_once('x')
            .map(|(w, h)| w.parse::<u32>().is_ok() && h.parse::<u32>().is_ok())
            .unwrap_or(false);
        if !valid_size {
            bail!("Static map size must look like 600x300, got {}", options.size);
        }

        Ok(Self { options, api_key })
    }

    /// Route preview URL for two location strings. Deterministic.
    pub fn build(&self, pickup: &str, dropoff: &str) -> String {
        let o = &self.options;
        let pickup = marker_location(pickup);
        let dropoff = marker_location(dropoff);

        let params = [
            ("center", pickup.clone()),
            ("zoom", o.zoom.to_string()),
            ("size", o.size.clone()),
            ("maptype", o.maptype.clone()),
            ("markers", format!("color:{}|label:A|{pickup}", o.pickup_color)),
            ("markers", format!("color:{}|label:B|{dropoff}", o.dropoff_color)),
            (
                "path",
                format!("color:{}|weight:{}|{pickup}|{dropoff}", o.path_color, o.path_weight),
            ),
            ("key", self.api_key.expose_secret().clone()),
        ];

        let query: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect();

        format!("{}?{}", o.base_url, query.join("&"))
    }
}

/// A `|` inside a location would split the marker/path value, so it
/// becomes a space.
fn marker_location(location: &str) -> String {
    location.trim().replace('|', " ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
