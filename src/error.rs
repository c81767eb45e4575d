//! Error types for configuration, badge normalization and data refresh.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems with the project configuration. Raised before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no sponsor tiers configured")]
    NoTiers,

    #[error("tier '{0}' is defined more than once")]
    DuplicateTier(String),

    #[error("tier '{tier}' has min_amount {min} which is not below the previous tier's {previous}")]
    TierOrder { tier: String, min: f64, previous: f64 },

    #[error("badge height for '{0}' must be positive")]
    ZeroHeight(String),

    #[error("margin scale must be positive, got {0}")]
    MarginScale(i64),

    #[error("badge height {height} gives a negative margin ({margin})")]
    NegativeMargin { height: u32, margin: i64 },

    #[error("canvas width {width} leaves no room after side padding {padding}")]
    CanvasTooNarrow { width: u32, padding: u32 },

    #[error("palette_colors must be within 2..=256, got {0}")]
    PaletteColors(u16),

    #[error("quality range {min}-{max} must satisfy min <= max <= 100")]
    QualityRange { min: u8, max: u8 },
}

/// Per-item failure while turning a logo reference into a badge raster.
///
/// These never abort a run: the badge is logged and left out of its sheet.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("request for '{logo}' failed: {source}")]
    Fetch {
        logo: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for '{logo}' returned {status}")]
    Status {
        logo: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode '{logo}': {source}")]
    Decode {
        logo: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse svg '{logo}': {source}")]
    Svg {
        logo: String,
        #[source]
        source: resvg::usvg::Error,
    },

    #[error("'{0}' has no drawable area")]
    Empty(String),

    #[error("'{logo}' is {width}x{height}, wider than {max}:1")]
    TooWide {
        logo: String,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("failed to encode png: {0}")]
    Encode(String),

    #[error("normalization task for '{logo}' did not complete: {reason}")]
    Task { logo: String, reason: String },
}

/// Failure pulling sponsor or contributor lists from their upstream APIs.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected payload from {url}: {source}")]
    Payload {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch task failed: {0}")]
    Task(String),
}
