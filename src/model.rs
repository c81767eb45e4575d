//! Data types shared by the classifier, normalizer, layout engine and renderer.
//!
//! Everything here is plain data: no filesystem or network side effects.

use serde::{Deserialize, Serialize};

/// One sponsor or contributor as loaded from the data files.
///
/// `weight` is the donated total for sponsors and the contribution count for
/// contributors; the JSON field is `amount` or `count` respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub logo: String,
    pub link: String,
    #[serde(alias = "amount", alias = "count")]
    pub weight: f64,
}

/// A donation bracket. Tiers are ordered by `min_amount` descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub id: String,
    pub name: String,
    pub min_amount: f64,
    /// Display height of badges in this tier.
    pub size: u32,
    /// Center-crop logos to a square (avatar-style tiers).
    #[serde(default)]
    pub crop: bool,
}

/// Compressed raster of a normalized logo.
///
/// `width` and `height` are the nominal display size, i.e. the oversampled
/// pixel dimensions halved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// A record paired with its normalized raster. `raster` is `None` when the
/// logo could not be fetched or decoded; such badges are skipped by layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub record: Record,
    pub raster: Option<Raster>,
}

impl Badge {
    pub fn new(record: Record, raster: Raster) -> Self {
        Self {
            record,
            raster: Some(raster),
        }
    }

    pub fn failed(record: Record) -> Self {
        Self {
            record,
            raster: None,
        }
    }
}

/// A badge positioned on the canvas by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedBadge<'a> {
    pub badge: &'a Badge,
    pub raster: &'a Raster,
    pub x: i64,
    pub y: i64,
    pub row_max_height: u32,
}

/// Output of one layout pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult<'a> {
    pub placed: Vec<PlacedBadge<'a>>,
    pub rows: usize,
    /// Vertical cursor after the last row.
    pub total_height: i64,
}
