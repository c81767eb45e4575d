//! Sponsor and contributor badge sheets.
//!
//! Records flow through the tier classifier (sponsors only), the logo
//! normalizer, the row-packing layout engine and finally the SVG renderer.

pub mod commands;
pub mod config;
pub mod error;
pub mod layout;
pub mod logos;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod quantize;
pub mod render;
pub mod sources;
pub mod tiers;

pub use config::Config;
pub use error::{ConfigError, NormalizeError, SourceError};
pub use layout::{MarginPolicy, RowPacker};
pub use model::{Badge, LayoutResult, PlacedBadge, Raster, Record, Tier};
pub use pipeline::Target;
