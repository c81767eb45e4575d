//! Project configuration loaded from `badgesheet.toml`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::MarginPolicy;
use crate::model::Tier;

pub const DEFAULT_CONFIG_FILE: &str = "badgesheet.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory relative paths are resolved against. Not part of the file.
    #[serde(skip)]
    pub root: PathBuf,
    pub paths: Paths,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    pub images: ImageConfig,
    pub http: HttpConfig,
    pub contributors: ContributorSheet,
    pub sources: SourcesConfig,
    pub tiers: Vec<Tier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    pub public_dir: PathBuf,
    pub sponsors_data: PathBuf,
    pub contributors_data: PathBuf,
    pub sponsors_svg: PathBuf,
    pub contributors_svg: PathBuf,
    pub logo_overrides: PathBuf,
    /// Optional JSON tier table (`{ "gold": { "name", "minAmount", "size" } }`).
    /// Replaces `[[tiers]]` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiers: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub canvas_width: u32,
    pub side_padding: u32,
    pub label_height: u32,
    pub label_baseline: u32,
    pub bottom_padding: u32,
    pub margin: MarginPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Badges of exactly this width and height get the circular avatar clip.
    pub avatar_size: u32,
    pub avatar_background: String,
    pub hover: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub palette_colors: u16,
    pub min_quality: u8,
    pub max_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContributorSheet {
    pub size: u32,
    pub crop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    /// OpenCollective `members/all.json` URL. Empty skips sponsors.
    pub opencollective: String,
    pub github_api: String,
    pub github_repos: Vec<String>,
    /// Contributor login -> canonical login.
    pub aliases: IndexMap<String, String>,
}

/// One entry of the JSON tier table.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TierEntry {
    name: String,
    min_amount: f64,
    size: u32,
    #[serde(default)]
    crop: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            paths: Paths::default(),
            layout: LayoutConfig::default(),
            render: RenderConfig::default(),
            images: ImageConfig::default(),
            http: HttpConfig::default(),
            contributors: ContributorSheet::default(),
            sources: SourcesConfig::default(),
            tiers: default_tiers(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            sponsors_data: PathBuf::from("data/sponsors.json"),
            contributors_data: PathBuf::from("data/contributors.json"),
            sponsors_svg: PathBuf::from("public/sponsors.svg"),
            contributors_svg: PathBuf::from("public/contributors.svg"),
            logo_overrides: PathBuf::from("public/sponsors"),
            tiers: None,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            canvas_width: 720,
            side_padding: 20,
            label_height: 60,
            label_baseline: 32,
            bottom_padding: 0,
            margin: MarginPolicy::default(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            avatar_size: 32,
            avatar_background: "#e7e7e7".to_string(),
            hover: true,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            palette_colors: 128,
            min_quality: 65,
            max_quality: 80,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for ContributorSheet {
    fn default() -> Self {
        Self {
            size: 32,
            crop: true,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            opencollective: String::new(),
            github_api: "https://api.github.com".to_string(),
            github_repos: Vec::new(),
            aliases: IndexMap::new(),
        }
    }
}

fn tier(id: &str, name: &str, min_amount: f64, size: u32, crop: bool) -> Tier {
    Tier {
        id: id.to_string(),
        name: name.to_string(),
        min_amount,
        size,
        crop,
    }
}

pub fn default_tiers() -> Vec<Tier> {
    vec![
        tier("platinum", "Platinum Sponsors", 10_000.0, 80, false),
        tier("gold", "Gold Sponsors", 5_000.0, 64, false),
        tier("silver", "Silver Sponsors", 1_000.0, 48, false),
        tier("bronze", "Bronze Sponsors", 500.0, 36, false),
        tier("backer", "Backers", 0.0, 32, true),
    ]
}

impl Config {
    /// Load `path` (relative to `root`). A missing file yields the defaults.
    pub fn load(root: &Path, path: &Path) -> Result<Self, ConfigError> {
        let file = root.join(path);
        let mut config = if file.exists() {
            let raw = std::fs::read_to_string(&file).map_err(|source| ConfigError::Read {
                path: file.clone(),
                source,
            })?;
            Self::parse(&raw).map_err(|source| ConfigError::Parse {
                path: file.clone(),
                source,
            })?
        } else {
            tracing::debug!("{} not found, using defaults", file.display());
            Self::default()
        };
        config.root = root.to_path_buf();

        if let Some(tiers) = config.paths.tiers.clone() {
            config.tiers = load_tier_table(&config.resolve(&tiers))?;
        }
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Checks every invariant the classifier and layout engine rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        if layout.canvas_width <= layout.side_padding {
            return Err(ConfigError::CanvasTooNarrow {
                width: layout.canvas_width,
                padding: layout.side_padding,
            });
        }
        if layout.margin.scale <= 0 {
            return Err(ConfigError::MarginScale(layout.margin.scale));
        }
        if !(2..=256).contains(&self.images.palette_colors) {
            return Err(ConfigError::PaletteColors(self.images.palette_colors));
        }
        let (min, max) = (self.images.min_quality, self.images.max_quality);
        if min > max || max > 100 {
            return Err(ConfigError::QualityRange { min, max });
        }
        if self.tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }

        let mut seen = HashSet::new();
        let mut previous = f64::INFINITY;
        for tier in &self.tiers {
            if !seen.insert(tier.id.as_str()) {
                return Err(ConfigError::DuplicateTier(tier.id.clone()));
            }
            if !(tier.min_amount < previous) {
                return Err(ConfigError::TierOrder {
                    tier: tier.id.clone(),
                    min: tier.min_amount,
                    previous,
                });
            }
            previous = tier.min_amount;
        }

        let sizes = self
            .tiers
            .iter()
            .map(|t| (t.id.as_str(), t.size))
            .chain(std::iter::once(("contributors", self.contributors.size)));
        for (id, size) in sizes {
            if size == 0 {
                return Err(ConfigError::ZeroHeight(id.to_string()));
            }
            let margin = layout.margin.margin(size);
            if margin < 0 {
                return Err(ConfigError::NegativeMargin {
                    height: size,
                    margin,
                });
            }
        }
        Ok(())
    }
}

fn load_tier_table(path: &Path) -> Result<Vec<Tier>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tier_table(&raw).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses the JSON tier table, keeping the file's key order.
pub fn parse_tier_table(raw: &str) -> Result<Vec<Tier>, serde_json::Error> {
    let table: IndexMap<String, TierEntry> = serde_json::from_str(raw)?;
    Ok(table
        .into_iter()
        .map(|(id, entry)| Tier {
            id,
            name: entry.name,
            min_amount: entry.min_amount,
            size: entry.size,
            crop: entry.crop,
        })
        .collect())
}
