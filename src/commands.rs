//! Command handlers. Each one stays thin and delegates to the modules above.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Serialize;

use crate::config::Config;
use crate::logos::LogoOverrides;
use crate::pipeline::{self, http_client, load_records, Target};
use crate::sources;
use crate::tiers::classify;

/// Folders created next to a fresh config file.
const SCAFFOLD_DIRS: [&str; 2] = ["data", "public/sponsors"];

/// Writes a default config at `root/path` plus the data and public folders.
pub fn init(root: &Path, path: &Path, force: bool) -> anyhow::Result<PathBuf> {
    let file = root.join(path);
    if file.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", file.display());
    }
    let raw = Config::default().to_toml().context("failed to serialize default config")?;
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&file, raw).with_context(|| format!("failed to write {}", file.display()))?;
    for dir in SCAFFOLD_DIRS {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    tracing::info!(path = %file.display(), "wrote config");
    Ok(file)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    pub id: String,
    pub name: String,
    pub size: u32,
    pub sponsors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub tiers: Vec<TierCount>,
    /// Sponsors below the lowest tier.
    pub unplaced: usize,
    pub contributors: Option<usize>,
    pub overrides: usize,
}

/// Validates the config and reports how the current data would be laid out.
/// Missing data files are reported as empty rather than failing.
pub fn check(config: &Config) -> anyhow::Result<CheckReport> {
    config.validate()?;

    let sponsors_path = config.resolve(&config.paths.sponsors_data);
    let sponsors = if sponsors_path.exists() {
        load_records(&sponsors_path)?
    } else {
        tracing::warn!(path = %sponsors_path.display(), "no sponsor data");
        Vec::new()
    };
    let groups = classify(&sponsors, &config.tiers);
    let tiers: Vec<TierCount> = config
        .tiers
        .iter()
        .map(|t| TierCount {
            id: t.id.clone(),
            name: t.name.clone(),
            size: t.size,
            sponsors: groups.get(&t.id).map_or(0, Vec::len),
        })
        .collect();
    let placed: usize = tiers.iter().map(|t| t.sponsors).sum();

    let contributors_path = config.resolve(&config.paths.contributors_data);
    let contributors = if contributors_path.exists() {
        Some(load_records(&contributors_path)?.len())
    } else {
        None
    };

    let overrides = LogoOverrides::scan(
        &config.resolve(&config.paths.logo_overrides),
        &config.resolve(&config.paths.public_dir),
    )?;

    Ok(CheckReport {
        tiers,
        unplaced: sponsors.len() - placed,
        contributors,
        overrides: overrides.len(),
    })
}

pub async fn generate(config: &Config, target: Target) -> anyhow::Result<pipeline::Summary> {
    pipeline::generate(config, target).await
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateSummary {
    pub sponsors: Option<usize>,
    pub contributors: Option<usize>,
}

/// Pulls fresh sponsor and contributor lists and rewrites the data files.
pub async fn update_data(config: &Config, target: Target) -> anyhow::Result<UpdateSummary> {
    config.validate()?;
    let client = http_client(&config.http)?;
    let mut summary = UpdateSummary::default();

    if target.sponsors() {
        if config.sources.opencollective.is_empty() {
            tracing::warn!("sources.opencollective is not set, skipping sponsors");
        } else {
            let overrides = LogoOverrides::scan(
                &config.resolve(&config.paths.logo_overrides),
                &config.resolve(&config.paths.public_dir),
            )?;
            let members = sources::fetch_members(&client, &config.sources.opencollective).await?;
            let sponsors = sources::collect_sponsors(members, &overrides);
            write_json(&config.resolve(&config.paths.sponsors_data), &sponsors)?;
            summary.sponsors = Some(sponsors.len());
        }
    }

    if target.contributors() {
        if config.sources.github_repos.is_empty() {
            tracing::warn!("sources.github_repos is empty, skipping contributors");
        } else {
            let lists = sources::fetch_contributors(
                &client,
                &config.sources.github_api,
                &config.sources.github_repos,
            )
            .await?;
            let contributors = sources::merge_contributors(lists, &config.sources.aliases);
            write_json(&config.resolve(&config.paths.contributors_data), &contributors)?;
            summary.contributors = Some(contributors.len());
        }
    }

    Ok(summary)
}

fn write_json<T: Serialize>(path: &Path, data: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(data)?;
    std::fs::write(path, raw + "\n").with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote data");
    Ok(())
}
