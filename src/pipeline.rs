//! One generation run: load records, normalize every logo concurrently,
//! lay out and render the badge sheets, and write them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use serde::Serialize;

use crate::config::{Config, HttpConfig};
use crate::error::NormalizeError;
use crate::model::{Badge, Record};
use crate::normalize::Normalizer;
use crate::quantize::Quantizer;
use crate::render::{Group, Renderer, Sheet};
use crate::tiers::classify;

/// Which sheets a command operates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Target {
    All,
    Sponsors,
    Contributors,
}

impl Target {
    pub fn sponsors(self) -> bool {
        matches!(self, Target::All | Target::Sponsors)
    }

    pub fn contributors(self) -> bool {
        matches!(self, Target::All | Target::Contributors)
    }
}

/// A logo to normalize and the size it is wanted at.
#[derive(Debug, Clone)]
pub struct Job {
    pub record: Record,
    pub height: u32,
    pub crop: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetSummary {
    pub path: PathBuf,
    pub rendered: usize,
    pub dropped: usize,
    pub height: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub sponsors: Option<SheetSummary>,
    pub contributors: Option<SheetSummary>,
}

pub fn http_client(http: &HttpConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(http.user_agent.clone())
        .timeout(Duration::from_secs(http.timeout_secs))
        .build()
        .context("failed to build http client")
}

/// Reads a sponsor or contributor JSON file, dropping records without weight.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<Record> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    let total = records.len();
    let records: Vec<Record> = records.into_iter().filter(|r| r.weight > 0.0).collect();
    if records.len() < total {
        tracing::debug!(
            path = %path.display(),
            skipped = total - records.len(),
            "skipped records without weight"
        );
    }
    Ok(records)
}

/// Normalizes every job concurrently. The result is aligned with `jobs`:
/// failed logos are logged and come back as badges without a raster.
pub async fn normalize_all(normalizer: Arc<Normalizer>, jobs: Vec<Job>) -> Vec<Badge> {
    let mut records = Vec::with_capacity(jobs.len());
    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let normalizer = Arc::clone(&normalizer);
        let record = job.record.clone();
        handles.push(tokio::spawn(async move {
            normalizer.normalize(&job.record, job.height, job.crop).await
        }));
        records.push(record);
    }

    let mut badges = Vec::with_capacity(records.len());
    for (record, handle) in records.into_iter().zip(handles) {
        let result = handle.await.unwrap_or_else(|e| {
            Err(NormalizeError::Task {
                logo: record.logo.clone(),
                reason: e.to_string(),
            })
        });
        match result {
            Ok(raster) => badges.push(Badge::new(record, raster)),
            Err(err) => {
                tracing::warn!(name = %record.name, logo = %record.logo, "dropping badge: {err}");
                badges.push(Badge::failed(record));
            }
        }
    }
    badges
}

/// Runs a full generation for `target` and writes the resulting sheets.
pub async fn generate(config: &Config, target: Target) -> anyhow::Result<Summary> {
    config.validate()?;

    let sponsors = if target.sponsors() {
        Some(load_records(&config.resolve(&config.paths.sponsors_data))?)
    } else {
        None
    };
    let contributors = if target.contributors() {
        Some(load_records(&config.resolve(&config.paths.contributors_data))?)
    } else {
        None
    };

    let tiers = sponsors.as_deref().map(|records| classify(records, &config.tiers));
    let mut jobs = Vec::new();
    if let Some(tiers) = &tiers {
        for tier in &config.tiers {
            for record in tiers.get(&tier.id).into_iter().flatten() {
                jobs.push(Job {
                    record: record.clone(),
                    height: tier.size,
                    crop: tier.crop,
                });
            }
        }
    }
    let sponsor_jobs = jobs.len();
    for record in contributors.iter().flatten() {
        jobs.push(Job {
            record: record.clone(),
            height: config.contributors.size,
            crop: config.contributors.crop,
        });
    }

    let normalizer = Arc::new(Normalizer::new(
        http_client(&config.http)?,
        config.resolve(&config.paths.public_dir),
        Quantizer::new(
            config.images.palette_colors,
            config.images.min_quality,
            config.images.max_quality,
        ),
    ));
    tracing::info!(logos = jobs.len(), "normalizing logos");
    let mut sponsor_badges = normalize_all(normalizer, jobs).await;
    let contributor_badges = sponsor_badges.split_off(sponsor_jobs);

    let renderer = Renderer::from_config(config);
    let mut summary = Summary::default();

    if let Some(tiers) = &tiers {
        let mut rest = sponsor_badges.into_iter();
        let grouped: Vec<(&str, Vec<Badge>)> = config
            .tiers
            .iter()
            .map(|tier| {
                let n = tiers.get(&tier.id).map_or(0, Vec::len);
                (tier.name.as_str(), rest.by_ref().take(n).collect())
            })
            .collect();
        let groups: Vec<Group<'_>> = grouped
            .iter()
            .map(|(label, badges)| Group {
                label: Some(*label),
                badges: badges.as_slice(),
            })
            .collect();
        let total = grouped.iter().map(|(_, b)| b.len()).sum();
        let sheet = renderer.render(&groups);
        summary.sponsors = Some(write_sheet(&config.resolve(&config.paths.sponsors_svg), &sheet, total)?);
    }

    if contributors.is_some() {
        let sheet = renderer.render(&[Group {
            label: None,
            badges: &contributor_badges,
        }]);
        summary.contributors = Some(write_sheet(
            &config.resolve(&config.paths.contributors_svg),
            &sheet,
            contributor_badges.len(),
        )?);
    }

    Ok(summary)
}

fn write_sheet(path: &Path, sheet: &Sheet, total: usize) -> anyhow::Result<SheetSummary> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &sheet.svg).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        badges = sheet.rendered,
        height = sheet.height,
        "wrote sheet"
    );
    Ok(SheetSummary {
        path: path.to_path_buf(),
        rendered: sheet.rendered,
        dropped: total - sheet.rendered,
        height: sheet.height,
    })
}
