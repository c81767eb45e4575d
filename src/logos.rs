//! Custom sponsor logos that replace the ones served by the sponsor platform.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

const LOGO_PATTERN: &str = "*.{svg,png}";

/// Sponsor slug -> logo reference, relative to the public directory when the
/// override directory lives inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoOverrides {
    by_slug: BTreeMap<String, String>,
}

impl LogoOverrides {
    /// Scans the top level of `dir`. A missing directory yields no overrides.
    pub fn scan(dir: &Path, public_dir: &Path) -> anyhow::Result<Self> {
        let mut by_slug = BTreeMap::new();
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "no logo override directory");
            return Ok(Self { by_slug });
        }

        let matcher = matcher()?;
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to scan {}", dir.display()))?;
            if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
                continue;
            }
            let path = entry.path();
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let reference = match path.strip_prefix(public_dir) {
                Ok(rel) => rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
                Err(_) => path.to_string_lossy().into_owned(),
            };
            by_slug.insert(slug.to_string(), reference);
        }
        tracing::debug!(count = by_slug.len(), "found logo overrides");
        Ok(Self { by_slug })
    }

    pub fn get(&self, slug: &str) -> Option<&str> {
        self.by_slug.get(slug).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_slug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_slug.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for LogoOverrides {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            by_slug: iter.into_iter().collect(),
        }
    }
}

fn matcher() -> anyhow::Result<GlobMatcher> {
    let glob = GlobBuilder::new(LOGO_PATTERN)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid logo pattern {LOGO_PATTERN}"))?;
    Ok(glob.compile_matcher())
}
