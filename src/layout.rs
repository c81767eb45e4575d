//! Greedy row packing of badges onto a fixed-width canvas.
//!
//! Badges are taken in input order and accumulated into a row until the next
//! one would reach the width budget (`canvas_width - side_padding`). Each row
//! is centered horizontally and rows are stacked top to bottom. A row always
//! accepts its first badge, so a badge wider than the canvas gets a row of
//! its own instead of stalling the packer. Badges without a raster are skipped.

use serde::{Deserialize, Serialize};

use crate::model::{Badge, LayoutResult, PlacedBadge, Raster};

/// Spacing between badges (and below rows) as a function of badge height:
/// `base + floor((height - reference_height) / scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarginPolicy {
    pub base: i64,
    pub reference_height: i64,
    pub scale: i64,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self {
            base: 6,
            reference_height: 32,
            scale: 2,
        }
    }
}

impl MarginPolicy {
    /// `scale` must be positive; `Config::validate` enforces it.
    pub fn margin(&self, height: u32) -> i64 {
        self.base + (i64::from(height) - self.reference_height).div_euclid(self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPacker {
    pub canvas_width: u32,
    pub side_padding: u32,
    pub margin: MarginPolicy,
}

impl RowPacker {
    pub fn new(canvas_width: u32, side_padding: u32, margin: MarginPolicy) -> Self {
        Self {
            canvas_width,
            side_padding,
            margin,
        }
    }

    fn budget(&self) -> i64 {
        i64::from(self.canvas_width) - i64::from(self.side_padding)
    }

    /// Packs `items` into centered rows starting at `start_y`.
    pub fn layout<'a>(&self, items: &'a [Badge], start_y: i64) -> LayoutResult<'a> {
        let budget = self.budget();
        let mut placed = Vec::with_capacity(items.len());
        let mut rows = 0;
        let mut y = start_y;
        let mut i = 0;

        while i < items.len() {
            let mut row: Vec<(&'a Badge, &'a Raster)> = Vec::new();
            let mut width = 0i64;

            while i < items.len() {
                let badge = &items[i];
                let Some(raster) = badge.raster.as_ref() else {
                    i += 1;
                    continue;
                };
                let before = if row.is_empty() {
                    0
                } else {
                    self.margin.margin(raster.height)
                };
                let next = width + i64::from(raster.width) + before;
                if !row.is_empty() && next >= budget {
                    break;
                }
                row.push((badge, raster));
                width = next;
                i += 1;
            }

            // Only unrendered badges were left.
            if row.is_empty() {
                break;
            }

            let row_max_height = row.iter().map(|(_, r)| r.height).max().unwrap_or(0);
            let mut x = (i64::from(self.canvas_width) - width).div_euclid(2);
            tracing::debug!(
                row = rows,
                badges = row.len(),
                width,
                x,
                y,
                "placed row"
            );

            for (n, (badge, raster)) in row.into_iter().enumerate() {
                if n > 0 {
                    x += self.margin.margin(raster.height);
                }
                placed.push(PlacedBadge {
                    badge,
                    raster,
                    x,
                    y,
                    row_max_height,
                });
                x += i64::from(raster.width);
            }

            y += i64::from(row_max_height) + self.margin.margin(row_max_height);
            rows += 1;
        }

        LayoutResult {
            placed,
            rows,
            total_height: y,
        }
    }
}
