//! SVG badge sheet rendering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::Config;
use crate::layout::RowPacker;
use crate::model::{Badge, PlacedBadge};

const LABEL_STYLE: &str = "text { fill: #2c3e50; font-weight: 600; font-size: 21px; font-family: -apple-system, BlinkMacSystemFont, \"Segoe UI\", Roboto, Oxygen, Ubuntu, Cantarell, \"Fira Sans\", \"Droid Sans\", \"Helvetica Neue\", sans-serif; }";
const HOVER_STYLE: &str = "a image, a circle { transition: transform .15s ease-out; transform-box: fill-box; transform-origin: center; } a:hover image, a:hover circle { transform: scale(1.08); }";

/// A run of badges laid out together, optionally under a heading.
#[derive(Debug, Clone, Copy)]
pub struct Group<'a> {
    pub label: Option<&'a str>,
    pub badges: &'a [Badge],
}

/// A rendered document and what went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub svg: String,
    pub height: i64,
    pub rendered: usize,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    pub packer: RowPacker,
    pub label_height: u32,
    pub label_baseline: u32,
    pub bottom_padding: u32,
    pub avatar_size: u32,
    pub avatar_background: String,
    pub hover: bool,
}

impl Renderer {
    pub fn from_config(config: &Config) -> Self {
        let layout = &config.layout;
        Self {
            packer: RowPacker::new(layout.canvas_width, layout.side_padding, layout.margin),
            label_height: layout.label_height,
            label_baseline: layout.label_baseline,
            bottom_padding: layout.bottom_padding,
            avatar_size: config.render.avatar_size,
            avatar_background: config.render.avatar_background.clone(),
            hover: config.render.hover,
        }
    }

    /// Lays out each group below the previous one. Groups without a single
    /// renderable badge are skipped along with their label.
    pub fn render(&self, groups: &[Group<'_>]) -> Sheet {
        let width = self.packer.canvas_width;
        let mut body = String::new();
        body.push_str(&self.style(groups.iter().any(|g| g.label.is_some())));
        let r = f64::from(self.avatar_size) / 2.0;
        body.push_str(&format!(
            "<defs><clipPath id=\"avatar\"><circle cx=\"{r}\" cy=\"{r}\" r=\"{r}\" /></clipPath></defs>\n"
        ));

        let mut y = 0i64;
        let mut rendered = 0;
        for group in groups {
            if !group.badges.iter().any(|b| b.raster.is_some()) {
                continue;
            }
            if let Some(label) = group.label {
                body.push_str(&format!(
                    "<text text-anchor=\"middle\" x=\"{}\" y=\"{}\">{}</text>\n",
                    width / 2,
                    y + i64::from(self.label_baseline),
                    escape_xml(label)
                ));
                y += i64::from(self.label_height);
            }
            let layout = self.packer.layout(group.badges, y);
            for placed in &layout.placed {
                self.push_badge(&mut body, placed);
            }
            rendered += layout.placed.len();
            y = layout.total_height;
        }

        let height = y + i64::from(self.bottom_padding);
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\n{body}</svg>\n"
        );
        Sheet {
            svg,
            height,
            rendered,
        }
    }

    fn style(&self, labels: bool) -> String {
        let mut rules = vec!["a { cursor: pointer; }"];
        if labels {
            rules.push(LABEL_STYLE);
        }
        if self.hover {
            rules.push(HOVER_STYLE);
        }
        format!("<style>{}</style>\n", rules.join(" "))
    }

    fn push_badge(&self, out: &mut String, placed: &PlacedBadge<'_>) {
        let raster = placed.raster;
        let record = &placed.badge.record;
        let avatar = raster.width == self.avatar_size && raster.height == self.avatar_size;

        out.push_str(&format!(
            "<g transform=\"translate({},{})\"><a xlink:href=\"{}\" target=\"_blank\"><title>{}</title>",
            placed.x,
            placed.y,
            escape_xml(&record.link),
            escape_xml(&record.name)
        ));
        let clip = if avatar {
            let r = f64::from(self.avatar_size) / 2.0;
            out.push_str(&format!(
                "<circle cx=\"{r}\" cy=\"{r}\" r=\"{r}\" fill=\"{}\" />",
                escape_xml(&self.avatar_background)
            ));
            " clip-path=\"url(#avatar)\""
        } else {
            ""
        };
        out.push_str(&format!(
            "<image width=\"{}\" height=\"{}\"{clip} xlink:href=\"data:image/png;base64,{}\" /></a></g>\n",
            raster.width,
            raster.height,
            STANDARD.encode(&raster.png)
        ));
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
