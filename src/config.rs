use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::color::{Align, Orientation, parse_hex};
use crate::error::Error;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// Fixed value for the `{date}` placeholder; today's date when unset.
    pub date: Option<String>,
    /// Body text size in points.
    pub font_size: f32,
    pub colors: Colors,
    pub layout: Layout,
    pub gradient: Gradient,
    pub toc: Toc,
    pub header: Header,
    pub footer: Footer,
    pub page_numbers: PageNumbers,
    pub code: Code,
    pub labels: Labels,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: String::new(),
            subtitle: String::new(),
            author: String::new(),
            date: None,
            font_size: 11.0,
            colors: Colors::default(),
            layout: Layout::default(),
            gradient: Gradient::default(),
            toc: Toc::default(),
            header: Header::default(),
            footer: Footer::default(),
            page_numbers: PageNumbers::default(),
            code: Code::default(),
            labels: Labels::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Colors {
    pub title: String,
    pub header: String,
    /// Solid page background; none means white paper.
    pub background: Option<String>,
    pub text: String,
    pub accent: Option<String>,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            title: "#1f3a5f".into(),
            header: "#4b5563".into(),
            background: None,
            text: "#000000".into(),
            accent: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 10.0,
            right: 10.0,
            top: 25.0,
            bottom: 20.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FooterStyle {
    #[default]
    Fixed,
    Inline,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub title_align: Align,
    pub body_align: Align,
    pub margins: Margins,
    pub header_numbering: bool,
    pub line_spacing: f32,
    pub footer_style: FooterStyle,
    pub title_page: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            title_align: Align::Left,
            body_align: Align::Left,
            margins: Margins::default(),
            header_numbering: true,
            line_spacing: 1.0,
            footer_style: FooterStyle::Fixed,
            title_page: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Gradient {
    pub enabled: bool,
    pub start: String,
    pub end: String,
    pub orientation: Orientation,
    /// Paint the gradient on every page instead of only the title page.
    pub global: bool,
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "#1f3a5f".into(),
            end: "#4f86c6".into(),
            orientation: Orientation::Vertical,
            global: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Toc {
    pub enabled: bool,
    pub show_numbers: bool,
    pub show_dots: bool,
    pub line_spacing: f32,
    pub bold_headings: bool,
    /// Entry size in points; level-1 entries use this + 1.
    pub font_size: f32,
    /// Indent per level, in millimetres.
    pub indent: f32,
}

impl Default for Toc {
    fn default() -> Self {
        Self {
            enabled: true,
            show_numbers: true,
            show_dots: true,
            line_spacing: 1.0,
            bold_headings: true,
            font_size: 11.0,
            indent: 8.0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub text: String,
    pub image: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Footer {
    pub left: String,
    pub center: String,
    pub right: String,
    pub image: Option<PathBuf>,
}

impl Default for Footer {
    fn default() -> Self {
        Self {
            left: String::new(),
            center: String::new(),
            right: "{page} / {total}".into(),
            image: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PageNumbers {
    /// Physical page that is displayed as page 1.
    pub start_page: usize,
}

impl Default for PageNumbers {
    fn default() -> Self {
        Self { start_page: 1 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Code {
    /// Base size for code blocks; inline code uses 90% of the body size when unset.
    pub font_size: Option<f32>,
    pub min_font_size: f32,
    pub auto_scale: bool,
    /// Height-based shrinking only starts above this many lines.
    pub max_lines: usize,
    /// Width-based shrinking only starts above this many characters.
    pub max_line_len: usize,
}

impl Default for Code {
    fn default() -> Self {
        Self {
            font_size: None,
            min_font_size: 4.0,
            auto_scale: true,
            max_lines: 30,
            max_line_len: 80,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub toc_title: String,
    pub author: String,
    pub created_by: String,
    pub date: String,
    /// Continuation marker for split code blocks; `{i}` and `{n}` are replaced.
    pub continuation: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            toc_title: "Table of Contents".into(),
            author: "Author: ".into(),
            created_by: "Created by: ".into(),
            date: "Date: ".into(),
            continuation: "... (part {i}/{n})".into(),
        }
    }
}

impl Config {
    pub fn content_width(&self) -> f32 {
        PAGE_WIDTH - self.layout.margins.left - self.layout.margins.right
    }

    /// Reject settings that would make the build meaningless before any
    /// page is laid out.
    pub fn validate(&self) -> Result<(), Error> {
        let mut colors: Vec<(&str, &str)> = vec![
            ("colors.title", &self.colors.title),
            ("colors.header", &self.colors.header),
            ("colors.text", &self.colors.text),
        ];
        if let Some(bg) = &self.colors.background {
            colors.push(("colors.background", bg));
        }
        if let Some(accent) = &self.colors.accent {
            colors.push(("colors.accent", accent));
        }
        if self.gradient.enabled {
            colors.push(("gradient.start", &self.gradient.start));
            colors.push(("gradient.end", &self.gradient.end));
        }
        for (field, value) in colors {
            if parse_hex(value).is_none() {
                return Err(Error::Config(format!("{field}: invalid hex colour {value:?}")));
            }
        }

        if !(self.font_size > 0.0) {
            return Err(Error::Config(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        if !(self.layout.line_spacing > 0.0) {
            return Err(Error::Config("layout.line_spacing must be positive".into()));
        }
        if !(self.toc.font_size > 0.0) || !(self.toc.line_spacing > 0.0) {
            return Err(Error::Config("toc.font_size and toc.line_spacing must be positive".into()));
        }
        if self.toc.indent < 0.0 {
            return Err(Error::Config("toc.indent must not be negative".into()));
        }

        let m = &self.layout.margins;
        if [m.left, m.right, m.top, m.bottom].iter().any(|v| *v < 0.0) {
            return Err(Error::Config("margins must not be negative".into()));
        }
        if self.content_width() < 40.0 || PAGE_HEIGHT - m.top - m.bottom < 80.0 {
            return Err(Error::Config("margins leave no usable content area".into()));
        }

        if let Some(size) = self.code.font_size
            && !(size > 0.0)
        {
            return Err(Error::Config("code.font_size must be positive".into()));
        }
        if !(self.code.min_font_size > 0.0) {
            return Err(Error::Config("code.min_font_size must be positive".into()));
        }
        if let Some(size) = self.code.font_size
            && self.code.min_font_size > size
        {
            return Err(Error::Config(format!(
                "code.min_font_size ({}) exceeds code.font_size ({size})",
                self.code.min_font_size
            )));
        }

        if self.page_numbers.start_page == 0 {
            return Err(Error::Config("page_numbers.start_page starts at 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert!((cfg.content_width() - 190.0).abs() < 1e-4);
    }

    #[test]
    fn rejects_bad_colour_and_sizes() {
        let mut cfg = Config::default();
        cfg.colors.accent = Some("#12345".into());
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let mut cfg = Config::default();
        cfg.font_size = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.code.font_size = Some(5.0);
        cfg.code.min_font_size = 6.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.layout.margins.left = 90.0;
        cfg.layout.margins.right = 90.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.page_numbers.start_page = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gradient_colours_only_checked_when_enabled() {
        let mut cfg = Config::default();
        cfg.gradient.start = "blue".into();
        assert!(cfg.validate().is_ok());
        cfg.gradient.enabled = true;
        assert!(cfg.validate().is_err());
    }
}
