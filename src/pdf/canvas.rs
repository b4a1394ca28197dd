use pdf_writer::{Content, Name, Str};

use crate::color::{MM_TO_PT, PT_TO_MM, Rgb, unit_rgb};
use crate::config::PAGE_HEIGHT;
use crate::fonts::{FontId, FontRegistry};

/// A link target inside the document: 1-based page and a y position in mm.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Dest {
    pub(crate) page: usize,
    pub(crate) y: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum LinkTarget {
    Uri(String),
    Internal(Dest),
}

/// Clickable area in page millimetres (top-left origin).
pub(crate) struct Link {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) w: f32,
    pub(crate) h: f32,
    pub(crate) target: LinkTarget,
}

/// Font, size in points and fill colour for a text write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Pen {
    pub(crate) font: FontId,
    pub(crate) size: f32,
    pub(crate) color: Rgb,
}

impl Pen {
    pub(crate) fn size_mm(&self) -> f32 {
        self.size * PT_TO_MM
    }

    /// Baseline for text vertically centred in a box of height `h` at `top`.
    pub(crate) fn baseline(&self, top: f32, h: f32) -> f32 {
        top + h / 2.0 + 0.3 * self.size_mm()
    }
}

pub(crate) struct PageOut {
    pub(crate) content: Content,
    pub(crate) links: Vec<Link>,
}

/// Drawing surface in millimetres with a top-down y axis. In measuring mode
/// nothing is written; text writes only record the characters they use.
pub(crate) struct Canvas {
    measuring: bool,
    pages: Vec<PageOut>,
}

fn finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn px(x: f32) -> f32 {
    x * MM_TO_PT
}

fn py(y: f32) -> f32 {
    (PAGE_HEIGHT - y) * MM_TO_PT
}

impl Canvas {
    pub(crate) fn new(measuring: bool) -> Self {
        Self {
            measuring,
            pages: Vec::new(),
        }
    }

    pub(crate) fn begin_page(&mut self) {
        self.pages.push(PageOut {
            content: Content::new(),
            links: Vec::new(),
        });
    }

    /// Content stream of the current page when output is being produced.
    fn content(&mut self, what: &str, geometry: &[f32]) -> Option<&mut Content> {
        if self.measuring {
            return None;
        }
        if !finite(geometry) {
            log::warn!("Skipping {what} with non-finite geometry {geometry:?}");
            return None;
        }
        self.pages.last_mut().map(|p| &mut p.content)
    }

    pub(crate) fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        let Some(content) = self.content("rectangle", &[x, y, w, h]) else {
            return;
        };
        let (r, g, b) = unit_rgb(color);
        content.set_fill_rgb(r, g, b);
        content.rect(px(x), py(y + h), px(w), px(h));
        content.fill_nonzero();
    }

    pub(crate) fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, width: f32) {
        let Some(content) = self.content("rectangle", &[x, y, w, h, width]) else {
            return;
        };
        let (r, g, b) = unit_rgb(color);
        content.set_stroke_rgb(r, g, b);
        content.set_line_width(px(width));
        content.rect(px(x), py(y + h), px(w), px(h));
        content.stroke();
    }

    pub(crate) fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb, width: f32) {
        let Some(content) = self.content("line", &[x1, y1, x2, y2, width]) else {
            return;
        };
        let (r, g, b) = unit_rgb(color);
        content.set_stroke_rgb(r, g, b);
        content.set_line_width(px(width));
        content.move_to(px(x1), py(y1));
        content.line_to(px(x2), py(y2));
        content.stroke();
    }

    /// Rounded rectangle, filled and/or stroked. Stroke is `(colour, width)`.
    pub(crate) fn rounded_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        fill: Option<Rgb>,
        stroke: Option<(Rgb, f32)>,
    ) {
        let Some(content) = self.content("rounded rectangle", &[x, y, w, h, radius]) else {
            return;
        };
        if fill.is_none() && stroke.is_none() {
            return;
        }
        let r = radius.min(w / 2.0).min(h / 2.0).max(0.0);
        // Control point distance for a quarter circle.
        let k = r * 0.5523;
        let (left, right) = (px(x), px(x + w));
        let (top, bottom) = (py(y), py(y + h));
        let (rp, kp) = (px(r), px(k));

        content.move_to(left + rp, top);
        content.line_to(right - rp, top);
        content.cubic_to(right - rp + kp, top, right, top - rp + kp, right, top - rp);
        content.line_to(right, bottom + rp);
        content.cubic_to(right, bottom + rp - kp, right - rp + kp, bottom, right - rp, bottom);
        content.line_to(left + rp, bottom);
        content.cubic_to(left + rp - kp, bottom, left, bottom + rp - kp, left, bottom + rp);
        content.line_to(left, top - rp);
        content.cubic_to(left, top - rp + kp, left + rp - kp, top, left + rp, top);
        content.close_path();

        if let Some(color) = fill {
            let (r, g, b) = unit_rgb(color);
            content.set_fill_rgb(r, g, b);
        }
        if let Some((color, width)) = stroke {
            let (r, g, b) = unit_rgb(color);
            content.set_stroke_rgb(r, g, b);
            content.set_line_width(px(width));
        }
        match (fill, stroke) {
            (Some(_), Some(_)) => content.fill_nonzero_and_stroke(),
            (Some(_), None) => content.fill_nonzero(),
            _ => content.stroke(),
        };
    }

    /// Write `text` with its baseline at `baseline`. Empty strings and
    /// non-finite positions are dropped.
    pub(crate) fn text(
        &mut self,
        fonts: &mut FontRegistry,
        pen: Pen,
        x: f32,
        baseline: f32,
        text: &str,
    ) {
        if text.is_empty() {
            return;
        }
        if !finite(&[x, baseline, pen.size]) || pen.size <= 0.0 {
            log::warn!("Rejected text write {text:?} at ({x}, {baseline}) size {}", pen.size);
            return;
        }
        fonts.record_used(pen.font, text);
        if self.measuring {
            return;
        }
        let encoded = fonts.encode(pen.font, text);
        let resource = pen.font.resource_name();
        let Some(page) = self.pages.last_mut() else {
            return;
        };
        let content = &mut page.content;
        let (r, g, b) = unit_rgb(pen.color);
        content.begin_text();
        content.set_font(Name(resource.as_bytes()), pen.size);
        content.set_fill_rgb(r, g, b);
        content.next_line(px(x), py(baseline));
        content.show(Str(&encoded));
        content.end_text();
    }

    pub(crate) fn image(&mut self, resource: &str, x: f32, y: f32, w: f32, h: f32) {
        let Some(content) = self.content("image", &[x, y, w, h]) else {
            return;
        };
        content.save_state();
        content.transform([px(w), 0.0, 0.0, px(h), px(x), py(y + h)]);
        content.x_object(Name(resource.as_bytes()));
        content.restore_state();
    }

    /// Add a clickable area. Adjacent areas on the same line with the same
    /// target are merged.
    pub(crate) fn link(&mut self, x: f32, y: f32, w: f32, h: f32, target: LinkTarget) {
        if self.measuring || !finite(&[x, y, w, h]) || w <= 0.0 {
            return;
        }
        let Some(page) = self.pages.last_mut() else {
            return;
        };
        if let Some(prev) = page.links.last_mut()
            && prev.target == target
            && (prev.y - y).abs() < 0.5
            && (prev.x + prev.w - x).abs() < 3.0
        {
            prev.w = x + w - prev.x;
            return;
        }
        page.links.push(Link { x, y, w, h, target });
    }

    pub(crate) fn into_pages(self) -> Vec<PageOut> {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{Family, Style};

    fn pen() -> Pen {
        Pen {
            font: FontId::Builtin(Family::Main, Style::Regular),
            size: 10.0,
            color: [0, 0, 0],
        }
    }

    #[test]
    fn measuring_canvas_records_chars_but_writes_nothing() {
        let mut fonts = FontRegistry::builtin_only();
        let mut canvas = Canvas::new(true);
        canvas.begin_page();
        canvas.text(&mut fonts, pen(), 10.0, 20.0, "abc");
        canvas.fill_rect(0.0, 0.0, 10.0, 10.0, [1, 2, 3]);
        canvas.link(0.0, 0.0, 10.0, 5.0, LinkTarget::Uri("https://a.b".into()));
        let pages = canvas.into_pages();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].links.is_empty());
    }

    #[test]
    fn adjacent_links_merge() {
        let mut canvas = Canvas::new(false);
        canvas.begin_page();
        let target = LinkTarget::Internal(Dest { page: 3, y: 40.0 });
        canvas.link(10.0, 50.0, 20.0, 5.0, target.clone());
        canvas.link(31.0, 50.0, 10.0, 5.0, target);
        canvas.link(50.0, 50.0, 10.0, 5.0, LinkTarget::Uri("https://x.y".into()));
        let pages = canvas.into_pages();
        assert_eq!(pages[0].links.len(), 2);
        assert!((pages[0].links[0].w - 31.0).abs() < 1e-4);
    }

    #[test]
    fn non_finite_writes_are_ignored() {
        let mut fonts = FontRegistry::builtin_only();
        let mut canvas = Canvas::new(false);
        canvas.begin_page();
        canvas.text(&mut fonts, pen(), f32::NAN, 20.0, "x");
        canvas.fill_rect(0.0, f32::INFINITY, 1.0, 1.0, [0, 0, 0]);
        let mut pages = canvas.into_pages();
        let page = pages.remove(0);
        assert!(page.content.finish().as_slice().is_empty());
    }
}
