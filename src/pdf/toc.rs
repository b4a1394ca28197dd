//! Heading numbering, the table of contents plan and the TOC page.

use crate::color::{Align, Rgb};
use crate::config::Config;
use crate::fonts::{Family, Style};
use crate::model::{DocBlock, Heading};

use super::Renderer;
use super::canvas::{Dest, LinkTarget, Pen};
use super::layout::{draw_line, wrap_plain};

pub(crate) const MAX_HEADING_LEVEL: usize = 6;

const DOT_COLOR: Rgb = [180, 180, 180];
const PAGE_CELL: f32 = 8.0;

/// One counter per heading depth.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct HeadingCounters([usize; MAX_HEADING_LEVEL]);

impl HeadingCounters {
    pub(crate) fn reset(&mut self) {
        self.0 = [0; MAX_HEADING_LEVEL];
    }

    /// Count a heading of `level` and zero every deeper slot.
    pub(crate) fn enter(&mut self, level: u8) {
        let idx = clamp_level(level) - 1;
        self.0[idx] += 1;
        for slot in &mut self.0[idx + 1..] {
            *slot = 0;
        }
    }

    fn slot(&self, idx: usize) -> usize {
        self.0[idx].max(1)
    }

    /// `1.`, `1.2.`, `1.2.1.` ...
    pub(crate) fn hierarchical(&self, level: u8) -> String {
        (0..clamp_level(level))
            .map(|i| format!("{}.", self.slot(i)))
            .collect()
    }

    /// Folder-derived prefix extended by the in-file counters below level 1.
    pub(crate) fn extend_parent(&self, parent: &str, level: u8) -> String {
        let mut number = parent.trim().to_string();
        if !number.ends_with('.') {
            number.push('.');
        }
        let inner: Vec<String> = (1..clamp_level(level))
            .map(|i| self.slot(i).to_string())
            .collect();
        if !inner.is_empty() {
            number.push_str(&inner.join("."));
            number.push('.');
        }
        number
    }
}

fn clamp_level(level: u8) -> usize {
    (level as usize).clamp(1, MAX_HEADING_LEVEL)
}

/// Split a leading explicit number such as `"1.2 Title"` or `"3) Title"` off
/// heading text. The prefix must contain a digit and be followed by a blank.
pub fn split_numbering(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    let mut found_digit = false;
    for (i, c) in text.char_indices() {
        match c {
            '0'..='9' => found_digit = true,
            '.' | ')' => {}
            ' ' | '\t' if found_digit => return Some((&text[..i], text[i..].trim())),
            _ => return None,
        }
    }
    None
}

/// Count `heading` and work out its displayed number and text.
///
/// Excluded headings neither count nor get a number. Otherwise an explicit
/// prefix in the text wins, then folder-derived numbering, then plain
/// hierarchical counters.
pub(crate) fn number_heading(
    counters: &mut HeadingCounters,
    heading: &Heading,
    cfg: &Config,
) -> (String, String) {
    let text = heading.text.trim();
    if heading.exclude_from_toc {
        return (String::new(), text.to_string());
    }
    counters.enter(heading.level);

    if let Some((number, rest)) = split_numbering(text) {
        return (number.to_string(), rest.to_string());
    }
    if !cfg.layout.header_numbering {
        return (String::new(), text.to_string());
    }
    let number = if heading.parent_numbering.trim().is_empty() {
        counters.hierarchical(heading.level)
    } else {
        counters.extend_parent(&heading.parent_numbering, heading.level)
    };
    (number, text.to_string())
}

pub(crate) fn display_text(number: &str, text: &str) -> String {
    if number.is_empty() {
        text.to_string()
    } else {
        format!("{number} {text}")
    }
}

/// Heading level plus the depth contributed by folder numbering ("2.3" adds one).
pub(crate) fn global_level(heading: &Heading) -> usize {
    let depth = heading
        .parent_numbering
        .split('.')
        .filter(|part| !part.trim().is_empty())
        .count();
    clamp_level(heading.level) + depth.saturating_sub(1)
}

/// Layout-independent part of a TOC entry, known before any page exists.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PlannedEntry {
    pub(crate) level: usize,
    pub(crate) number: String,
    pub(crate) text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TocEntry {
    pub(crate) level: usize,
    pub(crate) number: String,
    pub(crate) text: String,
    /// Physical 1-based page of the heading.
    pub(crate) page: usize,
    pub(crate) dest: Dest,
}

/// Number every TOC heading in document order without laying anything out.
pub(crate) fn plan(blocks: &[DocBlock], cfg: &Config) -> Vec<PlannedEntry> {
    let mut counters = HeadingCounters::default();
    blocks
        .iter()
        .filter_map(|block| match block {
            DocBlock::Heading(h) => {
                let (number, text) = number_heading(&mut counters, h, cfg);
                (!h.exclude_from_toc).then(|| PlannedEntry {
                    level: global_level(h),
                    number,
                    text,
                })
            }
            _ => None,
        })
        .collect()
}

/// Page number as printed: pages before `start_page` do not count.
pub(crate) fn display_page(page: usize, start_page: usize) -> usize {
    (page + 1).saturating_sub(start_page).max(1)
}

fn heading_metrics(level: u8) -> (f32, f32) {
    match level {
        1 => (22.0, 10.0),
        2 => (18.0, 5.0),
        _ => (14.0, 3.0),
    }
}

/// Cut `text` so it fits `max_width`, ending in "...".
fn truncate_to_width(renderer: &Renderer<'_>, pen: Pen, text: &str, max_width: f32) -> String {
    let fonts = &*renderer.fonts;
    if fonts.text_width(pen.font, text, pen.size) <= max_width {
        return text.to_string();
    }
    let ellipsis_w = fonts.text_width(pen.font, "...", pen.size);
    let mut out = String::new();
    let mut width = 0.0;
    for c in text.chars() {
        let mut buf = [0u8; 4];
        let cw = fonts.text_width(pen.font, c.encode_utf8(&mut buf), pen.size);
        if width + cw + ellipsis_w > max_width {
            break;
        }
        out.push(c);
        width += cw;
    }
    out.push_str("...");
    out
}

impl Renderer<'_> {
    pub(super) fn render_heading(&mut self, heading: &Heading) {
        let (number, text) = number_heading(&mut self.state.counters, heading, self.cfg);
        let display = display_text(&number, &text);
        let (size, spacing) = heading_metrics(heading.level);
        const LINE_H: f32 = 10.0;

        self.ensure_space(size + spacing + 20.0);
        let dest = Dest {
            page: self.state.page,
            y: self.state.y,
        };
        if let Some(anchor) = heading.anchor_id.as_deref().filter(|a| !a.is_empty()) {
            self.state.anchors.insert(anchor.to_string(), dest);
        }
        if !heading.exclude_from_toc {
            self.state.toc.push(TocEntry {
                level: global_level(heading),
                number,
                text,
                page: self.state.page,
                dest,
            });
        }

        self.ln(spacing);
        let mut x = self.state.left;
        if heading.level <= 1 {
            let bar = self.theme.accent.unwrap_or(self.theme.title);
            self.canvas.fill_rect(x, self.state.y + 2.0, 2.0, 10.0, bar);
            x += 5.0;
        }
        let pen = self.pen(Family::Main, Style::Bold, size, self.theme.title);
        let width = self.right_edge() - x;
        let lines = wrap_plain(self.fonts, &display, pen, width);
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            self.ensure_space(LINE_H);
            draw_line(&mut self.canvas, self.fonts, line, x, self.state.y, width, LINE_H, Align::Left, i == last);
            self.state.y += LINE_H;
        }
        self.ln(3.0);
        log::debug!("Heading {:?} on page {}", display, dest.page);
    }

    /// Draw the TOC from the plan; page numbers and links come from the
    /// measuring pass, so the first pass only reserves the same space.
    pub(super) fn render_toc(&mut self) {
        let cfg = self.cfg;
        let left = self.margins().left;
        let right = self.right_edge();

        self.state.y = 40.0;
        let title_pen = self.pen(Family::Main, Style::Bold, 24.0, self.theme.title);
        let baseline = title_pen.baseline(self.state.y, 15.0);
        self.canvas
            .text(self.fonts, title_pen, left, baseline, &cfg.labels.toc_title);
        self.state.y += 15.0;
        self.canvas
            .line(left, self.state.y, right, self.state.y, self.theme.title, 0.5);
        self.ln(10.0);

        let spacing = if cfg.toc.line_spacing > 0.0 { cfg.toc.line_spacing } else { 1.0 };
        let plan = self.plan;
        for (i, planned) in plan.iter().enumerate() {
            let top_level = planned.level <= 1;
            let (style, size) = if top_level {
                let style = if cfg.toc.bold_headings { Style::Bold } else { Style::Regular };
                (style, cfg.toc.font_size + 1.0)
            } else {
                (Style::Regular, cfg.toc.font_size)
            };
            let row_h = size * 0.6 * spacing;
            self.ensure_space(row_h + if top_level { 2.0 } else { 0.0 });
            if top_level {
                self.ln(2.0);
            }

            let entry = self.measured.as_ref().and_then(|m| m.toc.get(i)).cloned();
            let x = left + (planned.level.saturating_sub(1)) as f32 * cfg.toc.indent;
            let top = self.state.y;

            let label = if cfg.toc.show_numbers {
                display_text(&planned.number, &planned.text)
            } else {
                planned.text.clone()
            };
            let pen = self.pen(Family::Main, style, size, self.theme.text);
            let text_room = (right - PAGE_CELL - 4.0 - x).max(0.0);
            let label = truncate_to_width(self, pen, &label, text_room);
            let text_end = x + self.fonts.text_width(pen.font, &label, pen.size);
            self.canvas.text(self.fonts, pen, x, pen.baseline(top, row_h), &label);

            if cfg.toc.show_dots {
                let dot_pen = self.pen(Family::Main, Style::Regular, 10.0, DOT_COLOR);
                let start = text_end + 2.0;
                let end = right - 10.0;
                let dot_w = self.fonts.text_width(dot_pen.font, ".", dot_pen.size);
                if end > start && dot_w > 0.0 {
                    let count = ((end - start) / dot_w).floor() as usize;
                    let dots = ".".repeat(count);
                    self.canvas
                        .text(self.fonts, dot_pen, start, dot_pen.baseline(top, row_h), &dots);
                }
            }

            if let Some(entry) = entry {
                let number_pen = self.pen(Family::Main, Style::Bold, size, self.theme.text);
                let page = display_page(entry.page, cfg.page_numbers.start_page).to_string();
                let w = self.fonts.text_width(number_pen.font, &page, number_pen.size);
                self.canvas.text(
                    self.fonts,
                    number_pen,
                    right - w,
                    number_pen.baseline(top, row_h),
                    &page,
                );
                self.canvas
                    .link(x, top, right - x, row_h, LinkTarget::Internal(entry.dest));
            }
            self.ln(row_h);
        }
    }
}
