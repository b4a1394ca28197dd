//! Fenced code blocks: text sanitising, font autoscaling and page chunks.

use crate::color::{Rgb, parse_hex};
use crate::config::{Config, PAGE_HEIGHT};
use crate::fonts::{Family, Style};
use crate::model::CodeBlock;

use super::Renderer;

const DEFAULT_CODE_SIZE: f32 = 6.0;
/// Code line height in millimetres per point of font size.
const LINE_FACTOR: f32 = 0.35;
/// Rough monospace advance per point, in millimetres.
const CHAR_FACTOR: f32 = 0.5;
const BOX_PAD: f32 = 5.0;
const DEFAULT_BG: Rgb = [245, 245, 245];
const BOX_STROKE: Rgb = [200, 200, 200];
const LABEL_GREY: Rgb = [150, 150, 150];

/// Make code text safe for the output fonts.
///
/// Tabs become four spaces, a few typographic symbols get ASCII spellings,
/// NBSP becomes a space, and BOM, zero-width and control characters are
/// dropped. Other symbols from U+2000 upwards (emoji, dingbats) are dropped
/// as well since code faces rarely carry them.
pub fn clean_code_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => out.push_str("    "),
            '\n' | '\r' => out.push(c),
            ' '..='~' => out.push(c),
            '\u{A0}' => out.push(' '),
            '\u{80}'..='\u{FF}' if !c.is_control() => out.push(c),
            '\u{2192}' => out.push_str("->"),
            '\u{2190}' => out.push_str("<-"),
            '\u{2265}' => out.push_str(">="),
            '\u{2264}' => out.push_str("<="),
            '\u{2260}' => out.push_str("!="),
            '\u{2026}' => out.push_str("..."),
            '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' => {}
            c if c.is_control() => {}
            c if (c as u32) < 0x2000 => out.push(c),
            _ => {}
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CodeRun {
    pub(crate) text: String,
    pub(crate) color: Option<Rgb>,
    pub(crate) bold: bool,
}

pub(crate) type CodeLine = Vec<CodeRun>;

/// Reassemble highlighted runs (or the raw content) into lines, keeping each
/// run's colour within its line.
pub(crate) fn split_lines(block: &CodeBlock) -> Vec<CodeLine> {
    let runs: Vec<(String, Option<Rgb>, bool)> = if block.segments.is_empty() {
        vec![(block.content.clone(), None, false)]
    } else {
        block
            .segments
            .iter()
            .map(|s| (s.text.clone(), s.color.as_deref().and_then(parse_hex), s.bold))
            .collect()
    };

    let mut lines: Vec<CodeLine> = Vec::new();
    let mut current: CodeLine = Vec::new();
    for (text, color, bold) in runs {
        let cleaned = clean_code_text(&text);
        let mut pieces = cleaned.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            let piece = piece.trim_end_matches('\r');
            if !piece.is_empty() {
                current.push(CodeRun {
                    text: piece.to_string(),
                    color,
                    bold,
                });
            }
            if pieces.peek().is_some() {
                lines.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn line_len(line: &CodeLine) -> usize {
    line.iter().map(|r| r.text.chars().count()).sum()
}

/// Usable page height for code, leaving room for header and footer.
fn available_height(cfg: &Config) -> f32 {
    let m = &cfg.layout.margins;
    PAGE_HEIGHT - m.top - m.bottom
}

/// Font size in points for a block of `line_count` lines whose longest line
/// has `max_line_len` characters.
pub(crate) fn code_font_size(cfg: &Config, line_count: usize, max_line_len: usize) -> f32 {
    let code = &cfg.code;
    let base = code.font_size.filter(|s| *s > 0.0).unwrap_or(DEFAULT_CODE_SIZE);
    if !code.auto_scale {
        return base;
    }
    let lines = line_count.max(1) as f32;
    let mut size = base;

    let avail_h = available_height(cfg) - 30.0;
    let needed_h = lines * size * LINE_FACTOR + 10.0;
    if line_count > code.max_lines && needed_h > avail_h {
        size = size.min((avail_h - 10.0) / (lines * LINE_FACTOR));
    }

    if max_line_len > code.max_line_len {
        let avail_w = cfg.content_width() - 10.0;
        let needed_w = max_line_len as f32 * size * CHAR_FACTOR;
        if needed_w > avail_w {
            size *= avail_w / needed_w;
        }
    }

    size.max(code.min_font_size)
}

/// Lines that fit in one chunk box at `font_size`; never fewer than five.
pub(crate) fn lines_per_page(cfg: &Config, font_size: f32) -> usize {
    let line_h = font_size * LINE_FACTOR;
    let budget = available_height(cfg) - 40.0 - 20.0;
    ((budget / line_h).floor() as usize).max(5)
}

pub(crate) fn continuation_label(template: &str, part: usize, total: usize) -> String {
    template
        .replace("{i}", &part.to_string())
        .replace("{n}", &total.to_string())
}

impl Renderer<'_> {
    pub(super) fn render_code(&mut self, block: &CodeBlock) {
        let lines = split_lines(block);
        let max_len = lines.iter().map(line_len).max().unwrap_or(0);
        let size = code_font_size(self.cfg, lines.len(), max_len);
        let line_h = size * LINE_FACTOR;
        let per_chunk = lines_per_page(self.cfg, size);
        let chunks: Vec<&[CodeLine]> = lines.chunks(per_chunk).collect();
        let total = chunks.len();

        let background = block
            .background
            .as_deref()
            .and_then(parse_hex)
            .filter(|c| c.iter().any(|&v| v < 250))
            .unwrap_or(DEFAULT_BG);
        let width = self.available_width();
        log::debug!(
            "Code block: {} lines, {:.1}pt, {} chunk(s)",
            lines.len(),
            size,
            total
        );

        for (idx, chunk) in chunks.into_iter().enumerate() {
            let rect_h = chunk.len() as f32 * line_h + 10.0;
            self.ensure_space(rect_h + 10.0);
            let x = self.state.left;
            let y = self.state.y;
            self.canvas
                .rounded_rect(x, y, width, rect_h, 4.0, Some(background), Some((BOX_STROKE, 0.2)));

            let label = if idx == 0 {
                (!block.language.is_empty()).then(|| (block.language.clone(), Style::Bold, 7.0))
            } else {
                Some((
                    continuation_label(&self.cfg.labels.continuation, idx + 1, total),
                    Style::Italic,
                    6.0,
                ))
            };
            if let Some((text, style, pt)) = label {
                let pen = self.pen(Family::Main, style, pt, LABEL_GREY);
                let label_w = self.fonts.text_width(pen.font, &text, pen.size);
                self.canvas
                    .text(self.fonts, pen, x + width - label_w - 4.0, pen.baseline(y + 2.0, 4.0), &text);
            }

            for (row, line) in chunk.iter().enumerate() {
                let top = y + BOX_PAD + row as f32 * line_h;
                let mut cx = x + BOX_PAD;
                for run in line {
                    let color = run.color.unwrap_or(self.theme.text);
                    let pen = self.pen(Family::Mono, Style::from_flags(run.bold, false), size, color);
                    self.canvas.text(self.fonts, pen, cx, pen.baseline(top, line_h), &run.text);
                    cx += self.fonts.text_width(pen.font, &run.text, pen.size);
                }
            }

            self.state.y = y + rect_h + 5.0;
            self.ln(2.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColoredSegment;

    fn code(content: &str) -> CodeBlock {
        CodeBlock {
            content: content.to_string(),
            ..CodeBlock::default()
        }
    }

    #[test]
    fn cleans_problem_characters() {
        assert_eq!(clean_code_text("a\tb"), "a    b");
        assert_eq!(clean_code_text("x \u{2192} y \u{2264} z\u{2026}"), "x -> y <= z...");
        assert_eq!(clean_code_text("\u{FEFF}fn\u{200B}()\u{A0}{}"), "fn() {}");
        assert_eq!(clean_code_text("über \u{1F600}\u{7}"), "über ");
        assert_eq!(clean_code_text("line\r\nnext"), "line\r\nnext");
        assert_eq!(clean_code_text("\u{3B1}\u{3B2}"), "\u{3B1}\u{3B2}");
    }

    #[test]
    fn splits_highlighted_runs_into_lines() {
        let block = CodeBlock {
            segments: vec![
                ColoredSegment {
                    text: "let".into(),
                    color: Some("#ff0000".into()),
                    bold: true,
                },
                ColoredSegment {
                    text: " x = 1;\nx".into(),
                    color: None,
                    bold: false,
                },
                ColoredSegment {
                    text: "\n".into(),
                    color: None,
                    bold: false,
                },
            ],
            ..CodeBlock::default()
        };
        let lines = split_lines(&block);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 2);
        assert_eq!(lines[0][0].color, Some([255, 0, 0]));
        assert!(lines[0][0].bold);
        assert_eq!(lines[1][0].text, "x");
    }

    #[test]
    fn empty_block_has_one_line() {
        assert_eq!(split_lines(&code("")), vec![Vec::new()]);
        assert_eq!(split_lines(&code("a\r\nb")).len(), 2);
    }

    #[test]
    fn short_blocks_keep_base_size() {
        let cfg = Config::default();
        assert_eq!(code_font_size(&cfg, 10, 40), DEFAULT_CODE_SIZE);
    }

    #[test]
    fn long_lines_shrink_font() {
        let cfg = Config::default();
        let size = code_font_size(&cfg, 10, 120);
        let avail_w = cfg.content_width() - 10.0;
        assert!(size < DEFAULT_CODE_SIZE);
        assert!((120.0 * size * CHAR_FACTOR - avail_w).abs() < 1e-3 || size == cfg.code.min_font_size);
    }

    #[test]
    fn scaling_respects_minimum_and_switch() {
        let mut cfg = Config::default();
        assert_eq!(code_font_size(&cfg, 2000, 400), cfg.code.min_font_size);
        cfg.code.auto_scale = false;
        cfg.code.font_size = Some(9.0);
        assert_eq!(code_font_size(&cfg, 2000, 400), 9.0);
    }

    #[test]
    fn chunk_count_matches_capacity() {
        let cfg = Config::default();
        let lpp = lines_per_page(&cfg, 4.0);
        let avail = available_height(&cfg) - 60.0;
        assert_eq!(lpp, (avail / (4.0 * LINE_FACTOR)).floor() as usize);

        let content = (0..lpp * 2 + 3).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let lines = split_lines(&code(&content));
        assert_eq!(lines.chunks(lpp).count(), 3);
        assert!(lpp as f32 * 4.0 * LINE_FACTOR + 10.0 <= available_height(&cfg));
    }

    #[test]
    fn continuation_labels() {
        assert_eq!(continuation_label("... (part {i}/{n})", 2, 5), "... (part 2/5)");
    }
}
