use crate::color::{Align, Rgb};
use crate::fonts::{Family, FontRegistry, Style};
use crate::model::TextSegment;

use super::canvas::{Canvas, LinkTarget, Pen};

pub(super) const CHIP_FILL: Rgb = [243, 244, 246];
pub(super) const CHIP_TEXT: Rgb = [55, 65, 81];
const CHIP_PAD_H: f32 = 2.5;
const CHIP_PAD_V: f32 = 1.2;
const CHIP_GAP: f32 = 1.5;

/// How segments of a run of text are turned into pens.
#[derive(Clone, Copy, Debug)]
pub(super) struct InlineStyle {
    pub(super) size: f32,
    pub(super) color: Rgb,
    /// Quote bodies force italic on every segment.
    pub(super) italic: bool,
    pub(super) code_size: f32,
}

pub(super) struct WordChunk {
    pub(super) text: String,
    pub(super) pen: Pen,
    pub(super) x_offset: f32,
    pub(super) width: f32,
    /// A justifiable gap precedes this chunk.
    pub(super) space_before: bool,
    pub(super) strikethrough: bool,
    pub(super) code: bool,
    pub(super) link: Option<LinkTarget>,
}

pub(super) struct TextLine {
    pub(super) chunks: Vec<WordChunk>,
    pub(super) total_width: f32,
}

impl TextLine {
    fn gaps(&self) -> usize {
        self.chunks.iter().skip(1).filter(|c| c.space_before).count()
    }
}

fn finish_line(chunks: &mut Vec<WordChunk>) -> TextLine {
    let total_width = chunks.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
    TextLine {
        chunks: std::mem::take(chunks),
        total_width,
    }
}

fn pen_for(fonts: &FontRegistry, seg: &TextSegment, style: &InlineStyle) -> Pen {
    if seg.inline_code {
        return Pen {
            font: fonts.select(Family::Mono, Style::Regular),
            size: style.code_size,
            color: CHIP_TEXT,
        };
    }
    Pen {
        font: fonts.select(Family::Main, Style::from_flags(seg.bold, seg.italic || style.italic)),
        size: style.size,
        color: style.color,
    }
}

/// Split `word` into pieces no wider than `max_width` (at least one char each).
fn break_word(fonts: &FontRegistry, pen: Pen, word: &str, max_width: f32) -> Vec<(String, f32)> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_w = 0.0;
    for ch in word.chars() {
        let mut buf = [0u8; 4];
        let cw = fonts.text_width(pen.font, ch.encode_utf8(&mut buf), pen.size);
        if !current.is_empty() && current_w + cw > max_width {
            pieces.push((std::mem::take(&mut current), current_w));
            current_w = 0.0;
        }
        current.push(ch);
        current_w += cw;
    }
    if !current.is_empty() {
        pieces.push((current, current_w));
    }
    pieces
}

/// Wrap styled segments into lines no wider than `max_width` millimetres.
///
/// No space is inserted between two segments unless one side carries the
/// whitespace ("bold" + ", " stays "bold,"). Inline code is kept as one chip
/// per segment; words wider than a whole line are broken between characters.
pub(super) fn build_lines(
    fonts: &FontRegistry,
    segments: &[TextSegment],
    style: &InlineStyle,
    max_width: f32,
    resolve_link: &dyn Fn(&str) -> Option<LinkTarget>,
) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut chunks: Vec<WordChunk> = Vec::new();
    let mut current_x: f32 = 0.0;
    let mut prev_ended_with_ws = false;
    let mut prev_space_w: f32 = 0.0;

    for seg in segments {
        if seg.text.is_empty() {
            continue;
        }
        let pen = pen_for(fonts, seg, style);
        let link = seg.link.as_deref().and_then(resolve_link);
        let space_w = fonts.text_width(pen.font, " ", pen.size);
        let starts_with_ws = seg.text.starts_with(char::is_whitespace);

        let words: Vec<&str> = if seg.inline_code {
            vec![seg.text.trim()]
        } else {
            seg.text.split_whitespace().collect()
        };

        for (i, word) in words.into_iter().enumerate() {
            if word.is_empty() {
                continue;
            }
            let text_w = fonts.text_width(pen.font, word, pen.size);
            let ww = if seg.inline_code {
                text_w + 2.0 * CHIP_PAD_H + CHIP_GAP
            } else {
                text_w
            };

            let need_space =
                !chunks.is_empty() && (i > 0 || starts_with_ws || prev_ended_with_ws);
            let gap = if !need_space {
                0.0
            } else if i > 0 || starts_with_ws {
                space_w
            } else {
                prev_space_w
            };

            if ww > max_width && !seg.inline_code {
                let pieces = break_word(fonts, pen, word, max_width);
                for (n, (piece, piece_w)) in pieces.into_iter().enumerate() {
                    let lead = if n == 0 { gap } else { 0.0 };
                    if !chunks.is_empty() && current_x + lead + piece_w > max_width {
                        lines.push(finish_line(&mut chunks));
                        current_x = 0.0;
                    } else {
                        current_x += lead;
                    }
                    chunks.push(WordChunk {
                        text: piece,
                        pen,
                        x_offset: current_x,
                        width: piece_w,
                        space_before: n == 0 && need_space,
                        strikethrough: seg.strikethrough,
                        code: false,
                        link: link.clone(),
                    });
                    current_x += piece_w;
                }
                continue;
            }

            if !chunks.is_empty() && current_x + gap + ww > max_width {
                lines.push(finish_line(&mut chunks));
                current_x = 0.0;
            } else {
                current_x += gap;
            }

            chunks.push(WordChunk {
                text: word.to_string(),
                pen,
                x_offset: current_x,
                width: ww,
                space_before: need_space && current_x > 0.0,
                strikethrough: seg.strikethrough,
                code: seg.inline_code,
                link: link.clone(),
            });
            current_x += ww;
        }

        prev_ended_with_ws = seg.text.ends_with(char::is_whitespace);
        prev_space_w = space_w;
    }

    if !chunks.is_empty() {
        lines.push(finish_line(&mut chunks));
    }
    if lines.is_empty() {
        lines.push(TextLine {
            chunks: Vec::new(),
            total_width: 0.0,
        });
    }
    lines
}

/// Wrap one unstyled string with a fixed pen.
pub(super) fn wrap_plain(fonts: &FontRegistry, text: &str, pen: Pen, max_width: f32) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let space_w = fonts.text_width(pen.font, " ", pen.size);
    for paragraph in text.split('\n') {
        let mut chunks: Vec<WordChunk> = Vec::new();
        let mut current_x = 0.0;
        for word in paragraph.split_whitespace() {
            let ww = fonts.text_width(pen.font, word, pen.size);
            let pieces = if ww > max_width {
                break_word(fonts, pen, word, max_width)
            } else {
                vec![(word.to_string(), ww)]
            };
            for (n, (piece, piece_w)) in pieces.into_iter().enumerate() {
                let gap = if chunks.is_empty() || n > 0 { 0.0 } else { space_w };
                if !chunks.is_empty() && current_x + gap + piece_w > max_width {
                    lines.push(finish_line(&mut chunks));
                    current_x = 0.0;
                } else {
                    current_x += gap;
                }
                chunks.push(WordChunk {
                    text: piece,
                    pen,
                    x_offset: current_x,
                    width: piece_w,
                    space_before: gap > 0.0,
                    strikethrough: false,
                    code: false,
                    link: None,
                });
                current_x += piece_w;
            }
        }
        lines.push(finish_line(&mut chunks));
    }
    lines
}

/// Draw one wrapped line into the box `[x, x + width] x [top, top + line_h]`.
/// Justified lines stretch their word gaps except on the last line.
pub(super) fn draw_line(
    canvas: &mut Canvas,
    fonts: &mut FontRegistry,
    line: &TextLine,
    x: f32,
    top: f32,
    width: f32,
    line_h: f32,
    align: Align,
    is_last: bool,
) {
    let gaps = line.gaps();
    let justify = align == Align::Justify && !is_last && gaps > 0;
    let line_start = match align {
        Align::Center => x + (width - line.total_width) / 2.0,
        Align::Right => x + width - line.total_width,
        Align::Left | Align::Justify => x,
    };
    let extra_per_gap = if justify {
        ((width - line.total_width) / gaps as f32).max(0.0)
    } else {
        0.0
    };

    let mut shift = 0.0;
    for (i, chunk) in line.chunks.iter().enumerate() {
        if i > 0 && chunk.space_before {
            shift += extra_per_gap;
        }
        let cx = line_start + chunk.x_offset + shift;
        let baseline = chunk.pen.baseline(top, line_h);

        if chunk.code {
            let chip_h = chunk.pen.size * 0.5 + 2.0 * CHIP_PAD_V;
            let chip_w = chunk.width - CHIP_GAP;
            canvas.rounded_rect(cx, top + (line_h - chip_h) / 2.0, chip_w, chip_h, 1.5, Some(CHIP_FILL), None);
            canvas.text(fonts, chunk.pen, cx + CHIP_PAD_H, baseline, &chunk.text);
        } else {
            canvas.text(fonts, chunk.pen, cx, baseline, &chunk.text);
        }

        if chunk.strikethrough {
            let strike_y = baseline - 0.3 * chunk.pen.size_mm();
            canvas.line(cx, strike_y, cx + chunk.width, strike_y, chunk.pen.color, 0.3);
        }
        if let Some(target) = &chunk.link {
            canvas.link(cx, top, chunk.width, line_h, target.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontId;

    fn style() -> InlineStyle {
        InlineStyle {
            size: 10.0,
            color: [0, 0, 0],
            italic: false,
            code_size: 9.0,
        }
    }

    fn no_links(_: &str) -> Option<LinkTarget> {
        None
    }

    #[test]
    fn wraps_words_at_width() {
        let fonts = FontRegistry::builtin_only();
        let segs = vec![TextSegment::plain("aaaa bbbb cccc dddd")];
        let word_w = fonts.text_width(FontId::Builtin(Family::Main, Style::Regular), "aaaa", 10.0);
        let lines = build_lines(&fonts, &segs, &style(), word_w * 2.5, &no_links);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chunks.len(), 2);
        assert!(lines.iter().all(|l| l.total_width <= word_w * 2.5 + 1e-3));
    }

    #[test]
    fn no_space_between_adjacent_runs() {
        let fonts = FontRegistry::builtin_only();
        let segs = vec![
            TextSegment {
                bold: true,
                ..TextSegment::plain("bold")
            },
            TextSegment::plain(", rest"),
        ];
        let lines = build_lines(&fonts, &segs, &style(), 500.0, &no_links);
        let chunks = &lines[0].chunks;
        assert_eq!(chunks[1].text, ",");
        assert!(!chunks[1].space_before);
        assert!((chunks[1].x_offset - chunks[0].width).abs() < 1e-4);
        assert!(chunks[2].space_before);
    }

    #[test]
    fn long_words_are_broken() {
        let fonts = FontRegistry::builtin_only();
        let segs = vec![TextSegment::plain(&"x".repeat(200))];
        let lines = build_lines(&fonts, &segs, &style(), 30.0, &no_links);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.total_width <= 30.0 + 1e-3));
    }

    #[test]
    fn inline_code_is_one_chip() {
        let fonts = FontRegistry::builtin_only();
        let segs = vec![
            TextSegment::plain("run "),
            TextSegment {
                inline_code: true,
                ..TextSegment::plain("cargo test")
            },
        ];
        let lines = build_lines(&fonts, &segs, &style(), 500.0, &no_links);
        let chip = &lines[0].chunks[1];
        assert!(chip.code);
        assert_eq!(chip.text, "cargo test");
        assert_eq!(chip.pen.font, FontId::Builtin(Family::Mono, Style::Regular));
    }

    #[test]
    fn plain_wrap_keeps_empty_lines() {
        let fonts = FontRegistry::builtin_only();
        let pen = Pen {
            font: FontId::Builtin(Family::Main, Style::Regular),
            size: 10.0,
            color: [0, 0, 0],
        };
        let lines = wrap_plain(&fonts, "one\n\ntwo", pen, 100.0);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].chunks.is_empty());
    }
}
