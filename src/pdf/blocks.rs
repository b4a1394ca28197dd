//! Flowing blocks: dispatch, paragraphs, lists, quotes and images.

use crate::color::{Align, Rgb, WHITE};
use crate::config::PAGE_HEIGHT;
use crate::error::{Error, Result};
use crate::fonts::{Family, Style};
use crate::images::ImageStore;
use crate::model::{Blockquote, DocBlock, ImageBlock, ListBlock, MAX_NESTING, TextSegment};
use crate::text::normalize_segments;

use super::layout::{build_lines, draw_line};
use super::{QuoteBar, Renderer};

const LIST_INDENT: f32 = 8.0;
const QUOTE_BAR_OFFSET: f32 = 10.0;
const QUOTE_TEXT_OFFSET: f32 = 15.0;
const IMAGE_PAD: f32 = 5.0;
const IMAGE_TITLE_H: f32 = 10.0;
const IMAGE_FRAME: Rgb = [220, 220, 220];
const CAPTION_GREY: Rgb = [100, 100, 100];

/// Punctuation fixes only matter once a run is split into styled segments;
/// a run of plain segments is drawn as one string.
fn prepare_segments(segments: &[TextSegment]) -> Vec<TextSegment> {
    if segments.iter().any(TextSegment::is_formatted) {
        normalize_segments(segments)
    } else {
        let text: String = segments.iter().map(|s| s.text.as_str()).collect();
        vec![TextSegment::plain(&text)]
    }
}

fn list_prefix(ordered: bool, index: usize) -> String {
    if ordered {
        format!("{}. ", index + 1)
    } else {
        "\u{2022} ".to_string()
    }
}

impl Renderer<'_> {
    /// Render one block. `depth` counts enclosing quotes and lists.
    pub(super) fn render_block(&mut self, block: &DocBlock, depth: usize) -> Result<()> {
        match block {
            DocBlock::Heading(h) => self.render_heading(h),
            DocBlock::Paragraph(p) => self.render_paragraph(&p.segments, false),
            DocBlock::Code(c) => self.render_code(c),
            DocBlock::Image(img) => self.render_image(img),
            DocBlock::List(list) => {
                self.render_list(list, 0, depth)?;
                self.ln(5.0);
            }
            DocBlock::Table(t) => self.render_table(t),
            DocBlock::Blockquote(q) => self.render_quote(q, depth)?,
            DocBlock::PageBreak => self.add_page(),
        }
        Ok(())
    }

    /// Draw styled text wrapped between `x` and the right margin, breaking
    /// pages between lines.
    fn flow_segments(&mut self, segments: &[TextSegment], italic: bool, x: f32, align: Align) {
        let style = self.inline_style(italic);
        let line_h = self.body_line_height();
        let width = self.right_edge() - x;
        let lines = build_lines(self.fonts, segments, &style, width, &|link| self.resolve_link(link));
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            self.ensure_space(line_h);
            draw_line(&mut self.canvas, self.fonts, line, x, self.state.y, width, line_h, align, i == last);
            self.state.y += line_h;
        }
        self.state.x = self.state.left;
    }

    pub(super) fn render_paragraph(&mut self, segments: &[TextSegment], italic: bool) {
        let segments = prepare_segments(segments);
        let x = self.state.x;
        self.flow_segments(&segments, italic, x, self.cfg.layout.body_align);
        self.ln(2.0);
    }

    /// Items get a bullet or number with wrapped lines hanging under the
    /// item text; sub-lists indent one more step.
    pub(super) fn render_list(&mut self, list: &ListBlock, level: usize, depth: usize) -> Result<()> {
        if depth + level >= MAX_NESTING {
            return Err(Error::Render(format!(
                "list nesting deeper than {MAX_NESTING} levels"
            )));
        }
        let italic = self.state.quote.is_some();
        let indent = self.state.left + level as f32 * LIST_INDENT;
        let line_h = self.body_line_height();

        for (i, item) in list.items.iter().enumerate() {
            let prefix = list_prefix(list.ordered, i);
            let pen = self.pen(Family::Main, Style::from_flags(false, italic), self.cfg.font_size, self.theme.text);
            let prefix_w = self.fonts.text_width(pen.font, &prefix, pen.size);

            self.ensure_space(line_h);
            self.canvas
                .text(self.fonts, pen, indent, pen.baseline(self.state.y, line_h), prefix.trim_end());

            let segments = prepare_segments(&item.segments);
            let align = match self.cfg.layout.body_align {
                Align::Justify => Align::Justify,
                _ => Align::Left,
            };
            self.flow_segments(&segments, italic, indent + prefix_w, align);
            self.ln(1.0);

            if let Some(sub) = &item.sub_list {
                self.render_list(sub, level + 1, depth)?;
            }
        }
        Ok(())
    }

    /// Only paragraphs and lists are drawn inside a quote, so quotes never
    /// nest.
    pub(super) fn render_quote(&mut self, quote: &Blockquote, depth: usize) -> Result<()> {
        let outer_left = self.state.left;
        self.state.quote = Some(QuoteBar {
            x: outer_left + QUOTE_BAR_OFFSET,
            top: self.state.y,
        });
        self.state.left = outer_left + QUOTE_TEXT_OFFSET;
        self.state.x = self.state.left;

        let result = self.render_quote_body(quote, depth + 1);

        if let Some(bar) = self.state.quote.take() {
            self.draw_quote_bar(bar, self.state.y);
        }
        self.state.left = outer_left;
        self.ln(5.0);
        result
    }

    fn render_quote_body(&mut self, quote: &Blockquote, depth: usize) -> Result<()> {
        for block in &quote.content {
            match block {
                DocBlock::Paragraph(p) => self.render_paragraph(&p.segments, true),
                DocBlock::List(list) => {
                    self.render_list(list, 0, depth)?;
                    self.ln(5.0);
                }
                other => log::warn!("Skipping {} inside a quote", block_kind(other)),
            }
        }
        Ok(())
    }

    pub(super) fn render_image(&mut self, img: &ImageBlock) {
        let max_w = self.available_width();
        let Some((id, aspect)) = self
            .images
            .get(&img.path)
            .map(|(id, loaded)| (id, loaded.aspect()))
            .filter(|(_, aspect)| *aspect > 0.0)
        else {
            self.render_image_placeholder(img, max_w);
            return;
        };

        let base_w = (max_w - 20.0).max(10.0);
        let mut w = match (img.width, img.scale) {
            (Some(width), _) if width > 0.0 => width.min(base_w),
            (_, Some(scale)) if scale > 0.0 && scale != 1.0 => base_w * scale,
            _ => base_w,
        };
        w = w.min(max_w - 2.0 * IMAGE_PAD);
        let mut h = w * aspect;

        let title = img.title.as_deref().filter(|t| !t.trim().is_empty());
        let title_h = if title.is_some() { IMAGE_TITLE_H } else { 0.0 };
        let m = self.margins();
        let max_page_h = PAGE_HEIGHT - m.top - m.bottom - 40.0;
        if h + title_h > max_page_h {
            h = max_page_h - title_h;
            w = h / aspect;
        }

        let container_w = w + 2.0 * IMAGE_PAD;
        let container_h = h + 2.0 * IMAGE_PAD;
        self.ensure_space(container_h + title_h + 10.0);
        let start_y = self.state.y;

        if let Some(title) = title {
            self.draw_caption(title, max_w);
        }

        let x = self.state.left + (max_w - container_w) / 2.0;
        let y = self.state.y;
        let fill = if self.theme.background.is_some() { [250, 250, 250] } else { WHITE };
        self.canvas
            .rounded_rect(x, y, container_w, container_h, 5.0, Some(fill), Some((IMAGE_FRAME, 0.2)));
        self.canvas
            .image(&ImageStore::resource_name(id), x + IMAGE_PAD, y + IMAGE_PAD, w, h);

        self.state.y = start_y + container_h + title_h + 5.0;
        self.ln(2.0);
        log::debug!("Image {} placed at {:.1}x{:.1}mm", img.path.display(), w, h);
    }

    fn draw_caption(&mut self, title: &str, max_w: f32) {
        let pen = self.pen(Family::Main, Style::Bold, 10.0, CAPTION_GREY);
        let x = self.state.left;
        self.write_wrapped(title, pen, x, max_w, 8.0, Align::Center);
        self.ln(2.0);
    }

    /// Framed box with the alt text where an unreadable image would go.
    fn render_image_placeholder(&mut self, img: &ImageBlock, max_w: f32) {
        const PLACEHOLDER_H: f32 = 60.0;
        let w = (max_w - 20.0).max(10.0);
        self.ensure_space(PLACEHOLDER_H + 10.0);
        let x = self.state.left + (max_w - w) / 2.0;
        let y = self.state.y;
        self.canvas
            .rounded_rect(x, y, w, PLACEHOLDER_H, 5.0, Some([248, 248, 248]), Some((IMAGE_FRAME, 0.2)));

        let label = if img.alt.trim().is_empty() {
            img.path.display().to_string()
        } else {
            img.alt.clone()
        };
        let pen = self.pen(Family::Main, Style::Italic, 10.0, CAPTION_GREY);
        self.state.y = y + PLACEHOLDER_H / 2.0 - 4.0;
        self.write_wrapped(&label, pen, x + IMAGE_PAD, w - 2.0 * IMAGE_PAD, 8.0, Align::Center);

        self.state.y = y + PLACEHOLDER_H + 5.0;
        self.ln(2.0);
        log::warn!("Image {} unavailable, drew placeholder", img.path.display());
    }
}

fn block_kind(block: &DocBlock) -> &'static str {
    match block {
        DocBlock::Heading(_) => "heading",
        DocBlock::Paragraph(_) => "paragraph",
        DocBlock::Code(_) => "code block",
        DocBlock::Image(_) => "image",
        DocBlock::List(_) => "list",
        DocBlock::Table(_) => "table",
        DocBlock::Blockquote(_) => "quote",
        DocBlock::PageBreak => "page break",
    }
}
