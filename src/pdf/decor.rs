//! Page furniture: background, running header and footer, title page.

use crate::color::{Align, Rgb, WHITE, gradient_bands};
use crate::config::{Config, FooterStyle, PAGE_HEIGHT, PAGE_WIDTH};
use crate::fonts::{Family, Style};
use crate::images::ImageStore;

use super::toc::display_page;
use super::{QuoteBar, Renderer};

const FOOTER_GREY: Rgb = [128, 128, 128];
const QUOTE_BAR: Rgb = [150, 150, 150];
/// Lowest top edge of the footer row.
const FOOTER_Y: f32 = PAGE_HEIGHT - 15.0;

/// Expand `{page}`, `{total}`, `{title}`, `{author}` and `{date}`. Pages are
/// physical 1-based numbers; both are shifted so `start_page` reads as 1.
pub fn replace_placeholders(template: &str, page: usize, total: usize, cfg: &Config, date: &str) -> String {
    let start = cfg.page_numbers.start_page;
    template
        .replace("{page}", &display_page(page, start).to_string())
        .replace("{total}", &display_page(total, start).to_string())
        .replace("{title}", &cfg.title)
        .replace("{author}", &cfg.author)
        .replace("{date}", date)
}

impl Renderer<'_> {
    /// Header and footer are skipped on the first page, TOC pages and every
    /// page before the configured first numbered page.
    fn furniture_hidden(&self) -> bool {
        self.state.in_toc
            || self.state.page == 1
            || self.state.page < self.cfg.page_numbers.start_page
    }

    pub(super) fn paint_background(&mut self) {
        if self.state.on_title_page || self.state.in_toc {
            return;
        }
        match (self.theme.gradient, self.theme.background) {
            (Some((start, end, orientation)), _) if self.cfg.gradient.global => {
                for band in gradient_bands(start, end, orientation, PAGE_WIDTH, PAGE_HEIGHT) {
                    self.canvas.fill_rect(band.x, band.y, band.w, band.h, band.color);
                }
            }
            (_, Some(color)) => self.canvas.fill_rect(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT, color),
            _ => {}
        }
    }

    fn draw_image_at(&mut self, path: &std::path::Path, x: f32, y: f32, w: f32) {
        match self.images.get(path) {
            Some((id, img)) if img.aspect() > 0.0 => {
                let h = w * img.aspect();
                self.canvas.image(&ImageStore::resource_name(id), x, y, w, h);
            }
            _ => log::debug!("Decoration image {} not available", path.display()),
        }
    }

    pub(super) fn draw_header(&mut self) {
        if self.furniture_hidden() {
            return;
        }
        let y = 10.0;
        let mut x = self.margins().left;
        if let Some(path) = self.cfg.header.image.clone() {
            self.draw_image_at(&path, 10.0, y, 20.0);
            x = 35.0;
        }
        if self.cfg.header.text.is_empty() {
            return;
        }
        let text = replace_placeholders(
            &self.cfg.header.text,
            self.state.page,
            self.total_pages(),
            self.cfg,
            &self.date,
        );
        let pen = self.pen(Family::Main, Style::Regular, 8.0, self.theme.header);
        self.canvas.text(self.fonts, pen, x, pen.baseline(y, 10.0), &text);
    }

    pub(super) fn draw_footer(&mut self) {
        if self.furniture_hidden() {
            return;
        }
        let left = self.margins().left;
        let width = self.cfg.content_width();
        let y = match self.cfg.layout.footer_style {
            FooterStyle::Fixed => FOOTER_Y,
            FooterStyle::Inline => (self.state.y + 5.0).min(FOOTER_Y),
        };
        if let Some(path) = self.cfg.footer.image.clone() {
            self.draw_image_at(&path, left, y, 15.0);
        }

        let cfg = self.cfg;
        let pen = self.pen(Family::Main, Style::Regular, 8.0, FOOTER_GREY);
        let zones = [
            (&cfg.footer.left, Align::Left),
            (&cfg.footer.center, Align::Center),
            (&cfg.footer.right, Align::Right),
        ];
        for (template, align) in zones {
            if template.is_empty() {
                continue;
            }
            let text = replace_placeholders(template, self.state.page, self.total_pages(), cfg, &self.date);
            let w = self.fonts.text_width(pen.font, &text, pen.size);
            let x = match align {
                Align::Center => left + (width - w) / 2.0,
                Align::Right => left + width - w,
                _ => left,
            };
            self.canvas.text(self.fonts, pen, x, pen.baseline(y, 10.0), &text);
        }
    }

    pub(super) fn draw_quote_bar(&mut self, bar: QuoteBar, bottom: f32) {
        if bottom > bar.top {
            self.canvas.line(bar.x, bar.top, bar.x, bottom, QUOTE_BAR, 2.0);
        }
    }

    pub(super) fn draw_title_page(&mut self) {
        let cfg = self.cfg;
        let gradient = self.theme.gradient;
        let (title_color, subtitle_color, author_color, footer_color) = match gradient {
            Some((start, end, orientation)) => {
                for band in gradient_bands(start, end, orientation, PAGE_WIDTH, PAGE_HEIGHT) {
                    self.canvas.fill_rect(band.x, band.y, band.w, band.h, band.color);
                }
                (WHITE, WHITE, WHITE, WHITE)
            }
            None => {
                self.canvas.fill_rect(0.0, 0.0, 10.0, PAGE_HEIGHT, self.theme.title);
                (self.theme.title, [100, 100, 100], [120, 120, 120], FOOTER_GREY)
            }
        };

        let x = 30.0;
        let width = self.right_edge() - x;
        let align = cfg.layout.title_align;

        self.state.y = 60.0;
        let pen = self.pen(Family::Main, Style::Bold, 40.0, title_color);
        self.write_wrapped(&cfg.title, pen, x, width, 15.0, align);

        if !cfg.subtitle.is_empty() {
            self.state.y += 5.0;
            let pen = self.pen(Family::Main, Style::Regular, 20.0, subtitle_color);
            self.write_wrapped(&cfg.subtitle, pen, x, width, 12.0, align);
        }
        if !cfg.author.is_empty() {
            self.state.y += 5.0;
            let pen = self.pen(Family::Main, Style::Italic, 14.0, author_color);
            let line = format!("{}{}", cfg.labels.author, cfg.author);
            self.write_wrapped(&line, pen, x, width, 10.0, align);
        }

        self.state.y = 250.0;
        let pen = self.pen(Family::Main, Style::Regular, 12.0, footer_color);
        if !cfg.author.is_empty() {
            let line = format!("{}{}", cfg.labels.created_by, cfg.author);
            self.write_wrapped(&line, pen, x, width, 10.0, align);
        }
        let line = format!("{}{}", cfg.labels.date, self.date);
        self.write_wrapped(&line, pen, x, width, 10.0, align);
    }
}
