mod blocks;
mod canvas;
mod code;
mod decor;
mod layout;
mod table;
mod toc;

use std::collections::BTreeMap;

use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::color::{MM_TO_PT, Orientation, Rgb, hex_to_rgb, parse_hex};
use crate::config::{Config, PAGE_HEIGHT, PAGE_WIDTH};
use crate::error::{Error, Result};
use crate::fonts::{Family, FontRegistry, Style};
use crate::images::ImageStore;
use crate::model::DocBlock;

use canvas::{Canvas, Dest, LinkTarget, Pen};
use layout::InlineStyle;
use toc::{HeadingCounters, PlannedEntry, TocEntry};

pub use code::clean_code_text;
pub use table::balance_columns;
pub use decor::replace_placeholders;
pub use toc::split_numbering;

/// Colours resolved once per build.
struct Theme {
    title: Rgb,
    header: Rgb,
    text: Rgb,
    accent: Option<Rgb>,
    background: Option<Rgb>,
    gradient: Option<(Rgb, Rgb, Orientation)>,
}

impl Theme {
    fn from_config(cfg: &Config) -> Self {
        Self {
            title: hex_to_rgb(&cfg.colors.title),
            header: hex_to_rgb(&cfg.colors.header),
            text: hex_to_rgb(&cfg.colors.text),
            accent: cfg.colors.accent.as_deref().and_then(parse_hex),
            background: cfg.colors.background.as_deref().and_then(parse_hex),
            gradient: cfg.gradient.enabled.then(|| {
                (
                    hex_to_rgb(&cfg.gradient.start),
                    hex_to_rgb(&cfg.gradient.end),
                    cfg.gradient.orientation,
                )
            }),
        }
    }
}

/// Vertical bar of a quote that is still open; split at page breaks.
#[derive(Clone, Copy, Debug)]
struct QuoteBar {
    x: f32,
    top: f32,
}

/// Cursor, counters and everything else one render pass mutates.
pub(crate) struct RenderState {
    pub(crate) x: f32,
    pub(crate) y: f32,
    /// 1-based number of the current page; 0 before the first page.
    pub(crate) page: usize,
    page_open: bool,
    /// Left edge for body content; indented inside quotes.
    pub(crate) left: f32,
    pub(crate) counters: HeadingCounters,
    pub(crate) toc: Vec<TocEntry>,
    pub(crate) anchors: BTreeMap<String, Dest>,
    pub(crate) in_toc: bool,
    on_title_page: bool,
    quote: Option<QuoteBar>,
}

impl RenderState {
    fn new(cfg: &Config) -> Self {
        let mut state = Self {
            x: 0.0,
            y: 0.0,
            page: 0,
            page_open: false,
            left: 0.0,
            counters: HeadingCounters::default(),
            toc: Vec::new(),
            anchors: BTreeMap::new(),
            in_toc: false,
            on_title_page: false,
            quote: None,
        };
        state.reset(cfg);
        state
    }

    /// Back to the state before the first page of a pass.
    pub(crate) fn reset(&mut self, cfg: &Config) {
        let m = &cfg.layout.margins;
        self.x = m.left;
        self.y = m.top;
        self.page = 0;
        self.page_open = false;
        self.left = m.left;
        self.counters.reset();
        self.toc.clear();
        self.anchors.clear();
        self.in_toc = false;
        self.on_title_page = false;
        self.quote = None;
    }
}

/// What the measuring pass learned about the final layout.
pub(crate) struct Measurement {
    pub(crate) toc: Vec<TocEntry>,
    pub(crate) anchors: BTreeMap<String, Dest>,
    pub(crate) total_pages: usize,
}

pub(crate) struct Renderer<'a> {
    cfg: &'a Config,
    theme: Theme,
    date: String,
    fonts: &'a mut FontRegistry,
    images: &'a ImageStore,
    plan: &'a [PlannedEntry],
    measured: Option<Measurement>,
    canvas: Canvas,
    state: RenderState,
}

/// A TOC line as printed, with the page number after the `start_page` offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocLine {
    pub level: usize,
    pub number: String,
    pub text: String,
    pub page: usize,
}

/// Output of a build: the PDF plus what the layout decided.
#[derive(Clone, Debug)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub pages: usize,
    pub toc: Vec<TocLine>,
}

/// Lay `blocks` out twice and serialize the second pass as a PDF.
pub(crate) fn render(
    blocks: &[DocBlock],
    cfg: &Config,
    fonts: &mut FontRegistry,
    images: &ImageStore,
) -> Result<Rendered> {
    let t0 = std::time::Instant::now();
    let date = cfg
        .date
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%d.%m.%Y").to_string());
    let plan = toc::plan(blocks, cfg);

    let mut renderer = Renderer {
        cfg,
        theme: Theme::from_config(cfg),
        date,
        fonts,
        images,
        plan: &plan,
        measured: None,
        canvas: Canvas::new(true),
        state: RenderState::new(cfg),
    };

    renderer.run(blocks)?;
    let measurement = renderer.take_measurement()?;
    let total_pages = measurement.total_pages;
    let t_measure = t0.elapsed();
    log::debug!(
        "Measuring pass: {} page(s), {} TOC entries, {} anchors",
        total_pages,
        measurement.toc.len(),
        measurement.anchors.len()
    );

    renderer.fonts.prepare_subsets();
    renderer.reset(measurement);
    renderer.run(blocks)?;
    if renderer.state.page != total_pages {
        log::warn!(
            "Page count changed between passes ({} -> {}), TOC page numbers may be off",
            total_pages,
            renderer.state.page
        );
    }
    let pages = renderer.state.page;
    let t_layout = t0.elapsed();

    let toc = renderer
        .measured
        .as_ref()
        .map(|m| {
            m.toc
                .iter()
                .map(|e| TocLine {
                    level: e.level,
                    number: e.number.clone(),
                    text: e.text.clone(),
                    page: toc::display_page(e.page, cfg.page_numbers.start_page),
                })
                .collect()
        })
        .unwrap_or_default();
    let bytes = renderer.finish();
    let t_assembly = t0.elapsed();

    log::info!(
        "Render phases: measure={:.1}ms, layout={:.1}ms, assembly={:.1}ms ({} pages, {} bytes)",
        t_measure.as_secs_f64() * 1000.0,
        (t_layout - t_measure).as_secs_f64() * 1000.0,
        (t_assembly - t_layout).as_secs_f64() * 1000.0,
        pages,
        bytes.len(),
    );
    Ok(Rendered { bytes, pages, toc })
}

impl<'a> Renderer<'a> {
    /// Final-pass renderer with no TOC plan, for exercising single blocks.
    #[cfg(test)]
    pub(crate) fn for_tests(cfg: &'a Config, fonts: &'a mut FontRegistry, images: &'a ImageStore) -> Self {
        Self {
            cfg,
            theme: Theme::from_config(cfg),
            date: "01.01.2024".into(),
            fonts,
            images,
            plan: &[],
            measured: None,
            canvas: Canvas::new(false),
            state: RenderState::new(cfg),
        }
    }

    fn run(&mut self, blocks: &[DocBlock]) -> Result<()> {
        if self.cfg.layout.title_page {
            self.state.on_title_page = true;
            self.add_page();
            self.draw_title_page();
            self.close_page();
            self.state.on_title_page = false;
        }

        if self.cfg.toc.enabled && !self.plan.is_empty() {
            self.state.in_toc = true;
            self.add_page();
            self.render_toc();
            self.close_page();
            self.state.in_toc = false;
        }

        self.add_page();
        for block in blocks {
            self.render_block(block, 0)?;
        }
        self.close_page();
        Ok(())
    }

    fn take_measurement(&mut self) -> Result<Measurement> {
        let toc = std::mem::take(&mut self.state.toc);
        let consistent = toc.len() == self.plan.len()
            && toc
                .iter()
                .zip(self.plan)
                .all(|(entry, planned)| {
                    entry.level == planned.level
                        && entry.number == planned.number
                        && entry.text == planned.text
                });
        if !consistent {
            return Err(Error::Render(format!(
                "table of contents changed during layout ({} planned, {} laid out)",
                self.plan.len(),
                toc.len()
            )));
        }
        Ok(Measurement {
            toc,
            anchors: std::mem::take(&mut self.state.anchors),
            total_pages: self.state.page,
        })
    }

    /// Prepare the final pass: same starting state, real output.
    fn reset(&mut self, measurement: Measurement) {
        self.state.reset(self.cfg);
        self.canvas = Canvas::new(false);
        self.measured = Some(measurement);
    }

    fn margins(&self) -> crate::config::Margins {
        self.cfg.layout.margins
    }

    /// Right edge of the content area.
    fn right_edge(&self) -> f32 {
        PAGE_WIDTH - self.cfg.layout.margins.right
    }

    /// Width from the current left edge to the right margin.
    fn available_width(&self) -> f32 {
        self.right_edge() - self.state.left
    }

    fn page_bottom(&self) -> f32 {
        PAGE_HEIGHT - self.cfg.layout.margins.bottom
    }

    fn total_pages(&self) -> usize {
        self.measured.as_ref().map_or(self.state.page, |m| m.total_pages)
    }

    /// Break to a new page unless `height` millimetres still fit.
    pub(crate) fn ensure_space(&mut self, height: f32) {
        if self.state.y + height > self.page_bottom() {
            self.add_page();
        }
    }

    pub(crate) fn add_page(&mut self) {
        self.close_page();
        self.canvas.begin_page();
        self.state.page += 1;
        self.state.page_open = true;
        self.state.x = self.state.left;
        self.state.y = self.margins().top;
        self.paint_background();
        self.draw_header();
        if let Some(bar) = &mut self.state.quote {
            bar.top = self.state.y;
        }
        log::debug!("Page {} started", self.state.page);
    }

    fn close_page(&mut self) {
        if !self.state.page_open {
            return;
        }
        if let Some(bar) = self.state.quote {
            self.draw_quote_bar(bar, self.state.y);
        }
        self.draw_footer();
        self.state.page_open = false;
    }

    fn ln(&mut self, h: f32) {
        self.state.y += h;
        self.state.x = self.state.left;
    }

    fn body_line_height(&self) -> f32 {
        let spacing = if self.cfg.layout.line_spacing > 0.0 {
            self.cfg.layout.line_spacing
        } else {
            1.0
        };
        (self.cfg.font_size * 0.5 * spacing).max(5.0)
    }

    fn inline_style(&self, italic: bool) -> InlineStyle {
        InlineStyle {
            size: self.cfg.font_size,
            color: self.theme.text,
            italic,
            code_size: self.cfg.code.font_size.unwrap_or(self.cfg.font_size * 0.9),
        }
    }

    fn pen(&self, family: Family, style: Style, size: f32, color: Rgb) -> Pen {
        Pen {
            font: self.fonts.select(family, style),
            size,
            color,
        }
    }

    /// Resolve a segment link. Internal `#anchor` links need the measuring
    /// pass, so they are inert until the final pass.
    fn resolve_link(&self, link: &str) -> Option<LinkTarget> {
        if let Some(anchor) = link.strip_prefix('#') {
            let measured = self.measured.as_ref()?;
            match measured.anchors.get(anchor) {
                Some(dest) => Some(LinkTarget::Internal(*dest)),
                None => {
                    log::warn!("Unresolved internal link #{anchor}, rendering as plain text");
                    None
                }
            }
        } else if link.trim().is_empty() {
            None
        } else {
            Some(LinkTarget::Uri(link.to_string()))
        }
    }

    /// Draw `text` wrapped into `width` starting at the cursor, one
    /// `line_h` row per line.
    fn write_wrapped(&mut self, text: &str, pen: Pen, x: f32, width: f32, line_h: f32, align: crate::color::Align) {
        let lines = layout::wrap_plain(self.fonts, text, pen, width);
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            layout::draw_line(
                &mut self.canvas,
                self.fonts,
                line,
                x,
                self.state.y,
                width,
                line_h,
                align,
                i == last,
            );
            self.state.y += line_h;
        }
    }

    fn finish(self) -> Vec<u8> {
        let mut pdf = Pdf::new();
        let mut next_id = 1i32;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };

        let catalog_id = alloc();
        let pages_id = alloc();
        let info_id = alloc();

        let font_pairs = self.fonts.embed(&mut pdf, &mut alloc);
        let image_pairs = self.images.embed(&mut pdf, &mut alloc);

        let pages = self.canvas.into_pages();
        let n = pages.len();
        let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
        let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

        let left_pt = self.cfg.layout.margins.left * MM_TO_PT;
        let mut page_annot_refs: Vec<Vec<Ref>> = Vec::with_capacity(n);
        for page in &pages {
            let mut refs = Vec::with_capacity(page.links.len());
            for link in &page.links {
                let rect = Rect::new(
                    link.x * MM_TO_PT,
                    (PAGE_HEIGHT - link.y - link.h) * MM_TO_PT,
                    (link.x + link.w) * MM_TO_PT,
                    (PAGE_HEIGHT - link.y) * MM_TO_PT,
                );
                let target_page = match &link.target {
                    LinkTarget::Internal(dest) => match page_ids.get(dest.page.wrapping_sub(1)) {
                        Some(id) => Some((*id, dest.y)),
                        None => {
                            log::warn!("Link to missing page {} dropped", dest.page);
                            continue;
                        }
                    },
                    LinkTarget::Uri(_) => None,
                };
                let annot_ref = alloc();
                let mut annot = pdf.annotation(annot_ref);
                annot
                    .subtype(AnnotationType::Link)
                    .rect(rect)
                    .border(0.0, 0.0, 0.0, None);
                match (&link.target, target_page) {
                    (LinkTarget::Uri(url), _) => {
                        annot.action().action_type(ActionType::Uri).uri(Str(url.as_bytes()));
                    }
                    (LinkTarget::Internal(_), Some((page_ref, y))) => {
                        annot
                            .action()
                            .action_type(ActionType::GoTo)
                            .destination()
                            .page(page_ref)
                            .xyz(left_pt, (PAGE_HEIGHT - y) * MM_TO_PT, None);
                    }
                    (LinkTarget::Internal(_), None) => {}
                }
                refs.push(annot_ref);
            }
            page_annot_refs.push(refs);
        }

        for (i, page) in pages.into_iter().enumerate() {
            let raw = page.content.finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
        }

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().copied())
            .count(n as i32);

        {
            let mut info = pdf.document_info(info_id);
            if !self.cfg.title.is_empty() {
                info.title(TextStr(&self.cfg.title));
            }
            if !self.cfg.author.is_empty() {
                info.author(TextStr(&self.cfg.author));
            }
            info.creator(TextStr("docweave-pdf"));
        }

        let media_box = Rect::new(0.0, 0.0, PAGE_WIDTH * MM_TO_PT, PAGE_HEIGHT * MM_TO_PT);
        for i in 0..n {
            let mut page = pdf.page(page_ids[i]);
            page.media_box(media_box)
                .parent(pages_id)
                .contents(content_ids[i]);
            if !page_annot_refs[i].is_empty() {
                page.annotations(page_annot_refs[i].iter().copied());
            }
            let mut resources = page.resources();
            {
                let mut fonts = resources.fonts();
                for (name, font_ref) in &font_pairs {
                    fonts.pair(Name(name.as_bytes()), *font_ref);
                }
            }
            if !image_pairs.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in &image_pairs {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }

        pdf.finish()
    }
}
