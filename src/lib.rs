//! Layout and pagination engine that turns a sequence of document blocks
//! into a paginated A4 PDF with a generated table of contents.

mod color;
mod config;
mod error;
mod fonts;
mod images;
mod model;
mod pdf;
mod text;

pub use color::{Align, Orientation, Rgb, gradient_bands, hex_to_rgb, lerp_rgb, parse_hex};
pub use config::{
    Code, Colors, Config, Footer, FooterStyle, Gradient, Header, Labels, Layout, Margins,
    PAGE_HEIGHT, PAGE_WIDTH, PageNumbers, Toc,
};
pub use error::{Error, Result};
pub use fonts::{FaceRole, Family, FontPaths, FontRegistry, Style, resolve_role};
pub use images::ImageStore;
pub use model::{
    Blockquote, Cell, CodeBlock, ColoredSegment, ColumnAlign, DocBlock, Heading, ImageBlock,
    ListBlock, ListItem, MAX_NESTING, Paragraph, TableBlock, TextSegment,
};
pub use pdf::{
    Rendered, TocLine, balance_columns, clean_code_text, replace_placeholders, split_numbering,
};
pub use text::normalize_segments;

use std::path::Path;
use std::time::Instant;

/// Build the PDF for `blocks` and return it with the TOC as laid out.
///
/// The configuration is validated first; missing fonts and unreadable images
/// only produce warnings.
pub fn render(blocks: &[DocBlock], config: &Config, fonts: &FontPaths) -> Result<Rendered> {
    let t0 = Instant::now();
    config.validate()?;

    let mut registry = FontRegistry::register(fonts);
    let images = ImageStore::load(blocks, config);
    let t_load = t0.elapsed();

    let rendered = pdf::render(blocks, config, &mut registry, &images)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: load={:.1}ms, render={:.1}ms, total={:.1}ms ({} blocks, {} pages)",
        t_load.as_secs_f64() * 1000.0,
        (t_total - t_load).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        blocks.len(),
        rendered.pages,
    );
    Ok(rendered)
}

/// Build the PDF for `blocks` and return its bytes.
pub fn generate(blocks: &[DocBlock], config: &Config, fonts: &FontPaths) -> Result<Vec<u8>> {
    render(blocks, config, fonts).map(|r| r.bytes)
}

/// Build the PDF and write it to `output`, creating the parent directory.
/// Nothing is written when rendering fails.
pub fn generate_to_file(
    blocks: &[DocBlock],
    config: &Config,
    fonts: &FontPaths,
    output: &Path,
) -> Result<()> {
    let bytes = generate(blocks, config, fonts)?;

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("Creating {} failed ({e}), retrying once", dir.display());
            std::fs::create_dir_all(dir)?;
        }
    }
    std::fs::write(output, &bytes)?;
    log::info!("Wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}
