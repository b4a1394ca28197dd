mod common;

use docweave_pdf::{DocBlock, FontPaths};
use rayon::prelude::*;

use common::{bare_config, code, config, heading, paragraph, table};

fn pages(blocks: &[DocBlock], cfg: &docweave_pdf::Config) -> usize {
    let rendered = docweave_pdf::render(blocks, cfg, &FontPaths::default()).unwrap();
    common::assert_pdf(&rendered.bytes);
    assert_eq!(common::page_objects(&rendered.bytes), rendered.pages);
    rendered.pages
}

#[test]
fn title_page_toc_and_body() {
    common::init_logging();
    let blocks = vec![heading(1, "Intro"), paragraph("Hello world.")];
    assert_eq!(pages(&blocks, &config()), 3);
}

#[test]
fn toc_is_skipped_without_headings() {
    let blocks = vec![paragraph("No headings here.")];
    assert_eq!(pages(&blocks, &config()), 2);
    assert_eq!(pages(&[], &config()), 2);
}

#[test]
fn bare_layout_is_body_only() {
    assert_eq!(pages(&[paragraph("One page.")], &bare_config()), 1);
    assert_eq!(pages(&[], &bare_config()), 1);
}

#[test]
fn page_break_starts_a_new_page() {
    let blocks = vec![paragraph("Before"), DocBlock::PageBreak, paragraph("After")];
    assert_eq!(pages(&blocks, &bare_config()), 2);
}

#[test]
fn long_paragraphs_flow_onto_following_pages() {
    let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(400);
    assert!(pages(&[paragraph(&text)], &bare_config()) > 1);
}

#[test]
fn fixed_date_gives_identical_output() {
    let blocks = vec![
        heading(1, "Intro"),
        paragraph("Same input, same bytes."),
        heading(2, "Details"),
        table(3),
        code(12),
    ];
    let cfg = config();
    let a = docweave_pdf::generate(&blocks, &cfg, &FontPaths::default()).unwrap();
    let b = docweave_pdf::generate(&blocks, &cfg, &FontPaths::default()).unwrap();
    assert!(a == b, "output differs between runs");
}

#[test]
fn long_code_block_is_split_into_chunks() {
    let mut cfg = config();
    cfg.code.auto_scale = false;
    cfg.code.font_size = Some(10.0);
    // 54 lines fit per chunk at 10pt, and every chunk after the first needs
    // a fresh page: six chunks plus the title page.
    assert_eq!(pages(&[code(300)], &cfg), 7);
}

#[test]
fn autoscaled_code_needs_fewer_pages() {
    let mut fixed = config();
    fixed.code.auto_scale = false;
    let scaled = config();
    assert!(pages(&[code(300)], &scaled) < pages(&[code(300)], &fixed));
}

#[test]
fn long_tables_continue_on_the_next_page() {
    assert!(pages(&[table(80)], &bare_config()) >= 2);
}

#[test]
fn oversized_table_cells_continue_across_pages() {
    let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(300);
    let as_paragraph = pages(&[paragraph(&text)], &bare_config());
    let cell = docweave_pdf::Cell {
        segments: vec![docweave_pdf::TextSegment::plain(&text)],
        header: false,
    };
    let big = DocBlock::Table(docweave_pdf::TableBlock {
        rows: vec![vec![cell]],
        alignments: vec![],
    });
    let as_table = pages(&[big], &bare_config());
    assert!(as_paragraph >= 3);
    assert!(as_table + 1 >= as_paragraph, "table {as_table} pages, paragraph {as_paragraph}");
}

#[test]
fn mixed_documents_render_in_parallel() {
    let documents: Vec<Vec<DocBlock>> = vec![
        vec![heading(1, "A"), paragraph("alpha")],
        vec![heading(1, "B"), table(30), heading(2, "B.1"), code(80)],
        vec![paragraph("no headings"), DocBlock::PageBreak, paragraph("second page")],
        vec![DocBlock::placeholder("Diagram could not be rendered")],
    ];
    let results: Vec<usize> = documents.par_iter().map(|blocks| pages(blocks, &config())).collect();
    assert_eq!(results.len(), documents.len());
    assert!(results.iter().all(|&n| n >= 2));
}
