#![allow(dead_code)]

use std::path::{Path, PathBuf};

use docweave_pdf::{
    Cell, CodeBlock, Config, DocBlock, Heading, ListBlock, ListItem, Paragraph, TableBlock,
    TextSegment,
};

/// Route `log` output through the test harness; set RUST_LOG to see it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Default settings with a fixed date so output is reproducible.
pub fn config() -> Config {
    Config {
        title: "Handbook".into(),
        author: "Docs Team".into(),
        date: Some("01.02.2024".into()),
        ..Config::default()
    }
}

/// Body-only layout: no title page and no TOC.
pub fn bare_config() -> Config {
    let mut cfg = config();
    cfg.layout.title_page = false;
    cfg.toc.enabled = false;
    cfg
}

pub fn heading(level: u8, text: &str) -> DocBlock {
    DocBlock::Heading(Heading {
        level,
        text: text.into(),
        ..Heading::default()
    })
}

pub fn paragraph(text: &str) -> DocBlock {
    DocBlock::Paragraph(Paragraph {
        segments: vec![TextSegment::plain(text)],
    })
}

pub fn link(text: &str, target: &str) -> DocBlock {
    DocBlock::Paragraph(Paragraph {
        segments: vec![
            TextSegment::plain("See "),
            TextSegment {
                link: Some(target.into()),
                ..TextSegment::plain(text)
            },
        ],
    })
}

pub fn code(lines: usize) -> DocBlock {
    let content = (0..lines)
        .map(|i| format!("let value_{i} = compute({i});"))
        .collect::<Vec<_>>()
        .join("\n");
    DocBlock::Code(CodeBlock {
        language: "rust".into(),
        content,
        ..CodeBlock::default()
    })
}

pub fn table(rows: usize) -> DocBlock {
    let cell = |text: String, header: bool| Cell {
        segments: vec![TextSegment::plain(&text)],
        header,
    };
    let mut all = vec![vec![cell("Key".into(), true), cell("Value".into(), true)]];
    all.extend((0..rows).map(|i| vec![cell(format!("k{i}"), false), cell(format!("v{i}"), false)]));
    DocBlock::Table(TableBlock {
        rows: all,
        alignments: vec![],
    })
}

/// A list nested `depth` levels deep.
pub fn nested_list(depth: usize) -> DocBlock {
    let mut list = ListBlock {
        items: vec![ListItem {
            segments: vec![TextSegment::plain("leaf")],
            sub_list: None,
        }],
        ordered: false,
    };
    for _ in 1..depth {
        list = ListBlock {
            items: vec![ListItem {
                segments: vec![TextSegment::plain("item")],
                sub_list: Some(Box::new(list)),
            }],
            ordered: true,
        };
    }
    DocBlock::List(list)
}

/// Count page objects, ignoring the page tree node.
pub fn page_objects(pdf: &[u8]) -> usize {
    const NEEDLE: &[u8] = b"/Type /Page";
    pdf.windows(NEEDLE.len() + 1)
        .filter(|w| w.starts_with(NEEDLE) && w[NEEDLE.len()] != b's')
        .count()
}

pub fn contains(pdf: &[u8], needle: &[u8]) -> bool {
    pdf.windows(needle.len()).any(|w| w == needle)
}

pub fn assert_pdf(pdf: &[u8]) {
    assert!(pdf.starts_with(b"%PDF-"), "missing PDF header");
    let tail = &pdf[pdf.len().saturating_sub(16)..];
    assert!(contains(tail, b"%%EOF"), "missing EOF marker");
}

/// First system TrueType face found in the usual places, if any.
pub fn system_font() -> Option<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .iter()
    .map(Path::new)
    .find(|p| p.is_file())
    .map(Path::to_path_buf)
}
