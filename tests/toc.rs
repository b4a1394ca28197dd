mod common;

use docweave_pdf::{DocBlock, FontPaths, Heading, TocLine};

use common::{config, heading, paragraph};

fn toc(blocks: &[DocBlock], cfg: &docweave_pdf::Config) -> Vec<TocLine> {
    docweave_pdf::render(blocks, cfg, &FontPaths::default())
        .unwrap()
        .toc
}

fn labels(lines: &[TocLine]) -> Vec<(String, String)> {
    lines
        .iter()
        .map(|l| (l.number.clone(), l.text.clone()))
        .collect()
}

#[test]
fn numbers_follow_heading_hierarchy() {
    common::init_logging();
    let blocks = vec![
        heading(1, "Intro"),
        paragraph("text"),
        heading(2, "Sub"),
        heading(1, "Next"),
    ];
    let lines = toc(&blocks, &config());
    assert_eq!(
        labels(&lines),
        [
            ("1.".to_string(), "Intro".to_string()),
            ("1.1.".to_string(), "Sub".to_string()),
            ("2.".to_string(), "Next".to_string()),
        ]
    );
    assert_eq!(lines.iter().map(|l| l.level).collect::<Vec<_>>(), [1, 2, 1]);
    // Title page and one TOC page come first.
    assert!(lines.iter().all(|l| l.page == 3));
}

#[test]
fn excluded_headings_are_left_out() {
    let blocks = vec![
        heading(1, "Shown"),
        DocBlock::Heading(Heading {
            level: 1,
            text: "Hidden".into(),
            exclude_from_toc: true,
            ..Heading::default()
        }),
        heading(1, "Also shown"),
    ];
    let lines = toc(&blocks, &config());
    assert_eq!(
        labels(&lines),
        [
            ("1.".to_string(), "Shown".to_string()),
            ("2.".to_string(), "Also shown".to_string()),
        ]
    );
}

#[test]
fn page_numbers_honour_start_page() {
    let blocks = vec![
        heading(1, "First"),
        DocBlock::PageBreak,
        heading(1, "Second"),
        DocBlock::PageBreak,
        heading(2, "Third"),
    ];
    let mut cfg = config();
    cfg.page_numbers.start_page = 3;
    let pages: Vec<usize> = toc(&blocks, &cfg).iter().map(|l| l.page).collect();
    assert_eq!(pages, [1, 2, 3]);

    cfg.page_numbers.start_page = 1;
    let pages: Vec<usize> = toc(&blocks, &cfg).iter().map(|l| l.page).collect();
    assert_eq!(pages, [3, 4, 5]);
}

#[test]
fn long_toc_spans_pages_and_stays_ordered() {
    let blocks: Vec<DocBlock> = (0..60)
        .flat_map(|i| {
            [
                heading(if i % 3 == 0 { 1 } else { 2 }, &format!("Section {i}")),
                paragraph("Body text that takes a little room on the page."),
            ]
        })
        .collect();
    let lines = toc(&blocks, &config());
    assert_eq!(lines.len(), 60);
    assert!(lines[0].page >= 4, "TOC should need more than one page");
    assert!(lines.windows(2).all(|w| w[0].page <= w[1].page));
}

#[test]
fn toc_can_be_disabled() {
    let mut cfg = config();
    cfg.toc.enabled = false;
    let rendered = docweave_pdf::render(&[heading(1, "Only")], &cfg, &FontPaths::default()).unwrap();
    assert_eq!(rendered.pages, 2);
    assert_eq!(rendered.toc.len(), 1);
    assert_eq!(rendered.toc[0].page, 2);
}

#[test]
fn folder_numbering_reaches_the_toc() {
    let with_parent = |level, text: &str| {
        DocBlock::Heading(Heading {
            level,
            text: text.into(),
            parent_numbering: "4".into(),
            ..Heading::default()
        })
    };
    let lines = toc(&[with_parent(1, "Guide"), with_parent(2, "Install")], &config());
    assert_eq!(lines[0].number, "4.");
    assert_eq!(lines[1].number, "4.1.");
}
