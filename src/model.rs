use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lists and quotes deeper than this are rejected instead of recursing further.
pub const MAX_NESTING: usize = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocBlock {
    Heading(Heading),
    Paragraph(Paragraph),
    Code(CodeBlock),
    Image(ImageBlock),
    List(ListBlock),
    Table(TableBlock),
    Blockquote(Blockquote),
    PageBreak,
}

impl DocBlock {
    /// Italic one-line paragraph used in place of a block an upstream
    /// collaborator failed to produce (e.g. a diagram that did not render).
    pub fn placeholder(message: &str) -> Self {
        DocBlock::Paragraph(Paragraph {
            segments: vec![TextSegment {
                italic: true,
                ..TextSegment::plain(message)
            }],
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// Numbering derived from the folder/file the heading came from, e.g. "2.1.".
    pub parent_numbering: String,
    pub anchor_id: Option<String>,
    pub exclude_from_toc: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSegment {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    #[serde(alias = "code")]
    pub inline_code: bool,
    /// External URL, or `#anchor` for a link to a heading.
    pub link: Option<String>,
}

impl TextSegment {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn is_formatted(&self) -> bool {
        self.bold || self.italic || self.strikethrough || self.inline_code || self.link.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paragraph {
    pub segments: Vec<TextSegment>,
}

/// One highlighted token run, as produced by the syntax highlighter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColoredSegment {
    pub text: String,
    pub color: Option<String>,
    pub bold: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
    /// Empty when the block was not highlighted; `content` is used as-is then.
    pub segments: Vec<ColoredSegment>,
    pub background: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageBlock {
    pub path: PathBuf,
    pub alt: String,
    pub title: Option<String>,
    /// Width on the page in millimetres.
    pub width: Option<f32>,
    pub scale: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListBlock {
    pub items: Vec<ListItem>,
    pub ordered: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListItem {
    pub segments: Vec<TextSegment>,
    pub sub_list: Option<Box<ListBlock>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAlign {
    #[default]
    Default,
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableBlock {
    pub rows: Vec<Vec<Cell>>,
    pub alignments: Vec<ColumnAlign>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cell {
    pub segments: Vec<TextSegment>,
    pub header: bool,
}

impl Cell {
    pub(crate) fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Quoted content. Only paragraphs and lists are rendered inside a quote.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blockquote {
    pub content: Vec<DocBlock>,
}
