use crate::color::{Align, Rgb, WHITE};
use crate::config::PAGE_HEIGHT;
use crate::fonts::{Family, FontRegistry, Style};
use crate::model::{Cell, ColumnAlign, TableBlock, TextSegment};
use crate::text::normalize_segments;

use super::Renderer;
use super::layout::{TextLine, build_lines, draw_line};

const CELL_PAD: f32 = 4.0;
/// Extra room on top of the padded text width when measuring a column.
const MEASURE_SLACK: f32 = 4.0;
const LINE_SPACING: f32 = 1.2;
const HEADER_BG: Rgb = [52, 73, 94];
const ZEBRA: Rgb = [245, 247, 250];
const BORDER: Rgb = [200, 200, 210];

/// Scale natural column widths onto `width`.
///
/// Narrow tables (natural sum under half the width) grow by at most 1.5x,
/// everything else is scaled to fit exactly. Any remaining gap goes to the
/// last column, so the result always sums to `width`.
pub fn balance_columns(natural: &[f32], width: f32) -> Vec<f32> {
    if natural.is_empty() {
        return Vec::new();
    }
    let total: f32 = natural.iter().sum();
    if total <= 0.0 {
        return vec![width / natural.len() as f32; natural.len()];
    }

    let mut scale = width / total;
    if total < width * 0.5 {
        scale = scale.min(1.5);
    }
    let mut widths: Vec<f32> = natural.iter().map(|w| w * scale).collect();

    let sum: f32 = widths.iter().sum();
    if sum > width {
        let shrink = width / sum;
        widths.iter_mut().for_each(|w| *w *= shrink);
    }
    let sum: f32 = widths.iter().sum();
    if let Some(last) = widths.last_mut() {
        *last += width - sum;
    }
    widths
}

fn cell_segments(cell: &Cell, header: bool) -> Vec<TextSegment> {
    let mut segments = normalize_segments(&cell.segments);
    if header {
        segments.iter_mut().for_each(|s| s.bold = true);
    }
    segments
}

/// One-line width of every column's widest cell, measured in bold.
fn natural_widths(fonts: &FontRegistry, table: &TableBlock, columns: usize, size: f32) -> Vec<f32> {
    let bold = fonts.select(Family::Main, Style::Bold);
    let mut widths = vec![0.0f32; columns];
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            let w = fonts.text_width(bold, &cell.text(), size) + 2.0 * CELL_PAD + MEASURE_SLACK;
            widths[i] = widths[i].max(w);
        }
    }
    widths
}

struct RowLayout {
    height: f32,
    /// Wrapped lines of the tallest cell.
    lines: usize,
    header: bool,
    cells: Vec<Vec<TextLine>>,
}

/// One drawing step of a table, decided before anything is drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Step {
    /// Start a new page.
    Break,
    /// Repeat the header row at the top of a continuation page.
    Header(usize),
    /// Draw lines `from..to` of a row; a whole row spans `0..lines`.
    Row { row: usize, from: usize, to: usize },
}

fn slice_height(lines: usize, line_h: f32) -> f32 {
    lines as f32 * line_h + 2.0 * CELL_PAD
}

/// Place rows between `top` and `bottom`, starting at `y`.
///
/// A row that does not fit moves to the next page. A row taller than a whole
/// page is split between its wrapped lines. Every continuation page starts
/// with the header row.
fn plan_rows(rows: &[RowLayout], line_h: f32, mut y: f32, top: f32, bottom: f32) -> Vec<Step> {
    let header_row = rows.iter().position(|r| r.header);
    let header_h = header_row.map_or(0.0, |h| rows[h].height);
    let mut steps = Vec::with_capacity(rows.len());

    let break_page = |steps: &mut Vec<Step>, y: &mut f32, is_header: bool| {
        steps.push(Step::Break);
        *y = top;
        if let Some(h) = header_row.filter(|_| !is_header) {
            steps.push(Step::Header(h));
            *y += header_h;
        }
    };

    for (idx, row) in rows.iter().enumerate() {
        if y + row.height <= bottom {
            steps.push(Step::Row { row: idx, from: 0, to: row.lines });
            y += row.height;
            continue;
        }
        let fresh = top + if row.header { 0.0 } else { header_h };
        if fresh + row.height <= bottom {
            break_page(&mut steps, &mut y, row.header);
            steps.push(Step::Row { row: idx, from: 0, to: row.lines });
            y += row.height;
            continue;
        }

        let mut from = 0;
        let mut page_is_fresh = false;
        while from < row.lines {
            let room = ((bottom - y - 2.0 * CELL_PAD) / line_h).floor();
            if room < 1.0 && !page_is_fresh {
                break_page(&mut steps, &mut y, row.header);
                page_is_fresh = true;
                continue;
            }
            let fit = (room.max(1.0) as usize).min(row.lines - from);
            let to = from + fit;
            steps.push(Step::Row { row: idx, from, to });
            y += slice_height(fit, line_h);
            from = to;
            page_is_fresh = false;
            if from < row.lines {
                break_page(&mut steps, &mut y, row.header);
                page_is_fresh = true;
            }
        }
    }
    steps
}

/// Position of each row among the body rows, for zebra striping.
fn body_indices(rows: &[RowLayout]) -> Vec<Option<usize>> {
    let mut next = 0;
    rows.iter()
        .map(|r| {
            (!r.header).then(|| {
                next += 1;
                next - 1
            })
        })
        .collect()
}

impl Renderer<'_> {
    fn layout_rows(&self, table: &TableBlock, widths: &[f32], line_h: f32) -> Vec<RowLayout> {
        let resolve = |link: &str| self.resolve_link(link);
        table
            .rows
            .iter()
            .map(|row| {
                let header = row.first().is_some_and(|c| c.header);
                let cells: Vec<Vec<TextLine>> = row
                    .iter()
                    .zip(widths)
                    .map(|(cell, &w)| {
                        let is_header = header || cell.header;
                        let style = super::layout::InlineStyle {
                            color: if is_header { WHITE } else { self.theme.text },
                            ..self.inline_style(false)
                        };
                        let segments = cell_segments(cell, is_header);
                        build_lines(self.fonts, &segments, &style, (w - 2.0 * CELL_PAD).max(1.0), &resolve)
                    })
                    .collect();
                let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
                RowLayout {
                    height: slice_height(lines, line_h),
                    lines,
                    header,
                    cells,
                }
            })
            .collect()
    }

    pub(super) fn render_table(&mut self, table: &TableBlock) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let size = self.cfg.font_size;
        let line_h = size * 0.35 * LINE_SPACING;
        let width = self.available_width();
        let natural = natural_widths(self.fonts, table, columns, size);
        let widths = balance_columns(&natural, width);
        let rows = self.layout_rows(table, &widths, line_h);

        let m = self.margins();
        let bottom = PAGE_HEIGHT - m.bottom - 10.0;
        let total_h: f32 = rows.iter().map(|r| r.height).sum::<f32>() + 5.0;
        let full_page = PAGE_HEIGHT - m.top - m.bottom - 20.0;
        if total_h > bottom - self.state.y && total_h <= full_page {
            self.add_page();
        }

        let aligns: Vec<Align> = (0..columns)
            .map(|i| match table.alignments.get(i).copied().unwrap_or_default() {
                ColumnAlign::Left => Align::Left,
                ColumnAlign::Center => Align::Center,
                ColumnAlign::Right => Align::Right,
                ColumnAlign::Default => self.cfg.layout.body_align,
            })
            .collect();
        let header_bg = self.theme.accent.unwrap_or(HEADER_BG);
        let fill_for = |body: Option<usize>| match body {
            None => header_bg,
            Some(i) if i % 2 == 0 => ZEBRA,
            Some(_) => WHITE,
        };
        let body = body_indices(&rows);

        for step in plan_rows(&rows, line_h, self.state.y, m.top, bottom) {
            match step {
                Step::Break => self.add_page(),
                Step::Header(h) => {
                    let r = &rows[h];
                    self.draw_row(r, 0, r.lines, &widths, &aligns, header_bg, line_h);
                }
                Step::Row { row, from, to } => {
                    self.draw_row(&rows[row], from, to, &widths, &aligns, fill_for(body[row]), line_h);
                    log::trace!("Table row {row} lines {from}..{to} at y={:.1}", self.state.y);
                }
            }
        }
        self.ln(5.0);
    }

    /// Backgrounds and borders first, then vertically centred cell text for
    /// wrapped lines `from..to`.
    #[allow(clippy::too_many_arguments)]
    fn draw_row(
        &mut self,
        row: &RowLayout,
        from: usize,
        to: usize,
        widths: &[f32],
        aligns: &[Align],
        fill: Rgb,
        line_h: f32,
    ) {
        let top = self.state.y;
        let height = slice_height(to - from, line_h);
        let mut x = self.state.left;
        for &w in widths {
            self.canvas.fill_rect(x, top, w, height, fill);
            self.canvas.stroke_rect(x, top, w, height, BORDER, 0.15);
            x += w;
        }

        let mut x = self.state.left;
        for ((lines, &w), &align) in row.cells.iter().zip(widths).zip(aligns) {
            let last = lines.len().saturating_sub(1);
            let slice = lines.get(from.min(lines.len())..to.min(lines.len())).unwrap_or(&[]);
            let text_h = slice.len() as f32 * line_h;
            let offset = ((height - text_h) / 2.0).max(CELL_PAD);
            let inner = w - 2.0 * CELL_PAD;
            for (i, line) in slice.iter().enumerate() {
                let line_top = top + offset + i as f32 * line_h;
                draw_line(&mut self.canvas, self.fonts, line, x + CELL_PAD, line_top, inner, line_h, align, from + i == last);
            }
            x += w;
        }
        self.state.y = top + height;
        self.state.x = self.state.left;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(widths: &[f32]) -> f32 {
        widths.iter().sum()
    }

    #[test]
    fn narrow_tables_grow_at_most_one_and_a_half() {
        let widths = balance_columns(&[10.0, 10.0, 10.0], 190.0);
        assert!((widths[0] - 15.0).abs() < 1e-4);
        assert!((widths[1] - 15.0).abs() < 1e-4);
        assert!((widths[2] - 160.0).abs() < 1e-3);
        assert!((sum(&widths) - 190.0).abs() < 1e-3);
    }

    #[test]
    fn medium_tables_fill_the_width() {
        let widths = balance_columns(&[60.0, 40.0], 190.0);
        assert!((widths[0] - 114.0).abs() < 1e-3);
        assert!((widths[1] - 76.0).abs() < 1e-3);
    }

    #[test]
    fn wide_tables_shrink_proportionally() {
        let widths = balance_columns(&[200.0, 100.0, 80.0], 190.0);
        assert!((sum(&widths) - 190.0).abs() < 1e-3);
        assert!((widths[0] / widths[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(balance_columns(&[], 190.0).is_empty());
        assert_eq!(balance_columns(&[0.0, 0.0], 100.0), vec![50.0, 50.0]);
    }

    #[test]
    fn widths_always_sum_to_content_width() {
        for natural in [vec![1.0], vec![3.0, 500.0], vec![47.5; 4], vec![12.0, 0.5, 90.0, 33.3]] {
            let widths = balance_columns(&natural, 170.0);
            assert!((sum(&widths) - 170.0).abs() < 1e-3, "{natural:?} -> {widths:?}");
        }
    }

    #[test]
    fn header_cells_are_measured_bold() {
        let fonts = FontRegistry::builtin_only();
        let table = TableBlock {
            rows: vec![vec![Cell {
                segments: vec![TextSegment::plain("Name")],
                header: true,
            }]],
            alignments: vec![],
        };
        let natural = natural_widths(&fonts, &table, 1, 11.0);
        let bold = fonts.text_width(fonts.select(Family::Main, Style::Bold), "Name", 11.0);
        assert!((natural[0] - (bold + 12.0)).abs() < 1e-4);
    }

    const LINE_H: f32 = 5.0;
    const TOP: f32 = 25.0;
    const BOTTOM: f32 = 267.0;

    fn row(lines: usize, header: bool) -> RowLayout {
        RowLayout {
            height: slice_height(lines, LINE_H),
            lines,
            header,
            cells: Vec::new(),
        }
    }

    /// Replay the steps and return the bottom edge of every drawn slice.
    fn replay(rows: &[RowLayout], steps: &[Step], start: f32) -> Vec<f32> {
        let mut y = start;
        let mut edges = Vec::new();
        for step in steps {
            match *step {
                Step::Break => y = TOP,
                Step::Header(h) => {
                    y += rows[h].height;
                    edges.push(y);
                }
                Step::Row { from, to, .. } => {
                    y += slice_height(to - from, LINE_H);
                    edges.push(y);
                }
            }
        }
        edges
    }

    #[test]
    fn header_repeats_on_every_continuation_page() {
        let mut rows = vec![row(1, true)];
        rows.extend((0..45).map(|_| row(1, false)));
        let steps = plan_rows(&rows, LINE_H, TOP, TOP, BOTTOM);

        let breaks = steps.iter().filter(|s| **s == Step::Break).count();
        let headers = steps.iter().filter(|s| matches!(s, Step::Header(_))).count();
        assert_eq!(breaks, 2, "17 body rows fit per page");
        assert_eq!(headers, breaks);
        for pair in steps.windows(2).filter(|w| w[0] == Step::Break) {
            assert_eq!(pair[1], Step::Header(0));
        }
        assert_eq!(steps[0], Step::Row { row: 0, from: 0, to: 1 });
        assert!(replay(&rows, &steps, TOP).iter().all(|&y| y <= BOTTOM + 1e-3));
        let drawn: Vec<usize> = steps
            .iter()
            .filter_map(|s| match s {
                Step::Row { row, .. } => Some(*row),
                _ => None,
            })
            .collect();
        assert_eq!(drawn, (0..46).collect::<Vec<_>>());
    }

    #[test]
    fn oversized_rows_are_split_between_lines() {
        let rows = vec![row(1, true), row(120, false), row(2, false)];
        let steps = plan_rows(&rows, LINE_H, 200.0, TOP, BOTTOM);

        let slices: Vec<(usize, usize)> = steps
            .iter()
            .filter_map(|s| match *s {
                Step::Row { row: 1, from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert!(slices.len() >= 3, "{slices:?}");
        assert_eq!(slices.first().map(|s| s.0), Some(0));
        assert_eq!(slices.last().map(|s| s.1), Some(120));
        assert!(slices.windows(2).all(|w| w[0].1 == w[1].0));
        assert!(replay(&rows, &steps, 200.0).iter().all(|&y| y <= BOTTOM + 1e-3));
        assert!(steps.windows(2).filter(|w| w[0] == Step::Break).all(|w| w[1] == Step::Header(0)));
    }

    #[test]
    fn rows_that_fit_a_fresh_page_move_whole() {
        let rows = vec![row(1, false), row(10, false)];
        let steps = plan_rows(&rows, LINE_H, 240.0, TOP, BOTTOM);
        assert_eq!(
            steps,
            vec![
                Step::Row { row: 0, from: 0, to: 1 },
                Step::Break,
                Step::Row { row: 1, from: 0, to: 10 },
            ]
        );
    }

    #[test]
    fn zebra_counts_body_rows_only() {
        let rows = vec![row(1, true), row(1, false), row(1, false), row(1, true), row(1, false)];
        assert_eq!(body_indices(&rows), vec![None, Some(0), Some(1), None, Some(2)]);
    }
}
