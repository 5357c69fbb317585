//! Voxel picker screen.
//!
//! Left: the first time slice as a grayscale image with a cursor.
//! Right: the time series under the cursor, updated as it moves.
//! Enter (or a left click on the image) picks; `q`/Esc cancels.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind};
use ndarray::ArrayView2;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::{Term, chart::ChartData, draw_err, event_err};
use crate::data::Dataset;
use crate::domain::{TimeBase, Voxel};
use crate::error::AppError;

/// Cursor step for the capital-letter keys.
const FAST_STEP: usize = 10;

/// Result of one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Continue,
    Picked(Voxel),
    Cancelled,
}

/// Cursor state, independent of the terminal.
#[derive(Debug, Clone)]
pub struct PickerState {
    rows: usize,
    cols: usize,
    pub cursor: Voxel,
}

impl PickerState {
    /// Starts at the image centre.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cursor: Voxel::new(rows / 2, cols / 2),
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> PickerAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return PickerAction::Cancelled,
            KeyCode::Enter | KeyCode::Char(' ') => return PickerAction::Picked(self.cursor),
            KeyCode::Up | KeyCode::Char('k') => self.move_by(-1, 0),
            KeyCode::Down | KeyCode::Char('j') => self.move_by(1, 0),
            KeyCode::Left | KeyCode::Char('h') => self.move_by(0, -1),
            KeyCode::Right | KeyCode::Char('l') => self.move_by(0, 1),
            KeyCode::Char('K') | KeyCode::PageUp => self.move_by(-(FAST_STEP as isize), 0),
            KeyCode::Char('J') | KeyCode::PageDown => self.move_by(FAST_STEP as isize, 0),
            KeyCode::Char('H') => self.move_by(0, -(FAST_STEP as isize)),
            KeyCode::Char('L') => self.move_by(0, FAST_STEP as isize),
            _ => {}
        }
        PickerAction::Continue
    }

    fn move_by(&mut self, d_row: isize, d_col: isize) {
        self.cursor.row = self.cursor.row.saturating_add_signed(d_row).min(self.rows - 1);
        self.cursor.col = self.cursor.col.saturating_add_signed(d_col).min(self.cols - 1);
    }
}

/// Map a terminal cell inside `image` to a voxel.
pub fn cell_to_voxel(image: Rect, rows: usize, cols: usize, x: u16, y: u16) -> Option<Voxel> {
    if !(x >= image.x && x < image.x + image.width && y >= image.y && y < image.y + image.height) {
        return None;
    }
    let row = (y - image.y) as usize * rows / image.height as usize;
    let col = (x - image.x) as usize * cols / image.width as usize;
    Some(Voxel::new(row.min(rows - 1), col.min(cols - 1)))
}

fn voxel_to_cell(image: Rect, rows: usize, cols: usize, v: Voxel) -> (u16, u16) {
    let x = image.x + (v.col * image.width as usize / cols) as u16;
    let y = image.y + (v.row * image.height as usize / rows) as u16;
    (x, y)
}

/// Largest rect inside `area` that keeps the image aspect (cells are ~2:1).
fn image_rect(area: Rect, rows: usize, cols: usize) -> Rect {
    let want_w = (cols * 2).max(1) as f64;
    let want_h = rows.max(1) as f64;
    let scale = (area.width as f64 / want_w).min(area.height as f64 / want_h);
    let width = ((want_w * scale).floor() as u16).clamp(1, area.width.max(1));
    let height = ((want_h * scale).floor() as u16).clamp(1, area.height.max(1));
    Rect {
        x: area.x,
        y: area.y,
        width,
        height,
    }
}

/// Grayscale rendering of one time slice.
struct SliceImage<'a> {
    slice: ArrayView2<'a, f64>,
    cursor: Voxel,
}

impl Widget for SliceImage<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (rows, cols) = self.slice.dim();
        if rows == 0 || cols == 0 || area.width == 0 || area.height == 0 {
            return;
        }
        let (lo, hi) = self
            .slice
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = if hi > lo { hi - lo } else { 1.0 };

        for dy in 0..area.height {
            for dx in 0..area.width {
                let r = dy as usize * rows / area.height as usize;
                let c = dx as usize * cols / area.width as usize;
                let v = self.slice[[r, c]];
                let g = if v.is_finite() {
                    (((v - lo) / span).clamp(0.0, 1.0) * 255.0).round() as u8
                } else {
                    0
                };
                if let Some(cell) = buf.cell_mut((area.x + dx, area.y + dy)) {
                    cell.set_char(' ').set_bg(Color::Rgb(g, g, g));
                }
            }
        }

        let (x, y) = voxel_to_cell(area, rows, cols, self.cursor);
        if let Some(cell) = buf.cell_mut((x, y)) {
            cell.set_char('+').set_fg(Color::Red).set_bg(Color::Black);
        }
    }
}

pub(super) fn run(terminal: &mut Term, dataset: &Dataset, times: &TimeBase) -> Result<Voxel, AppError> {
    let (rows, cols, _) = dataset.shape();
    let slice = dataset.first_slice();
    let mut state = PickerState::new(rows, cols);
    let mut image_area = Rect::default();

    loop {
        let series = dataset.series(state.cursor)?;
        let data = ChartData::new(times, &series, None);
        terminal
            .draw(|frame| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(3)])
                    .split(frame.area());
                let body = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(chunks[0]);

                let block = Block::default()
                    .title(format!("First time slice ({rows}x{cols})"))
                    .borders(Borders::ALL);
                let inner = block.inner(body[0]);
                frame.render_widget(block, body[0]);
                image_area = image_rect(inner, rows, cols);
                frame.render_widget(
                    SliceImage {
                        slice: slice.view(),
                        cursor: state.cursor,
                    },
                    image_area,
                );

                let block = Block::default().title("Time evolution").borders(Borders::ALL);
                let inner = block.inner(body[1]);
                frame.render_widget(block, body[1]);
                frame.render_widget(data.widget("t (ms)", "signal", None), inner);

                let help = "arrows/hjkl move  HJKL x10  Enter/click pick  q cancel";
                let line = Line::from(vec![
                    Span::styled(help, Style::default().fg(Color::Gray)),
                    Span::raw(" | "),
                    Span::styled(
                        format!(
                            "voxel {} value {:.2}",
                            state.cursor,
                            slice[[state.cursor.row, state.cursor.col]]
                        ),
                        Style::default().fg(Color::Yellow),
                    ),
                ]);
                frame.render_widget(
                    Paragraph::new(line).block(Block::default().borders(Borders::ALL)),
                    chunks[1],
                );
            })
            .map_err(draw_err)?;

        if !event::poll(Duration::from_millis(100)).map_err(event_err)? {
            continue;
        }

        let action = match event::read().map_err(event_err)? {
            Event::Key(key) if key.kind == KeyEventKind::Press => state.handle_key(key.code),
            Event::Mouse(m) => match m.kind {
                MouseEventKind::Down(MouseButton::Left) => {
                    match cell_to_voxel(image_area, rows, cols, m.column, m.row) {
                        Some(v) => PickerAction::Picked(v),
                        None => PickerAction::Continue,
                    }
                }
                _ => PickerAction::Continue,
            },
            _ => PickerAction::Continue,
        };

        match action {
            PickerAction::Continue => {}
            PickerAction::Picked(v) => {
                tracing::debug!(voxel = %v, "voxel picked");
                return Ok(v);
            }
            PickerAction::Cancelled => return Err(AppError::new(2, "Point selection canceled.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn cursor_moves_and_clamps() {
        let mut s = PickerState::new(5, 8);
        assert_eq!(s.cursor, Voxel::new(2, 4));
        s.handle_key(KeyCode::Up);
        s.handle_key(KeyCode::Char('h'));
        assert_eq!(s.cursor, Voxel::new(1, 3));
        s.handle_key(KeyCode::Char('J'));
        s.handle_key(KeyCode::Char('L'));
        assert_eq!(s.cursor, Voxel::new(4, 7));
        s.handle_key(KeyCode::PageUp);
        assert_eq!(s.cursor.row, 0);
    }

    #[test]
    fn enter_picks_and_q_cancels() {
        let mut s = PickerState::new(3, 3);
        assert_eq!(s.handle_key(KeyCode::Enter), PickerAction::Picked(Voxel::new(1, 1)));
        assert_eq!(s.handle_key(KeyCode::Char('q')), PickerAction::Cancelled);
        assert_eq!(s.handle_key(KeyCode::Esc), PickerAction::Cancelled);
        assert_eq!(s.handle_key(KeyCode::Tab), PickerAction::Continue);
    }

    #[test]
    fn clicks_map_to_voxels() {
        let image = Rect::new(10, 5, 20, 10);
        assert_eq!(cell_to_voxel(image, 10, 10, 10, 5), Some(Voxel::new(0, 0)));
        assert_eq!(cell_to_voxel(image, 10, 10, 29, 14), Some(Voxel::new(9, 9)));
        assert_eq!(cell_to_voxel(image, 10, 10, 9, 5), None);
        assert_eq!(cell_to_voxel(image, 10, 10, 30, 5), None);
    }

    #[test]
    fn image_keeps_cell_aspect() {
        let r = image_rect(Rect::new(0, 0, 100, 20), 10, 10);
        assert_eq!((r.width, r.height), (40, 20));
    }

    #[test]
    fn slice_image_marks_cursor() {
        let img = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f64);
        let area = Rect::new(0, 0, 8, 4);
        let mut buf = Buffer::empty(area);
        SliceImage {
            slice: img.view(),
            cursor: Voxel::new(2, 1),
        }
        .render(area, &mut buf);
        assert_eq!(buf[(2, 2)].symbol(), "+");
        assert_eq!(buf[(0, 0)].bg, Color::Rgb(0, 0, 0));
        assert_eq!(buf[(7, 3)].bg, Color::Rgb(255, 255, 255));
    }
}
