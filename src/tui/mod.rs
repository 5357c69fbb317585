//! Ratatui-based terminal UI.
//!
//! Two blocking, single-shot screens:
//! - a voxel picker showing the first time slice with a movable cursor and the
//!   live time evolution under it (`picker`)
//! - a fit viewer with data vs fitted curve, one panel per hypothesis (`viewer`)

use std::io;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::data::Dataset;
use crate::domain::{TimeBase, Voxel};
use crate::error::AppError;
use crate::interact::{FitView, FitViewer, VoxelPicker};

mod chart;
mod picker;
mod viewer;

pub use chart::{ChartData, SignalChart};
pub use picker::{PickerAction, PickerState};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Interactive voxel picker.
#[derive(Debug, Default)]
pub struct TuiPicker;

impl VoxelPicker for TuiPicker {
    fn pick(&mut self, dataset: &Dataset, times: &TimeBase) -> Result<Voxel, AppError> {
        let _guard = TerminalGuard::new(true)?;
        let mut terminal = open_terminal()?;
        picker::run(&mut terminal, dataset, times)
    }
}

/// Interactive fit viewer.
#[derive(Debug, Default)]
pub struct TuiViewer;

impl FitViewer for TuiViewer {
    fn show(&mut self, view: &FitView<'_>) -> Result<(), AppError> {
        let _guard = TerminalGuard::new(false)?;
        let mut terminal = open_terminal()?;
        viewer::run(&mut terminal, view)
    }
}

fn open_terminal() -> Result<Term, AppError> {
    Terminal::new(CrosstermBackend::new(io::stdout()))
        .map_err(|e| AppError::new(2, format!("Failed to initialize terminal: {e}")))
}

/// Ensures the terminal is restored (raw mode, alternate screen, mouse) on exit.
struct TerminalGuard {
    mouse: bool,
}

impl TerminalGuard {
    fn new(mouse: bool) -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(2, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(2, format!("Failed to enter alternate screen: {e}")));
        }
        if mouse {
            // Keyboard picking still works without it.
            let _ = execute!(io::stdout(), EnableMouseCapture);
        }
        Ok(Self { mouse })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.mouse {
            let _ = execute!(io::stdout(), DisableMouseCapture);
        }
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

fn draw_err(e: io::Error) -> AppError {
    AppError::new(2, format!("Terminal draw error: {e}"))
}

fn event_err(e: io::Error) -> AppError {
    AppError::new(2, format!("Terminal event error: {e}"))
}
