//! Fit viewer screen: data vs fitted curve, one panel per fit.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use super::{Term, chart::ChartData, draw_err, event_err};
use crate::domain::{FitResult, TimeBase};
use crate::error::AppError;
use crate::interact::FitView;
use crate::report::format_param_error_line;

/// One chart panel.
struct Panel {
    title: String,
    data: ChartData,
    /// Sample to highlight.
    marked: Option<usize>,
    lines: Vec<String>,
}

fn panels(view: &FitView<'_>) -> Vec<Panel> {
    match *view {
        FitView::Single {
            voxel,
            times,
            series,
            fit,
        } => vec![Panel {
            title: format!("{} at {voxel}", fit.model.display_name()),
            data: ChartData::new(times, series, Some(fit)),
            marked: None,
            lines: fit_lines(fit),
        }],
        FitView::Ambiguous { voxel, times, fit } => fit
            .hypotheses()
            .iter()
            .map(|h| {
                let (result, lines) = match &h.outcome {
                    Ok(r) => (Some(r), fit_lines(r)),
                    Err(err) => (None, vec![format!("fit failed: {err}")]),
                };
                Panel {
                    title: format!("Hypothesis {} at {voxel}", h.hypothesis.label()),
                    data: ChartData::new(times, &h.signed, result),
                    marked: Some(fit.min_index),
                    lines,
                }
            })
            .collect(),
    }
}

fn fit_lines(fit: &FitResult) -> Vec<String> {
    let mut lines: Vec<String> = fit
        .model
        .param_names()
        .iter()
        .zip(&fit.params)
        .zip(&fit.std_errors)
        .map(|((name, v), e)| format!("{name} = {v:.4} ± {e:.4}"))
        .collect();
    lines.push(format_param_error_line(fit));
    lines.push(format!("RMSE {:.4}", fit.quality.rmse));
    lines
}

pub(super) fn run(terminal: &mut Term, view: &FitView<'_>) -> Result<(), AppError> {
    let panels = panels(view);
    let times: &TimeBase = match *view {
        FitView::Single { times, .. } | FitView::Ambiguous { times, .. } => times,
    };
    let footer = match view {
        FitView::Ambiguous { .. } => "q/Enter close | yellow: minimum magnitude sample; both hypotheses shown, neither preferred",
        FitView::Single { .. } => "q/Enter close",
    };
    tracing::debug!(panels = panels.len(), samples = times.len(), "showing fit viewer");

    loop {
        terminal
            .draw(|frame| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(3)])
                    .split(frame.area());
                let columns = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints(vec![Constraint::Ratio(1, panels.len() as u32); panels.len()])
                    .split(chunks[0]);

                for (panel, area) in panels.iter().zip(columns.iter()) {
                    draw_panel(frame, panel, *area);
                }

                let footer = Paragraph::new(Line::from(Span::styled(footer, Style::default().fg(Color::Gray))))
                    .block(Block::default().borders(Borders::ALL));
                frame.render_widget(footer, chunks[1]);
            })
            .map_err(draw_err)?;

        if !event::poll(Duration::from_millis(100)).map_err(event_err)? {
            continue;
        }
        if let Event::Key(key) = event::read().map_err(event_err)? {
            if key.kind == KeyEventKind::Press
                && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter)
            {
                return Ok(());
            }
        }
    }
}

fn draw_panel(frame: &mut ratatui::Frame<'_>, panel: &Panel, area: Rect) {
    let block = Block::default().title(panel.title.as_str()).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text_height = panel.lines.len() as u16;
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(text_height)])
        .split(inner);

    frame.render_widget(panel.data.widget("t (ms)", "signal", panel.marked), parts[0]);

    let text = Text::from(panel.lines.iter().map(|l| Line::from(l.as_str())).collect::<Vec<_>>());
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), parts[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Guess, ModelKind, Relaxation, Voxel};
    use crate::fit::{fit_inversion_recovery, fit_model};
    use crate::math::LmOptions;
    use crate::models::predict;

    #[test]
    fn ambiguous_view_has_a_panel_per_hypothesis() {
        let ti = Relaxation::T1.default_times();
        let mag: Vec<f64> = ti
            .as_slice()
            .iter()
            .map(|&t| predict(ModelKind::T1Ir, t, &[100.0, 1000.0]).abs())
            .collect();
        let fit = fit_inversion_recovery(
            ModelKind::T1Ir,
            &ti,
            &mag,
            &Guess::Fixed(vec![100.0, 1000.0]),
            &LmOptions::default(),
        )
        .unwrap();
        let ps = panels(&FitView::Ambiguous {
            voxel: Voxel::new(0, 0),
            times: &ti,
            fit: &fit,
        });
        assert_eq!(ps.len(), 2);
        assert!(ps[0].title.starts_with("Hypothesis A"));
        assert_eq!(ps[1].marked, Some(3));
        assert!(ps[1].lines.iter().any(|l| l.starts_with("T1: ")));
    }

    #[test]
    fn single_view_draws_the_curve() {
        let te = Relaxation::T2.default_times();
        let y: Vec<f64> = te
            .as_slice()
            .iter()
            .map(|&t| predict(ModelKind::T2Exp, t, &[100.0, 100.0]))
            .collect();
        let fit = fit_model(ModelKind::T2Exp, &te, &y, &[100.0, 100.0], &LmOptions::default()).unwrap();
        let ps = panels(&FitView::Single {
            voxel: Voxel::new(0, 0),
            times: &te,
            series: &y,
            fit: &fit,
        });
        assert_eq!(ps.len(), 1);
        assert!(!ps[0].data.curve.is_empty());
        assert_eq!(ps[0].lines.len(), 4);
    }
}
