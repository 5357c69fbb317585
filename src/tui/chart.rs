//! Plotters-powered signal chart widget for Ratatui.
//!
//! Why Plotters instead of Ratatui's built-in `Chart` widget?
//! - nicer axis + mesh rendering
//! - less manual work for ticks/labels
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::domain::{FitResult, TimeBase};

/// Samples used to draw a fitted curve.
const CURVE_POINTS: usize = 200;

/// A lightweight, render-only chart description.
///
/// All series and bounds are computed outside the render call (see `ChartData`).
pub struct SignalChart<'a> {
    /// Line series for the fitted curve (may be empty).
    pub curve: &'a [(f64, f64)],
    /// Observed samples.
    pub points: &'a [(f64, f64)],
    /// Sample to highlight (e.g. the minimum of an inversion-recovery series).
    pub marked: Option<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
}

impl Widget for SignalChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.0}"))
                .y_label_formatter(&|v| format!("{v:.0}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let curve_color = RGBColor(0, 255, 255); // cyan
            let marked_color = RGBColor(255, 255, 0); // yellow

            // A zero line helps judge the sign of inversion-recovery samples.
            if y0 < 0.0 && y1 > 0.0 {
                chart.draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], &RGBColor(90, 90, 90)))?;
            }

            if !self.curve.is_empty() {
                chart.draw_series(LineSeries::new(self.curve.iter().copied(), &curve_color))?;
            }

            // `Circle` markers come out far too large through this backend;
            // pixels read well in terminals.
            chart.draw_series(self.points.iter().map(|&(x, y)| Pixel::new((x, y), WHITE)))?;
            if let Some(p) = self.marked {
                chart.draw_series(std::iter::once(Pixel::new(p, marked_color)))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

/// Series and bounds for one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub curve: Vec<(f64, f64)>,
    pub points: Vec<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl ChartData {
    /// Samples over `[0, last time]`, plus the fitted curve when there is one.
    pub fn new(times: &TimeBase, series: &[f64], fit: Option<&FitResult>) -> Self {
        let t0 = 0.0;
        let t1 = times.last();
        let x_bounds = [t0, t1];

        let points: Vec<(f64, f64)> = times
            .as_slice()
            .iter()
            .zip(series)
            .map(|(&t, &y)| (t, y))
            .collect();

        let curve: Vec<(f64, f64)> = fit
            .map(|fit| {
                (0..CURVE_POINTS)
                    .map(|i| {
                        let u = i as f64 / (CURVE_POINTS as f64 - 1.0);
                        let t = t0 + u * (t1 - t0);
                        (t, fit.predict(t))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(_, y) in points.iter().chain(&curve) {
            if y.is_finite() {
                y_min = y_min.min(y);
                y_max = y_max.max(y);
            }
        }
        if !y_min.is_finite() || !y_max.is_finite() {
            (y_min, y_max) = (0.0, 1.0);
        } else if y_max <= y_min {
            y_min = y_min.min(0.0);
            y_max = y_max.max(y_min + 1.0);
        }

        let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);
        Self {
            curve,
            points,
            x_bounds,
            y_bounds: [y_min - pad, y_max + pad],
        }
    }

    pub fn widget<'a>(&'a self, x_label: &'a str, y_label: &'a str, marked: Option<usize>) -> SignalChart<'a> {
        SignalChart {
            curve: &self.curve,
            points: &self.points,
            marked: marked.and_then(|i| self.points.get(i).copied()),
            x_bounds: self.x_bounds,
            y_bounds: self.y_bounds,
            x_label,
            y_label,
        }
    }
}
