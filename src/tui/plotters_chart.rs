//! Plotters-powered equation chart widget for Ratatui.
//!
//! Why Plotters instead of Ratatui's built-in `Chart` widget?
//! - nicer axis + mesh rendering
//! - less manual work for ticks/labels
//! - the same drawing calls as the SVG figures
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

use crate::tui::session::ChartView;

/// Render-only chart of one equation. All series are prepared by the session.
pub struct FitPlottersChart<'a> {
    pub view: &'a ChartView,
}

impl<'a> Widget for FitPlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        // In that case, we render a small hint rather than panicking.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let view = self.view;
        let [x0, x1] = view.x_bounds;
        let [y0, y1] = view.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 8)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(view.x_label.as_str())
                .y_desc(view.y_label.as_str())
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.2}"))
                .y_label_formatter(&|v| format!("{v:.3}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let line_color = if view.frozen { RGBColor(128, 128, 128) } else { RGBColor(0, 255, 255) };
            let error_color = RGBColor(90, 90, 90);
            let rejected_color = RGBColor(255, 0, 0);
            let cursor_color = RGBColor(255, 255, 0);

            for &(x, y, ex, ey) in &view.error_bars {
                chart.draw_series(std::iter::once(PathElement::new(vec![(x - ex, y), (x + ex, y)], &error_color)))?;
                chart.draw_series(std::iter::once(PathElement::new(vec![(x, y - ey), (x, y + ey)], &error_color)))?;
            }

            chart.draw_series(LineSeries::new(view.line.iter().copied(), &line_color))?;

            // `Pixel` rather than `Circle`: the ratatui backend maps circle
            // radii to canvas units and draws huge circles.
            chart.draw_series(view.kept.iter().map(|&(x, y)| Pixel::new((x, y), WHITE)))?;
            chart.draw_series(view.rejected.iter().map(|&(x, y)| Pixel::new((x, y), rejected_color)))?;
            if let Some((x, y)) = view.cursor {
                let dx = (x1 - x0) * 0.01;
                let dy = (y1 - y0) * 0.02;
                chart.draw_series(std::iter::once(PathElement::new(vec![(x - dx, y), (x + dx, y)], &cursor_color)))?;
                chart.draw_series(std::iter::once(PathElement::new(vec![(x, y - dy), (x, y + dy)], &cursor_color)))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
