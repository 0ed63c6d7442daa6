//! Review session state, independent of the terminal.
//!
//! The session owns the `FitChain` and turns operator actions into chain
//! calls. Recoverable failures only update the status line; anything else
//! ends the session.

use crate::domain::{FitParams, PairLabel};
use crate::error::CalibError;
use crate::fit::{FitChain, PairFit};
use crate::report::format_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NextPair,
    PrevPair,
    /// Focus pair by 0-based index.
    FocusPair(usize),
    CursorLeft,
    CursorRight,
    Toggle,
    Zoom,
    ErrorBars,
    Finish,
    Quit,
}

pub struct ReviewSession {
    chain: FitChain,
    focus: usize,
    /// Point indexes of each pair sorted by color, for cursor movement.
    order: Vec<Vec<usize>>,
    /// Cursor position within `order[pair]`.
    cursor: Vec<usize>,
    zoom: bool,
    show_errors: bool,
    status: String,
}

/// Everything the chart widget needs for the focused pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kept: Vec<(f64, f64)>,
    pub rejected: Vec<(f64, f64)>,
    pub cursor: Option<(f64, f64)>,
    pub line: Vec<(f64, f64)>,
    /// `(x, y, err_x, err_y)` per point when error bars are on.
    pub error_bars: Vec<(f64, f64, f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub frozen: bool,
}

impl ReviewSession {
    pub fn new(chain: FitChain, show_errors: bool) -> Self {
        let order: Vec<Vec<usize>> = chain
            .pairs()
            .iter()
            .map(|p| {
                let x = p.points().x();
                let mut idx: Vec<usize> = (0..x.len()).collect();
                idx.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
                idx
            })
            .collect();
        let cursor = vec![0; order.len()];
        Self {
            chain,
            focus: 0,
            order,
            cursor,
            zoom: false,
            show_errors,
            status: "Space toggles a point, Enter freezes the equation.".to_string(),
        }
    }

    pub fn chain(&self) -> &FitChain {
        &self.chain
    }

    pub fn into_chain(self) -> FitChain {
        self.chain
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_errors(&self) -> bool {
        self.show_errors
    }

    pub fn focused(&self) -> &PairFit {
        &self.chain.pairs()[self.focus]
    }

    /// Point index (into the focused pair's point set) under the cursor.
    pub fn cursor_point(&self) -> Option<usize> {
        self.order[self.focus].get(self.cursor[self.focus]).copied()
    }

    /// Apply one operator action. Returns `true` when the session is over.
    pub fn apply(&mut self, action: Action) -> Result<bool, CalibError> {
        let len = self.chain.len();
        match action {
            Action::NextPair => self.focus = (self.focus + 1) % len,
            Action::PrevPair => self.focus = (self.focus + len - 1) % len,
            Action::FocusPair(i) if i < len => self.focus = i,
            Action::FocusPair(i) => self.status = format!("There is no Equation[{}].", i + 1),
            Action::CursorLeft => {
                let c = &mut self.cursor[self.focus];
                *c = c.saturating_sub(1);
            }
            Action::CursorRight => {
                let last = self.order[self.focus].len().saturating_sub(1);
                let c = &mut self.cursor[self.focus];
                *c = (*c + 1).min(last);
            }
            Action::Toggle => self.toggle()?,
            Action::Zoom => {
                self.zoom = !self.zoom;
                self.status = if self.zoom { "Zoomed to kept points." } else { "Zoom reset." }.to_string();
            }
            Action::ErrorBars => self.show_errors = !self.show_errors,
            Action::Finish => self.finish()?,
            Action::Quit => {
                self.chain.finish_all();
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Show a recoverable error on the status line, pass anything else up.
    fn report(&mut self, err: CalibError) -> Result<(), CalibError> {
        if !err.is_recoverable() {
            return Err(err);
        }
        self.status = err.to_string();
        Ok(())
    }

    fn toggle(&mut self) -> Result<(), CalibError> {
        let Some(point) = self.cursor_point() else {
            self.status = "No points in this equation.".to_string();
            return Ok(());
        };
        match self.chain.toggle_point(self.focus, point) {
            Ok(state) => {
                let kept = state.mask[point];
                self.status = format!(
                    "Point {} {}: A={:.4} B={:.4} N={} RMS={:.4}",
                    point + 1,
                    if kept { "restored" } else { "rejected" },
                    state.params.a,
                    state.params.b,
                    state.n,
                    state.rms
                );
                Ok(())
            }
            Err(err) => self.report(err),
        }
    }

    fn finish(&mut self) -> Result<(), CalibError> {
        match self.chain.finish(self.focus) {
            Ok(result) => {
                self.status = format!("{} frozen: {}", result.label, format_line(&result));
                if let Some(next) = self.next_unfrozen() {
                    self.focus = next;
                } else {
                    self.status.push_str(". All equations frozen, press q to write the output.");
                }
                Ok(())
            }
            Err(err) => self.report(err),
        }
    }

    fn next_unfrozen(&self) -> Option<usize> {
        let len = self.chain.len();
        (1..=len)
            .map(|k| (self.focus + k) % len)
            .find(|&i| !self.chain.pairs()[i].is_frozen())
    }

    /// Series and bounds for the focused pair.
    pub fn chart_view(&self) -> ChartView {
        let pair = self.focused();
        let points = pair.points();
        let state = pair.state();
        let (x, y) = (points.x(), points.y());

        let mut kept = Vec::new();
        let mut rejected = Vec::new();
        for i in 0..points.len() {
            if state.mask[i] {
                kept.push((x[i], y[i]));
            } else {
                rejected.push((x[i], y[i]));
            }
        }

        let all: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        let framed = if self.zoom && !kept.is_empty() { &kept } else { &all };
        let x_bounds = padded_bounds(framed.iter().map(|p| p.0));
        let y_bounds = padded_bounds(framed.iter().map(|p| p.1));

        let error_bars = if self.show_errors {
            (0..points.len())
                .map(|i| (x[i], y[i], points.err_x()[i], points.err_y()[i]))
                .collect()
        } else {
            Vec::new()
        };

        ChartView {
            title: title(points.label(), state.params, state.rms, state.n, pair.is_frozen()),
            x_label: points.label().x_label.clone(),
            y_label: points.label().y_label.clone(),
            kept,
            rejected,
            cursor: self.cursor_point().map(|i| (x[i], y[i])),
            line: x_bounds.iter().map(|&xv| (xv, state.params.predict(xv))).collect(),
            error_bars,
            x_bounds,
            y_bounds,
            frozen: pair.is_frozen(),
        }
    }
}

fn title(label: &PairLabel, p: FitParams, rms: f64, n: usize, frozen: bool) -> String {
    let sign = if p.b < 0.0 { '-' } else { '+' };
    let status = if frozen { " [frozen]" } else { "" };
    format!(
        "{label}  y = {:.4} x {sign} {:.4}  RMS = {rms:.4}  N = {n}{status}",
        p.a,
        p.b.abs()
    )
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo).abs() * 0.05).max(1e-3);
    [lo - pad, hi + pad]
}
