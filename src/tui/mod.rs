//! Ratatui-based interactive review.
//!
//! The TUI shows one equation at a time: kept and rejected points, the
//! current line and its statistics. The operator toggles points, freezes
//! equations, and leaves with every equation frozen.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use tracing::info;

use crate::error::AppError;
use crate::fit::FitChain;

mod plotters_chart;
pub mod session;

use plotters_chart::FitPlottersChart;
pub use session::{Action, ChartView, ReviewSession};

/// Run a review session over `chain`; returns it with every pair frozen.
pub fn run(chain: FitChain, show_errors: bool, source: &str) -> Result<FitChain, AppError> {
    let mut session = ReviewSession::new(chain, show_errors);
    {
        let _guard = TerminalGuard::new()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)
            .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;
        event_loop(&mut session, &mut terminal, source)?;
    }
    info!(equations = session.chain().len(), "review finished");
    Ok(session.into_chain())
}

/// Restores the terminal (raw mode, alternate screen, console logging) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        crate::logging::mute_console(true);
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        crate::logging::mute_console(false);
    }
}

fn event_loop<B: ratatui::backend::Backend>(
    session: &mut ReviewSession,
    terminal: &mut Terminal<B>,
    source: &str,
) -> Result<(), AppError> {
    let mut needs_redraw = true;
    loop {
        if needs_redraw {
            terminal
                .draw(|f| draw(f, session, source))
                .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
            needs_redraw = false;
        }

        if !event::poll(Duration::from_millis(100)).map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
            continue;
        }

        match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let Some(action) = key_action(key.code, key.modifiers) else {
                    continue;
                };
                if session.apply(action)? {
                    break;
                }
                needs_redraw = true;
            }
            Event::Resize(_, _) => needs_redraw = true,
            _ => {}
        }
    }
    Ok(())
}

/// Map a key press to a session action.
pub fn key_action(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    let action = match code {
        KeyCode::Tab if modifiers.contains(KeyModifiers::SHIFT) => Action::PrevPair,
        KeyCode::Tab => Action::NextPair,
        KeyCode::BackTab => Action::PrevPair,
        KeyCode::Char(c @ '1'..='9') => Action::FocusPair(c as usize - '1' as usize),
        KeyCode::Left => Action::CursorLeft,
        KeyCode::Right => Action::CursorRight,
        KeyCode::Char(' ') => Action::Toggle,
        KeyCode::Char('z') => Action::Zoom,
        KeyCode::Char('e') => Action::ErrorBars,
        KeyCode::Enter => Action::Finish,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}

fn draw(frame: &mut ratatui::Frame<'_>, session: &ReviewSession, source: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
        .split(frame.area());

    draw_header(frame, chunks[0], session, source);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(34)])
        .split(chunks[1]);
    draw_chart(frame, body[0], session);
    draw_equations(frame, body[1], session);
    draw_footer(frame, chunks[2], session);
}

fn draw_header(frame: &mut ratatui::Frame<'_>, area: Rect, session: &ReviewSession, source: &str) {
    let mut tabs = vec![
        Span::styled("stdphot", Style::default().fg(Color::Cyan)),
        Span::raw(format!(" {source}  ")),
    ];
    for (i, pair) in session.chain().pairs().iter().enumerate() {
        let mut style = Style::default().fg(if pair.is_frozen() { Color::DarkGray } else { Color::White });
        if i == session.focus() {
            style = style.add_modifier(Modifier::REVERSED);
        }
        let mark = if pair.is_frozen() { "*" } else { "" };
        tabs.push(Span::styled(format!(" {}{mark} ", i + 1), style));
    }

    let view = session.chart_view();
    let lines = vec![
        Line::from(tabs),
        Line::from(Span::styled(view.title, Style::default().fg(Color::Gray))),
    ];
    let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(p, area);
}

fn draw_chart(frame: &mut ratatui::Frame<'_>, area: Rect, session: &ReviewSession) {
    let title = session.focused().points().label().to_string();
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Clear, inner);

    let view = session.chart_view();
    frame.render_widget(FitPlottersChart { view: &view }, inner);
}

fn draw_equations(frame: &mut ratatui::Frame<'_>, area: Rect, session: &ReviewSession) {
    let items: Vec<ListItem> = session
        .chain()
        .pairs()
        .iter()
        .map(|pair| {
            let s = pair.state();
            let style = if pair.is_frozen() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(Span::styled(pair.points().label().y_label.clone(), style)),
                Line::from(Span::styled(
                    format!(
                        "  A={:7.4} B={:7.4}  N={}/{}  RMS={:.4}",
                        s.params.a,
                        s.params.b,
                        s.n,
                        s.mask.len(),
                        s.rms
                    ),
                    style,
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().title("Equations").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD))
        .highlight_symbol("» ");

    let mut state = ratatui::widgets::ListState::default();
    state.select(Some(session.focus()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_footer(frame: &mut ratatui::Frame<'_>, area: Rect, session: &ReviewSession) {
    let errors = if session.show_errors() { "on" } else { "off" };
    let help = format!("Tab/1-9 equation  ←/→ point  Space toggle  z zoom  e errors({errors})  Enter freeze  q done");
    let line = Line::from(vec![
        Span::styled(help, Style::default().fg(Color::Gray)),
        Span::raw(" | "),
        Span::styled(session.status(), Style::default().fg(Color::Yellow)),
    ]);
    let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions() {
        let none = KeyModifiers::NONE;
        assert_eq!(key_action(KeyCode::Char('3'), none), Some(Action::FocusPair(2)));
        assert_eq!(key_action(KeyCode::Tab, KeyModifiers::SHIFT), Some(Action::PrevPair));
        assert_eq!(key_action(KeyCode::BackTab, KeyModifiers::SHIFT), Some(Action::PrevPair));
        assert_eq!(key_action(KeyCode::Char(' '), none), Some(Action::Toggle));
        assert_eq!(key_action(KeyCode::Enter, none), Some(Action::Finish));
        assert_eq!(key_action(KeyCode::Char('x'), none), None);
    }
}
