//! Pure projection of supervisor state onto a terminal frame.

use super::help::help_line;
use super::state::UiState;
use crate::error::SupervisorError;
use crate::model::{Phase, Snapshot};
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Lines of captured task output shown under a failure.
const OUTPUT_TAIL_LINES: usize = 6;

/// Presentation constants, built once and passed into every draw.
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,
    pub info: Color,
    pub muted: Color,
    pub error: Color,
    pub key: Color,
    pub margin: Margin,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Indexed(205),
            info: Color::Indexed(28),
            muted: Color::Indexed(240),
            error: Color::Indexed(9),
            key: Color::Magenta,
            margin: Margin {
                horizontal: 2,
                vertical: 1,
            },
        }
    }
}

pub fn draw(f: &mut Frame, state: &UiState, theme: &Theme) {
    let area = f.area().inner(theme.margin);
    let Some(snap) = state.snapshot.as_ref() else {
        f.render_widget(Paragraph::new(format!("{} Starting…", state.spinner())), area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    let header = Paragraph::new(status_lines(snap, state.spinner(), theme)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                " Checkpoint Watch ",
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(header, chunks[0]);

    f.render_widget(
        Paragraph::new("Agent Task (press 'e' to edit, 'enter' to submit):"),
        chunks[1],
    );
    draw_editor(f, snap, theme, chunks[2]);
    f.render_widget(Paragraph::new(help_line(theme)), chunks[3]);
    f.render_widget(
        Paragraph::new(footer_lines(snap, theme)).wrap(Wrap { trim: false }),
        chunks[4],
    );
}

/// Checkpoint, loop status and cycle count.
pub fn status_lines(snap: &Snapshot, spinner: char, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(3);

    lines.push(match &snap.checkpoint {
        Some(path) => Line::from(vec![
            Span::raw("Watching Checkpoint: "),
            Span::styled(path.display().to_string(), Style::default().fg(theme.info)),
        ]),
        None => Line::from(vec![
            Span::styled(spinner.to_string(), Style::default().fg(theme.accent)),
            Span::raw(" Searching for checkpoints..."),
        ]),
    });

    let spin = Span::styled(format!("{spinner} "), Style::default().fg(theme.accent));
    lines.push(match snap.phase {
        Phase::Running => Line::from(vec![spin, Span::raw("Running episode... (Press space to pause)")]),
        Phase::Cancelling => Line::from(vec![spin, Span::raw("Stopping…")]),
        Phase::AwaitingArtifact => Line::from(vec![
            spin,
            Span::raw("Looking for the next checkpoint... (Press space to pause)"),
        ]),
        Phase::Idle if snap.looping => Line::from(vec![
            spin,
            Span::raw("Waiting for a checkpoint... (Press space to pause)"),
        ]),
        Phase::Idle | Phase::Paused => Line::from("Paused. (Press space to resume)"),
    });

    if snap.cycles > 0 {
        let when = snap
            .last_cycle_at
            .as_deref()
            .map(|t| format!(", last finished {t}"))
            .unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("Episodes run: {}{when}", snap.cycles),
            Style::default().fg(theme.muted),
        )));
    }

    lines
}

fn draw_editor(f: &mut Frame, snap: &Snapshot, theme: &Theme, area: Rect) {
    let color = if snap.editing { theme.accent } else { theme.muted };
    let width = area.width.saturating_sub(2) as usize;
    let cursor = if snap.editing { snap.editor_cursor } else { 0 };
    let (visible, column) = editor_window(&snap.editor_text, cursor, width);
    let editor = Paragraph::new(visible)
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(editor, area);

    if snap.editing && width > 0 {
        let x = area.x + 1 + column.min(width - 1) as u16;
        f.set_cursor_position(Position::new(x, area.y + 1));
    }
}

/// The part of `text` that fits in `width` columns with the cursor in view,
/// plus the cursor's column inside it. Scrolls right as the cursor moves past
/// the edge.
pub fn editor_window(text: &str, cursor: usize, width: usize) -> (String, usize) {
    if width == 0 {
        return (String::new(), 0);
    }
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    // The cursor may sit one past the last character.
    let offset = cursor.saturating_sub(width - 1);
    let visible = chars.iter().skip(offset).take(width).collect();
    (visible, cursor - offset)
}

/// Info notice and the last error, with the tail of captured output for
/// failed runs.
pub fn footer_lines(snap: &Snapshot, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(info) = &snap.info {
        lines.push(Line::from(Span::styled(
            info.clone(),
            Style::default().fg(theme.info),
        )));
    }
    if let Some(err) = &snap.last_error {
        lines.push(Line::from(Span::styled(
            format!("Error: {err}"),
            Style::default().fg(theme.error),
        )));
        if let SupervisorError::Task(task_err) = err {
            let output = task_err.output();
            let tail: Vec<&str> = output.lines().rev().take(OUTPUT_TAIL_LINES).collect();
            for line in tail.into_iter().rev() {
                lines.push(Line::from(Span::styled(
                    format!("  {line}"),
                    Style::default().fg(theme.muted),
                )));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, TaskError};
    use crate::model::WatchConfig;
    use crate::orchestrator::Supervisor;
    use ratatui::{backend::TestBackend, Terminal};
    use std::path::PathBuf;

    fn render(state: &UiState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(110, 30)).unwrap();
        terminal
            .draw(|f| draw(f, state, &Theme::default()))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn startup_snapshot() -> Snapshot {
        Supervisor::new(&WatchConfig::default()).unwrap().snapshot()
    }

    #[test]
    fn idle_view_shows_searching() {
        let state = UiState {
            snapshot: Some(startup_snapshot()),
            spinner_frame: 0,
        };
        let screen = render(&state);
        assert!(screen.contains("Searching for checkpoints..."));
        assert!(screen.contains("speed_flip"));
        assert!(screen.contains("q: quit | space: pause/resume | e: edit task"));
        assert!(!screen.contains("Error:"));
    }

    #[test]
    fn running_view_shows_checkpoint_and_call_to_action() {
        let mut snap = startup_snapshot();
        snap.phase = Phase::Running;
        snap.checkpoint = Some(PathBuf::from("/runs/exp/checkpoint_000001"));
        let screen = render(&UiState {
            snapshot: Some(snap),
            spinner_frame: 3,
        });
        assert!(screen.contains("Watching Checkpoint: /runs/exp/checkpoint_000001"));
        assert!(screen.contains("Running episode... (Press space to pause)"));
    }

    #[test]
    fn paused_view_invites_resume() {
        let mut snap = startup_snapshot();
        snap.phase = Phase::Paused;
        snap.looping = false;
        snap.checkpoint = Some(PathBuf::from("/runs/exp/checkpoint_000001"));
        let lines = status_lines(&snap, '⠋', &Theme::default());
        assert_eq!(lines[1].to_string(), "Paused. (Press space to resume)");
    }

    #[test]
    fn errors_are_styled_and_show_output_tail() {
        let theme = Theme::default();
        let mut snap = startup_snapshot();
        snap.last_error = Some(SupervisorError::Task(TaskError::NonZeroExit {
            status: "exit status: 1".into(),
            output: "line 1\nTraceback\nValueError: bad".into(),
        }));
        let lines = footer_lines(&snap, &theme);
        assert_eq!(lines[0].to_string(), "Error: script error: exit status: 1");
        assert_eq!(lines[0].spans[0].style.fg, Some(theme.error));
        assert_eq!(lines.last().unwrap().to_string(), "  ValueError: bad");
    }

    #[test]
    fn validation_error_is_rendered() {
        let mut snap = startup_snapshot();
        snap.editing = true;
        snap.editor_text = r#"{"speed_flip": }"#.into();
        snap.last_error = Some(ConfigError::InvalidJson("expected value".into()).into());
        let screen = render(&UiState {
            snapshot: Some(snap),
            spinner_frame: 0,
        });
        assert!(screen.contains("Error: invalid JSON format for task"));
        assert!(screen.contains(r#"{"speed_flip": }"#));
    }

    #[test]
    fn editor_scrolls_to_keep_cursor_visible() {
        let text: String = ('a'..='z').collect();
        assert_eq!(editor_window(&text, 3, 10), ("abcdefghij".to_string(), 3));
        // Cursor at the end: the tail is shown and one column is left for it.
        assert_eq!(editor_window(&text, 26, 10), ("rstuvwxyz".to_string(), 9));
        assert_eq!(editor_window(&text, 15, 10), ("ghijklmnop".to_string(), 9));
        assert_eq!(editor_window(&text, 5, 0), (String::new(), 0));
    }

    #[test]
    fn long_task_text_shows_its_end_while_typing() {
        let mut snap = startup_snapshot();
        snap.editing = true;
        snap.editor_text = format!("{{\"speed_flip\": 10, \"pad\": \"{}\", \"zz_last\": 1}}", "x".repeat(150));
        snap.editor_cursor = snap.editor_text.chars().count();
        let screen = render(&UiState {
            snapshot: Some(snap),
            spinner_frame: 0,
        });
        assert!(screen.contains("\"zz_last\": 1}"));
        assert!(!screen.contains("speed_flip\": 10, \"pad"));
    }
}
