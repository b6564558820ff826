use super::render::Theme;
use ratatui::{
    style::Style,
    text::{Line, Span},
};

const KEYBINDS: &[(&str, &str)] = &[
    ("q", "quit"),
    ("space", "pause/resume"),
    ("e", "edit task"),
    ("enter", "submit"),
    ("esc", "cancel edit"),
];

/// Static one-line keybind summary.
pub fn help_line(theme: &Theme) -> Line<'static> {
    let mut spans = Vec::with_capacity(KEYBINDS.len() * 3);
    for (i, (key, action)) in KEYBINDS.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", Style::default().fg(theme.muted)));
        }
        spans.push(Span::styled(*key, Style::default().fg(theme.key)));
        spans.push(Span::styled(format!(": {action}"), Style::default().fg(theme.muted)));
    }
    Line::from(spans)
}
