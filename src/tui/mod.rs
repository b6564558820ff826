mod help;
pub mod render;
pub mod state;

use crate::model::{KeyInput, WatchConfig};
use crate::orchestrator::{self, UiCommand, UiUpdate};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use render::{draw, Theme};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::warn;

pub async fn run(cfg: WatchConfig) -> Result<()> {
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiUpdate>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(ui_rx, cmd_tx));

    // Dropping the sender on error disconnects the UI thread.
    let res = orchestrator::run_controller(&cfg, ui_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    mut ui_rx: UnboundedReceiver<UiUpdate>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let theme = Theme::default();
    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = 'ui: loop {
        loop {
            match ui_rx.try_recv() {
                Ok(UiUpdate::State(snapshot)) => state.snapshot = Some(*snapshot),
                Ok(UiUpdate::Shutdown) | Err(TryRecvError::Disconnected) => break 'ui Ok(()),
                Err(TryRecvError::Empty) => break,
            }
        }

        if last_tick.elapsed() >= tick_rate {
            state.advance_spinner();
            terminal.draw(|f| draw(f, &state, &theme)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        match event::poll(Duration::from_millis(10)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(k)) => {
                    if let Some(key) = map_key(k) {
                        if cmd_tx.send(UiCommand::Key(key)).is_err() {
                            break Ok(());
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "terminal input failed");
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Err(e).context("read terminal event");
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "terminal poll failed");
                let _ = cmd_tx.send(UiCommand::Quit);
                break Err(e).context("poll terminal");
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Translate a terminal key press into supervisor input. Releases and
/// repeats are ignored.
pub fn map_key(k: KeyEvent) -> Option<KeyInput> {
    if k.kind != KeyEventKind::Press {
        return None;
    }
    let key = match (k.modifiers, k.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => KeyInput::Interrupt,
        (m, KeyCode::Char(c)) if !m.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            KeyInput::Char(c)
        }
        (_, KeyCode::Enter) => KeyInput::Enter,
        (_, KeyCode::Esc) => KeyInput::Esc,
        (_, KeyCode::Backspace) => KeyInput::Backspace,
        (_, KeyCode::Delete) => KeyInput::Delete,
        (_, KeyCode::Left) => KeyInput::Left,
        (_, KeyCode::Right) => KeyInput::Right,
        (_, KeyCode::Home) => KeyInput::Home,
        (_, KeyCode::End) => KeyInput::End,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn ctrl_c_is_an_interrupt() {
        assert_eq!(
            map_key(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyInput::Interrupt)
        );
    }

    #[test]
    fn plain_and_shifted_characters_pass_through() {
        assert_eq!(
            map_key(press(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(KeyInput::Char('q'))
        );
        assert_eq!(
            map_key(press(KeyCode::Char('{'), KeyModifiers::SHIFT)),
            Some(KeyInput::Char('{'))
        );
        assert_eq!(
            map_key(press(KeyCode::Char(' '), KeyModifiers::NONE)),
            Some(KeyInput::Char(' '))
        );
    }

    #[test]
    fn editing_keys_are_mapped() {
        assert_eq!(map_key(press(KeyCode::Enter, KeyModifiers::NONE)), Some(KeyInput::Enter));
        assert_eq!(map_key(press(KeyCode::Esc, KeyModifiers::NONE)), Some(KeyInput::Esc));
        assert_eq!(
            map_key(press(KeyCode::Backspace, KeyModifiers::NONE)),
            Some(KeyInput::Backspace)
        );
        assert_eq!(map_key(press(KeyCode::Home, KeyModifiers::NONE)), Some(KeyInput::Home));
    }

    #[test]
    fn releases_and_control_chords_are_dropped() {
        let release = KeyEvent::new_with_kind_and_state(
            KeyCode::Char('q'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
            KeyEventState::NONE,
        );
        assert_eq!(map_key(release), None);
        assert_eq!(map_key(press(KeyCode::Char('x'), KeyModifiers::CONTROL)), None);
        assert_eq!(map_key(press(KeyCode::F(1), KeyModifiers::NONE)), None);
    }
}
