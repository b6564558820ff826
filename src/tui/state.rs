use crate::model::Snapshot;

const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// UI-thread state: the latest supervisor snapshot plus cosmetic widget state.
#[derive(Debug, Default)]
pub struct UiState {
    pub snapshot: Option<Snapshot>,
    pub spinner_frame: usize,
}

impl UiState {
    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
    }

    pub fn spinner(&self) -> char {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }
}
