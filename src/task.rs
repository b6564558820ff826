//! Task configuration: the JSON weights handed to the evaluation script.

use crate::error::ConfigError;
use serde_json::{Map, Value};

/// An accepted task configuration. Only well-formed JSON objects get here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    text: String,
    weights: Map<String, Value>,
}

impl TaskConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let weights = serde_json::from_str::<Map<String, Value>>(text)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;
        Ok(Self {
            text: text.to_string(),
            weights,
        })
    }

    /// The text exactly as accepted; this is what gets forwarded.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parsed weights in the order the operator wrote them.
    pub fn weights(&self) -> &Map<String, Value> {
        &self.weights
    }
}

/// Single-line edit buffer for the task configuration.
#[derive(Debug, Clone)]
pub struct TaskEditor {
    chars: Vec<char>,
    cursor: usize,
    focused: bool,
}

impl TaskEditor {
    pub const CHAR_LIMIT: usize = 256;

    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().take(Self::CHAR_LIMIT).collect();
        let cursor = chars.len();
        Self {
            chars,
            cursor,
            focused: false,
        }
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Replace the whole buffer and park the cursor at the end.
    pub fn set_text(&mut self, text: &str) {
        *self = Self {
            focused: self.focused,
            ..Self::new(text)
        };
    }

    pub fn insert(&mut self, c: char) {
        if self.chars.len() >= Self::CHAR_LIMIT || c.is_control() {
            return;
        }
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.chars.len();
    }
}
