//! Simulated 20x4 character display.

use std::sync::{Arc, Mutex};

use gantry_common::display::CharacterDisplay;

const COLS: usize = 20;
const ROWS: usize = 4;

#[derive(Debug)]
struct Buffer {
    chars: [[char; COLS]; ROWS],
    col: usize,
    row: usize,
}

impl Buffer {
    fn new() -> Self {
        Self {
            chars: [[' '; COLS]; ROWS],
            col: 0,
            row: 0,
        }
    }

    fn put(&mut self, c: char) {
        if self.row < ROWS && self.col < COLS {
            self.chars[self.row][self.col] = c;
            self.col += 1;
        }
    }
}

/// Character display backed by a shared text buffer.
///
/// Handles are cheap clones of the same buffer, so a test can keep one
/// handle for assertions while the control unit owns another.
#[derive(Debug, Clone)]
pub struct SimDisplay {
    buffer: Arc<Mutex<Buffer>>,
}

impl SimDisplay {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer::new())),
        }
    }

    /// One display row as a trimmed string.
    pub fn line(&self, row: usize) -> String {
        let buf = self.buffer.lock().unwrap();
        if row >= ROWS {
            return String::new();
        }
        buf.chars[row].iter().collect::<String>().trim_end().to_string()
    }

    /// Whether any row contains `text`.
    pub fn contains(&self, text: &str) -> bool {
        (0..ROWS).any(|row| self.line(row).contains(text))
    }

    /// Whether the whole surface is blank.
    pub fn is_blank(&self) -> bool {
        (0..ROWS).all(|row| self.line(row).is_empty())
    }
}

impl Default for SimDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterDisplay for SimDisplay {
    fn clear(&mut self) {
        let mut buf = self.buffer.lock().unwrap();
        buf.chars = [[' '; COLS]; ROWS];
        buf.col = 0;
        buf.row = 0;
    }

    fn set_cursor(&mut self, col: u8, row: u8) {
        let mut buf = self.buffer.lock().unwrap();
        buf.col = (col as usize).min(COLS);
        buf.row = (row as usize).min(ROWS);
    }

    fn put_char(&mut self, c: char) {
        self.buffer.lock().unwrap().put(c);
    }

    fn put_str(&mut self, s: &str) {
        let mut buf = self.buffer.lock().unwrap();
        for c in s.chars() {
            buf.put(c);
        }
    }

    fn put_int(&mut self, value: i32) {
        self.put_str(&value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_blank() {
        let display = SimDisplay::new();
        assert!(display.is_blank());
    }

    #[test]
    fn writes_land_at_cursor() {
        let mut display = SimDisplay::new();
        display.set_cursor(0, 1);
        display.put_str("HOME");
        display.set_cursor(5, 1);
        display.put_int(-12);
        assert_eq!(display.line(1), "HOME -12");
        assert!(display.contains("HOME"));
    }

    #[test]
    fn clear_blanks_all_rows() {
        let mut display = SimDisplay::new();
        display.put_str("alert");
        display.clear();
        assert!(display.is_blank());
    }

    #[test]
    fn writes_clip_at_display_edge() {
        let mut display = SimDisplay::new();
        display.set_cursor(18, 0);
        display.put_str("ABCDEF");
        assert_eq!(display.line(0), "                  AB");
    }

    #[test]
    fn clones_share_the_buffer() {
        let display = SimDisplay::new();
        let mut writer = display.clone();
        writer.put_str("shared");
        assert!(display.contains("shared"));
    }
}
