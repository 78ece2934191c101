//! The chipset: keyboard matrix, LCD text surface, and the I/O ports that
//! reach them, plus the monitor FIFO that streams characters from machine
//! code into the same display output the BASIC runtime writes to.
//!
//! Port map (an implementation choice; the distilled spec leaves concrete
//! port numbers unspecified — see DESIGN.md):
//! - `0x00..=0x07`: keyboard row read (IN only, row = port & 0x07).
//! - `0x10`: LCD character write (OUT only).
//! - `0x11`: LCD clear (OUT only, value ignored).
//! - `0x20`: monitor FIFO write (OUT only) — pushes straight into the
//!   display FIFO the BASIC runtime's own PRINT output also feeds.
//!
//! All other ports read as `0xFF` and drop writes silently.

use std::collections::VecDeque;

const KEY_ROWS: usize = 8;
const KEY_COLS: u8 = 8;
const LCD_COLS: usize = 24;
const LCD_ROWS: usize = 4;

const PORT_KEYBOARD_LO: u16 = 0x00;
const PORT_KEYBOARD_HI: u16 = 0x07;
const PORT_LCD_DATA: u16 = 0x10;
const PORT_LCD_CLEAR: u16 = 0x11;
const PORT_MONITOR_FIFO: u16 = 0x20;

/// An 8-row by 8-column key matrix, active-low on read like the teacher's
/// own half-row keyboard, but addressed one row per port instead of a
/// high-byte row select (the PC-G815 has no multiplexed address bus port).
pub struct KeyMatrix {
    rows: [u8; KEY_ROWS],
}

impl KeyMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self { rows: [0; KEY_ROWS] }
    }

    pub fn set_key(&mut self, row: u8, col: u8, pressed: bool) {
        let row = row as usize;
        if row < KEY_ROWS && col < KEY_COLS {
            if pressed {
                self.rows[row] |= 1 << col;
            } else {
                self.rows[row] &= !(1 << col);
            }
        }
    }

    /// Set a key from the `setKeyState(code, down)` machine API, where
    /// `code` packs row in the high nibble and column in the low nibble.
    pub fn set_key_code(&mut self, code: u8, down: bool) {
        self.set_key(code >> 4, code & 0x0F, down);
    }

    #[must_use]
    pub fn read_row(&self, row: u8) -> u8 {
        let row = row as usize;
        if row < KEY_ROWS {
            !self.rows[row]
        } else {
            0xFF
        }
    }

    pub fn release_all(&mut self) {
        self.rows = [0; KEY_ROWS];
    }
}

impl Default for KeyMatrix {
    fn default() -> Self {
        Self::new()
    }
}

/// The LCD's text surface: a small character grid with a cursor and a
/// scrollable display-start line. Pixel-level framebuffer layout is out of
/// scope; `getFrameBuffer()` exposes this grid's raw bytes instead.
pub struct LcdText {
    grid: [[u8; LCD_COLS]; LCD_ROWS],
    cursor_col: u8,
    cursor_row: u8,
    display_start_line: u8,
}

impl LcdText {
    #[must_use]
    pub fn new() -> Self {
        Self { grid: [[b' '; LCD_COLS]; LCD_ROWS], cursor_col: 0, cursor_row: 0, display_start_line: 0 }
    }

    pub fn clear(&mut self) {
        self.grid = [[b' '; LCD_COLS]; LCD_ROWS];
        self.cursor_col = 0;
        self.cursor_row = 0;
    }

    pub fn write_char(&mut self, code: u8) {
        if code == b'\n' {
            self.newline();
            return;
        }
        let (col, row) = (self.cursor_col as usize, self.cursor_row as usize);
        if row < LCD_ROWS {
            self.grid[row][col] = code;
        }
        self.cursor_col += 1;
        if self.cursor_col as usize >= LCD_COLS {
            self.newline();
        }
    }

    fn newline(&mut self) {
        self.cursor_col = 0;
        self.cursor_row += 1;
        if self.cursor_row as usize >= LCD_ROWS {
            self.grid.rotate_left(1);
            if let Some(last) = self.grid.last_mut() {
                *last = [b' '; LCD_COLS];
            }
            self.cursor_row = LCD_ROWS as u8 - 1;
        }
    }

    pub fn set_cursor(&mut self, col: u8, row: u8) {
        self.cursor_col = col;
        self.cursor_row = row;
    }

    pub fn set_display_start_line(&mut self, n: u8) {
        self.display_start_line = n;
    }

    #[must_use]
    pub fn display_start_line(&self) -> u8 {
        self.display_start_line
    }

    #[must_use]
    pub fn text_lines(&self) -> Vec<String> {
        self.grid
            .iter()
            .map(|row| String::from_utf8_lossy(row).trim_end().to_string())
            .collect()
    }

    #[must_use]
    pub fn frame_bytes(&self) -> Vec<u8> {
        self.grid.iter().flatten().copied().collect()
    }
}

impl Default for LcdText {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyboard, LCD, and the ports that reach them. Owned directly by the
/// machine; the CPU-facing bus and the BASIC-facing adapter are both thin
/// views constructed on demand, so nothing here needs shared ownership.
pub struct Peripherals {
    pub keyboard: KeyMatrix,
    pub lcd: LcdText,
    pub display_fifo: VecDeque<u8>,
    pub kana_mode: bool,
}

impl Peripherals {
    #[must_use]
    pub fn new() -> Self {
        Self { keyboard: KeyMatrix::new(), lcd: LcdText::new(), display_fifo: VecDeque::new(), kana_mode: false }
    }

    #[must_use]
    pub fn io_read(&self, port: u16) -> u8 {
        if (PORT_KEYBOARD_LO..=PORT_KEYBOARD_HI).contains(&port) {
            self.keyboard.read_row(port as u8)
        } else {
            0xFF
        }
    }

    pub fn io_write(&mut self, port: u16, value: u8) {
        match port {
            PORT_LCD_DATA => self.lcd.write_char(value),
            PORT_LCD_CLEAR => self.lcd.clear(),
            PORT_MONITOR_FIFO => self.display_fifo.push_back(value),
            _ => {}
        }
    }
}

impl Default for Peripherals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_keys_pressed_reads_all_ones() {
        let kbd = KeyMatrix::new();
        assert_eq!(kbd.read_row(0), 0xFF);
    }

    #[test]
    fn pressed_key_clears_its_bit() {
        let mut kbd = KeyMatrix::new();
        kbd.set_key(2, 3, true);
        assert_eq!(kbd.read_row(2) & (1 << 3), 0);
        kbd.set_key(2, 3, false);
        assert_eq!(kbd.read_row(2) & (1 << 3), 1 << 3);
    }

    #[test]
    fn set_key_code_packs_row_and_column() {
        let mut kbd = KeyMatrix::new();
        kbd.set_key_code(0x23, true);
        assert_eq!(kbd.read_row(2) & (1 << 3), 0);
    }

    #[test]
    fn lcd_wraps_to_next_line_at_column_limit() {
        let mut lcd = LcdText::new();
        for _ in 0..LCD_COLS {
            lcd.write_char(b'X');
        }
        lcd.write_char(b'Y');
        let lines = lcd.text_lines();
        assert_eq!(lines[1], "Y");
    }

    #[test]
    fn lcd_scrolls_past_last_row() {
        let mut lcd = LcdText::new();
        for row in 0..LCD_ROWS {
            lcd.write_char(b'0' + row as u8);
            lcd.write_char(b'\n');
        }
        // Writing one line per row fills the grid then scrolls once more,
        // dropping row "0" off the top.
        let lines = lcd.text_lines();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[LCD_ROWS - 1], "");
    }

    #[test]
    fn io_read_unmapped_port_is_ff() {
        let p = Peripherals::new();
        assert_eq!(p.io_read(0x50), 0xFF);
    }

    #[test]
    fn monitor_fifo_write_reaches_display_fifo() {
        let mut p = Peripherals::new();
        p.io_write(PORT_MONITOR_FIFO, b'!');
        assert_eq!(p.display_fifo.pop_front(), Some(b'!'));
    }

    #[test]
    fn lcd_data_port_advances_cursor() {
        let mut p = Peripherals::new();
        p.io_write(PORT_LCD_DATA, b'A');
        assert_eq!(p.lcd.text_lines()[0], "A");
    }
}
