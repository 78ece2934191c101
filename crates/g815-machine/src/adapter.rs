//! The BASIC-facing adapter: another thin borrowing view, this time of
//! `g815_basic::MachineAdapter`. Like the CPU-facing bus, it is never
//! stored long-term; [`crate::Machine::pump_basic`] detaches the
//! persistent `Runtime`'s placeholder adapter, swaps this one in for the
//! duration of the call, then swaps the placeholder back.

use g815_basic::{FileHandle, FileMode, MachineAdapter, Value};

use crate::memory::Memory;
use crate::peripherals::Peripherals;

pub struct BasicAdapter<'a> {
    pub memory: &'a mut Memory,
    pub peripherals: &'a mut Peripherals,
}

impl MachineAdapter for BasicAdapter<'_> {
    fn clear_lcd(&mut self) {
        self.peripherals.lcd.clear();
    }

    fn write_lcd_char(&mut self, code: u8) {
        self.peripherals.lcd.write_char(code);
    }

    fn set_text_cursor(&mut self, col: u8, row: u8) {
        self.peripherals.lcd.set_cursor(col, row);
    }

    fn set_display_start_line(&mut self, n: u8) {
        self.peripherals.lcd.set_display_start_line(n);
    }

    fn get_display_start_line(&self) -> u8 {
        self.peripherals.lcd.display_start_line()
    }

    fn read_key_matrix(&self, row: u8) -> u8 {
        self.peripherals.keyboard.read_row(row)
    }

    fn in8(&mut self, port: u16) -> u8 {
        self.peripherals.io_read(port)
    }

    fn out8(&mut self, port: u16, value: u8) {
        self.peripherals.io_write(port, value);
    }

    fn peek8(&self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    fn poke8(&mut self, addr: u16, value: u8) {
        self.memory.write(addr, value);
    }

    // File I/O, CALL, and graphics primitives have no PC-G815 peripheral
    // backing this session; the trait's no-op defaults stand for them.
    fn open_file(&mut self, _path: &str, _mode: FileMode) -> Option<FileHandle> {
        None
    }
    fn read_file_value(&mut self, _handle: FileHandle) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_routes_peek_poke_to_memory() {
        let mut memory = Memory::new(vec![0u8; 0], 0x1_0000);
        let mut peripherals = Peripherals::new();
        let mut adapter = BasicAdapter { memory: &mut memory, peripherals: &mut peripherals };
        adapter.poke8(0x9000, 0x7E);
        assert_eq!(adapter.peek8(0x9000), 0x7E);
    }

    #[test]
    fn adapter_routes_lcd_writes() {
        let mut memory = Memory::new(vec![0u8; 0], 0x1_0000);
        let mut peripherals = Peripherals::new();
        let mut adapter = BasicAdapter { memory: &mut memory, peripherals: &mut peripherals };
        adapter.write_lcd_char(b'H');
        adapter.write_lcd_char(b'I');
        drop(adapter);
        assert_eq!(peripherals.lcd.text_lines()[0], "HI");
    }
}
