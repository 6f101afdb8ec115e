//! Seam to the instruction-level emulation engine.
//!
//! The engine itself lives outside this crate. It steps one video frame per
//! call, reads cartridge memory through [`Cartridge`], pushes every finished
//! scanline into a [`LineSink`] and renders the frame's audio on request.

use std::{fmt, time::SystemTime};

use crate::video::LCD_WIDTH;

/// Start of the switchable ROM bank window.
pub const ROM_BANK_WINDOW_START: u16 = 0x4000;
/// End (exclusive) of the switchable ROM bank window.
pub const ROM_BANK_WINDOW_END: u16 = 0x8000;
/// Size of one ROM bank in bytes.
pub const ROM_BANK_SIZE: u32 = 0x4000;

/// Receives one scanline of palette indices at a time.
pub trait LineSink {
    fn draw_line(&mut self, pixels: &[u8; LCD_WIDTH], line: usize);
}

/// ROM image plus battery-backed cartridge RAM, owned by the host.
#[derive(Debug, Clone, Default)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self { rom, ram }
    }

    /// Out-of-range reads float high.
    #[inline]
    pub fn rom_read(&self, addr: u32) -> u8 {
        self.rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    #[inline]
    pub fn ram_read(&self, addr: u32) -> u8 {
        self.ram.get(addr as usize).copied().unwrap_or(0xFF)
    }

    #[inline]
    pub fn ram_write(&mut self, addr: u32, value: u8) {
        if let Some(slot) = self.ram.get_mut(addr as usize) {
            *slot = value;
        }
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }
}

/// Per-frame inputs handed to [`Engine::run_frame`].
pub struct FrameContext<'a> {
    /// Controller state, active low (a cleared bit means pressed).
    pub joypad: u8,
    pub cart: &'a mut Cartridge,
    pub lcd: &'a mut dyn LineSink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Unknown,
    InvalidOpcode,
    InvalidRead,
    InvalidWrite,
    HaltForever,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::Unknown => "UNKNOWN",
            FaultKind::InvalidOpcode => "INVALID OPCODE",
            FaultKind::InvalidRead => "INVALID READ",
            FaultKind::InvalidWrite => "INVALID WRITE",
            FaultKind::HaltForever => "HALT FOREVER",
        })
    }
}

/// Unrecoverable engine error raised from inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineFault {
    pub kind: FaultKind,
    pub address: u16,
}

pub trait Engine {
    /// Runs exactly one video frame.
    fn run_frame(&mut self, ctx: FrameContext<'_>) -> Result<(), EngineFault>;

    /// Renders one frame's worth of interleaved stereo samples from the
    /// current audio register snapshot.
    fn render_audio(&mut self, out: &mut [i16]);

    fn reset(&mut self);

    fn set_rtc(&mut self, now: SystemTime);

    /// Advances the cartridge clock by one second on carts whose RTC is
    /// driven by the host rather than by the emulated oscillator.
    fn tick_rtc(&mut self) {}

    /// Reads a byte through the engine's memory map without side effects.
    fn peek(&mut self, cart: &Cartridge, addr: u16) -> u8;

    fn selected_rom_bank(&self) -> u16;

    fn cart_mode(&self) -> u8;

    fn set_interlace(&mut self, _enabled: bool) {}

    fn set_frame_skip(&mut self, _enabled: bool) {}
}

/// File offset of a banked ROM address, or `None` outside the switchable window.
pub fn banked_file_offset(addr: u16, bank: u16) -> Option<u32> {
    if (ROM_BANK_WINDOW_START..ROM_BANK_WINDOW_END).contains(&addr) {
        Some(u32::from(bank) * ROM_BANK_SIZE + u32::from(addr - ROM_BANK_WINDOW_START))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banked_offset_only_inside_window() {
        assert_eq!(banked_file_offset(0x4500, 3), Some(0xC500));
        assert_eq!(banked_file_offset(0x4000, 1), Some(0x4000));
        assert_eq!(banked_file_offset(0x3FFF, 3), None);
        assert_eq!(banked_file_offset(0x8000, 3), None);
    }

    #[test]
    fn cartridge_ignores_out_of_range_access() {
        let mut cart = Cartridge::new(vec![1, 2, 3], vec![0; 2]);
        assert_eq!(cart.rom_read(2), 3);
        assert_eq!(cart.rom_read(99), 0xFF);
        cart.ram_write(1, 0x42);
        cart.ram_write(7, 0x42);
        assert_eq!(cart.ram(), &[0, 0x42]);
        assert_eq!(cart.ram_read(7), 0xFF);
    }
}
