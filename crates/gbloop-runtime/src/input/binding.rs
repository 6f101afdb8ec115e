use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Emulated controller buttons, in the engine's joypad bit order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PadButtons: u8 {
        const A = 0x01;
        const B = 0x02;
        const SELECT = 0x04;
        const START = 0x08;
        const RIGHT = 0x10;
        const LEFT = 0x20;
        const UP = 0x40;
        const DOWN = 0x80;
    }
}

bitflags! {
    /// Emulator-level actions bound to physical keys.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Hotkeys: u16 {
        const QUIT = 1;
        const MUTE = 1 << 1;
        const RESET = 1 << 2;
        const SCROLL_UP = 1 << 3;
        const SCROLL_DOWN = 1 << 4;
        const SCROLL_TOP = 1 << 5;
        const SCROLL_CENTER = 1 << 6;
        const SCROLL_BOTTOM = 1 << 7;
        const SRAM_COMMIT = 1 << 8;
    }
}

/// Raw key codes of the reference keypad layout.
///
/// Letters, digits and navigation keys follow the virtual-key numbering the
/// device firmware reports; `POWER` and `SAVE` are vendor keys.
pub mod keycode {
    pub const ESC: u16 = 0x1B;
    pub const PAGE_UP: u16 = 0x21;
    pub const PAGE_DOWN: u16 = 0x22;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const DIGIT_1: u16 = 0x31;
    pub const DIGIT_2: u16 = 0x32;
    pub const DIGIT_3: u16 = 0x33;
    pub const A: u16 = 0x41;
    pub const H: u16 = 0x48;
    pub const M: u16 = 0x4D;
    pub const R: u16 = 0x52;
    pub const S: u16 = 0x53;
    pub const X: u16 = 0x58;
    pub const Z: u16 = 0x5A;
    pub const POWER: u16 = 0x0100;
    pub const SAVE: u16 = 0x0101;
}

/// Logical action → raw key code table. Zero leaves an action unbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBinding {
    pub a: u16,
    pub b: u16,
    pub select: u16,
    pub start: u16,
    pub right: u16,
    pub left: u16,
    pub up: u16,
    pub down: u16,
    /// Presses A, B, Select and Start together.
    pub reset_combo: u16,

    pub quit: u16,
    pub mute: u16,
    pub reset_hard: u16,
    pub scroll_up: u16,
    pub scroll_down: u16,
    pub scroll_top: u16,
    pub scroll_center: u16,
    pub scroll_bottom: u16,
    pub sram_commit: u16,
}

impl Default for KeyBinding {
    fn default() -> Self {
        Self {
            a: keycode::X,
            b: keycode::Z,
            select: keycode::A,
            start: keycode::S,
            right: keycode::RIGHT,
            left: keycode::LEFT,
            up: keycode::UP,
            down: keycode::DOWN,
            reset_combo: keycode::R,
            quit: keycode::ESC,
            mute: keycode::M,
            reset_hard: keycode::H,
            scroll_up: keycode::PAGE_UP,
            scroll_down: keycode::PAGE_DOWN,
            scroll_top: keycode::DIGIT_1,
            scroll_center: keycode::DIGIT_2,
            scroll_bottom: keycode::DIGIT_3,
            sram_commit: keycode::SAVE,
        }
    }
}

#[inline]
fn bound(binding: u16, code: u16) -> bool {
    binding != 0 && binding == code
}

impl KeyBinding {
    /// Controller buttons driven by `code`.
    pub fn pad_bits(&self, code: u16) -> PadButtons {
        if bound(self.reset_combo, code) {
            return PadButtons::A | PadButtons::B | PadButtons::SELECT | PadButtons::START;
        }

        let table = [
            (self.a, PadButtons::A),
            (self.b, PadButtons::B),
            (self.select, PadButtons::SELECT),
            (self.start, PadButtons::START),
            (self.up, PadButtons::UP),
            (self.down, PadButtons::DOWN),
            (self.left, PadButtons::LEFT),
            (self.right, PadButtons::RIGHT),
        ];
        table
            .iter()
            .filter(|(key, _)| bound(*key, code))
            .fold(PadButtons::empty(), |acc, (_, bit)| acc | *bit)
    }

    /// Hotkeys driven by `code`.
    pub fn hotkey_bits(&self, code: u16) -> Hotkeys {
        let table = [
            (self.quit, Hotkeys::QUIT),
            (self.mute, Hotkeys::MUTE),
            (self.reset_hard, Hotkeys::RESET),
            (self.scroll_up, Hotkeys::SCROLL_UP),
            (self.scroll_down, Hotkeys::SCROLL_DOWN),
            (self.scroll_top, Hotkeys::SCROLL_TOP),
            (self.scroll_center, Hotkeys::SCROLL_CENTER),
            (self.scroll_bottom, Hotkeys::SCROLL_BOTTOM),
            (self.sram_commit, Hotkeys::SRAM_COMMIT),
        ];
        table
            .iter()
            .filter(|(key, _)| bound(*key, code))
            .fold(Hotkeys::empty(), |acc, (_, bit)| acc | *bit)
    }
}
