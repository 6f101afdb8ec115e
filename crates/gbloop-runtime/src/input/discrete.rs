use std::time::Duration;

use crate::platform::{KeyEventKind, KeySource};

use super::{Hotkeys, KeyBinding, PadButtons, SynthFrame, keycode};

/// Rebuilds held state from matching key-down / key-up notifications.
#[derive(Debug, Clone, Default)]
pub struct DiscreteSynth {
    pad: PadButtons,
    hotkeys: Hotkeys,
}

impl DiscreteSynth {
    pub const POLL_PERIOD: Duration = Duration::from_millis(15);

    pub fn new() -> Self {
        Self::default()
    }

    /// Drains every pending event and returns the resulting held state.
    pub fn tick(&mut self, source: &dyn KeySource, binding: &KeyBinding) -> SynthFrame {
        let mut power = false;

        // Shifted key codes would never match their key-down counterpart.
        source.suppress_modifiers();
        while let Some(event) = source.next_event() {
            match event.kind {
                KeyEventKind::Down if event.code0 == keycode::POWER => power = true,
                KeyEventKind::Down => {
                    self.pad |= binding.pad_bits(event.code0);
                    self.hotkeys |= binding.hotkey_bits(event.code0);
                }
                KeyEventKind::Up => {
                    self.pad &= !binding.pad_bits(event.code0);
                    self.hotkeys &= !binding.hotkey_bits(event.code0);
                }
                KeyEventKind::Other => {}
            }
        }

        // Held keys without a binding are invisible here, so drift
        // compensation is skipped while only such keys are down.
        SynthFrame {
            pad: self.pad,
            hotkeys: self.hotkeys,
            holding_any: !self.pad.is_empty() || !self.hotkeys.is_empty(),
            power,
        }
    }
}
