use std::time::Duration;

use crate::platform::{KeyEventKind, KeySource};

use super::{KeyBinding, SynthFrame, keycode};

/// Simulates key releases for sources that cannot report key-up for two
/// simultaneous keys.
///
/// Every key-down latches up to two key codes and arms a decay counter. Each
/// poll without new events counts down; when the counter runs out the latched
/// keys are released. Key repeats are switched to "turbo" while this runs, so
/// a key that is physically held keeps re-arming the counter.
///
/// A key held without producing repeats is indistinguishable from a released
/// key that is still latched. This is accepted rather than corrected.
#[derive(Debug, Clone, Default)]
pub struct TimeoutSynth {
    down_counter: u8,
    pressing: [u16; 2],
}

impl TimeoutSynth {
    pub const POLL_PERIOD: Duration = Duration::from_millis(5);
    /// Polls a press stays latched after its last event (≈35 ms).
    pub const DECAY_PERIODS: u8 = 7;
    /// Pending events are only read once the counter has decayed this far.
    const READ_THRESHOLD: u8 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Currently latched key codes; zero marks an empty slot.
    pub fn latched(&self) -> [u16; 2] {
        self.pressing
    }

    pub fn tick(&mut self, source: &dyn KeySource, binding: &KeyBinding) -> SynthFrame {
        let mut hit = false;
        let mut power = false;

        if self.down_counter <= Self::READ_THRESHOLD {
            loop {
                source.suppress_modifiers();
                let Some(event) = source.next_event() else {
                    break;
                };
                hit = true;
                if event.kind != KeyEventKind::Down {
                    continue;
                }
                if event.code0 == keycode::POWER || event.code1 == keycode::POWER {
                    // Release right away so nothing stays latched across suspend.
                    hit = false;
                    power = true;
                    self.down_counter = 1;
                } else {
                    self.pressing = [event.code0, event.code1];
                    self.down_counter = Self::DECAY_PERIODS;
                }
            }
        }

        if !hit {
            if self.down_counter == 1 {
                self.pressing = [0, 0];
            }
            self.down_counter = self.down_counter.saturating_sub(1);
        }

        let [first, second] = self.pressing;
        SynthFrame {
            pad: binding.pad_bits(first) | binding.pad_bits(second),
            hotkeys: binding.hotkey_bits(first) | binding.hotkey_bits(second),
            holding_any: first != 0 || second != 0,
            power,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::{
        input::PadButtons,
        platform::{KeyEvent, KeyRepeatConfig},
    };

    #[derive(Default)]
    struct Queue(Mutex<VecDeque<KeyEvent>>);

    impl Queue {
        fn push(&self, event: KeyEvent) {
            self.0.lock().push_back(event);
        }
    }

    impl KeySource for Queue {
        fn next_event(&self) -> Option<KeyEvent> {
            self.0.lock().pop_front()
        }

        fn has_pending(&self) -> bool {
            !self.0.lock().is_empty()
        }

        fn clear_pending(&self) {
            self.0.lock().clear();
        }

        fn repeat_config(&self) -> KeyRepeatConfig {
            KeyRepeatConfig::TURBO
        }

        fn set_repeat_config(&self, _config: KeyRepeatConfig) {}
    }

    #[test]
    fn single_event_clears_after_exactly_the_decay_window() {
        let queue = Queue::default();
        let binding = KeyBinding::default();
        let mut synth = TimeoutSynth::new();

        queue.push(KeyEvent::down(keycode::X));
        assert_eq!(synth.tick(&queue, &binding).pad, PadButtons::A);

        for silent in 1..TimeoutSynth::DECAY_PERIODS {
            let frame = synth.tick(&queue, &binding);
            assert_eq!(frame.pad, PadButtons::A, "released early after {silent} polls");
        }

        let frame = synth.tick(&queue, &binding);
        assert!(frame.pad.is_empty());
        assert!(!frame.holding_any);
        assert_eq!(synth.latched(), [0, 0]);
    }

    #[test]
    fn repeat_before_expiry_extends_the_hold() {
        let queue = Queue::default();
        let binding = KeyBinding::default();
        let mut synth = TimeoutSynth::new();

        queue.push(KeyEvent::down(keycode::X));
        synth.tick(&queue, &binding);
        for _ in 0..4 {
            synth.tick(&queue, &binding);
        }

        // Counter is at 3 now, so the repeat is read on this poll.
        queue.push(KeyEvent::down(keycode::X));
        synth.tick(&queue, &binding);

        for _ in 1..TimeoutSynth::DECAY_PERIODS {
            assert_eq!(synth.tick(&queue, &binding).pad, PadButtons::A);
        }
        assert!(synth.tick(&queue, &binding).pad.is_empty());
    }

    #[test]
    fn repeats_wait_while_the_press_is_fresh() {
        let queue = Queue::default();
        let binding = KeyBinding::default();
        let mut synth = TimeoutSynth::new();

        queue.push(KeyEvent::down(keycode::X));
        synth.tick(&queue, &binding);

        queue.push(KeyEvent::down(keycode::LEFT));
        synth.tick(&queue, &binding);
        assert!(queue.has_pending(), "event consumed while counter was high");
        assert_eq!(synth.latched(), [keycode::X, 0]);

        // 6 → 5 → 4 → 3, then the queued event is read.
        synth.tick(&queue, &binding);
        synth.tick(&queue, &binding);
        synth.tick(&queue, &binding);
        let frame = synth.tick(&queue, &binding);
        assert_eq!(frame.pad, PadButtons::LEFT);
        assert!(!queue.has_pending());
    }

    #[test]
    fn two_key_event_latches_both() {
        let queue = Queue::default();
        let binding = KeyBinding::default();
        let mut synth = TimeoutSynth::new();

        queue.push(KeyEvent::down_pair(keycode::X, keycode::ESC));
        let frame = synth.tick(&queue, &binding);
        assert_eq!(frame.pad, PadButtons::A);
        assert!(frame.hotkeys.contains(crate::input::Hotkeys::QUIT));
    }

    #[test]
    fn power_key_releases_immediately() {
        let queue = Queue::default();
        let binding = KeyBinding::default();
        let mut synth = TimeoutSynth::new();

        queue.push(KeyEvent::down(keycode::X));
        synth.tick(&queue, &binding);
        for _ in 0..4 {
            synth.tick(&queue, &binding);
        }

        queue.push(KeyEvent::down(keycode::POWER));
        let frame = synth.tick(&queue, &binding);
        assert!(frame.power);
        assert!(frame.pad.is_empty());
        assert!(!frame.holding_any);
    }

    #[test]
    fn non_key_events_count_as_activity_only() {
        let queue = Queue::default();
        let binding = KeyBinding::default();
        let mut synth = TimeoutSynth::new();

        queue.push(KeyEvent::other());
        let frame = synth.tick(&queue, &binding);
        assert!(!frame.holding_any);
        assert!(!queue.has_pending());
    }
}
