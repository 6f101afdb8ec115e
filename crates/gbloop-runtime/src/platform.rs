//! Platform seams consumed by the runtime.
//!
//! The device this core targets exposes a discrete key-event queue, a coarse
//! millisecond tick counter and blocking message boxes. Each of those is a
//! trait here so the scheduler and workers never talk to a concrete OS API.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use crate::{audio::AudioDevice, runtime::FaultReport};

/// Tick length reported by clocks that only advance every half millisecond.
pub const HALF_RES_QUANTUM_US: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
    /// Anything the queue delivers that is not a key transition.
    Other,
}

/// One entry from the platform event queue.
///
/// Some devices report two simultaneously pressed keys in a single event;
/// `code1` is zero when only one key is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub code0: u16,
    pub code1: u16,
}

impl KeyEvent {
    pub const fn down(code: u16) -> Self {
        Self {
            kind: KeyEventKind::Down,
            code0: code,
            code1: 0,
        }
    }

    pub const fn down_pair(code0: u16, code1: u16) -> Self {
        Self {
            kind: KeyEventKind::Down,
            code0,
            code1,
        }
    }

    pub const fn up(code: u16) -> Self {
        Self {
            kind: KeyEventKind::Up,
            code0: code,
            code1: 0,
        }
    }

    pub const fn other() -> Self {
        Self {
            kind: KeyEventKind::Other,
            code0: 0,
            code1: 0,
        }
    }
}

/// Key-repeat parameters of the platform event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRepeatConfig {
    pub delay: u16,
    pub interval: u16,
    pub single_shot: bool,
}

impl KeyRepeatConfig {
    /// Repeats disabled, single-shot events on. Applied while shutting input down.
    pub const DRAIN: Self = Self {
        delay: 65535,
        interval: 65535,
        single_shot: true,
    };
    /// Repeats and single-shot events disabled. Used with real key-up events.
    pub const SUPPRESS: Self = Self {
        delay: 65535,
        interval: 65535,
        single_shot: false,
    };
    /// Immediate, continuous repeats. Used by the timeout-based synthesizer.
    pub const TURBO: Self = Self {
        delay: 0,
        interval: 0,
        single_shot: false,
    };
}

/// Discrete key-event source.
///
/// Shared between the scheduler thread (repeat configuration, draining) and
/// the input worker (event reads), so every method takes `&self`.
pub trait KeySource: Send + Sync {
    /// Pops the next pending event, if any.
    fn next_event(&self) -> Option<KeyEvent>;

    fn has_pending(&self) -> bool;

    /// Drops every pending event.
    fn clear_pending(&self);

    /// Disables modifier handling that would rewrite key codes (e.g. shift).
    fn suppress_modifiers(&self) {}

    fn repeat_config(&self) -> KeyRepeatConfig;

    fn set_repeat_config(&self, config: KeyRepeatConfig);
}

/// Coarse monotonic clock plus the sleep primitive the scheduler paces with.
pub trait Clock: Send + Sync {
    /// Monotonic tick counter.
    fn ticks(&self) -> u64;

    /// Length of one tick in microseconds.
    fn tick_quantum_us(&self) -> u32 {
        1000
    }

    /// Millisecond field (0..1000) of the wall clock.
    fn wall_millis(&self) -> u16;

    fn sleep_ms(&self, ms: u32);

    /// Ticks converted to milliseconds.
    fn millis(&self) -> u64 {
        self.ticks() * u64::from(self.tick_quantum_us()) / 1000
    }

    fn is_half_resolution(&self) -> bool {
        self.tick_quantum_us() == HALF_RES_QUANTUM_US
    }
}

/// [`Clock`] backed by `Instant` and `thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn ticks(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wall_millis(&self) -> u16 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_millis() as u16)
            .unwrap_or(0)
    }

    fn sleep_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Blocking user-facing dialogs.
pub trait Dialogs {
    /// Asks whether the session should end. `true` means quit.
    fn confirm_quit(&mut self) -> bool;

    /// Shows a fatal emulation fault. Returns once the user dismissed it.
    fn report_fault(&mut self, report: &FaultReport);
}

/// Everything the runtime needs from the host device.
pub struct Platform {
    pub clock: Arc<dyn Clock>,
    pub keys: Arc<dyn KeySource>,
    pub audio: Arc<dyn AudioDevice>,
    pub dialogs: Box<dyn Dialogs>,
}
