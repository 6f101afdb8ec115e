use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering},
};

use crate::input::{Hotkeys, PadButtons, SynthFrame};

#[derive(Default)]
struct HeldCells {
    pad: AtomicU8,
    hotkeys: AtomicU16,
    holding_any: AtomicBool,
    power: AtomicBool,
}

/// Held buttons and hotkeys shared between the input worker and the frame loop.
///
/// Each field is a single word; readers may see a mix of two consecutive
/// publishes, which only delays a transition by one poll.
#[derive(Clone, Default)]
pub(crate) struct HeldState {
    cells: Arc<HeldCells>,
}

/// Write half, moved into the input worker.
pub(crate) struct HeldWriter {
    cells: Arc<HeldCells>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct HeldSnapshot {
    pub(crate) pad: PadButtons,
    pub(crate) hotkeys: Hotkeys,
    pub(crate) holding_any: bool,
}

impl HeldState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn writer(&self) -> HeldWriter {
        HeldWriter {
            cells: Arc::clone(&self.cells),
        }
    }

    pub(crate) fn snapshot(&self) -> HeldSnapshot {
        HeldSnapshot {
            pad: PadButtons::from_bits_retain(self.cells.pad.load(Ordering::Acquire)),
            hotkeys: Hotkeys::from_bits_retain(self.cells.hotkeys.load(Ordering::Acquire)),
            holding_any: self.cells.holding_any.load(Ordering::Acquire),
        }
    }

    /// Consumes a pending power-key signal.
    pub(crate) fn take_power_event(&self) -> bool {
        self.cells.power.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn reset(&self) {
        self.cells.pad.store(0, Ordering::Release);
        self.cells.hotkeys.store(0, Ordering::Release);
        self.cells.holding_any.store(false, Ordering::Release);
    }
}

impl HeldWriter {
    pub(crate) fn publish(&self, frame: &SynthFrame) {
        self.cells.pad.store(frame.pad.bits(), Ordering::Release);
        self.cells.hotkeys.store(frame.hotkeys.bits(), Ordering::Release);
        self.cells
            .holding_any
            .store(frame.holding_any, Ordering::Release);
        if frame.power {
            self.cells.power.store(true, Ordering::Release);
        }
    }
}
