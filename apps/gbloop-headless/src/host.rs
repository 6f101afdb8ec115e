//! Host services for a session with no keyboard and no screen.

use std::{collections::VecDeque, sync::Arc};

use gbloop_runtime::{Dialogs, FaultReport, KeyEvent, KeyRepeatConfig, KeySource};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::args::KeyPress;

/// Frames a scripted key stays down before its release is queued.
pub const PRESS_HOLD_FRAMES: u64 = 10;

/// Key queue that only ever holds what the driver pushes into it.
pub struct QueuedKeys {
    events: Mutex<VecDeque<KeyEvent>>,
    repeat: Mutex<KeyRepeatConfig>,
}

impl QueuedKeys {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(KeyRepeatConfig {
                delay: 500,
                interval: 40,
                single_shot: false,
            }),
        }
    }

    pub fn push(&self, event: KeyEvent) {
        self.events.lock().push_back(event);
    }
}

impl KeySource for QueuedKeys {
    fn next_event(&self) -> Option<KeyEvent> {
        self.events.lock().pop_front()
    }

    fn has_pending(&self) -> bool {
        !self.events.lock().is_empty()
    }

    fn clear_pending(&self) {
        self.events.lock().clear();
    }

    fn repeat_config(&self) -> KeyRepeatConfig {
        *self.repeat.lock()
    }

    fn set_repeat_config(&self, config: KeyRepeatConfig) {
        *self.repeat.lock() = config;
    }
}

/// Feeds command-line key presses into a [`QueuedKeys`] as frames go by.
pub struct KeyScript {
    keys: Arc<QueuedKeys>,
    presses: Vec<KeyPress>,
}

impl KeyScript {
    pub fn new(keys: Arc<QueuedKeys>, presses: Vec<KeyPress>) -> Self {
        Self { keys, presses }
    }

    /// Queues the key-downs and key-ups due on `frame`.
    pub fn advance(&self, frame: u64) {
        for press in &self.presses {
            if press.frame == frame {
                debug!(frame, code = press.code, "scripted key down");
                self.keys.push(KeyEvent::down(press.code));
            } else if press.frame + PRESS_HOLD_FRAMES == frame {
                self.keys.push(KeyEvent::up(press.code));
            }
        }
    }
}

/// Confirms every quit request and prints fault reports to stderr.
pub struct ConsoleDialogs;

impl Dialogs for ConsoleDialogs {
    fn confirm_quit(&mut self) -> bool {
        info!("quit requested, confirming");
        true
    }

    fn report_fault(&mut self, report: &FaultReport) {
        eprintln!("{report}");
    }
}
