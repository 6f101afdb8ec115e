//! Input state synthesis.
//!
//! The platform only reports discrete key events. A synthesizer runs on the
//! input worker, turns that stream back into a "currently held" view, and the
//! worker publishes the result for the scheduler to read once per frame.

mod binding;
mod discrete;
mod timeout;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use binding::{Hotkeys, KeyBinding, PadButtons, keycode};
pub use discrete::DiscreteSynth;
pub use timeout::TimeoutSynth;

use crate::platform::{KeyRepeatConfig, KeySource};

/// How held keys are reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultiPressMode {
    /// Real key-down/key-up pairs are available.
    DiscretePolling,
    /// Key-up is unreliable; presses decay after a short silence.
    #[default]
    TimeoutSimulation,
}

/// State published after every synthesizer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SynthFrame {
    pub pad: PadButtons,
    pub hotkeys: Hotkeys,
    /// Any key is latched, mapped or not.
    pub holding_any: bool,
    /// The power key was seen during this tick.
    pub power: bool,
}

/// The two interchangeable reconstruction strategies.
#[derive(Debug, Clone)]
pub enum Synthesizer {
    Discrete(DiscreteSynth),
    Timeout(TimeoutSynth),
}

impl Synthesizer {
    pub fn new(mode: MultiPressMode) -> Self {
        match mode {
            MultiPressMode::DiscretePolling => Self::Discrete(DiscreteSynth::new()),
            MultiPressMode::TimeoutSimulation => Self::Timeout(TimeoutSynth::new()),
        }
    }

    /// Sleep between two ticks of the input worker.
    pub fn poll_period(&self) -> Duration {
        match self {
            Self::Discrete(_) => DiscreteSynth::POLL_PERIOD,
            Self::Timeout(_) => TimeoutSynth::POLL_PERIOD,
        }
    }

    /// Key-repeat parameters to apply while this synthesizer is active.
    pub fn repeat_preset(&self) -> KeyRepeatConfig {
        match self {
            Self::Discrete(_) => KeyRepeatConfig::SUPPRESS,
            Self::Timeout(_) => KeyRepeatConfig::TURBO,
        }
    }

    pub fn tick(&mut self, source: &dyn KeySource, binding: &KeyBinding) -> SynthFrame {
        match self {
            Self::Discrete(synth) => synth.tick(source, binding),
            Self::Timeout(synth) => synth.tick(source, binding),
        }
    }
}
