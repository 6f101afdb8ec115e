//! The real-time session driver.
//!
//! [`Runtime`] wires an [`Engine`] to the platform: it owns the frame loop,
//! the input-synthesis worker and the audio worker, and tears all of them
//! down on quit or on a fatal emulation fault.

mod lifecycle;
mod pacing;
mod runner;
mod state;
mod types;
pub(crate) mod worker;

use std::path::PathBuf;

pub use lifecycle::{DRAIN_QUIET_POLLS, WorkerState};
pub use pacing::FRAME_ADVANCE_MS;
pub use runner::{AUTOSAVE_FRAMES, RTC_TICK_FRAMES};
pub use types::{FaultReport, RuntimeError, RuntimeNotification, SessionSummary};
pub use worker::{ShutdownOutcome, WorkerContext, WorkerHandle};

use crate::{
    audio::RingSnapshot,
    config::Config,
    engine::{Cartridge, Engine},
    platform::Platform,
    video::{Compositor, DisplaySurface},
};

use lifecycle::{AudioOutput, InputPoller};
use runner::Runner;

pub struct Runtime<E, S> {
    runner: Runner<E, S>,
}

impl<E: Engine, S: DisplaySurface> Runtime<E, S> {
    /// Prepares a session. Nothing runs until [`Runtime::run`].
    ///
    /// `save_path` receives cartridge RAM on manual and automatic commits and
    /// at the end of the session; fatal faults dump it to `recovery.sav` in the
    /// same directory.
    pub fn new(
        config: &Config,
        platform: Platform,
        engine: E,
        cart: Cartridge,
        surface: S,
        save_path: impl Into<PathBuf>,
    ) -> Result<Self, RuntimeError> {
        let config = config.clone().sanitized();
        let compositor = Compositor::new(surface, config.debug.force_safe_framebuffer)?;

        let Platform {
            clock,
            keys,
            audio,
            dialogs,
        } = platform;

        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
        let input = InputPoller::new(
            keys,
            clock.clone(),
            config.key_binding.clone(),
            config.options.multi_press_mode,
        );
        let audio = AudioOutput::new(
            audio,
            config.options.audio_format(),
            config.options.audio_ring_chunks,
            notify_tx,
        );

        Ok(Self {
            runner: Runner::new(
                &config,
                engine,
                cart,
                compositor,
                clock,
                dialogs,
                input,
                audio,
                notify_rx,
                save_path.into(),
            ),
        })
    }

    /// Stops the session on its own after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.runner.set_frame_limit(Some(frames));
        self
    }

    /// Runs frames until the user quits or the engine faults.
    ///
    /// Workers are stopped and cartridge RAM is written before this returns,
    /// whatever the outcome.
    pub fn run(&mut self) -> Result<SessionSummary, RuntimeError> {
        self.runner.run()
    }

    pub fn engine(&self) -> &E {
        self.runner.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.runner.engine_mut()
    }

    pub fn cart(&self) -> &Cartridge {
        self.runner.cart()
    }

    pub fn compositor(&self) -> &Compositor<S> {
        self.runner.compositor()
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor<S> {
        self.runner.compositor_mut()
    }

    pub fn input_state(&self) -> WorkerState {
        self.runner.input_state()
    }

    /// Whether the audio worker is currently running.
    pub fn audio_on(&self) -> bool {
        self.runner.audio().is_on()
    }

    /// Ring counters of the current or most recent audio session.
    pub fn audio_stats(&self) -> Option<RingSnapshot> {
        self.runner.audio().stats()
    }
}
