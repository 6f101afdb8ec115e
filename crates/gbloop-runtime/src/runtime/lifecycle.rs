//! Start/stop coordination of the background workers.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::{
    audio::{self, AudioDevice, AudioFormat, ChunkProducer, RingSnapshot},
    input::{KeyBinding, MultiPressMode, Synthesizer},
    platform::{Clock, KeyRepeatConfig, KeySource},
};

use super::{
    RuntimeError, RuntimeNotification,
    state::HeldState,
    worker::{ACK_TIMEOUT, WorkerHandle},
};

/// Consecutive empty polls required before stale input counts as drained.
pub const DRAIN_QUIET_POLLS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Owns the input-synthesis worker and the device configuration it overrides.
pub(crate) struct InputPoller {
    keys: Arc<dyn KeySource>,
    clock: Arc<dyn Clock>,
    binding: KeyBinding,
    mode: MultiPressMode,
    held: HeldState,
    state: WorkerState,
    worker: Option<WorkerHandle>,
    saved_repeat: Option<KeyRepeatConfig>,
}

impl InputPoller {
    pub(crate) fn new(
        keys: Arc<dyn KeySource>,
        clock: Arc<dyn Clock>,
        binding: KeyBinding,
        mode: MultiPressMode,
    ) -> Self {
        Self {
            keys,
            clock,
            binding,
            mode,
            held: HeldState::new(),
            state: WorkerState::Stopped,
            worker: None,
            saved_repeat: None,
        }
    }

    pub(crate) fn held(&self) -> &HeldState {
        &self.held
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker = "input", from = ?self.state, to = ?next, "worker state");
        self.state = next;
    }

    pub(crate) fn begin(&mut self) -> Result<(), RuntimeError> {
        if self.state == WorkerState::Running {
            return Ok(());
        }
        self.transition(WorkerState::Starting);

        let mut synth = Synthesizer::new(self.mode);
        let period = synth.poll_period();
        self.saved_repeat = Some(self.keys.repeat_config());
        self.keys.set_repeat_config(synth.repeat_preset());
        self.held.reset();

        let keys = Arc::clone(&self.keys);
        let binding = self.binding.clone();
        let writer = self.held.writer();
        let spawned = WorkerHandle::spawn("gbloop-input", move |ctx| {
            while ctx.should_run() {
                let frame = synth.tick(&*keys, &binding);
                writer.publish(&frame);
                if !ctx.sleep(period) {
                    break;
                }
            }
        });

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                self.transition(WorkerState::Running);
                Ok(())
            }
            Err(source) => {
                if let Some(saved) = self.saved_repeat.take() {
                    self.keys.set_repeat_config(saved);
                }
                self.transition(WorkerState::Stopped);
                Err(RuntimeError::WorkerSpawn {
                    worker: "input",
                    source,
                })
            }
        }
    }

    pub(crate) fn end(&mut self) {
        if self.state == WorkerState::Stopped {
            return;
        }
        self.transition(WorkerState::Stopping);

        self.keys.set_repeat_config(KeyRepeatConfig::DRAIN);
        if let Some(worker) = self.worker.take() {
            worker.shutdown(ACK_TIMEOUT);
        }
        self.drain();
        if let Some(saved) = self.saved_repeat.take() {
            self.keys.set_repeat_config(saved);
        }
        self.held.reset();

        self.transition(WorkerState::Stopped);
    }

    /// Discards queued events until the source stays quiet for a while.
    fn drain(&self) {
        let mut quiet = 0;
        while quiet < DRAIN_QUIET_POLLS {
            if self.keys.has_pending() {
                self.keys.clear_pending();
                quiet = 0;
            } else {
                quiet += 1;
            }
            self.clock.sleep_ms(1);
        }
    }
}

impl Drop for InputPoller {
    fn drop(&mut self) {
        self.end();
    }
}

/// Owns the audio worker and the producer half of its ring.
pub(crate) struct AudioOutput {
    device: Arc<dyn AudioDevice>,
    format: AudioFormat,
    slots: usize,
    notify: Sender<RuntimeNotification>,
    state: WorkerState,
    worker: Option<WorkerHandle>,
    producer: Option<ChunkProducer>,
    last_stats: Option<RingSnapshot>,
}

impl AudioOutput {
    pub(crate) fn new(
        device: Arc<dyn AudioDevice>,
        format: AudioFormat,
        slots: usize,
        notify: Sender<RuntimeNotification>,
    ) -> Self {
        Self {
            device,
            format,
            slots,
            notify,
            state: WorkerState::Stopped,
            worker: None,
            producer: None,
            last_stats: None,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker = "audio", from = ?self.state, to = ?next, "worker state");
        self.state = next;
    }

    pub(crate) fn is_on(&self) -> bool {
        self.state == WorkerState::Running
    }

    pub(crate) fn format(&self) -> AudioFormat {
        self.format
    }

    /// Starts the audio worker. A spawn failure only disables audio.
    pub(crate) fn begin(&mut self) {
        if self.state == WorkerState::Running {
            return;
        }
        self.transition(WorkerState::Starting);

        let (producer, consumer) = audio::audio_ring(self.slots, self.format.chunk_samples());
        let device = Arc::clone(&self.device);
        let notify = self.notify.clone();
        let format = self.format;
        let spawned = WorkerHandle::spawn("gbloop-audio", move |ctx| {
            audio::consume_loop(&ctx, consumer, &*device, format, &notify);
        });

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                self.producer = Some(producer);
                self.transition(WorkerState::Running);
            }
            Err(err) => {
                warn!("failed to spawn audio worker, audio disabled: {err}");
                self.transition(WorkerState::Stopped);
            }
        }
    }

    pub(crate) fn end(&mut self) {
        if self.state == WorkerState::Stopped {
            return;
        }
        self.transition(WorkerState::Stopping);

        if let Some(worker) = self.worker.take() {
            worker.shutdown(ACK_TIMEOUT);
        }
        if let Some(producer) = self.producer.take() {
            self.last_stats = Some(producer.stats());
        }

        self.transition(WorkerState::Stopped);
    }

    /// Offers one frame of samples. Never blocks.
    pub(crate) fn try_produce(&mut self, chunk: &[i16]) -> bool {
        self.producer
            .as_mut()
            .is_some_and(|producer| producer.try_produce(chunk))
    }

    /// Counters of the current ring, or of the last one after audio was stopped.
    pub(crate) fn stats(&self) -> Option<RingSnapshot> {
        self.producer
            .as_ref()
            .map(ChunkProducer::stats)
            .or(self.last_stats)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.end();
    }
}
