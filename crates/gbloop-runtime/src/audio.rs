//! Audio streaming pipeline.
//!
//! The frame loop is the single producer: once per frame it offers one chunk
//! of interleaved stereo samples. A dedicated worker is the single consumer
//! and forwards chunks to the output device. The producer side never blocks;
//! when every slot is taken the chunk is dropped whole.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use cpal::{
    SampleFormat,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use crossbeam_channel::Sender;
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use tracing::{debug, warn};

use crate::runtime::{RuntimeNotification, worker::WorkerContext};

pub const CHANNELS: usize = 2;

/// Sleep of the consumer worker while the ring is empty.
const EMPTY_POLL: Duration = Duration::from_millis(1);

/// Sample format of the chunks flowing through the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    /// Emulated frame rate in millihertz (59728 for ~59.73 Hz).
    pub frame_rate_millihz: u32,
}

impl AudioFormat {
    /// Stereo frames per emulated frame, rounded up.
    pub fn chunk_frames(&self) -> usize {
        let rate = u64::from(self.sample_rate) * 1000;
        let fps = u64::from(self.frame_rate_millihz.max(1));
        rate.div_ceil(fps) as usize
    }

    /// Interleaved samples per chunk.
    pub fn chunk_samples(&self) -> usize {
        self.chunk_frames() * CHANNELS
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 32768,
            frame_rate_millihz: 59728,
        }
    }
}

#[derive(Debug, Default)]
struct RingStats {
    produced: AtomicU64,
    consumed: AtomicU64,
    dropped: AtomicU64,
    closed: AtomicBool,
}

/// Counters of a ring at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingSnapshot {
    /// Chunks accepted by the producer.
    pub produced: u64,
    /// Chunks handed to the device.
    pub consumed: u64,
    /// Chunks rejected because every slot was taken.
    pub dropped: u64,
}

impl RingStats {
    fn snapshot(&self) -> RingSnapshot {
        RingSnapshot {
            produced: self.produced.load(Ordering::Acquire),
            consumed: self.consumed.load(Ordering::Acquire),
            dropped: self.dropped.load(Ordering::Acquire),
        }
    }
}

/// Creates a ring holding `slots` chunks of `chunk_len` samples each.
pub fn audio_ring(slots: usize, chunk_len: usize) -> (ChunkProducer, ChunkConsumer) {
    let chunk_len = chunk_len.max(1);
    let slots = slots.max(1);
    let (producer, consumer) = HeapRb::<i16>::new(slots * chunk_len).split();
    let stats = Arc::new(RingStats::default());

    (
        ChunkProducer {
            inner: producer,
            chunk_len,
            stats: Arc::clone(&stats),
        },
        ChunkConsumer {
            inner: consumer,
            chunk_len,
            stats,
        },
    )
}

/// Producer half. Owned by the frame loop.
pub struct ChunkProducer {
    inner: HeapProd<i16>,
    chunk_len: usize,
    stats: Arc<RingStats>,
}

impl ChunkProducer {
    /// Queues a whole chunk, or drops it when no slot is free.
    ///
    /// The samples are copied before the write index moves, so the consumer
    /// never sees a partially written chunk. Only a full ring counts as a
    /// drop; a closed ring or a chunk of the wrong length is refused quietly.
    pub fn try_produce(&mut self, chunk: &[i16]) -> bool {
        if self.stats.closed.load(Ordering::Acquire) || chunk.len() != self.chunk_len {
            return false;
        }
        if self.inner.vacant_len() < self.chunk_len {
            self.stats.dropped.fetch_add(1, Ordering::AcqRel);
            return false;
        }

        let pushed = self.inner.push_slice(chunk);
        debug_assert_eq!(pushed, self.chunk_len);
        self.stats.produced.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Chunks waiting for the consumer.
    pub fn queued(&self) -> usize {
        self.inner.occupied_len() / self.chunk_len
    }

    pub fn is_closed(&self) -> bool {
        self.stats.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RingSnapshot {
        self.stats.snapshot()
    }
}

/// Consumer half. Owned by the audio worker.
pub struct ChunkConsumer {
    inner: HeapCons<i16>,
    chunk_len: usize,
    stats: Arc<RingStats>,
}

impl ChunkConsumer {
    /// Copies the oldest chunk into `out` and frees its slot.
    pub fn try_consume(&mut self, out: &mut [i16]) -> bool {
        if out.len() < self.chunk_len || self.inner.occupied_len() < self.chunk_len {
            return false;
        }

        let popped = self.inner.pop_slice(&mut out[..self.chunk_len]);
        debug_assert_eq!(popped, self.chunk_len);
        self.stats.consumed.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Marks the ring as having no consumer. Later chunks are refused quietly.
    pub fn close(&self) {
        self.stats.closed.store(true, Ordering::Release);
    }

    pub fn stats(&self) -> RingSnapshot {
        self.stats.snapshot()
    }
}

/// Output device able to play interleaved stereo `i16` chunks.
pub trait AudioDevice: Send + Sync {
    /// Opens a stream. Called on the audio worker thread.
    fn open(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>>;
}

/// An open output stream.
pub trait AudioSink {
    /// Plays one chunk. May block for a bounded time while the device catches up.
    fn write(&mut self, samples: &[i16]) -> Result<()>;
}

/// Device that accepts and discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioDevice;

struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _samples: &[i16]) -> Result<()> {
        Ok(())
    }
}

impl AudioDevice for NullAudioDevice {
    fn open(&self, _format: AudioFormat) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(NullSink))
    }
}

/// Default output device of the host, through cpal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalDevice;

/// Longest time a write waits for room in the stream buffer.
const CPAL_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

struct CpalSink {
    producer: HeapProd<f32>,
    source_rate: u32,
    device_rate: u32,
    scratch: Vec<f32>,
    _stream: cpal::Stream,
}

impl AudioDevice for CpalDevice {
    fn open(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no default output device")?;

        let supported_config = device
            .default_output_config()
            .context("no default output config")?;

        let sample_format = supported_config.sample_format();
        if sample_format != SampleFormat::F32 {
            anyhow::bail!("only f32 output format is supported, got {sample_format:?}");
        }

        let config: cpal::StreamConfig = supported_config.into();
        let device_rate = config.sample_rate;
        let channels = config.channels as usize;

        // Room for four chunks at the device rate.
        let chunk_frames = format.chunk_frames() as u64 * u64::from(device_rate)
            / u64::from(format.sample_rate.max(1));
        let capacity = (chunk_frames as usize * CHANNELS * 4).max(CHANNELS);
        let (producer, mut consumer) = HeapRb::<f32>::new(capacity).split();

        let err_fn = |err| warn!("audio stream error: {err}");

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    for frame in data.chunks_mut(channels.max(1)) {
                        let left = consumer.try_pop().unwrap_or(0.0);
                        let right = consumer.try_pop().unwrap_or(left);

                        match frame.len() {
                            0 => {}
                            1 => frame[0] = (left + right) * 0.5,
                            _ => {
                                frame[0] = left;
                                frame[1] = right;
                                for ch in &mut frame[2..] {
                                    *ch = right;
                                }
                            }
                        }
                    }
                },
                err_fn,
                None,
            )
            .context("failed to build output stream")?;

        stream.play().context("failed to start output stream")?;
        debug!(device_rate, channels, "audio stream opened");

        Ok(Box::new(CpalSink {
            producer,
            source_rate: format.sample_rate.max(1),
            device_rate,
            scratch: Vec::with_capacity(capacity),
            _stream: stream,
        }))
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        resample_nearest(samples, self.source_rate, self.device_rate, &mut self.scratch);

        let deadline = Instant::now() + CPAL_WRITE_TIMEOUT;
        let mut written = 0;
        while written < self.scratch.len() {
            written += self.producer.push_slice(&self.scratch[written..]);
            if written == self.scratch.len() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(EMPTY_POLL);
        }
        Ok(())
    }
}

/// Converts interleaved stereo `i16` to `f32` at another rate, picking the
/// nearest earlier source frame for each output frame.
fn resample_nearest(input: &[i16], from: u32, to: u32, out: &mut Vec<f32>) {
    out.clear();
    let frames_in = input.len() / CHANNELS;
    if frames_in == 0 {
        return;
    }
    let frames_out = (frames_in as u64 * u64::from(to) / u64::from(from.max(1))) as usize;

    for i in 0..frames_out {
        let src = ((i as u64 * u64::from(from)) / u64::from(to.max(1))) as usize;
        let src = src.min(frames_in - 1) * CHANNELS;
        out.push(f32::from(input[src]) / 32768.0);
        out.push(f32::from(input[src + 1]) / 32768.0);
    }
}

/// Body of the audio worker.
///
/// Opens the device, then moves chunks from the ring to the device until
/// asked to stop. When the device cannot be opened the ring is closed, the
/// failure is reported once and the worker exits.
pub(crate) fn consume_loop(
    ctx: &WorkerContext,
    mut ring: ChunkConsumer,
    device: &dyn AudioDevice,
    format: AudioFormat,
    notify: &Sender<RuntimeNotification>,
) {
    let mut sink = match device.open(format) {
        Ok(sink) => sink,
        Err(err) => {
            warn!("audio unavailable: {err:#}");
            ring.close();
            let _ = notify.send(RuntimeNotification::AudioUnavailable {
                error: format!("{err:#}"),
            });
            return;
        }
    };

    let mut chunk = vec![0i16; ring.chunk_len()];
    let mut write_failed = false;
    while ctx.should_run() {
        if ring.try_consume(&mut chunk) {
            match sink.write(&chunk) {
                Ok(()) => write_failed = false,
                Err(err) => {
                    if !write_failed {
                        warn!("audio write failed: {err:#}");
                    }
                    write_failed = true;
                }
            }
        } else if !ctx.sleep(EMPTY_POLL) {
            break;
        }
    }
    debug!(stats = ?ring.stats(), "audio worker exiting");
}
