#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use gbloop_runtime::{
    AudioDevice, AudioFormat, AudioSink, Cartridge, Clock, Dialogs, Engine, EngineFault,
    FaultReport, FrameContext, KeyEvent, KeyRepeatConfig, KeySource, NullAudioDevice, Platform,
    SystemClock, video::LCD_HEIGHT,
};
use parking_lot::Mutex;

pub const USER_REPEAT: KeyRepeatConfig = KeyRepeatConfig {
    delay: 500,
    interval: 40,
    single_shot: false,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Key queue the test pushes events into.
pub struct ScriptedKeys {
    events: Mutex<VecDeque<KeyEvent>>,
    repeat: Mutex<KeyRepeatConfig>,
}

impl ScriptedKeys {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(USER_REPEAT),
        })
    }

    pub fn press(&self, code: u16) {
        self.events.lock().push_back(KeyEvent::down(code));
    }

    pub fn release(&self, code: u16) {
        self.events.lock().push_back(KeyEvent::up(code));
    }
}

impl KeySource for ScriptedKeys {
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

/// Clock whose sleeps only advance virtual time.
#[derive(Default)]
pub struct InstantClock {
    millis: AtomicU64,
}

impl Clock for InstantClock {
    fn ticks(&self) -> u64 {
        self.millis.load(Ordering::Relaxed)
    }

    fn wall_millis(&self) -> u16 {
        (self.millis.load(Ordering::Relaxed) % 1000) as u16
    }

    fn sleep_ms(&self, ms: u32) {
        self.millis.fetch_add(u64::from(ms), Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct DeviceLog {
    pub opens: AtomicUsize,
    pub chunks: AtomicUsize,
}

pub struct RecordingDevice(pub Arc<DeviceLog>);

struct RecordingSink(Arc<DeviceLog>);

impl AudioSink for RecordingSink {
    fn write(&mut self, _samples: &[i16]) -> anyhow::Result<()> {
        self.0.chunks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl AudioDevice for RecordingDevice {
    fn open(&self, _format: AudioFormat) -> anyhow::Result<Box<dyn AudioSink>> {
        self.0.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(RecordingSink(Arc::clone(&self.0))))
    }
}

pub struct BrokenDevice;

impl AudioDevice for BrokenDevice {
    fn open(&self, _format: AudioFormat) -> anyhow::Result<Box<dyn AudioSink>> {
        anyhow::bail!("device busy")
    }
}

#[derive(Default)]
pub struct DialogLog {
    pub confirms: AtomicUsize,
    pub faults: Mutex<Vec<FaultReport>>,
}

/// Answers quit confirmations from a script; `true` once the script runs out.
pub struct ScriptedDialogs {
    answers: VecDeque<bool>,
    log: Arc<DialogLog>,
}

impl ScriptedDialogs {
    pub fn new(answers: &[bool], log: Arc<DialogLog>) -> Box<Self> {
        Box::new(Self {
            answers: answers.iter().copied().collect(),
            log,
        })
    }
}

impl Dialogs for ScriptedDialogs {
    fn confirm_quit(&mut self) -> bool {
        self.log.confirms.fetch_add(1, Ordering::SeqCst);
        self.answers.pop_front().unwrap_or(true)
    }

    fn report_fault(&mut self, report: &FaultReport) {
        self.log.faults.lock().push(report.clone());
    }
}

pub fn platform(
    keys: Arc<ScriptedKeys>,
    audio: Arc<dyn AudioDevice>,
    dialogs: Box<dyn Dialogs>,
) -> Platform {
    Platform {
        clock: Arc::new(SystemClock::new()),
        keys,
        audio,
        dialogs,
    }
}

/// Platform on virtual time, so frame pacing never blocks the test.
pub fn instant_platform(keys: Arc<ScriptedKeys>) -> Platform {
    Platform {
        clock: Arc::new(InstantClock::default()),
        keys,
        audio: Arc::new(NullAudioDevice),
        dialogs: ScriptedDialogs::new(&[], Arc::new(DialogLog::default())),
    }
}

type FrameHook = Box<dyn FnMut(u64, &mut Cartridge) -> Result<(), EngineFault>>;

/// Engine stand-in that draws a gradient and runs a per-frame hook.
pub struct FakeEngine {
    pub frames: u64,
    pub joypads: Vec<u8>,
    pub resets: u32,
    pub rtc_sets: u32,
    pub rtc_ticks: u32,
    pub interlace: bool,
    pub frame_skip: bool,
    pub bank: u16,
    pub draw: bool,
    hook: FrameHook,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            frames: 0,
            joypads: Vec::new(),
            resets: 0,
            rtc_sets: 0,
            rtc_ticks: 0,
            interlace: false,
            frame_skip: false,
            bank: 1,
            draw: true,
            hook: Box::new(|_, _| Ok(())),
        }
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(u64, &mut Cartridge) -> Result<(), EngineFault> + 'static,
    {
        self.hook = Box::new(hook);
        self
    }
}

impl Engine for FakeEngine {
    fn run_frame(&mut self, ctx: FrameContext<'_>) -> Result<(), EngineFault> {
        self.frames += 1;
        self.joypads.push(ctx.joypad);
        (self.hook)(self.frames, ctx.cart)?;
        if self.draw {
            for line in 0..LCD_HEIGHT {
                let shade = ((line + self.frames as usize) % 4) as u8;
                ctx.lcd.draw_line(&[shade; 160], line);
            }
        }
        Ok(())
    }

    fn render_audio(&mut self, out: &mut [i16]) {
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = ((i as i64 * 97 + self.frames as i64) % 2000 - 1000) as i16;
        }
    }

    fn reset(&mut self) {
        self.resets += 1;
    }

    fn set_rtc(&mut self, _now: SystemTime) {
        self.rtc_sets += 1;
    }

    fn tick_rtc(&mut self) {
        self.rtc_ticks += 1;
    }

    fn peek(&mut self, cart: &Cartridge, addr: u16) -> u8 {
        if addr >= 0x4000 {
            cart.rom_read(u32::from(self.bank) * 0x4000 + u32::from(addr - 0x4000))
        } else {
            cart.rom_read(u32::from(addr))
        }
    }

    fn selected_rom_bank(&self) -> u16 {
        self.bank
    }

    fn cart_mode(&self) -> u8 {
        0
    }

    fn set_interlace(&mut self, enabled: bool) {
        self.interlace = enabled;
    }

    fn set_frame_skip(&mut self, enabled: bool) {
        self.frame_skip = enabled;
    }
}

/// 64 KiB ROM whose bytes encode their own offset.
pub fn test_cart(ram_size: usize) -> Cartridge {
    let rom = (0..0x10000u32).map(|i| (i ^ (i >> 8)) as u8).collect();
    Cartridge::new(rom, vec![0; ram_size])
}
