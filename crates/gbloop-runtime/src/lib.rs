//! Real-time execution core for a cycle-stepped handheld emulator.
//!
//! The engine that interprets instructions lives elsewhere and plugs in
//! through [`Engine`]. This crate keeps emulated frames aligned with wall
//! time, streams the engine's audio to the output device, rebuilds held
//! button state from a discrete key-event queue and composes scanlines onto
//! the display surface.

pub mod audio;
pub mod config;
pub mod engine;
pub mod input;
pub mod platform;
pub mod runtime;
pub mod save;
pub mod video;

pub use audio::{AudioDevice, AudioFormat, AudioSink, CpalDevice, NullAudioDevice, RingSnapshot};
pub use config::{Config, ConfigError};
pub use engine::{Cartridge, Engine, EngineFault, FaultKind, FrameContext, LineSink};
pub use input::{Hotkeys, KeyBinding, MultiPressMode, PadButtons};
pub use platform::{
    Clock, Dialogs, KeyEvent, KeyEventKind, KeyRepeatConfig, KeySource, Platform, SystemClock,
};
pub use runtime::{
    FaultReport, Runtime, RuntimeError, RuntimeNotification, SessionSummary, WorkerState,
};
pub use video::{Compositor, DisplaySurface, MemorySurface, PixelFormat, Rotation};
