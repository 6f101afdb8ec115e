use std::path::PathBuf;

use clap::Parser;

/// Runs a gbloop session without a display, against a built-in test-pattern engine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// ROM image; its `.sav` file receives cartridge RAM
    pub rom: Option<PathBuf>,

    /// Settings file (TOML). Missing files fall back to defaults.
    #[arg(long, default_value = "gbloop.toml")]
    pub config: PathBuf,

    /// Stop after this many frames
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Play audio on the default output device
    #[arg(long)]
    pub audio: bool,

    /// Cartridge RAM size in bytes
    #[arg(long, default_value_t = 0x2000)]
    pub ram_size: usize,

    /// Raise an invalid-opcode fault on this frame
    #[arg(long)]
    pub fault_at: Option<u64>,

    /// Display size as WIDTHxHEIGHT
    #[arg(long, default_value = "320x240", value_parser = parse_size)]
    pub display: (usize, usize),

    /// Press a key as FRAME:KEYCODE (decimal or 0x hex); repeatable
    #[arg(long = "press", value_name = "FRAME:KEY", value_parser = parse_press)]
    pub presses: Vec<KeyPress>,
}

/// A key pressed by the command line on a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub frame: u64,
    pub code: u16,
}

fn parse_press(text: &str) -> Result<KeyPress, String> {
    let (frame, code) = text
        .split_once(':')
        .ok_or_else(|| format!("expected FRAME:KEY, got {text:?}"))?;
    let frame = frame.parse().map_err(|err| format!("bad frame: {err}"))?;
    let code = match code.strip_prefix("0x").or_else(|| code.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => code.parse(),
    }
    .map_err(|err| format!("bad key code: {err}"))?;
    Ok(KeyPress { frame, code })
}

fn parse_size(text: &str) -> Result<(usize, usize), String> {
    let (w, h) = text
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let w = w.parse().map_err(|err| format!("bad width: {err}"))?;
    let h = h.parse().map_err(|err| format!("bad height: {err}"))?;
    Ok((w, h))
}
