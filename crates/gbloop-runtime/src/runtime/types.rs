use std::{fmt, io, path::PathBuf};

use crate::engine::FaultKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeNotification {
    /// The audio worker could not open its device and exited.
    AudioUnavailable { error: String },
}

/// Everything shown to the user after a fatal emulation fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    pub kind: FaultKind,
    pub address: u16,
    /// Selected ROM bank, for addresses in the switchable window.
    pub bank: Option<u16>,
    pub cart_mode: u8,
    pub file_offset: Option<u32>,
    pub instruction: u8,
    /// Where cartridge RAM was dumped, when the dump succeeded.
    pub recovery_path: Option<PathBuf>,
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {} at 0x{:04X}", self.kind, self.address)?;
        if let (Some(bank), Some(offset)) = (self.bank, self.file_offset) {
            write!(
                f,
                " (bank {bank} mode {}, file offset {offset})",
                self.cart_mode
            )?;
        }
        writeln!(f, " with instruction {:02X}.", self.instruction)?;
        match self.recovery_path.as_deref().and_then(|p| p.file_name()) {
            Some(name) => writeln!(f, "Cart RAM saved to {}", name.to_string_lossy())?,
            None => writeln!(f, "Cart RAM could not be saved")?,
        }
        f.write_str("Exiting.")
    }
}

/// Outcome of a session that ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub frames: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to read save file: {path}: {source}")]
    SaveRead { path: PathBuf, source: io::Error },
    #[error("failed to write save file: {path}: {source}")]
    SaveWrite { path: PathBuf, source: io::Error },
    #[error("display surface is {width}x{height}, smaller than one pixel")]
    UnsupportedSurface { width: usize, height: usize },
    #[error("failed to spawn {worker} worker: {source}")]
    WorkerSpawn {
        worker: &'static str,
        source: io::Error,
    },
    #[error("{0}")]
    EmulationFault(FaultReport),
}
