//! Cartridge RAM persistence.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::runtime::RuntimeError;

pub const RECOVERY_FILE_NAME: &str = "recovery.sav";

/// Save file next to a ROM: the extension is replaced by `.sav`.
pub fn save_path_for(rom: &Path) -> PathBuf {
    rom.with_extension("sav")
}

/// Emergency dump location, beside the regular save file.
pub fn recovery_path_for(save: &Path) -> PathBuf {
    save.with_file_name(RECOVERY_FILE_NAME)
}

/// Reads `size` bytes of cartridge RAM. Missing files and short files are
/// padded with zeros.
pub fn load_save_ram(path: &Path, size: usize) -> Result<Vec<u8>, RuntimeError> {
    let mut ram = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no save file");
            Vec::new()
        }
        Err(source) => {
            return Err(RuntimeError::SaveRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if ram.len() != size {
        debug!(path = %path.display(), found = ram.len(), size, "resizing save data");
    }
    ram.resize(size, 0);
    Ok(ram)
}

/// Writes cartridge RAM. Nothing is written for cartridges without RAM.
pub fn write_save(path: &Path, ram: &[u8]) -> Result<(), RuntimeError> {
    if ram.is_empty() {
        return Ok(());
    }
    fs::write(path, ram).map_err(|source| {
        warn!(path = %path.display(), "failed to write save: {source}");
        RuntimeError::SaveWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!(path = %path.display(), bytes = ram.len(), "save written");
    Ok(())
}
