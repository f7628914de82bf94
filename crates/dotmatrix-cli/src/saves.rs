//! Battery and RTC files: `<rom>.sav` and `<rom>.rtc`, either next to the
//! ROM or in a configured save directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dotmatrix_core::cartridge::SavePayload;
use log::{debug, info};

use crate::error::RuntimeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFiles {
    battery: PathBuf,
    rtc: PathBuf,
}

impl SaveFiles {
    pub fn for_rom(rom: &Path, save_dir: Option<&Path>) -> Self {
        let base = match (save_dir, rom.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => rom.to_path_buf(),
        };
        Self {
            battery: base.with_extension("sav"),
            rtc: base.with_extension("rtc"),
        }
    }

    pub fn battery_path(&self) -> &Path {
        &self.battery
    }

    pub fn rtc_path(&self) -> &Path {
        &self.rtc
    }

    /// Reads whatever save files exist. `None` when there are none. A
    /// battery file of the wrong size is an error; the RTC blob is passed
    /// through for the cartridge to validate.
    pub fn load(&self, expected_len: usize) -> Result<Option<SavePayload>, RuntimeError> {
        let battery = read_optional(&self.battery)?;
        let rtc = read_optional(&self.rtc)?;
        if battery.is_none() && rtc.is_none() {
            debug!("No save files at {}", self.battery.display());
            return Ok(None);
        }

        let battery = match battery {
            Some(bytes) if bytes.len() != expected_len => {
                return Err(RuntimeError::SaveSizeMismatch {
                    path: self.battery.clone(),
                    actual: bytes.len(),
                    expected: expected_len,
                });
            }
            Some(bytes) => bytes,
            None => vec![0; expected_len],
        };

        info!("Loaded save data from {}", self.battery.display());
        Ok(Some(SavePayload::new(battery, rtc)))
    }

    pub fn store(&self, payload: &SavePayload) -> Result<(), RuntimeError> {
        if let Some(dir) = self.battery.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|e| RuntimeError::io(dir, e))?;
        }

        if !payload.battery.is_empty() {
            std::fs::write(&self.battery, &payload.battery)
                .map_err(|e| RuntimeError::io(&self.battery, e))?;
        }
        if let Some(rtc) = &payload.rtc {
            std::fs::write(&self.rtc, rtc).map_err(|e| RuntimeError::io(&self.rtc, e))?;
        }
        debug!("Wrote save data to {}", self.battery.display());
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, RuntimeError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RuntimeError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_rom_name() {
        let files = SaveFiles::for_rom(Path::new("/roms/pokemon.gbc"), None);
        assert_eq!(files.battery_path(), Path::new("/roms/pokemon.sav"));
        assert_eq!(files.rtc_path(), Path::new("/roms/pokemon.rtc"));

        let files = SaveFiles::for_rom(Path::new("/roms/pokemon.gbc"), Some(Path::new("/saves")));
        assert_eq!(files.battery_path(), Path::new("/saves/pokemon.sav"));
    }
}
