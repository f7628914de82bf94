use std::path::PathBuf;

use dotmatrix_core::error::CartridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load ROM: {0}")]
    Cartridge(#[from] CartridgeError),

    #[error("save file {} is {actual} bytes, cartridge expects {expected}", path.display())]
    SaveSizeMismatch {
        path: PathBuf,
        actual: usize,
        expected: usize,
    },

    #[error("failed to serialize config: {0}")]
    Config(#[from] toml::ser::Error),

    #[error("emulation stopped: {0}")]
    Emulation(String),

    #[error("no ROM loaded")]
    NoRom,

    #[error("emulator worker is no longer running")]
    Disconnected,

    #[error("failed to start emulator worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("unexpected worker response: {0}")]
    UnexpectedResponse(String),
}

impl RuntimeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
