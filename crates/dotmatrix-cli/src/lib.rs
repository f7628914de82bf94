//! Host side of the emulator: configuration, save files and the worker
//! thread that owns a [`dotmatrix_core::gameboy::GameBoy`].

pub mod config;
pub mod error;
pub mod runtime;
pub mod saves;

pub use error::RuntimeError;
