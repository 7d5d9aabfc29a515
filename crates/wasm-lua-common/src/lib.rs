//! Common types, errors, and configuration for wasm-lua.
//!
//! This crate provides shared functionality used across the wasm-lua workspace:
//! - Error types using `thiserror`, classified by how the Lua binding surfaces them
//! - Configuration structures for the engine and per-instance execution limits
//! - TOML configuration file loading for the command-line runner

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, OptLevel, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, LoggingConfig};
pub use error::RuntimeError;
