//! Error types for wasm-lua.
//!
//! [`RuntimeError`] covers every failure of the embedding contract, from
//! compilation to export calls. Each variant belongs to one of three classes
//! that decide how the Lua binding surfaces it:
//!
//! - **Recoverable** engine failures (compile, instantiate, trap) become a
//!   `nil, message` pair.
//! - **Usage** errors (arity, argument type, released handle) are raised as
//!   Lua errors immediately.
//! - **Setup** errors (configuration) are returned to the Rust caller.

use thiserror::Error;

/// Top-level runtime errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// WebAssembly compilation failed (malformed or unsupported bytecode).
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// The module compiled but could not be instantiated.
    #[error("Instantiation failed: {reason}")]
    InstantiationFailed {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// A host-provided import could not be linked.
    #[error("Import `{module}::{name}` failed: {reason}")]
    ImportFailed {
        /// Module name of the import.
        module: String,
        /// Field name of the import.
        name: String,
        /// Why the import could not be provided.
        reason: String,
    },

    /// A WebAssembly trap occurred during execution.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
    },

    /// Execution exhausted the configured fuel limit.
    #[error("Fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// The instance is already executing a call on this thread.
    #[error("Instance is busy: re-entrant use of an executing instance")]
    InstanceBusy,

    /// Fewer arguments were supplied than the function declares.
    #[error("too few arguments; expected {expected}, but got {actual}")]
    Arity {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// An argument does not carry the declared value kind.
    #[error("type mismatch for argument #{position}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// 1-based argument position.
        position: usize,
        /// Declared value kind.
        expected: String,
        /// Supplied value kind.
        actual: String,
    },

    /// A signature uses a value type outside i32/i64/f32/f64.
    #[error("unsupported value type: {ty}")]
    UnsupportedType {
        /// The engine's name for the type.
        ty: String,
    },

    /// The handle's resource has already been released.
    #[error("{kind} has been released")]
    Released {
        /// What kind of handle was used.
        kind: &'static str,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl RuntimeError {
    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `InstantiationFailed` error.
    pub fn instantiation_failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `ImportFailed` error.
    pub fn import_failed(
        module: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ImportFailed {
            module: module.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
        }
    }

    /// Create a new `Arity` error.
    pub fn arity(expected: usize, actual: usize) -> Self {
        Self::Arity { expected, actual }
    }

    /// Create a new `UnsupportedType` error.
    pub fn unsupported_type(ty: impl Into<String>) -> Self {
        Self::UnsupportedType { ty: ty.into() }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is a caller usage error.
    ///
    /// Usage errors are raised immediately instead of being returned as a
    /// `nil, message` pair.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::Arity { .. }
                | Self::TypeMismatch { .. }
                | Self::UnsupportedType { .. }
                | Self::Released { .. }
        )
    }

    /// Returns `true` if this error happened while guest code was running.
    pub fn is_trap(&self) -> bool {
        matches!(self, Self::Trap { .. } | Self::FuelExhausted)
    }
}
