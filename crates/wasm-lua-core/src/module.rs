//! WebAssembly module compilation and inspection.
//!
//! This module provides [`CompiledModule`], a wrapper around Wasmtime's
//! [`Module`] that validates the bytecode header before compiling and
//! reports the module's declared imports and exports as descriptors.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Instant;

use tracing::{info, instrument};
use wasmtime::{Engine, ExternType, FuncType, Module};

use wasm_lua_common::RuntimeError;

use crate::value::FuncSignature;

/// Kind tag of an import or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternKind {
    Function,
    Global,
    Memory,
    Table,
}

impl ExternKind {
    /// Map an engine extern type.
    ///
    /// # Panics
    ///
    /// Panics if the engine reports a kind outside function, global, memory
    /// and table; that is a broken engine contract, not a user error.
    pub fn from_extern_type(ty: &ExternType) -> Self {
        match ty {
            ExternType::Func(_) => Self::Function,
            ExternType::Global(_) => Self::Global,
            ExternType::Memory(_) => Self::Memory,
            ExternType::Table(_) => Self::Table,
            #[allow(unreachable_patterns)]
            _ => panic!("engine reported an extern of unknown kind"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Global => "global",
            Self::Memory => "memory",
            Self::Table => "table",
        }
    }

    /// Presence marker shown for non-callable exports.
    ///
    /// Functions have none; they are exposed as callables.
    pub fn marker(self) -> Option<&'static str> {
        match self {
            Self::Function => None,
            Self::Global => Some("<global>"),
            Self::Memory => Some("<memory>"),
            Self::Table => Some("<table>"),
        }
    }
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One import requirement declared by a module.
#[derive(Debug, Clone)]
pub struct ImportDescriptor {
    /// Name of the module the import comes from (e.g. `env`).
    pub module: String,
    /// Field name within that module.
    pub name: String,
    pub kind: ExternKind,
    func_type: Option<FuncType>,
}

impl ImportDescriptor {
    /// Engine function type, for function imports.
    pub fn func_type(&self) -> Option<&FuncType> {
        self.func_type.as_ref()
    }

    /// Declared signature, for function imports.
    ///
    /// The inner error names the first unsupported value type.
    pub fn signature(&self) -> Option<Result<FuncSignature, String>> {
        self.func_type.as_ref().map(FuncSignature::from_func_type)
    }
}

/// One export declared by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescriptor {
    pub name: String,
    pub kind: ExternKind,
}

/// A compiled WebAssembly module.
///
/// `CompiledModule` is cheap to clone and thread-safe; instances created from
/// it do not borrow it, so it may be dropped before them.
#[derive(Clone)]
pub struct CompiledModule {
    module: Module,

    /// Hash of the original Wasm bytes.
    content_hash: String,
}

impl CompiledModule {
    /// Compile a core module from WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::CompilationFailed`] for a bad header or if the
    /// engine rejects the module.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        Self::validate_wasm_header(bytes)?;

        let module = Module::from_binary(engine, bytes).map_err(|e| {
            RuntimeError::compilation_failed(format!("Core module compilation failed: {e:#}"))
        })?;

        let content_hash = compute_hash(bytes);
        let duration = start.elapsed();

        info!(
            content_hash = %content_hash,
            duration_ms = duration.as_millis(),
            "Core module compiled"
        );

        Ok(Self {
            module,
            content_hash,
        })
    }

    /// Validate WebAssembly bytes without compiling them.
    pub fn validate(engine: &Engine, bytes: &[u8]) -> Result<(), RuntimeError> {
        Self::validate_wasm_header(bytes)?;

        Module::validate(engine, bytes).map_err(|e| {
            RuntimeError::compilation_failed(format!("Module validation failed: {e:#}"))
        })
    }

    /// Declared imports, in declaration order.
    pub fn imports(&self) -> Vec<ImportDescriptor> {
        self.module
            .imports()
            .map(|import| {
                let ty = import.ty();
                ImportDescriptor {
                    module: import.module().to_string(),
                    name: import.name().to_string(),
                    kind: ExternKind::from_extern_type(&ty),
                    func_type: ty.func().cloned(),
                }
            })
            .collect()
    }

    /// Declared exports, in declaration order.
    pub fn exports(&self) -> Vec<ExportDescriptor> {
        self.module
            .exports()
            .map(|export| ExportDescriptor {
                name: export.name().to_string(),
                kind: ExternKind::from_extern_type(&export.ty()),
            })
            .collect()
    }

    /// Get the content hash of the original Wasm bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get the inner Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.module
    }

    /// Validate WebAssembly header (magic number).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), RuntimeError> {
        if bytes.len() < 8 {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: file too small",
            ));
        }

        // Check magic number: \0asm
        if &bytes[0..4] != b"\0asm" {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: bad magic number",
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Translate WebAssembly text format into binary bytecode.
///
/// Binary input is passed through unchanged.
pub fn wat_to_binary(text: impl AsRef<[u8]>) -> Result<Vec<u8>, RuntimeError> {
    wat::parse_bytes(text.as_ref())
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| RuntimeError::compilation_failed(format!("WAT parse failed: {e}")))
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
