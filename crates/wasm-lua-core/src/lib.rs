//! Wasmtime embedding contract for wasm-lua.
//!
//! This crate owns everything that talks to the engine and knows nothing
//! about Lua:
//! - [`WasmEngine`]: Configured Wasmtime engine and the global engine lock
//! - [`CompiledModule`]: Compiled, not yet instantiated module
//! - [`Instance`]: Instantiated module owning its store
//! - [`ExportTable`] / [`ExportFunction`]: Enumerated exports and the call primitive
//! - [`Value`] / [`ValueKind`]: The four primitive WebAssembly value kinds
//! - [`Handle`]: Owning handle with idempotent release
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     WasmEngine                          │
//! │  (Shared by every handle of a session)                  │
//! │  - Global engine lock + last-error register             │
//! └─────────────────────────────────────────────────────────┘
//!                            │ compile
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   CompiledModule                        │
//! │  - Import / export descriptors                          │
//! └─────────────────────────────────────────────────────────┘
//!                            │ instantiate (+ ImportObject)
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │            Instance = Arc<Mutex<Store + Instance>>      │
//! └─────────────────────────────────────────────────────────┘
//!                            │ exports
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │   ExportTable (holds the store alive)                   │
//! │   └── ExportFunction = (Arc<ExportTable>, index)        │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod exports;
pub mod handle;
pub mod imports;
pub mod instance;
pub mod last_error;
pub mod module;
pub mod store;
pub mod value;

pub use engine::{WasmEngine, lock_engine};
pub use exports::{Export, ExportFunction, ExportTable};
pub use handle::Handle;
pub use imports::{HostCallback, ImportObject};
pub use instance::Instance;
pub use module::{CompiledModule, ExportDescriptor, ExternKind, ImportDescriptor, wat_to_binary};
pub use store::{ExecutionMetrics, HostState};
pub use value::{FuncSignature, Value, ValueKind};
