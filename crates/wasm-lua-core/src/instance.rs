//! Instantiated WebAssembly modules.
//!
//! An [`Instance`] owns its Wasmtime store behind a mutex shared with every
//! [`ExportTable`] built from it. Dropping the `Instance` therefore never
//! invalidates a live export table; the store goes away with the last owner.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use wasmtime::{Linker, Store};

use wasm_lua_common::{ExecutionConfig, RuntimeError};

use crate::WasmEngine;
use crate::engine::{describe_error, engine_call};
use crate::exports::ExportTable;
use crate::imports::ImportObject;
use crate::module::CompiledModule;
use crate::store::{ExecutionMetrics, HostState, create_store};

/// Store and instance, always locked together.
pub(crate) struct InstanceState {
    pub(crate) store: Store<HostState>,
    pub(crate) instance: wasmtime::Instance,
    pub(crate) execution: ExecutionConfig,
}

/// A live, runnable instance.
#[derive(Clone)]
pub struct Instance {
    state: Arc<Mutex<InstanceState>>,
    content_hash: String,
}

impl Instance {
    /// Instantiate `module` in a fresh store.
    ///
    /// Callers go through [`WasmEngine::instantiate`], which holds the engine lock.
    pub(crate) fn new(
        engine: &WasmEngine,
        module: &CompiledModule,
        imports: &ImportObject,
    ) -> Result<Self, RuntimeError> {
        let mut store = create_store(engine)?;

        let mut linker = Linker::new(engine.inner());
        imports.define(&mut linker, module)?;

        let instance = linker
            .instantiate(&mut store, module.inner())
            .map_err(|e| RuntimeError::instantiation_failed(describe_error(&e)))?;

        debug!(content_hash = %module.content_hash(), "Module instantiated");

        Ok(Self {
            state: Arc::new(Mutex::new(InstanceState {
                store,
                instance,
                execution: engine.execution().clone(),
            })),
            content_hash: module.content_hash().to_string(),
        })
    }

    /// Enumerate the instance's exports.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InstanceBusy`] when called from inside a call
    /// on this same instance.
    pub fn exports(&self) -> Result<ExportTable, RuntimeError> {
        engine_call("exports", || ExportTable::build(Arc::clone(&self.state)))
    }

    /// Counters accumulated by export calls.
    pub fn metrics(&self) -> Result<ExecutionMetrics, RuntimeError> {
        self.state
            .try_lock()
            .map(|state| state.store.data().metrics)
            .ok_or(RuntimeError::InstanceBusy)
    }

    /// Hash of the bytecode this instance was created from.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}
