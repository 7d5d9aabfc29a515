//! Per-instance store state.
//!
//! Every instance gets its own Wasmtime [`Store`]; this module provides the
//! data kept in it:
//! - [`HostState`]: Memory limits and execution metrics
//! - [`ExecutionMetrics`]: Counters updated by every export call

use wasmtime::{Store, StoreLimits, StoreLimitsBuilder};

use wasm_lua_common::{ExecutionConfig, RuntimeError};

use crate::WasmEngine;

/// Data stored alongside an instance.
pub struct HostState {
    limits: StoreLimits,

    /// Execution metrics.
    pub metrics: ExecutionMetrics,
}

/// Counters accumulated over an instance's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionMetrics {
    /// Export calls started.
    pub calls: u64,

    /// Calls that ended in a trap or host callback failure.
    pub traps: u64,

    /// Fuel consumed across all calls (0 without fuel metering).
    pub fuel_consumed: u64,
}

impl HostState {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            limits: StoreLimitsBuilder::new()
                .memory_size(config.max_memory_bytes())
                .build(),
            metrics: ExecutionMetrics::default(),
        }
    }
}

/// Create a new store configured from the engine's execution settings.
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(engine: &WasmEngine) -> Result<Store<HostState>, RuntimeError> {
    let config = engine.execution();
    let mut store = Store::new(engine.inner(), HostState::new(config));
    store.limiter(|state| &mut state.limits);

    // Fuel for start functions run during instantiation
    refuel(&mut store, config)?;

    Ok(store)
}

/// Reset the store's fuel to the configured per-call budget.
pub fn refuel(store: &mut Store<HostState>, config: &ExecutionConfig) -> Result<(), RuntimeError> {
    if config.fuel_metering {
        store
            .set_fuel(config.max_fuel)
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to set fuel: {e}")))?;
    }
    Ok(())
}

/// Get remaining fuel from a store.
pub fn get_remaining_fuel(store: &Store<HostState>) -> Option<u64> {
    store.get_fuel().ok()
}

/// Calculate fuel consumed.
pub fn calculate_fuel_consumed(initial_fuel: u64, store: &Store<HostState>) -> u64 {
    let remaining = get_remaining_fuel(store).unwrap_or(0);
    initial_fuel.saturating_sub(remaining)
}
