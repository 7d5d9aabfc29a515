//! Wasmtime engine configuration and the engine entry points.
//!
//! The [`WasmEngine`] is the foundation of a session. It is:
//! - Cheap to clone and shared by every module and instance of a session
//! - Configured once from [`RuntimeConfig`]
//! - The only way into the engine: every fallible operation runs under the
//!   global engine lock and records its failure in [`last_error`](crate::last_error)

use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, const_reentrant_mutex};
use tracing::{debug, info, instrument};
use wasmtime::{Config, Engine, InstanceAllocationStrategy, PoolingAllocationConfig, Trap};

use wasm_lua_common::{EngineConfig, ExecutionConfig, OptLevel, RuntimeConfig, RuntimeError};

use crate::imports::ImportObject;
use crate::instance::Instance;
use crate::last_error;
use crate::module::CompiledModule;

/// Serializes every engine entry point of the process.
///
/// Reentrant so that host callbacks running inside a guest call may call
/// back into the engine on the same thread.
static ENGINE_LOCK: ReentrantMutex<()> = const_reentrant_mutex(());

/// Acquire the global engine lock.
///
/// Engine entry points take this lock themselves. Hold it explicitly to make
/// a sequence of calls atomic, for example a failing call followed by the
/// read of [`last_error::take_last_error`].
pub fn lock_engine() -> ReentrantMutexGuard<'static, ()> {
    ENGINE_LOCK.lock()
}

/// Run one engine operation under the engine lock.
///
/// A failure is written to the last-error register before it is returned.
pub(crate) fn engine_call<R>(
    operation: &'static str,
    f: impl FnOnce() -> Result<R, RuntimeError>,
) -> Result<R, RuntimeError> {
    let _guard = lock_engine();
    let result = f();
    if let Err(err) = &result {
        debug!(operation, error = %err, "Engine call failed");
        last_error::record(err);
    }
    result
}

/// Render an engine error for the last-error register.
///
/// Traps display as their trap code; everything else includes its context chain.
pub(crate) fn describe_error(error: &wasmtime::Error) -> String {
    match error.downcast_ref::<Trap>() {
        Some(trap) => {
            let text = trap.to_string();
            match text.strip_prefix("wasm trap: ") {
                Some(code) => code.to_string(),
                None => text,
            }
        }
        None => format!("{error:#}"),
    }
}

/// Thread-safe WebAssembly engine wrapper.
///
/// # Example
///
/// ```ignore
/// use wasm_lua_common::RuntimeConfig;
/// use wasm_lua_core::{ImportObject, WasmEngine};
///
/// let engine = WasmEngine::new(&RuntimeConfig::default())?;
/// let instance = engine.instantiate_bytes(&bytes, &ImportObject::new())?;
/// ```
#[derive(Clone)]
pub struct WasmEngine {
    engine: Arc<Engine>,
    config: RuntimeConfig,
}

impl WasmEngine {
    /// Create a new WebAssembly engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime configuration is invalid or the
    /// pooling allocator cannot be initialized.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let mut wasmtime_config = Config::new();

        // Fuel is refilled before each export call
        wasmtime_config.consume_fuel(config.execution.fuel_metering);

        wasmtime_config.cranelift_opt_level(match config.engine.opt_level {
            OptLevel::None => wasmtime::OptLevel::None,
            OptLevel::Speed => wasmtime::OptLevel::Speed,
            OptLevel::SpeedAndSize => wasmtime::OptLevel::SpeedAndSize,
        });

        wasmtime_config.max_wasm_stack((config.engine.max_wasm_stack_kb as usize) * 1024);

        if config.engine.pooling_allocator {
            let pooling_config = Self::create_pooling_config(&config.engine);

            wasmtime_config
                .allocation_strategy(InstanceAllocationStrategy::Pooling(pooling_config));

            info!(
                max_instances = config.engine.max_instances,
                instance_memory_mb = config.engine.instance_memory_mb,
                "Pooling allocator enabled"
            );
        }

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            RuntimeError::invalid_config(format!("Failed to create Wasmtime engine: {e}"))
        })?;

        debug!(
            fuel_metering = config.execution.fuel_metering,
            "Wasmtime engine initialized"
        );

        Ok(Self {
            engine: Arc::new(engine),
            config: config.clone(),
        })
    }

    /// Create pooling allocation configuration.
    fn create_pooling_config(config: &EngineConfig) -> PoolingAllocationConfig {
        let mut pooling = PoolingAllocationConfig::default();

        pooling.total_core_instances(config.max_instances);
        pooling.total_memories(config.max_instances);
        pooling.total_tables(config.max_instances);

        let max_memory_bytes = (config.instance_memory_mb as usize) * 1024 * 1024;
        pooling.max_memory_size(max_memory_bytes);

        pooling
    }

    /// Compile bytecode into a module.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn compile(&self, bytes: &[u8]) -> Result<CompiledModule, RuntimeError> {
        engine_call("compile", || CompiledModule::from_bytes(&self.engine, bytes))
    }

    /// Validate bytecode without keeping a compiled module.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn validate(&self, bytes: &[u8]) -> Result<(), RuntimeError> {
        engine_call("validate", || CompiledModule::validate(&self.engine, bytes))
    }

    /// Instantiate an already compiled module.
    #[instrument(skip_all, fields(content_hash = %module.content_hash(), imports = imports.len()))]
    pub fn instantiate(
        &self,
        module: &CompiledModule,
        imports: &ImportObject,
    ) -> Result<Instance, RuntimeError> {
        engine_call("instantiate", || Instance::new(self, module, imports))
    }

    /// Compile and instantiate bytecode in one step.
    ///
    /// Equivalent to [`compile`](Self::compile) followed by
    /// [`instantiate`](Self::instantiate); the intermediate module is dropped.
    #[instrument(skip_all, fields(bytes_len = bytes.len(), imports = imports.len()))]
    pub fn instantiate_bytes(
        &self,
        bytes: &[u8],
        imports: &ImportObject,
    ) -> Result<Instance, RuntimeError> {
        engine_call("instantiate", || {
            let module = CompiledModule::from_bytes(&self.engine, bytes)?;
            Instance::new(self, &module, imports)
        })
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the per-instance execution configuration.
    pub fn execution(&self) -> &ExecutionConfig {
        &self.config.execution
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("pooling_allocator", &self.config.engine.pooling_allocator)
            .field("opt_level", &self.config.engine.opt_level)
            .field("fuel_metering", &self.config.execution.fuel_metering)
            .finish_non_exhaustive()
    }
}
