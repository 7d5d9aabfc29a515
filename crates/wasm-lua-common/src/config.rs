//! Configuration structures for wasm-lua.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (allocator, optimization)
//! - [`ExecutionConfig`]: Per-instance execution limits (fuel, memory)

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// It can be loaded from files (TOML, JSON) or built in code.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-instance execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Cranelift optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimizations, fastest compilation.
    None,
    /// Optimize for execution speed.
    #[default]
    Speed,
    /// Optimize for speed and code size.
    SpeedAndSize,
}

/// Wasmtime engine configuration.
///
/// These settings are shared by every module compiled in a session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable pooling allocator for instance creation.
    ///
    /// Scripts usually create a handful of instances, so this is off by
    /// default; the pool reserves address space up front.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Cranelift optimization level.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Maximum native stack in kilobytes available to guest code.
    #[serde(default = "defaults::max_wasm_stack_kb")]
    pub max_wasm_stack_kb: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            opt_level: OptLevel::default(),
            max_wasm_stack_kb: defaults::max_wasm_stack_kb(),
        }
    }
}

/// Per-instance execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Fuel granted to each export call.
    ///
    /// The store is refilled to this amount before every call, so the
    /// budget is per call rather than per instance lifetime.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Enable fuel metering.
    #[serde(default = "defaults::fuel_metering")]
    pub fuel_metering: bool,

    /// Maximum linear memory in megabytes.
    #[serde(default = "defaults::max_memory_mb")]
    pub max_memory_mb: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_fuel: defaults::max_fuel(),
            fuel_metering: defaults::fuel_metering(),
            max_memory_mb: defaults::max_memory_mb(),
        }
    }
}

impl ExecutionConfig {
    /// Get the memory limit in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_mb as usize) * 1024 * 1024
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn pooling_allocator() -> bool {
        false
    }

    pub const fn max_instances() -> u32 {
        100
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub const fn max_wasm_stack_kb() -> u32 {
        512
    }

    pub const fn max_fuel() -> u64 {
        10_000_000
    }

    pub const fn fuel_metering() -> bool {
        false
    }

    pub const fn max_memory_mb() -> u32 {
        128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert!(!config.engine.pooling_allocator);
        assert_eq!(config.engine.max_instances, 100);
        assert_eq!(config.engine.instance_memory_mb, 64);
        assert_eq!(config.engine.opt_level, OptLevel::Speed);
        assert_eq!(config.engine.max_wasm_stack_kb, 512);

        assert_eq!(config.execution.max_fuel, 10_000_000);
        assert!(!config.execution.fuel_metering);
        assert_eq!(config.execution.max_memory_mb, 128);
    }

    #[test]
    fn test_config_serialization() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            config.engine.max_instances,
            deserialized.engine.max_instances
        );
        assert_eq!(config.execution.max_fuel, deserialized.execution.max_fuel);
    }

    #[test]
    fn test_max_memory_bytes() {
        let config = ExecutionConfig {
            max_memory_mb: 2,
            ..Default::default()
        };

        assert_eq!(config.max_memory_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"engine": {"opt_level": "none"}, "execution": {"fuel_metering": true}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.engine.opt_level, OptLevel::None);
        assert!(config.execution.fuel_metering);
        // Default values for unspecified fields
        assert!(!config.engine.pooling_allocator);
        assert_eq!(config.execution.max_fuel, 10_000_000);
    }
}
