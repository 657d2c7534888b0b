use crate::core::kernel::ForceFlags;
use crate::core::models::locality::LocalityClass;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("Failed to parse pipeline configuration: {0}")]
    Parse(String),
}

/// The order in which a force step waits on the two locality classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitOrder {
    /// Non-local results gate the halo force exchange, so they are waited on first.
    #[default]
    NonLocalFirst,
    LocalFirst,
}

impl WaitOrder {
    pub fn sequence(self) -> [LocalityClass; 2] {
        match self {
            Self::NonLocalFirst => [LocalityClass::NonLocal, LocalityClass::Local],
            Self::LocalFirst => [LocalityClass::Local, LocalityClass::NonLocal],
        }
    }
}

/// Decides, per step, which optional kernel outputs are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ForceRequestPolicy {
    /// Request energies every this many steps; 0 never requests them.
    pub energy_interval: u64,
    /// Also request shift forces (for the virial) on energy steps.
    pub shift_forces_with_energy: bool,
}

impl Default for ForceRequestPolicy {
    fn default() -> Self {
        Self {
            energy_interval: 100,
            shift_forces_with_energy: true,
        }
    }
}

impl ForceRequestPolicy {
    pub fn flags_for_step(&self, step: u64) -> ForceFlags {
        if self.energy_interval == 0 || step % self.energy_interval != 0 {
            return ForceFlags::empty();
        }
        if self.shift_forces_with_energy {
            ForceFlags::ENERGY | ForceFlags::SHIFT_FORCES
        } else {
            ForceFlags::ENERGY
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PipelineConfig {
    pub wait_order: WaitOrder,
    pub force_requests: ForceRequestPolicy,
    /// Device memory budget in bytes; `None` is unbounded.
    pub device_memory_limit: Option<usize>,
    /// Over-allocation applied whenever a device buffer has to grow.
    pub buffer_growth_factor: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            wait_order: WaitOrder::default(),
            force_requests: ForceRequestPolicy::default(),
            device_memory_limit: None,
            buffer_growth_factor: 1.2,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.buffer_growth_factor >= 1.0 && self.buffer_growth_factor.is_finite()) {
            return Err(ConfigError::InvalidValue {
                parameter: "buffer_growth_factor",
                reason: format!("{} is not a finite factor >= 1", self.buffer_growth_factor),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    wait_order: Option<WaitOrder>,
    energy_interval: Option<u64>,
    shift_forces_with_energy: Option<bool>,
    device_memory_limit: Option<usize>,
    buffer_growth_factor: Option<f64>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_order(mut self, order: WaitOrder) -> Self {
        self.wait_order = Some(order);
        self
    }
    pub fn energy_interval(mut self, interval: u64) -> Self {
        self.energy_interval = Some(interval);
        self
    }
    pub fn shift_forces_with_energy(mut self, enabled: bool) -> Self {
        self.shift_forces_with_energy = Some(enabled);
        self
    }
    pub fn device_memory_limit(mut self, bytes: usize) -> Self {
        self.device_memory_limit = Some(bytes);
        self
    }
    pub fn buffer_growth_factor(mut self, factor: f64) -> Self {
        self.buffer_growth_factor = Some(factor);
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            wait_order: self.wait_order.unwrap_or(defaults.wait_order),
            force_requests: ForceRequestPolicy {
                energy_interval: self
                    .energy_interval
                    .ok_or(ConfigError::MissingParameter("energy_interval"))?,
                shift_forces_with_energy: self
                    .shift_forces_with_energy
                    .unwrap_or(defaults.force_requests.shift_forces_with_energy),
            },
            device_memory_limit: self.device_memory_limit,
            buffer_growth_factor: self
                .buffer_growth_factor
                .unwrap_or(defaults.buffer_growth_factor),
        };
        config.validate()?;
        Ok(config)
    }
}
