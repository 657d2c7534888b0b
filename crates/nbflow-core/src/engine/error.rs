use thiserror::Error;

use super::config::ConfigError;
use super::pipeline::PipelineState;
use super::queue::Stage;
use crate::core::kernel::ForceFlags;
use crate::core::models::locality::LocalityClass;
use crate::core::pairlist::PairListError;
use crate::core::state::StateError;

#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("Protocol violation: '{operation}' called on {locality} class while {state:?}")]
    Protocol {
        locality: LocalityClass,
        operation: &'static str,
        state: PipelineState,
    },

    #[error("Device allocation of {requested} bytes failed, {available} bytes available")]
    Allocation { requested: usize, available: usize },

    #[error("Device fault on {locality} queue during {stage}: {message}")]
    Device {
        locality: LocalityClass,
        stage: Stage,
        message: String,
    },

    #[error(
        "{locality} class needs partition generation {required}, pipeline holds {available:?}"
    )]
    StalePartition {
        locality: LocalityClass,
        required: u64,
        available: Option<u64>,
    },

    #[error("{locality} class requested {requested:?} but only {computed:?} were computed")]
    FlagsNotComputed {
        locality: LocalityClass,
        requested: ForceFlags,
        computed: ForceFlags,
    },

    #[error("Invalid partition: {source}")]
    Partition {
        #[from]
        source: PairListError,
    },

    #[error("Failed to start the {locality} execution queue: {source}")]
    QueueStartup {
        locality: LocalityClass,
        source: std::io::Error,
    },

    #[error("Invalid pipeline configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}

impl OffloadError {
    /// Whether the error signals a caller bug rather than a runtime failure.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::StalePartition { .. } | Self::FlagsNotComputed { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Offload(#[from] OffloadError),

    #[error("Pair-list builder failed: {source}")]
    PairList {
        #[from]
        source: PairListError,
    },

    #[error("Simulation state error: {source}")]
    State {
        #[from]
        source: StateError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}
