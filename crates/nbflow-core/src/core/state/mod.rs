//! # Simulation State
//!
//! Host-side container for all per-atom and extended-ensemble dynamical variables of
//! one simulation snapshot.
//!
//! Sequence shapes follow run-time parameters collected in [`StateDimensions`]:
//! per-atom arrays are sized by the atom count (plus one padding slot), coupling chains
//! by `groups x chain_length`, and the optional history sub-objects exist only when
//! their governing feature is active. [`SimulationState::initialize`] establishes these
//! invariants, [`SimulationState::resize_thermostat_state`] changes coupling shapes in
//! place, and [`SimulationState::compare`] reports differences between two snapshots
//! without mutating either.

pub mod compare;
pub mod error;
pub mod fields;
pub mod history;
pub mod simulation;

pub use compare::{ComparisonReport, Difference, ElementLocation, Tolerance};
pub use error::StateError;
pub use fields::{FreeEnergyComponent, StateFields};
pub use simulation::{CouplingChain, SimulationState, StateDimensions};
