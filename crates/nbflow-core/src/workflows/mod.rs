//! # Workflows Module
//!
//! Top-level entry points built on the offload [`engine`](crate::engine).
//!
//! - **Force Step** ([`force_step`]) - One timestep's nonbonded forces: launch both locality
//!   classes, overlap caller-supplied host work, wait in the configured order and reduce.
//! - **Dynamics** ([`dynamics`]) - A small leap-frog driver that repartitions every
//!   `nstlist` steps and runs a force step per step.

pub mod dynamics;
pub mod force_step;
