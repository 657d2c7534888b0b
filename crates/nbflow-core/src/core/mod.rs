//! # Core Module
//!
//! Data that flows through the offload pipeline, independent of how it is scheduled.
//!
//! - **Geometry and locality** ([`models`]) - vector aliases, padded per-atom storage, locality classes
//! - **Simulation state** ([`state`]) - dynamical and extended-ensemble variables of one snapshot
//! - **Pair lists** ([`pairlist`]) - per-locality interaction lists and periodic shift vectors
//! - **Pair kernels** ([`kernel`]) - the interaction kernel contract and a reference kernel

pub mod kernel;
pub mod models;
pub mod pairlist;
pub mod state;
