//! # nbflow Core Library
//!
//! Asynchronous accelerator offload of short-range nonbonded forces for molecular
//! dynamics, together with the host-side simulation state the offload reads from and
//! writes into every timestep.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Per-atom and extended-ensemble state (`SimulationState`),
//!   the pair-list hand-off types consumed from an external builder, and the pair-kernel
//!   contract with a reference implementation.
//!
//! - **[`engine`]: The Offload Pipeline.** An explicitly owned `DeviceContext`, one FIFO
//!   execution queue per locality class, the transfer/kernel/result stages issued onto those
//!   queues and the `SyncGate` the host blocks on before consuming forces.
//!
//! - **[`workflows`]: The Public API.** A single force step in the documented launch and
//!   wait order, and a small multi-step dynamics driver built on top of it.

pub mod core;
pub mod engine;
pub mod workflows;
