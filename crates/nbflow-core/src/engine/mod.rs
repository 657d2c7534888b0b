//! # Engine Module
//!
//! The asynchronous offload pipeline for short-range nonbonded forces.
//!
//! ## Overview
//!
//! Work is split by [`LocalityClass`](crate::core::models::locality::LocalityClass). Each
//! class owns an [`OffloadBuffer`](buffer::OffloadBuffer) of device mirrors and is bound by
//! the [`StreamScheduler`](scheduler::StreamScheduler) to its own in-order
//! [`ExecutionQueue`](queue::ExecutionQueue). A step issues three commands per class
//! (position transfer, pair kernel, result copy) and later blocks on the class's
//! [`SyncGate`](queue::SyncGate) before consuming forces. Within a class the commands
//! serialize by queue order alone; across classes nothing is ordered.
//!
//! ## Architecture
//!
//! - **Device Context** ([`context`]) - Explicitly owned accelerator handle with a memory budget
//! - **Queues** ([`queue`], [`scheduler`]) - Per-class FIFO workers and their completion gates
//! - **Buffers and Stages** ([`buffer`], [`stages`]) - Device mirrors and the commands touching them
//! - **Pipeline** ([`pipeline`]) - The per-class `Idle -> ComputePending -> ResultPending` state machine
//! - **Configuration** ([`config`]) - Wait order, output request policy and buffer sizing
//! - **Error Handling** ([`error`]) - Protocol, allocation and device failures
//!
//! Nothing here retries. Every fatal condition propagates to the caller driving the run.

pub mod buffer;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod scheduler;
pub mod stages;
