//! The per-locality offload state machine.
//!
//! Each locality class cycles `Idle -> TransferPending -> ComputePending -> ResultPending ->
//! Idle`. Launches only enqueue work; [`OffloadPipeline::wait_and_consume`] and
//! [`OffloadPipeline::drain`] are the only calls that block.

use super::buffer::OffloadBuffer;
use super::config::PipelineConfig;
use super::context::DeviceContext;
use super::error::OffloadError;
use super::queue::Stage;
use super::scheduler::StreamScheduler;
use super::stages::{HostResults, HostStaging, KernelStage, ResultStage, TransferStage};
use crate::core::kernel::{ForceFlags, PairEnergies, PairKernel};
use crate::core::models::geometry::Vec3;
use crate::core::models::locality::LocalityClass;
use crate::core::pairlist::Partition;
use crate::core::state::SimulationState;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Held only while a launch is uploading and issuing; callers observe `ComputePending`.
    TransferPending,
    ComputePending,
    ResultPending,
}

/// Host-provided destination of [`OffloadPipeline::wait_and_consume`].
///
/// `forces` is indexed like the state's atoms and covers the class's atom range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForceOutput {
    pub forces: Vec<Vec3>,
    pub shift_forces: Vec<Vec3>,
    pub energies: PairEnergies,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalityStats {
    pub launches: u64,
    pub result_copies: u64,
    pub waits: u64,
    pub rebuilds: u64,
    pub faults: u64,
    pub drains: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    classes: [LocalityStats; 2],
}

impl PipelineStats {
    pub fn get(&self, locality: LocalityClass) -> &LocalityStats {
        &self.classes[locality.index()]
    }

    fn get_mut(&mut self, locality: LocalityClass) -> &mut LocalityStats {
        &mut self.classes[locality.index()]
    }
}

struct LocalitySlot {
    state: PipelineState,
    buffer: OffloadBuffer,
    staging: HostStaging,
    launch_flags: ForceFlags,
    copy_flags: ForceFlags,
}

pub struct OffloadPipeline {
    // Declared first so queued work finishes before the buffers below are released.
    scheduler: StreamScheduler,
    context: DeviceContext,
    config: PipelineConfig,
    kernel: Arc<dyn PairKernel>,
    slots: [LocalitySlot; 2],
    partition: Option<Arc<Partition>>,
    stats: PipelineStats,
}

impl OffloadPipeline {
    pub fn new(
        context: DeviceContext,
        config: PipelineConfig,
        kernel: Arc<dyn PairKernel>,
    ) -> Result<Self, OffloadError> {
        config.validate()?;
        let slot = |locality| -> Result<LocalitySlot, OffloadError> {
            Ok(LocalitySlot {
                state: PipelineState::Idle,
                buffer: OffloadBuffer::new(&context, locality)?,
                staging: HostStaging::default(),
                launch_flags: ForceFlags::empty(),
                copy_flags: ForceFlags::empty(),
            })
        };
        let slots = [slot(LocalityClass::Local)?, slot(LocalityClass::NonLocal)?];
        let scheduler = StreamScheduler::new()?;
        info!(
            device = context.name(),
            kernel = kernel.name(),
            "Offload pipeline ready"
        );
        Ok(Self {
            scheduler,
            context,
            config,
            kernel,
            slots,
            partition: None,
            stats: PipelineStats::default(),
        })
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn state(&self, locality: LocalityClass) -> PipelineState {
        self.slots[locality.index()].state
    }

    /// Generation the class's device buffers were last built for.
    pub fn buffer_generation(&self, locality: LocalityClass) -> Option<u64> {
        self.slots[locality.index()].buffer.generation()
    }

    /// Hands over a partition from the pair-list builder. Buffers are rebuilt lazily, by
    /// the first launch whose state carries the partition's generation.
    pub fn set_partition(&mut self, partition: Partition) -> Result<(), OffloadError> {
        partition.validate()?;
        debug!(
            generation = partition.generation,
            atoms = partition.total_atoms(),
            local_pairs = partition.local.len(),
            non_local_pairs = partition.non_local.len(),
            "Received partition"
        );
        self.partition = Some(Arc::new(partition));
        Ok(())
    }

    pub fn partition(&self) -> Option<&Partition> {
        self.partition.as_deref()
    }

    fn expect_state(
        &self,
        locality: LocalityClass,
        operation: &'static str,
        expected: PipelineState,
    ) -> Result<(), OffloadError> {
        let state = self.state(locality);
        if state != expected {
            return Err(OffloadError::Protocol {
                locality,
                operation,
                state,
            });
        }
        Ok(())
    }

    /// Issues position upload and the pair kernel for `locality`. Valid only from `Idle`.
    ///
    /// Rebuilds the class's device buffers first when the state's partition generation
    /// differs from theirs; that is the only host-side blocking in a launch.
    pub fn launch_transfer_and_compute(
        &mut self,
        locality: LocalityClass,
        state: &SimulationState,
        flags: ForceFlags,
    ) -> Result<(), OffloadError> {
        self.expect_state(locality, "launch_transfer_and_compute", PipelineState::Idle)?;

        let generation = state.partition_generation();
        let growth = self.config.buffer_growth_factor;
        let slot = &mut self.slots[locality.index()];
        if slot.buffer.generation() != Some(generation) {
            let partition = self
                .partition
                .as_deref()
                .filter(|p| p.generation == generation)
                .ok_or(OffloadError::StalePartition {
                    locality,
                    required: generation,
                    available: self.partition.as_ref().map(|p| p.generation),
                })?;
            slot.buffer.rebuild(partition, growth)?;
            self.stats.get_mut(locality).rebuilds += 1;
        }

        let transfer = TransferStage::command(&self.context, &slot.buffer, state)?;
        let kernel = KernelStage::command(&self.context, &slot.buffer, Arc::clone(&self.kernel), flags);

        slot.state = PipelineState::TransferPending;
        self.scheduler.submit(locality, Stage::Transfer, transfer);
        self.scheduler.submit(locality, Stage::Kernel, kernel);
        slot.state = PipelineState::ComputePending;
        slot.launch_flags = flags;
        self.stats.get_mut(locality).launches += 1;
        Ok(())
    }

    /// Issues the result copy behind the kernel. Valid only from `ComputePending`, and
    /// `flags` may only select outputs the kernel was launched with.
    pub fn launch_result_copy(
        &mut self,
        locality: LocalityClass,
        flags: ForceFlags,
    ) -> Result<(), OffloadError> {
        self.expect_state(locality, "launch_result_copy", PipelineState::ComputePending)?;
        let slot = &mut self.slots[locality.index()];
        if !slot.launch_flags.contains(flags) {
            return Err(OffloadError::FlagsNotComputed {
                locality,
                requested: flags,
                computed: slot.launch_flags,
            });
        }

        let copy = ResultStage::command(&self.context, &slot.buffer, Arc::clone(&slot.staging), flags);
        self.scheduler.submit(locality, Stage::ResultCopy, copy);
        slot.state = PipelineState::ResultPending;
        slot.copy_flags = flags;
        self.stats.get_mut(locality).result_copies += 1;
        Ok(())
    }

    /// Blocks until the class's queue has finished, then writes its results into `output`
    /// and returns the class to `Idle`.
    ///
    /// A device fault on the queue surfaces here, also returns the class to `Idle`, and
    /// stays: later waits on the same class report it again.
    pub fn wait_and_consume(
        &mut self,
        locality: LocalityClass,
        flags: ForceFlags,
        output: &mut ForceOutput,
    ) -> Result<(), OffloadError> {
        self.expect_state(locality, "wait_and_consume", PipelineState::ResultPending)?;
        let slot = &mut self.slots[locality.index()];
        if !slot.copy_flags.contains(flags) {
            return Err(OffloadError::FlagsNotComputed {
                locality,
                requested: flags,
                computed: slot.copy_flags,
            });
        }

        let outcome = self.scheduler.gate(locality).wait();
        slot.state = PipelineState::Idle;
        let stats = self.stats.get_mut(locality);
        stats.waits += 1;
        if let Err(fault) = outcome {
            stats.faults += 1;
            warn!(%locality, stage = %fault.stage, message = %fault.message, "Device fault surfaced");
            return Err(OffloadError::Device {
                locality,
                stage: fault.stage,
                message: fault.message,
            });
        }

        let staged = slot.staging.lock();
        write_output(&staged, flags, output);
        Ok(())
    }

    /// The abort path: waits for whatever the class has in flight, discards it and returns
    /// the class to `Idle`. Issued work is never cancelled.
    pub fn drain(&mut self, locality: LocalityClass) {
        let slot = &mut self.slots[locality.index()];
        if slot.state == PipelineState::Idle {
            return;
        }
        if let Err(fault) = self.scheduler.gate(locality).wait() {
            debug!(%locality, stage = %fault.stage, "Discarding faulted work while draining");
        }
        *slot.staging.lock() = HostResults::default();
        slot.state = PipelineState::Idle;
        self.stats.get_mut(locality).drains += 1;
    }
}

fn write_output(staged: &HostResults, flags: ForceFlags, output: &mut ForceOutput) {
    output.forces.clear();
    output.forces.extend_from_slice(&staged.forces);
    output.shift_forces.clear();
    if flags.contains(ForceFlags::SHIFT_FORCES) {
        output.shift_forces.extend_from_slice(&staged.shift_forces);
    }
    output.energies = if flags.contains(ForceFlags::ENERGY) {
        staged.energies
    } else {
        PairEnergies::default()
    };
}

impl Drop for OffloadPipeline {
    fn drop(&mut self) {
        for locality in LocalityClass::ALL {
            self.drain(locality);
        }
    }
}
