use crate::core::kernel::{ForceFlags, PairEnergies};
use crate::core::models::geometry::Vec3;
use crate::core::models::locality::LocalityClass;
use crate::core::pairlist::ShiftTable;
use crate::core::state::SimulationState;
use crate::engine::error::{EngineError, OffloadError};
use crate::engine::pipeline::{ForceOutput, OffloadPipeline};
use tracing::{instrument, trace};

/// Reduced nonbonded output of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepForces {
    /// One entry per state atom.
    pub forces: Vec<Vec3>,
    pub shift_forces: Option<Vec<Vec3>>,
    pub energies: Option<PairEnergies>,
}

/// Computes one step's nonbonded forces.
///
/// Both classes are launched (local first) before `host_work` runs, so the closure overlaps
/// with accelerator work. Results are reduced local first regardless of the wait order,
/// which keeps the sum bitwise independent of completion order. On failure both classes
/// are drained before the error is returned.
#[instrument(skip_all, name = "force_step")]
pub fn run<F>(
    pipeline: &mut OffloadPipeline,
    state: &SimulationState,
    flags: ForceFlags,
    host_work: F,
) -> Result<StepForces, EngineError>
where
    F: FnOnce(),
{
    let outcome = issue_and_collect(pipeline, state, flags, host_work);
    if outcome.is_err() {
        for locality in LocalityClass::ALL {
            pipeline.drain(locality);
        }
    }
    let outputs = outcome?;
    Ok(reduce(state.atom_count(), flags, &outputs))
}

fn issue_and_collect<F: FnOnce()>(
    pipeline: &mut OffloadPipeline,
    state: &SimulationState,
    flags: ForceFlags,
    host_work: F,
) -> Result<[ForceOutput; 2], OffloadError> {
    for locality in LocalityClass::ALL {
        pipeline.launch_transfer_and_compute(locality, state, flags)?;
    }
    for locality in LocalityClass::ALL {
        pipeline.launch_result_copy(locality, flags)?;
    }

    host_work();

    let mut outputs = [ForceOutput::default(), ForceOutput::default()];
    for locality in pipeline.config().wait_order.sequence() {
        pipeline.wait_and_consume(locality, flags, &mut outputs[locality.index()])?;
        trace!(%locality, "Consumed forces");
    }
    Ok(outputs)
}

fn reduce(atom_count: usize, flags: ForceFlags, outputs: &[ForceOutput; 2]) -> StepForces {
    let mut forces = vec![Vec3::zeros(); atom_count];
    let mut shift_forces = vec![Vec3::zeros(); ShiftTable::LEN];
    let mut energies = PairEnergies::default();

    for out in outputs {
        for (acc, f) in forces.iter_mut().zip(&out.forces) {
            *acc += f;
        }
        for (acc, f) in shift_forces.iter_mut().zip(&out.shift_forces) {
            *acc += f;
        }
        energies += out.energies;
    }

    StepForces {
        forces,
        shift_forces: flags
            .contains(ForceFlags::SHIFT_FORCES)
            .then_some(shift_forces),
        energies: flags.contains(ForceFlags::ENERGY).then_some(energies),
    }
}
