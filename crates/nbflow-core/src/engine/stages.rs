//! Builders for the three commands issued per locality class and step.
//!
//! Every builder captures what its command needs by value or through shared device
//! handles, so the returned [`Command`] can run on a queue worker while the host moves on.
//! The state is only read while a transfer command is being built.

use super::buffer::OffloadBuffer;
use super::context::DeviceContext;
use super::error::OffloadError;
use super::queue::{Command, Stage};
use crate::core::kernel::{ForceFlags, KernelInput, KernelOutput, PairEnergies, PairKernel};
use crate::core::models::geometry::Vec3;
use crate::core::models::locality::LocalityClass;
use crate::core::pairlist::{PairListError, ShiftTable};
use crate::core::state::SimulationState;
use parking_lot::Mutex;
use std::sync::Arc;

/// Host-side landing zone of a result copy.
#[derive(Debug, Clone, Default)]
pub struct HostResults {
    pub forces: Vec<Vec3>,
    pub shift_forces: Vec<Vec3>,
    pub energies: PairEnergies,
    pub flags: ForceFlags,
}

pub type HostStaging = Arc<Mutex<HostResults>>;

fn check_injected(
    context: &DeviceContext,
    locality: LocalityClass,
    stage: Stage,
) -> Result<(), String> {
    if context.take_fault(locality, stage) {
        Err(format!("injected fault in {stage}"))
    } else {
        Ok(())
    }
}

pub struct TransferStage;

impl TransferStage {
    /// Snapshots the class's positions and the current box's shift vectors, and returns
    /// the command that uploads them.
    pub fn command(
        context: &DeviceContext,
        buffer: &OffloadBuffer,
        state: &SimulationState,
    ) -> Result<Command, OffloadError> {
        let locality = buffer.locality();
        let atoms = buffer.atom_count();
        let positions = state
            .positions()
            .get(..atoms)
            .map(<[Vec3]>::to_vec)
            .ok_or(PairListError::StateTooSmall {
                required: atoms,
                available: state.atom_count(),
            })?;
        let shifts = ShiftTable::from_box(&state.box_matrix);

        let context = context.clone();
        let device_positions = buffer.positions.slice();
        let device_shifts = buffer.shift_vectors.slice();
        Ok(Box::new(move || -> Result<(), String> {
            check_injected(&context, locality, Stage::Transfer)?;
            device_positions.lock()[..atoms].copy_from_slice(&positions);
            device_shifts.lock()[..ShiftTable::LEN].copy_from_slice(shifts.vectors());
            Ok(())
        }))
    }
}

pub struct KernelStage;

impl KernelStage {
    /// Zeroes the class's outputs and runs `kernel` over its pair list.
    pub fn command(
        context: &DeviceContext,
        buffer: &OffloadBuffer,
        kernel: Arc<dyn PairKernel>,
        flags: ForceFlags,
    ) -> Command {
        let locality = buffer.locality();
        let atoms = buffer.atom_count();
        let pair_count = buffer.pair_count();
        let context = context.clone();
        let positions = buffer.positions.slice();
        let charges = buffer.charges.slice();
        let type_ids = buffer.type_ids.slice();
        let pairs = buffer.pairs.slice();
        let shift_vectors = buffer.shift_vectors.slice();
        let forces = buffer.forces.slice();
        let shift_forces = buffer.shift_forces.slice();
        let energies = buffer.energies.slice();

        Box::new(move || -> Result<(), String> {
            check_injected(&context, locality, Stage::Kernel)?;
            let x = positions.lock();
            let q = charges.lock();
            let types = type_ids.lock();
            let list = pairs.lock();
            let shifts = shift_vectors.lock();
            let mut f = forces.lock();
            let mut fshift = shift_forces.lock();
            let mut e = energies.lock();

            f[..atoms].fill(Vec3::zeros());
            fshift.fill(Vec3::zeros());
            e[0] = PairEnergies::default();

            let input = KernelInput {
                positions: &x[..atoms],
                charges: &q[..atoms],
                type_ids: &types[..atoms],
                pairs: &list[..pair_count],
                shift_vectors: &shifts[..],
            };
            let mut output = KernelOutput {
                forces: &mut f[..atoms],
                shift_forces: &mut fshift[..],
                energies: &mut e[0],
            };
            kernel
                .compute(&input, flags, &mut output)
                .map_err(|fault| format!("{}: {fault}", kernel.name()))
        })
    }
}

pub struct ResultStage;

impl ResultStage {
    /// Copies forces, and the optional outputs `flags` selects, into `staging`.
    pub fn command(
        context: &DeviceContext,
        buffer: &OffloadBuffer,
        staging: HostStaging,
        flags: ForceFlags,
    ) -> Command {
        let locality = buffer.locality();
        let atoms = buffer.atom_count();
        let context = context.clone();
        let forces = buffer.forces.slice();
        let shift_forces = buffer.shift_forces.slice();
        let energies = buffer.energies.slice();

        Box::new(move || -> Result<(), String> {
            check_injected(&context, locality, Stage::ResultCopy)?;
            let mut host = staging.lock();
            host.forces.clear();
            host.forces.extend_from_slice(&forces.lock()[..atoms]);
            host.shift_forces.clear();
            if flags.contains(ForceFlags::SHIFT_FORCES) {
                host.shift_forces
                    .extend_from_slice(&shift_forces.lock()[..ShiftTable::LEN]);
            }
            host.energies = if flags.contains(ForceFlags::ENERGY) {
                energies.lock()[0]
            } else {
                PairEnergies::default()
            };
            host.flags = flags;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::{LennardJonesTable, ReferenceKernel};
    use crate::core::models::geometry::Mat3;
    use crate::core::pairlist::{AtomData, AtomPair, PairList, Partition};
    use crate::core::state::StateDimensions;

    struct Setup {
        context: DeviceContext,
        buffer: OffloadBuffer,
        state: SimulationState,
        kernel: Arc<dyn PairKernel>,
    }

    fn setup() -> Setup {
        let context = DeviceContext::new("test", None);
        let mut state = SimulationState::new(StateDimensions {
            atom_count: 3,
            ..Default::default()
        });
        state.box_matrix = Mat3::identity() * 4.0;
        state.positions_mut()[1] = Vec3::new(0.5, 0.0, 0.0);
        state.positions_mut()[2] = Vec3::new(0.0, 0.6, 0.0);

        let pair = |i, j| AtomPair {
            i,
            j,
            shift: ShiftTable::CENTRAL,
        };
        let partition = Partition {
            generation: 1,
            atoms: AtomData::new(vec![1.0, -1.0, 0.5], vec![0; 3]).unwrap(),
            local_atoms: 3,
            local: PairList {
                locality: LocalityClass::Local,
                pairs: vec![pair(0, 1), pair(0, 2), pair(1, 2)],
            },
            non_local: PairList::new(LocalityClass::NonLocal),
        };
        let mut buffer = OffloadBuffer::new(&context, LocalityClass::Local).unwrap();
        buffer.rebuild(&partition, 1.0).unwrap();
        let kernel: Arc<dyn PairKernel> = Arc::new(ReferenceKernel::new(
            LennardJonesTable::uniform(1e-3, 1e-6),
            1.0,
        ));
        Setup {
            context,
            buffer,
            state,
            kernel,
        }
    }

    fn run_all(s: &Setup, flags: ForceFlags) -> Result<HostResults, String> {
        let staging = HostStaging::default();
        TransferStage::command(&s.context, &s.buffer, &s.state).unwrap()()?;
        KernelStage::command(&s.context, &s.buffer, Arc::clone(&s.kernel), flags)()?;
        ResultStage::command(&s.context, &s.buffer, Arc::clone(&staging), flags)()?;
        let results = staging.lock().clone();
        Ok(results)
    }

    #[test]
    fn stages_produce_forces_for_every_class_atom() {
        let s = setup();
        let results = run_all(&s, ForceFlags::empty()).unwrap();
        assert_eq!(results.forces.len(), 3);
        let net: Vec3 = results.forces.iter().sum();
        assert!(net.norm() < 1e-9);
        assert!(results.forces[0].norm() > 0.0);
        assert!(results.shift_forces.is_empty());
        assert_eq!(results.energies, PairEnergies::default());
    }

    #[test]
    fn optional_outputs_are_copied_only_when_flagged() {
        let s = setup();
        let results = run_all(&s, ForceFlags::ENERGY | ForceFlags::SHIFT_FORCES).unwrap();
        assert_eq!(results.shift_forces.len(), ShiftTable::LEN);
        assert!(results.energies.coulomb != 0.0);
        assert_eq!(results.flags, ForceFlags::ENERGY | ForceFlags::SHIFT_FORCES);
    }

    #[test]
    fn repeated_kernels_do_not_accumulate_across_launches() {
        let s = setup();
        let first = run_all(&s, ForceFlags::ENERGY).unwrap();
        let second = run_all(&s, ForceFlags::ENERGY).unwrap();
        assert_eq!(first.forces, second.forces);
        assert_eq!(first.energies, second.energies);
    }

    #[test]
    fn transfer_rejects_a_state_smaller_than_the_buffer() {
        let s = setup();
        let small = SimulationState::new(StateDimensions {
            atom_count: 2,
            ..Default::default()
        });
        let result = TransferStage::command(&s.context, &s.buffer, &small);
        assert!(matches!(
            result,
            Err(OffloadError::Partition {
                source: PairListError::StateTooSmall {
                    required: 3,
                    available: 2
                }
            })
        ));
    }

    #[test]
    fn injected_fault_fails_only_the_targeted_stage() {
        let s = setup();
        s.context.inject_fault(LocalityClass::Local, Stage::Kernel);
        let err = run_all(&s, ForceFlags::empty()).unwrap_err();
        assert_eq!(err, "injected fault in kernel");
        assert!(run_all(&s, ForceFlags::empty()).is_ok());
    }
}
