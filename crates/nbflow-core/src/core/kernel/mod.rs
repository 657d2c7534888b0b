//! # Pair Kernels
//!
//! The contract an accelerator-side pair-interaction kernel satisfies. Kernel mathematics
//! (functional forms, cutoff treatment, vectorization) is up to the implementation; the
//! pipeline only relies on what [`PairKernel::compute`] reads and writes.

pub mod energy;
pub mod reference;

pub use energy::PairEnergies;
pub use reference::{LennardJonesTable, ReferenceKernel};

use crate::core::models::flags::flag_set;
use crate::core::models::geometry::Vec3;
use crate::core::pairlist::AtomPair;
use thiserror::Error;

flag_set! {
    /// Optional outputs requested from a kernel launch.
    pub struct ForceFlags: u8 {
        /// Accumulate Lennard-Jones and Coulomb energies.
        const ENERGY = 1 << 0;
        /// Accumulate forces per periodic shift, for the virial.
        const SHIFT_FORCES = 1 << 1;
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct KernelFault(pub String);

/// Accelerator-resident inputs of one kernel launch.
#[derive(Debug, Clone, Copy)]
pub struct KernelInput<'a> {
    pub positions: &'a [Vec3],
    pub charges: &'a [f64],
    pub type_ids: &'a [usize],
    pub pairs: &'a [AtomPair],
    pub shift_vectors: &'a [Vec3],
}

/// Accelerator-resident outputs. The pipeline zeroes them before every launch.
#[derive(Debug)]
pub struct KernelOutput<'a> {
    pub forces: &'a mut [Vec3],
    pub shift_forces: &'a mut [Vec3],
    pub energies: &'a mut PairEnergies,
}

pub trait PairKernel: Send + Sync {
    fn name(&self) -> &str;

    /// Accumulates pair forces into `output.forces` (indexed like `input.positions`)
    /// and, as `flags` request, energies and shift forces.
    fn compute(
        &self,
        input: &KernelInput<'_>,
        flags: ForceFlags,
        output: &mut KernelOutput<'_>,
    ) -> Result<(), KernelFault>;
}
