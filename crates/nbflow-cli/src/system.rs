//! Generated cubic-lattice test systems.

use nbflow::core::kernel::{LennardJonesTable, ReferenceKernel};
use nbflow::core::models::geometry::{Mat3, Vec3};
use nbflow::core::pairlist::{AtomData, BruteForcePartitioner, PairListError};
use nbflow::core::state::{SimulationState, StateDimensions};

#[derive(Debug, Clone, PartialEq)]
pub struct LatticeSystem {
    /// Lattice sites per box edge.
    pub cells: usize,
    pub spacing: f64,
    /// Charge magnitude; neighbouring sites alternate in sign.
    pub charge: f64,
    /// Fraction of atoms treated as local, the rest form the halo.
    pub local_fraction: f64,
    pub c6: f64,
    pub c12: f64,
    pub cutoff: f64,
    /// Maximum displacement of a site from its ideal position, per dimension.
    pub jitter: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coupling {
    pub thermostats: usize,
    pub barostat_vars: usize,
    pub chain_length: usize,
    pub free_energy_dimension: usize,
}

impl LatticeSystem {
    pub fn atom_count(&self) -> usize {
        self.cells.pow(3)
    }

    pub fn box_length(&self) -> f64 {
        self.cells as f64 * self.spacing
    }

    pub fn local_atoms(&self) -> usize {
        ((self.atom_count() as f64) * self.local_fraction).round() as usize
    }

    pub fn build_state(&self, coupling: &Coupling) -> SimulationState {
        let mut state = SimulationState::new(StateDimensions {
            atom_count: self.atom_count(),
            num_thermostats: coupling.thermostats,
            num_barostat_vars: coupling.barostat_vars,
            chain_length: coupling.chain_length,
            free_energy_dimension: coupling.free_energy_dimension,
        });
        state.box_matrix = Mat3::identity() * self.box_length();
        let n = self.cells;
        for (i, x) in state.positions_mut().iter_mut().enumerate() {
            let site = Vec3::new((i % n) as f64, ((i / n) % n) as f64, (i / (n * n)) as f64);
            let offset = Vec3::new(scatter(i, 1), scatter(i, 2), scatter(i, 3));
            *x = (site + Vec3::repeat(0.5)) * self.spacing + offset * self.jitter;
        }
        state
    }

    fn atom_data(&self) -> Result<AtomData, PairListError> {
        let n = self.cells;
        let charges = (0..self.atom_count())
            .map(|i| {
                let parity = (i % n + (i / n) % n + i / (n * n)) % 2;
                if parity == 0 { self.charge } else { -self.charge }
            })
            .collect();
        AtomData::new(charges, vec![0; self.atom_count()])
    }

    pub fn partitioner(&self) -> Result<BruteForcePartitioner, PairListError> {
        BruteForcePartitioner::new(self.atom_data()?, self.local_atoms(), self.cutoff)
    }

    pub fn kernel(&self) -> ReferenceKernel {
        ReferenceKernel::new(LennardJonesTable::uniform(self.c6, self.c12), self.cutoff)
    }
}

/// Deterministic value in `[-1, 1)` for site `i` and channel `salt`.
fn scatter(i: usize, salt: u64) -> f64 {
    let h = (i as u64 + 1)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(salt.wrapping_mul(0xBF58_476D_1CE4_E5B9))
        .rotate_left(17)
        .wrapping_mul(0x94D0_49BB_1331_11EB);
    ((h >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
}
