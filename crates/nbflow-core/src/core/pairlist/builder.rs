use super::{AtomData, AtomPair, PairList, PairListError, Partition, PartitionSource, ShiftTable};
use crate::core::models::locality::LocalityClass;
use crate::core::state::SimulationState;
use tracing::debug;

/// All-pairs minimum-image list builder for small systems and tests.
///
/// Splits pairs by locality: both atoms below `local_atoms` goes to the local list,
/// anything touching a halo atom to the non-local one. Only rectangular-ish boxes whose
/// diagonal bounds the cutoff are supported.
#[derive(Debug, Clone)]
pub struct BruteForcePartitioner {
    atoms: AtomData,
    local_atoms: usize,
    cutoff: f64,
}

impl BruteForcePartitioner {
    pub fn new(atoms: AtomData, local_atoms: usize, cutoff: f64) -> Result<Self, PairListError> {
        if local_atoms > atoms.len() {
            return Err(PairListError::LocalCountTooLarge {
                local: local_atoms,
                total: atoms.len(),
            });
        }
        Ok(Self {
            atoms,
            local_atoms,
            cutoff,
        })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn local_atoms(&self) -> usize {
        self.local_atoms
    }

    pub fn build(
        &self,
        state: &SimulationState,
        generation: u64,
    ) -> Result<Partition, PairListError> {
        let total = self.atoms.len();
        if state.atom_count() < total {
            return Err(PairListError::StateTooSmall {
                required: total,
                available: state.atom_count(),
            });
        }

        let limit = (0..3)
            .map(|k| state.box_matrix[(k, k)])
            .fold(f64::INFINITY, f64::min)
            * 0.5;
        if !(self.cutoff > 0.0 && self.cutoff < limit) {
            return Err(PairListError::InvalidCutoff {
                cutoff: self.cutoff,
                limit,
            });
        }

        let shifts = ShiftTable::from_box(&state.box_matrix);
        let x = state.positions();
        let rc2 = self.cutoff * self.cutoff;
        let mut local = PairList::new(LocalityClass::Local);
        let mut non_local = PairList::new(LocalityClass::NonLocal);

        for i in 0..total {
            for j in (i + 1)..total {
                let (shift, r2) = shifts
                    .vectors()
                    .iter()
                    .enumerate()
                    .map(|(s, sv)| (s, (x[i] + sv - x[j]).norm_squared()))
                    .fold((ShiftTable::CENTRAL, f64::INFINITY), |best, cand| {
                        if cand.1 < best.1 { cand } else { best }
                    });
                if r2 >= rc2 {
                    continue;
                }
                let pair = AtomPair { i, j, shift };
                if i < self.local_atoms && j < self.local_atoms {
                    local.pairs.push(pair);
                } else {
                    non_local.pairs.push(pair);
                }
            }
        }

        debug!(
            generation,
            local_pairs = local.len(),
            non_local_pairs = non_local.len(),
            "Built brute-force pair lists."
        );

        Ok(Partition {
            generation,
            atoms: self.atoms.clone(),
            local_atoms: self.local_atoms,
            local,
            non_local,
        })
    }
}

impl PartitionSource for BruteForcePartitioner {
    fn partition(
        &mut self,
        state: &SimulationState,
        generation: u64,
    ) -> Result<Partition, PairListError> {
        self.build(state, generation)
    }
}
