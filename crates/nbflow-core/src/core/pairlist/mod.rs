//! # Pair Lists
//!
//! The interface between an external pair-list builder and the offload pipeline.
//!
//! A [`Partition`] describes one generation of the spatial decomposition: per-atom
//! interaction parameters, how many atoms are local, and one [`PairList`] per locality
//! class. Pair displacements are taken through periodic images indexed into a
//! [`ShiftTable`] built from the current box. The pipeline rebuilds its accelerator-side
//! buffers whenever the state's partition generation moves past the one it last saw.

pub mod builder;
pub mod shifts;

pub use builder::BruteForcePartitioner;
pub use shifts::ShiftTable;

use crate::core::models::locality::LocalityClass;
use crate::core::state::SimulationState;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PairListError {
    #[error("Atom data is inconsistent: {charges} charges but {types} type ids")]
    AtomDataMismatch { charges: usize, types: usize },
    #[error("Local atom count {local} exceeds the partition's {total} atoms")]
    LocalCountTooLarge { local: usize, total: usize },
    #[error("{locality} pair ({i}, {j}) is outside that class's atom range {range:?}")]
    PairOutOfRange {
        locality: LocalityClass,
        i: usize,
        j: usize,
        range: Range<usize>,
    },
    #[error("Non-local pair ({i}, {j}) involves only local atoms")]
    LocalPairInNonLocalList { i: usize, j: usize },
    #[error("Pair ({i}, {j}) references shift index {shift}, table has {len}")]
    ShiftOutOfRange {
        i: usize,
        j: usize,
        shift: usize,
        len: usize,
    },
    #[error("Cutoff {cutoff} must be positive and below half the shortest box edge {limit}")]
    InvalidCutoff { cutoff: f64, limit: f64 },
    #[error("State holds {available} atoms but the partition needs {required}")]
    StateTooSmall { required: usize, available: usize },
}

/// One interacting atom pair. The displacement is `x[i] + shifts[shift] - x[j]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtomPair {
    pub i: usize,
    pub j: usize,
    pub shift: usize,
}

/// Per-atom interaction parameters, indexed like the state's atoms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomData {
    pub charges: Vec<f64>,
    pub type_ids: Vec<usize>,
}

impl AtomData {
    pub fn new(charges: Vec<f64>, type_ids: Vec<usize>) -> Result<Self, PairListError> {
        if charges.len() != type_ids.len() {
            return Err(PairListError::AtomDataMismatch {
                charges: charges.len(),
                types: type_ids.len(),
            });
        }
        Ok(Self { charges, type_ids })
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairList {
    pub locality: LocalityClass,
    pub pairs: Vec<AtomPair>,
}

impl PairList {
    pub fn new(locality: LocalityClass) -> Self {
        Self {
            locality,
            pairs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Everything the pipeline needs about one generation of the atom partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub generation: u64,
    pub atoms: AtomData,
    /// Atoms `[0, local_atoms)` are local; the rest are non-local (halo) atoms.
    pub local_atoms: usize,
    pub local: PairList,
    pub non_local: PairList,
}

impl Partition {
    pub fn total_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn pair_list(&self, locality: LocalityClass) -> &PairList {
        match locality {
            LocalityClass::Local => &self.local,
            LocalityClass::NonLocal => &self.non_local,
        }
    }

    /// Atoms whose coordinates a locality class's kernel reads and whose forces it
    /// produces. Non-local pairs couple halo atoms to local ones, so that class spans
    /// every atom.
    pub fn atom_range(&self, locality: LocalityClass) -> Range<usize> {
        match locality {
            LocalityClass::Local => 0..self.local_atoms,
            LocalityClass::NonLocal => 0..self.total_atoms(),
        }
    }

    pub fn validate(&self) -> Result<(), PairListError> {
        if self.atoms.charges.len() != self.atoms.type_ids.len() {
            return Err(PairListError::AtomDataMismatch {
                charges: self.atoms.charges.len(),
                types: self.atoms.type_ids.len(),
            });
        }
        if self.local_atoms > self.total_atoms() {
            return Err(PairListError::LocalCountTooLarge {
                local: self.local_atoms,
                total: self.total_atoms(),
            });
        }
        for locality in LocalityClass::ALL {
            let range = self.atom_range(locality);
            for p in &self.pair_list(locality).pairs {
                if !range.contains(&p.i) || !range.contains(&p.j) {
                    return Err(PairListError::PairOutOfRange {
                        locality,
                        i: p.i,
                        j: p.j,
                        range,
                    });
                }
                if p.shift >= ShiftTable::LEN {
                    return Err(PairListError::ShiftOutOfRange {
                        i: p.i,
                        j: p.j,
                        shift: p.shift,
                        len: ShiftTable::LEN,
                    });
                }
                let touches_halo = p.i >= self.local_atoms || p.j >= self.local_atoms;
                if locality == LocalityClass::NonLocal && !touches_halo {
                    return Err(PairListError::LocalPairInNonLocalList { i: p.i, j: p.j });
                }
            }
        }
        Ok(())
    }
}

/// The external pair-list builder, as seen by a timestep driver.
///
/// Called whenever the driver repartitions; the returned partition must carry
/// `generation`.
pub trait PartitionSource {
    fn partition(
        &mut self,
        state: &SimulationState,
        generation: u64,
    ) -> Result<Partition, PairListError>;
}
