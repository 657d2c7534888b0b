use super::context::{DeviceBuffer, DeviceContext};
use super::error::OffloadError;
use crate::core::kernel::PairEnergies;
use crate::core::models::geometry::Vec3;
use crate::core::models::locality::LocalityClass;
use crate::core::pairlist::{AtomPair, Partition, ShiftTable};
use tracing::debug;

/// Accelerator-side mirrors for one locality class.
///
/// Atom-indexed buffers cover the class's atom range of the current partition. Capacity
/// only grows; `atom_count` and `pair_count` give the valid prefix.
#[derive(Debug)]
pub struct OffloadBuffer {
    locality: LocalityClass,
    generation: Option<u64>,
    atom_count: usize,
    pair_count: usize,
    pub(crate) positions: DeviceBuffer<Vec3>,
    pub(crate) charges: DeviceBuffer<f64>,
    pub(crate) type_ids: DeviceBuffer<usize>,
    pub(crate) pairs: DeviceBuffer<AtomPair>,
    pub(crate) shift_vectors: DeviceBuffer<Vec3>,
    pub(crate) forces: DeviceBuffer<Vec3>,
    pub(crate) shift_forces: DeviceBuffer<Vec3>,
    pub(crate) energies: DeviceBuffer<PairEnergies>,
}

impl OffloadBuffer {
    pub fn new(context: &DeviceContext, locality: LocalityClass) -> Result<Self, OffloadError> {
        Ok(Self {
            locality,
            generation: None,
            atom_count: 0,
            pair_count: 0,
            positions: context.allocate(0)?,
            charges: context.allocate(0)?,
            type_ids: context.allocate(0)?,
            pairs: context.allocate(0)?,
            shift_vectors: context.allocate(ShiftTable::LEN)?,
            forces: context.allocate(0)?,
            shift_forces: context.allocate(ShiftTable::LEN)?,
            energies: context.allocate(1)?,
        })
    }

    pub fn locality(&self) -> LocalityClass {
        self.locality
    }

    /// Partition generation the buffers were last built for.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    pub fn pair_count(&self) -> usize {
        self.pair_count
    }

    /// Resizes the index buffers for `partition` and uploads its per-atom parameters and
    /// pair indices. Runs synchronously on the host; the class's queue must be idle.
    pub fn rebuild(&mut self, partition: &Partition, growth: f64) -> Result<(), OffloadError> {
        let range = partition.atom_range(self.locality);
        let pairs = &partition.pair_list(self.locality).pairs;
        let atoms = range.len();

        // Invalidate first so a failed rebuild is never mistaken for a current one.
        self.generation = None;
        self.atom_count = 0;
        self.pair_count = 0;

        let mut grown = false;
        grown |= self.positions.ensure_capacity(atoms, growth)?;
        grown |= self.charges.ensure_capacity(atoms, growth)?;
        grown |= self.type_ids.ensure_capacity(atoms, growth)?;
        grown |= self.forces.ensure_capacity(atoms, growth)?;
        grown |= self.pairs.ensure_capacity(pairs.len(), growth)?;

        self.charges.slice().lock()[..atoms].copy_from_slice(&partition.atoms.charges[range.clone()]);
        self.type_ids.slice().lock()[..atoms]
            .copy_from_slice(&partition.atoms.type_ids[range.clone()]);
        self.pairs.slice().lock()[..pairs.len()].copy_from_slice(pairs);

        self.atom_count = atoms;
        self.pair_count = pairs.len();
        self.generation = Some(partition.generation);
        debug!(
            locality = %self.locality,
            generation = partition.generation,
            atoms,
            pairs = pairs.len(),
            reallocated = grown,
            "Rebuilt offload buffers"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pairlist::{AtomData, PairList};

    fn partition(generation: u64, atoms: usize, local_atoms: usize) -> Partition {
        let pair = |i, j| AtomPair {
            i,
            j,
            shift: ShiftTable::CENTRAL,
        };
        Partition {
            generation,
            atoms: AtomData::new(
                (0..atoms).map(|i| i as f64).collect(),
                vec![0; atoms],
            )
            .unwrap(),
            local_atoms,
            local: PairList {
                locality: LocalityClass::Local,
                pairs: vec![pair(0, 1)],
            },
            non_local: PairList {
                locality: LocalityClass::NonLocal,
                pairs: vec![pair(0, atoms - 1), pair(1, atoms - 1)],
            },
        }
    }

    #[test]
    fn rebuild_uploads_the_class_atom_range() {
        let ctx = DeviceContext::new("test", None);
        let mut local = OffloadBuffer::new(&ctx, LocalityClass::Local).unwrap();
        let mut non_local = OffloadBuffer::new(&ctx, LocalityClass::NonLocal).unwrap();
        let p = partition(3, 6, 4);

        local.rebuild(&p, 1.0).unwrap();
        non_local.rebuild(&p, 1.0).unwrap();

        assert_eq!(local.generation(), Some(3));
        assert_eq!(local.atom_count(), 4);
        assert_eq!(local.pair_count(), 1);
        assert_eq!(non_local.atom_count(), 6);
        assert_eq!(non_local.pair_count(), 2);
        assert_eq!(&local.charges.slice().lock()[..4], &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn smaller_partition_reuses_allocations() {
        let ctx = DeviceContext::new("test", None);
        let mut buffer = OffloadBuffer::new(&ctx, LocalityClass::NonLocal).unwrap();
        buffer.rebuild(&partition(1, 10, 5), 1.5).unwrap();
        let charged = ctx.allocated_bytes();
        buffer.rebuild(&partition(2, 8, 5), 1.5).unwrap();
        assert_eq!(ctx.allocated_bytes(), charged);
        assert_eq!(buffer.atom_count(), 8);
        assert_eq!(buffer.generation(), Some(2));
    }

    #[test]
    fn failed_rebuild_invalidates_the_generation() {
        let ctx = DeviceContext::new("tiny", Some(4096));
        let mut buffer = OffloadBuffer::new(&ctx, LocalityClass::NonLocal).unwrap();
        buffer.rebuild(&partition(1, 3, 2), 1.0).unwrap();
        let err = buffer.rebuild(&partition(2, 500, 2), 1.0).unwrap_err();
        assert!(matches!(err, OffloadError::Allocation { .. }));
        assert_eq!(buffer.generation(), None);
        assert_eq!(buffer.atom_count(), 0);
    }

    #[test]
    fn dropping_buffers_returns_the_budget() {
        let ctx = DeviceContext::new("test", None);
        let mut buffer = OffloadBuffer::new(&ctx, LocalityClass::Local).unwrap();
        buffer.rebuild(&partition(1, 12, 12), 1.2).unwrap();
        assert!(ctx.allocated_bytes() > 0);
        drop(buffer);
        assert_eq!(ctx.allocated_bytes(), 0);
    }
}
