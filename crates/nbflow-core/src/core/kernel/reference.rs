use super::{ForceFlags, KernelFault, KernelInput, KernelOutput, PairEnergies, PairKernel};
use crate::core::models::geometry::Vec3;
use crate::core::pairlist::{AtomPair, ShiftTable};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Electric conversion factor, kJ mol^-1 nm e^-2.
pub const COULOMB_FACTOR: f64 = 138.935_458;

#[cfg(feature = "parallel")]
const PAIRS_PER_CHUNK: usize = 4096;

/// Symmetric C6/C12 table over atom types.
#[derive(Debug, Clone, PartialEq)]
pub struct LennardJonesTable {
    types: usize,
    c6: Vec<f64>,
    c12: Vec<f64>,
}

impl LennardJonesTable {
    pub fn new(types: usize) -> Self {
        Self {
            types,
            c6: vec![0.0; types * types],
            c12: vec![0.0; types * types],
        }
    }

    /// A single-type table.
    pub fn uniform(c6: f64, c12: f64) -> Self {
        let mut table = Self::new(1);
        table.set(0, 0, c6, c12);
        table
    }

    pub fn set(&mut self, a: usize, b: usize, c6: f64, c12: f64) {
        for (p, q) in [(a, b), (b, a)] {
            self.c6[p * self.types + q] = c6;
            self.c12[p * self.types + q] = c12;
        }
    }

    pub fn get(&self, a: usize, b: usize) -> Option<(f64, f64)> {
        if a >= self.types || b >= self.types {
            return None;
        }
        let idx = a * self.types + b;
        Some((self.c6[idx], self.c12[idx]))
    }

    pub fn types(&self) -> usize {
        self.types
    }
}

/// Plain-cutoff Lennard-Jones plus Coulomb kernel evaluated on the host.
///
/// Accumulates pairs in list order so results are bitwise reproducible; with the
/// `parallel` feature, fixed-size chunks are evaluated concurrently and reduced in
/// chunk order.
#[derive(Debug, Clone)]
pub struct ReferenceKernel {
    lj: LennardJonesTable,
    cutoff: f64,
    epsilon_r: f64,
}

struct PairTerm {
    force: Vec3,
    energies: PairEnergies,
}

impl ReferenceKernel {
    pub fn new(lj: LennardJonesTable, cutoff: f64) -> Self {
        Self {
            lj,
            cutoff,
            epsilon_r: 1.0,
        }
    }

    pub fn with_dielectric(mut self, epsilon_r: f64) -> Self {
        self.epsilon_r = epsilon_r;
        self
    }

    fn interact(
        &self,
        input: &KernelInput<'_>,
        pair: &AtomPair,
    ) -> Result<Option<PairTerm>, KernelFault> {
        let fetch = |idx: usize| -> Result<(Vec3, f64, usize), KernelFault> {
            match (
                input.positions.get(idx),
                input.charges.get(idx),
                input.type_ids.get(idx),
            ) {
                (Some(x), Some(q), Some(t)) => Ok((*x, *q, *t)),
                _ => Err(KernelFault(format!(
                    "atom index {idx} outside the {} uploaded atoms",
                    input.positions.len()
                ))),
            }
        };
        let (xi, qi, ti) = fetch(pair.i)?;
        let (xj, qj, tj) = fetch(pair.j)?;
        let shift = input.shift_vectors.get(pair.shift).ok_or_else(|| {
            KernelFault(format!("shift index {} outside the table", pair.shift))
        })?;

        let dr = xi + shift - xj;
        let r2 = dr.norm_squared();
        if r2 >= self.cutoff * self.cutoff {
            return Ok(None);
        }
        if r2 == 0.0 {
            return Err(KernelFault(format!(
                "atoms {} and {} coincide",
                pair.i, pair.j
            )));
        }

        let (c6, c12) = self
            .lj
            .get(ti, tj)
            .ok_or_else(|| KernelFault(format!("no LJ parameters for types ({ti}, {tj})")))?;

        let rinv2 = 1.0 / r2;
        let rinv = rinv2.sqrt();
        let rinv6 = rinv2 * rinv2 * rinv2;
        let vlj = c12 * rinv6 * rinv6 - c6 * rinv6;
        let flj = (12.0 * c12 * rinv6 * rinv6 - 6.0 * c6 * rinv6) * rinv2;

        let qq = COULOMB_FACTOR / self.epsilon_r * qi * qj;
        let vcoul = qq * rinv;
        let fcoul = vcoul * rinv2;

        Ok(Some(PairTerm {
            force: dr * (flj + fcoul),
            energies: PairEnergies::new(vlj, vcoul),
        }))
    }

    fn accumulate(
        &self,
        input: &KernelInput<'_>,
        pairs: &[AtomPair],
        flags: ForceFlags,
        output: &mut KernelOutput<'_>,
    ) -> Result<(), KernelFault> {
        for pair in pairs {
            let Some(term) = self.interact(input, pair)? else {
                continue;
            };
            output.forces[pair.i] += term.force;
            output.forces[pair.j] -= term.force;
            if flags.contains(ForceFlags::SHIFT_FORCES) {
                output.shift_forces[pair.shift] += term.force;
                output.shift_forces[ShiftTable::CENTRAL] -= term.force;
            }
            if flags.contains(ForceFlags::ENERGY) {
                *output.energies += term.energies;
            }
        }
        Ok(())
    }
}

impl PairKernel for ReferenceKernel {
    fn name(&self) -> &str {
        "reference-lj-coulomb"
    }

    fn compute(
        &self,
        input: &KernelInput<'_>,
        flags: ForceFlags,
        output: &mut KernelOutput<'_>,
    ) -> Result<(), KernelFault> {
        if output.forces.len() < input.positions.len() {
            return Err(KernelFault(format!(
                "force buffer holds {} atoms, {} uploaded",
                output.forces.len(),
                input.positions.len()
            )));
        }
        if flags.contains(ForceFlags::SHIFT_FORCES) && output.shift_forces.len() < ShiftTable::LEN
        {
            return Err(KernelFault("shift force buffer too small".to_string()));
        }

        self.accumulate_all(input, flags, output)
    }
}

impl ReferenceKernel {
    #[cfg(not(feature = "parallel"))]
    fn accumulate_all(
        &self,
        input: &KernelInput<'_>,
        flags: ForceFlags,
        output: &mut KernelOutput<'_>,
    ) -> Result<(), KernelFault> {
        self.accumulate(input, input.pairs, flags, output)
    }

    #[cfg(feature = "parallel")]
    fn accumulate_all(
        &self,
        input: &KernelInput<'_>,
        flags: ForceFlags,
        output: &mut KernelOutput<'_>,
    ) -> Result<(), KernelFault> {
        let atoms = output.forces.len();
        let shifts = output.shift_forces.len();
        let partials = input
            .pairs
            .par_chunks(PAIRS_PER_CHUNK)
            .map(|chunk| -> Result<(Vec<Vec3>, Vec<Vec3>, PairEnergies), KernelFault> {
                let mut forces = vec![Vec3::zeros(); atoms];
                let mut shift_forces = vec![Vec3::zeros(); shifts];
                let mut energies = PairEnergies::default();
                let mut partial = KernelOutput {
                    forces: &mut forces,
                    shift_forces: &mut shift_forces,
                    energies: &mut energies,
                };
                self.accumulate(input, chunk, flags, &mut partial)?;
                Ok((forces, shift_forces, energies))
            })
            .collect::<Vec<_>>();

        // Chunk order, not completion order, so results stay reproducible.
        for partial in partials {
            let (forces, shift_forces, energies) = partial?;
            for (acc, f) in output.forces.iter_mut().zip(&forces) {
                *acc += f;
            }
            for (acc, f) in output.shift_forces.iter_mut().zip(&shift_forces) {
                *acc += f;
            }
            *output.energies += energies;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::geometry::Mat3;

    const C6: f64 = 1.0e-3;
    const C12: f64 = 1.0e-6;

    struct Fixture {
        positions: Vec<Vec3>,
        charges: Vec<f64>,
        types: Vec<usize>,
        pairs: Vec<AtomPair>,
        shifts: ShiftTable,
    }

    impl Fixture {
        fn new(positions: Vec<Vec3>, charges: Vec<f64>) -> Self {
            let n = positions.len();
            let pairs = (0..n)
                .flat_map(|i| {
                    ((i + 1)..n).map(move |j| AtomPair {
                        i,
                        j,
                        shift: ShiftTable::CENTRAL,
                    })
                })
                .collect();
            Self {
                positions,
                charges,
                types: vec![0; n],
                pairs,
                shifts: ShiftTable::from_box(&(Mat3::identity() * 10.0)),
            }
        }

        fn run(&self, flags: ForceFlags) -> Result<(Vec<Vec3>, Vec<Vec3>, PairEnergies), KernelFault> {
            let kernel = ReferenceKernel::new(LennardJonesTable::uniform(C6, C12), 1.2);
            let input = KernelInput {
                positions: &self.positions,
                charges: &self.charges,
                type_ids: &self.types,
                pairs: &self.pairs,
                shift_vectors: self.shifts.vectors(),
            };
            let mut forces = vec![Vec3::zeros(); self.positions.len()];
            let mut shift_forces = vec![Vec3::zeros(); ShiftTable::LEN];
            let mut energies = PairEnergies::default();
            kernel.compute(
                &input,
                flags,
                &mut KernelOutput {
                    forces: &mut forces,
                    shift_forces: &mut shift_forces,
                    energies: &mut energies,
                },
            )?;
            Ok((forces, shift_forces, energies))
        }
    }

    #[test]
    fn forces_obey_newtons_third_law() {
        let fx = Fixture::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.3, 0.1, 0.0),
                Vec3::new(0.1, 0.4, 0.2),
            ],
            vec![0.5, -0.5, 0.25],
        );
        let (forces, _, _) = fx.run(ForceFlags::empty()).unwrap();
        let net: Vec3 = forces.iter().sum();
        assert!(net.norm() < 1e-9, "net force {net}");
    }

    #[test]
    fn lj_force_vanishes_at_potential_minimum() {
        let r_min = (2.0 * C12 / C6).powf(1.0 / 6.0);
        let fx = Fixture::new(vec![Vec3::zeros(), Vec3::new(r_min, 0.0, 0.0)], vec![0.0, 0.0]);
        let (forces, _, energies) = fx.run(ForceFlags::ENERGY).unwrap();
        assert!(forces[0].norm() < 1e-9);
        assert!(energies.lennard_jones < 0.0);
        assert_eq!(energies.coulomb, 0.0);
    }

    #[test]
    fn opposite_charges_attract() {
        let fx = Fixture::new(vec![Vec3::zeros(), Vec3::new(0.8, 0.0, 0.0)], vec![1.0, -1.0]);
        let (forces, _, energies) = fx.run(ForceFlags::ENERGY).unwrap();
        assert!(forces[0].x > 0.0);
        assert!(forces[1].x < 0.0);
        assert!(energies.coulomb < 0.0);
    }

    #[test]
    fn pairs_beyond_cutoff_contribute_nothing() {
        let fx = Fixture::new(vec![Vec3::zeros(), Vec3::new(1.5, 0.0, 0.0)], vec![1.0, 1.0]);
        let (forces, _, energies) = fx.run(ForceFlags::ENERGY).unwrap();
        assert!(forces.iter().all(|f| *f == Vec3::zeros()));
        assert_eq!(energies, PairEnergies::default());
    }

    #[test]
    fn energies_untouched_unless_requested() {
        let fx = Fixture::new(vec![Vec3::zeros(), Vec3::new(0.5, 0.0, 0.0)], vec![1.0, 1.0]);
        let (_, shift_forces, energies) = fx.run(ForceFlags::empty()).unwrap();
        assert_eq!(energies, PairEnergies::default());
        assert!(shift_forces.iter().all(|f| *f == Vec3::zeros()));
    }

    #[test]
    fn shift_forces_sum_to_zero() {
        let fx = Fixture::new(
            vec![Vec3::zeros(), Vec3::new(0.5, 0.2, 0.0), Vec3::new(0.1, 0.6, 0.3)],
            vec![0.3, 0.3, -0.6],
        );
        let (_, shift_forces, _) = fx.run(ForceFlags::SHIFT_FORCES).unwrap();
        let net: Vec3 = shift_forces.iter().sum();
        assert!(net.norm() < 1e-9);
    }

    #[test]
    fn coincident_atoms_fault() {
        let fx = Fixture::new(vec![Vec3::zeros(), Vec3::zeros()], vec![0.0, 0.0]);
        assert!(fx.run(ForceFlags::empty()).is_err());
    }

    #[test]
    fn unknown_atom_type_faults() {
        let mut fx = Fixture::new(vec![Vec3::zeros(), Vec3::new(0.5, 0.0, 0.0)], vec![0.0, 0.0]);
        fx.types[1] = 3;
        let err = fx.run(ForceFlags::empty()).unwrap_err();
        assert!(err.0.contains("no LJ parameters"));
    }

    #[test]
    fn table_is_symmetric() {
        let mut table = LennardJonesTable::new(2);
        table.set(0, 1, 2.0, 3.0);
        assert_eq!(table.get(1, 0), Some((2.0, 3.0)));
        assert_eq!(table.get(2, 0), None);
    }
}
