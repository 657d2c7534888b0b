use super::fields::StateFields;
use super::simulation::{CouplingChain, SimulationState};
use crate::core::models::geometry::{DIM, Mat3, Vec3};
use std::fmt;
use tracing::debug;

/// Combined absolute/relative tolerance test.
///
/// Two values pass when `|a - b| <= absolute + relative * max(|a|, |b|)`. With both
/// tolerances zero the test is bitwise: any difference in representation fails.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tolerance {
    pub relative: f64,
    pub absolute: f64,
}

impl Tolerance {
    pub fn new(relative: f64, absolute: f64) -> Self {
        Self { relative, absolute }
    }

    pub fn exact() -> Self {
        Self::default()
    }

    pub fn is_exact(&self) -> bool {
        self.relative == 0.0 && self.absolute == 0.0
    }

    pub fn accepts(&self, a: f64, b: f64) -> bool {
        if self.is_exact() {
            return a.to_bits() == b.to_bits();
        }
        (a - b).abs() <= self.bound(a.abs().max(b.abs()))
    }

    fn bound(&self, scale: f64) -> f64 {
        self.absolute + self.relative * scale
    }
}

/// Where inside a field a differing value sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementLocation {
    Scalar,
    Index(usize),
    Component { index: usize, dim: usize },
    Matrix { row: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    /// The active-field masks themselves differ.
    Flags { left: StateFields, right: StateFields },
    /// An integer parameter differs. For shape parameters the dependent sequences
    /// were not compared.
    Integer {
        field: &'static str,
        left: usize,
        right: usize,
    },
    Value {
        field: &'static str,
        location: ElementLocation,
        left: f64,
        right: f64,
    },
    /// Root-mean-square deviation over a per-atom field.
    Rmsd {
        field: &'static str,
        rmsd: f64,
        within_tolerance: bool,
    },
}

impl Difference {
    pub fn field(&self) -> &'static str {
        match self {
            Difference::Flags { .. } => "flags",
            Difference::Integer { field, .. }
            | Difference::Value { field, .. }
            | Difference::Rmsd { field, .. } => *field,
        }
    }

    pub fn is_mismatch(&self) -> bool {
        match self {
            Difference::Rmsd {
                within_tolerance, ..
            } => !within_tolerance,
            _ => true,
        }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::Flags { left, right } => {
                write!(f, "flags: {:#x} != {:#x}", left.bits(), right.bits())
            }
            Difference::Integer { field, left, right } => {
                write!(f, "{field}: {left} != {right}")
            }
            Difference::Value {
                field,
                location,
                left,
                right,
            } => match location {
                ElementLocation::Scalar => write!(f, "{field}: {left} != {right}"),
                ElementLocation::Index(i) => write!(f, "{field}[{i}]: {left} != {right}"),
                ElementLocation::Component { index, dim } => {
                    write!(f, "{field}[{index}][{dim}]: {left} != {right}")
                }
                ElementLocation::Matrix { row, col } => {
                    write!(f, "{field}[{row}][{col}]: {left} != {right}")
                }
            },
            Difference::Rmsd {
                field,
                rmsd,
                within_tolerance,
            } => write!(
                f,
                "{field}: rmsd {rmsd:e}{}",
                if *within_tolerance {
                    ""
                } else {
                    " (exceeds tolerance)"
                }
            ),
        }
    }
}

/// Outcome of [`SimulationState::compare`]. Mismatches are data, not errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonReport {
    differences: Vec<Difference>,
    compared_fields: Vec<&'static str>,
}

impl ComparisonReport {
    pub fn differences(&self) -> &[Difference] {
        &self.differences
    }

    /// Fields that were actually examined (active in both snapshots, matching shapes).
    pub fn compared_fields(&self) -> &[&'static str] {
        &self.compared_fields
    }

    pub fn is_match(&self) -> bool {
        !self.differences.iter().any(Difference::is_mismatch)
    }

    pub fn mismatch_count(&self) -> usize {
        self.differences.iter().filter(|d| d.is_mismatch()).count()
    }

    pub fn has_mismatch(&self, field: &str) -> bool {
        self.differences
            .iter()
            .any(|d| d.is_mismatch() && d.field() == field)
    }

    pub fn was_compared(&self, field: &str) -> bool {
        self.compared_fields.iter().any(|f| *f == field)
    }

    pub fn rmsd(&self, field: &str) -> Option<f64> {
        self.differences.iter().find_map(|d| match d {
            Difference::Rmsd { field: f, rmsd, .. } if *f == field => Some(*rmsd),
            _ => None,
        })
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.differences.is_empty() {
            return writeln!(f, "states match ({} fields)", self.compared_fields.len());
        }
        for diff in &self.differences {
            writeln!(f, "{diff}")?;
        }
        Ok(())
    }
}

struct Comparer {
    tolerance: Tolerance,
    use_rmsd: bool,
    report: ComparisonReport,
}

impl Comparer {
    fn push(&mut self, diff: Difference) {
        debug!(%diff, "State difference.");
        self.report.differences.push(diff);
    }

    fn integer(&mut self, field: &'static str, left: usize, right: usize) -> bool {
        if left != right {
            self.push(Difference::Integer { field, left, right });
            return false;
        }
        true
    }

    fn scalar(&mut self, field: &'static str, left: f64, right: f64) {
        self.report.compared_fields.push(field);
        if !self.tolerance.accepts(left, right) {
            self.push(Difference::Value {
                field,
                location: ElementLocation::Scalar,
                left,
                right,
            });
        }
    }

    fn sequence(&mut self, field: &'static str, left: &[f64], right: &[f64]) {
        if !self.integer(field, left.len(), right.len()) {
            return;
        }
        self.report.compared_fields.push(field);
        for (i, (&a, &b)) in left.iter().zip(right).enumerate() {
            if !self.tolerance.accepts(a, b) {
                self.push(Difference::Value {
                    field,
                    location: ElementLocation::Index(i),
                    left: a,
                    right: b,
                });
            }
        }
    }

    fn matrix(&mut self, field: &'static str, left: &Mat3, right: &Mat3) {
        self.report.compared_fields.push(field);
        for row in 0..DIM {
            for col in 0..DIM {
                let (a, b) = (left[(row, col)], right[(row, col)]);
                if !self.tolerance.accepts(a, b) {
                    self.push(Difference::Value {
                        field,
                        location: ElementLocation::Matrix { row, col },
                        left: a,
                        right: b,
                    });
                }
            }
        }
    }

    fn vectors(&mut self, field: &'static str, left: &[Vec3], right: &[Vec3]) {
        self.report.compared_fields.push(field);
        if self.use_rmsd {
            self.rmsd(field, left, right);
            return;
        }
        for (index, (a, b)) in left.iter().zip(right).enumerate() {
            for dim in 0..DIM {
                if !self.tolerance.accepts(a[dim], b[dim]) {
                    self.push(Difference::Value {
                        field,
                        location: ElementLocation::Component { index, dim },
                        left: a[dim],
                        right: b[dim],
                    });
                }
            }
        }
    }

    fn rmsd(&mut self, field: &'static str, left: &[Vec3], right: &[Vec3]) {
        if left.is_empty() {
            return;
        }
        let n = left.len() as f64;
        let msd = left
            .iter()
            .zip(right)
            .map(|(a, b)| (a - b).norm_squared())
            .sum::<f64>()
            / n;
        let mean_sq = |v: &[Vec3]| v.iter().map(|x| x.norm_squared()).sum::<f64>() / n;
        let rmsd = msd.sqrt();
        let scale = mean_sq(left).sqrt().max(mean_sq(right).sqrt());
        let within_tolerance = if self.tolerance.is_exact() {
            left.iter().zip(right).all(|(a, b)| {
                a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| x.to_bits() == y.to_bits())
            })
        } else {
            rmsd <= self.tolerance.bound(scale)
        };
        self.push(Difference::Rmsd {
            field,
            rmsd,
            within_tolerance,
        });
    }

    fn chain(&mut self, prefix: ChainFields, left: &CouplingChain, right: &CouplingChain) {
        self.sequence(prefix.positions, left.positions(), right.positions());
        self.sequence(prefix.velocities, left.velocities(), right.velocities());
    }
}

struct ChainFields {
    positions: &'static str,
    velocities: &'static str,
}

const THERMOSTAT_FIELDS: ChainFields = ChainFields {
    positions: "thermostat_positions",
    velocities: "thermostat_velocities",
};

const BAROSTAT_FIELDS: ChainFields = ChainFields {
    positions: "barostat_positions",
    velocities: "barostat_velocities",
};

impl SimulationState {
    /// Compares two snapshots field by field and reports every difference.
    ///
    /// Only fields active in both snapshots are examined. Coupling chains are compared
    /// only when their dimensions agree, per-atom fields only when the atom counts agree.
    /// With `use_rmsd`, positions and velocities are summarized by their root-mean-square
    /// deviation instead of per-element differences. Neither snapshot is modified.
    pub fn compare(
        &self,
        other: &SimulationState,
        use_rmsd: bool,
        relative_tolerance: f64,
        absolute_tolerance: f64,
    ) -> ComparisonReport {
        let mut cmp = Comparer {
            tolerance: Tolerance::new(relative_tolerance, absolute_tolerance),
            use_rmsd,
            report: ComparisonReport::default(),
        };

        if self.flags != other.flags {
            cmp.push(Difference::Flags {
                left: self.flags,
                right: other.flags,
            });
        }
        let active = self.flags & other.flags;

        let matrices: [(StateFields, &'static str, &Mat3, &Mat3); 6] = [
            (StateFields::BOX, "box", &self.box_matrix, &other.box_matrix),
            (StateFields::BOX_REL, "box_rel", &self.box_rel, &other.box_rel),
            (
                StateFields::BOX_VELOCITY,
                "box_velocity",
                &self.box_velocity,
                &other.box_velocity,
            ),
            (
                StateFields::PRESSURE_PREV,
                "pressure_prev",
                &self.pressure_prev,
                &other.pressure_prev,
            ),
            (
                StateFields::SHAKE_VIRIAL_PREV,
                "shake_virial_prev",
                &self.shake_virial_prev,
                &other.shake_virial_prev,
            ),
            (
                StateFields::FORCE_VIRIAL_PREV,
                "force_virial_prev",
                &self.force_virial_prev,
                &other.force_virial_prev,
            ),
        ];
        for (flag, field, a, b) in matrices {
            if active.contains(flag) {
                cmp.matrix(field, a, b);
            }
        }

        if active.contains(StateFields::BAROSTAT_VELOCITY) {
            cmp.scalar(
                "barostat_velocity",
                self.barostat_velocity,
                other.barostat_velocity,
            );
        }

        let (da, db) = (self.dimensions(), other.dimensions());
        let chain_ok = cmp.integer("chain_length", da.chain_length, db.chain_length);
        let thermostats_ok = cmp.integer("num_thermostats", da.num_thermostats, db.num_thermostats);
        if chain_ok && thermostats_ok && active.contains(StateFields::THERMOSTAT_CHAIN) {
            cmp.chain(THERMOSTAT_FIELDS, self.thermostat(), other.thermostat());
        }
        if thermostats_ok && active.contains(StateFields::THERMOSTAT_INTEGRAL) {
            cmp.sequence(
                "thermostat_integral",
                self.thermostat_integral(),
                other.thermostat_integral(),
            );
        }
        let barostats_ok =
            cmp.integer("num_barostat_vars", da.num_barostat_vars, db.num_barostat_vars);
        if chain_ok && barostats_ok && active.contains(StateFields::BAROSTAT_CHAIN) {
            cmp.chain(BAROSTAT_FIELDS, self.barostat(), other.barostat());
        }

        if active.contains(StateFields::LAMBDA) {
            cmp.sequence("lambda", self.lambdas(), other.lambdas());
        }
        if active.contains(StateFields::FEP_STATE) {
            cmp.report.compared_fields.push("fep_state");
            cmp.integer("fep_state", self.current_fep_state, other.current_fep_state);
        }

        if cmp.integer("atom_count", da.atom_count, db.atom_count) {
            if active.contains(StateFields::POSITIONS) {
                cmp.vectors("positions", self.positions(), other.positions());
            }
            if active.contains(StateFields::VELOCITIES) {
                cmp.vectors("velocities", self.velocities(), other.velocities());
            }
        }

        cmp.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{FreeEnergyComponent, StateDimensions};

    fn state(atoms: usize) -> SimulationState {
        let mut s = SimulationState::new(StateDimensions {
            atom_count: atoms,
            num_thermostats: 2,
            num_barostat_vars: 1,
            chain_length: 2,
            free_energy_dimension: 0,
        });
        s.flags = StateFields::BOX | StateFields::POSITIONS | StateFields::VELOCITIES;
        for (i, x) in s.positions_mut().iter_mut().enumerate() {
            *x = Vec3::new(i as f64, 1.0, -1.0);
        }
        s.box_matrix = Mat3::identity() * 3.0;
        s
    }

    #[test]
    fn tolerance_accepts_difference_equal_to_bound() {
        let tol = Tolerance::new(0.0, 0.5);
        assert!(tol.accepts(1.0, 1.5));
        assert!(!tol.accepts(1.0, 1.5 + f64::EPSILON * 4.0));
    }

    #[test]
    fn relative_tolerance_scales_with_larger_magnitude() {
        let tol = Tolerance::new(0.25, 0.0);
        assert!(tol.accepts(3.0, 4.0));
        assert!(!tol.accepts(2.0, 4.0));
    }

    #[test]
    fn exact_tolerance_flags_bitwise_differences() {
        let tol = Tolerance::exact();
        assert!(tol.accepts(1.0, 1.0));
        assert!(!tol.accepts(1.0, 1.0 + f64::EPSILON));
        assert!(!tol.accepts(0.0, -0.0));
    }

    #[test]
    fn identical_states_match() {
        let a = state(4);
        let report = a.compare(&a.clone(), false, 0.0, 0.0);
        assert!(report.is_match(), "{report}");
        assert!(report.was_compared("box"));
        assert!(report.was_compared("positions"));
    }

    #[test]
    fn zero_tolerance_flags_any_difference_in_active_field() {
        let a = state(3);
        let mut b = a.clone();
        b.positions_mut()[1].y = f64::from_bits(1.0f64.to_bits() + 1);

        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.has_mismatch("positions"));
        assert_eq!(report.mismatch_count(), 1);
        assert!(matches!(
            report.differences()[0],
            Difference::Value {
                location: ElementLocation::Component { index: 1, dim: 1 },
                ..
            }
        ));
    }

    #[test]
    fn box_differing_by_exactly_absolute_tolerance_passes() {
        let a = state(2);
        let mut b = a.clone();
        b.box_matrix[(0, 1)] += 0.5;

        let report = a.compare(&b, false, 0.0, 0.5);
        assert!(!report.has_mismatch("box"), "{report}");

        b.box_matrix[(0, 1)] = a.box_matrix[(0, 1)] + 1.0;
        let report = a.compare(&b, false, 0.0, 0.5);
        assert!(report.has_mismatch("box"));
    }

    #[test]
    fn box_differing_by_tolerance_plus_epsilon_fails() {
        let a = state(2);
        let mut b = a.clone();
        b.box_matrix[(2, 2)] = 3.5 + 1.0 / 1048576.0;
        let report = a.compare(&b, false, 0.0, 0.5);
        assert!(report.has_mismatch("box"));
    }

    #[test]
    fn inactive_fields_are_never_compared() {
        let mut a = state(2);
        a.flags = StateFields::POSITIONS;
        let mut b = a.clone();
        b.box_matrix[(0, 0)] = 100.0;
        b.velocities_mut()[0] = Vec3::new(5.0, 5.0, 5.0);

        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.is_match(), "{report}");
        assert!(!report.was_compared("box"));
        assert!(!report.was_compared("velocities"));
    }

    #[test]
    fn field_active_in_only_one_snapshot_is_skipped_but_flags_differ() {
        let a = state(2);
        let mut b = a.clone();
        b.flags.remove(StateFields::BOX);
        b.box_matrix[(0, 0)] = -1.0;

        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.has_mismatch("flags"));
        assert!(!report.has_mismatch("box"));
        assert!(!report.was_compared("box"));
    }

    #[test]
    fn rmsd_mode_reports_a_single_deviation_per_field() {
        let a = state(4);
        let mut b = a.clone();
        for x in b.positions_mut() {
            x.x += 0.1;
        }

        let report = a.compare(&b, true, 0.0, 0.0);
        let rmsd = report.rmsd("positions").unwrap();
        assert!((rmsd - 0.1).abs() < 1e-12);
        assert!(report.has_mismatch("positions"));
        assert_eq!(
            report
                .differences()
                .iter()
                .filter(|d| d.field() == "positions")
                .count(),
            1
        );

        let loose = a.compare(&b, true, 0.0, 0.2);
        assert!(!loose.has_mismatch("positions"));
        assert!(loose.rmsd("positions").is_some());
    }

    #[test]
    fn exact_rmsd_flags_differences_too_small_to_square() {
        let mut a = state(2);
        a.positions_mut()[0] = Vec3::new(1e-200, 0.0, 0.0);
        let mut b = a.clone();
        b.positions_mut()[0].x = 2e-200;

        let report = a.compare(&b, true, 0.0, 0.0);
        assert_eq!(report.rmsd("positions"), Some(0.0));
        assert!(report.has_mismatch("positions"));
        assert!(!report.is_match());
    }

    #[test]
    fn exact_rmsd_distinguishes_signed_zeros() {
        let mut a = state(1);
        a.velocities_mut()[0] = Vec3::new(0.0, 0.0, 0.0);
        let mut b = a.clone();
        b.velocities_mut()[0].y = -0.0;

        assert!(a.compare(&b, true, 0.0, 0.0).has_mismatch("velocities"));
        assert!(a.compare(&a.clone(), true, 0.0, 0.0).is_match());
    }

    #[test]
    fn differing_atom_counts_skip_per_atom_comparison() {
        let a = state(3);
        let b = state(4);
        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.has_mismatch("atom_count"));
        assert!(!report.was_compared("positions"));
    }

    #[test]
    fn thermostat_chains_compared_only_with_matching_dimensions() {
        let mut a = state(1);
        a.flags |= StateFields::THERMOSTAT_CHAIN;
        let mut b = a.clone();
        b.thermostat_mut().velocities_mut()[3] = 1.0;

        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.has_mismatch("thermostat_velocities"));

        b.resize_thermostat_state(3, 1, 2);
        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.has_mismatch("num_thermostats"));
        assert!(!report.was_compared("thermostat_velocities"));
    }

    #[test]
    fn thermostat_integral_compared_across_differing_chain_lengths() {
        let mut a = state(1);
        a.flags |= StateFields::THERMOSTAT_CHAIN | StateFields::THERMOSTAT_INTEGRAL;
        let mut b = a.clone();
        b.resize_thermostat_state(2, 1, 4);
        b.thermostat_integral_mut()[1] = 0.7;

        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.has_mismatch("chain_length"));
        assert!(!report.was_compared("thermostat_positions"));
        assert!(report.was_compared("thermostat_integral"));
        assert!(report.has_mismatch("thermostat_integral"));
    }

    #[test]
    fn lambda_and_fep_state_are_reported_when_active() {
        let mut a = state(1);
        a.flags |= StateFields::LAMBDA | StateFields::FEP_STATE;
        let mut b = a.clone();
        b.set_lambda(FreeEnergyComponent::Coulomb, 0.3);
        b.current_fep_state = 2;

        let report = a.compare(&b, false, 0.0, 0.0);
        assert!(report.has_mismatch("lambda"));
        assert!(report.has_mismatch("fep_state"));
    }

    #[test]
    fn compare_does_not_mutate_either_snapshot() {
        let a = state(2);
        let mut b = a.clone();
        b.positions_mut()[0].z = 9.0;
        let (a0, b0) = (a.clone(), b.clone());
        let _ = a.compare(&b, true, 0.1, 0.1);
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn report_renders_one_line_per_difference() {
        let a = state(2);
        let mut b = a.clone();
        b.box_matrix[(1, 0)] = 1.0;
        b.positions_mut()[1].x = 7.0;
        let text = a.compare(&b, false, 0.0, 0.0).to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("box[1][0]"));
        assert!(text.contains("positions[1][0]"));
    }
}
