use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairEnergies {
    pub lennard_jones: f64,
    pub coulomb: f64,
}

impl PairEnergies {
    pub fn new(lennard_jones: f64, coulomb: f64) -> Self {
        Self {
            lennard_jones,
            coulomb,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.lennard_jones + self.coulomb
    }
}

impl Add for PairEnergies {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            lennard_jones: self.lennard_jones + rhs.lennard_jones,
            coulomb: self.coulomb + rhs.coulomb,
        }
    }
}

impl AddAssign for PairEnergies {
    fn add_assign(&mut self, rhs: Self) {
        self.lennard_jones += rhs.lennard_jones;
        self.coulomb += rhs.coulomb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_returns_sum_of_both_terms() {
        assert_eq!(PairEnergies::new(1.5, -2.0).total(), -0.5);
    }

    #[test]
    fn add_sums_each_field() {
        let sum = PairEnergies::new(1.0, 2.0) + PairEnergies::new(3.0, 4.0);
        assert_eq!(sum, PairEnergies::new(4.0, 6.0));
    }

    #[test]
    fn add_assign_with_default_is_identity() {
        let mut e = PairEnergies::new(1.0, -1.0);
        e += PairEnergies::default();
        assert_eq!(e, PairEnergies::new(1.0, -1.0));
    }
}
