//! Optional sub-objects of the simulation state.
//!
//! Each is either fully constructed or absent (`None` in the owning state); there is no
//! partially initialized form.

use crate::core::models::geometry::{Mat3, Vec3};
use nalgebra::DMatrix;

/// Time-averaged accumulators for distance and orientation restraints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestraintHistory {
    pub distance_initial_factor: f64,
    pub distance_time_averages: Vec<f64>,
    pub orientation_initial_factor: f64,
    pub orientation_time_averages: Vec<f64>,
}

impl RestraintHistory {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.distance_time_averages.is_empty() && self.orientation_time_averages.is_empty()
    }
}

/// Kinetic energy tensors and Nose-Hoover scale factors, one entry per coupling group.
#[derive(Debug, Clone, PartialEq)]
pub struct KineticEnergyState {
    pub half_step: Vec<Mat3>,
    pub full_step: Vec<Mat3>,
    pub half_step_old: Vec<Mat3>,
    pub full_step_scale_nhc: Vec<f64>,
    pub half_step_scale_nhc: Vec<f64>,
    pub velocity_scale_nhc: Vec<f64>,
    /// Derivative of the kinetic energy with respect to lambda.
    pub dekindl: f64,
    /// Cosine acceleration momentum.
    pub mvcos: f64,
}

impl KineticEnergyState {
    pub fn zeroed(groups: usize) -> Self {
        Self {
            half_step: vec![Mat3::zeros(); groups],
            full_step: vec![Mat3::zeros(); groups],
            half_step_old: vec![Mat3::zeros(); groups],
            full_step_scale_nhc: vec![0.0; groups],
            half_step_scale_nhc: vec![0.0; groups],
            velocity_scale_nhc: vec![0.0; groups],
            dekindl: 0.0,
            mvcos: 0.0,
        }
    }

    pub fn groups(&self) -> usize {
        self.half_step.len()
    }

    /// Changes the number of coupling groups, keeping leading groups and zero-filling
    /// new ones.
    pub fn resize(&mut self, groups: usize) {
        self.half_step.resize(groups, Mat3::zeros());
        self.full_step.resize(groups, Mat3::zeros());
        self.half_step_old.resize(groups, Mat3::zeros());
        self.full_step_scale_nhc.resize(groups, 0.0);
        self.half_step_scale_nhc.resize(groups, 0.0);
        self.velocity_scale_nhc.resize(groups, 0.0);
    }
}

/// Running energy averages kept across restarts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnergyHistory {
    pub steps: u64,
    pub sum_count: u64,
    pub averages: Vec<f64>,
    pub sums: Vec<f64>,
    pub steps_simulation: u64,
    pub sum_count_simulation: u64,
    pub sums_simulation: Vec<f64>,
}

/// Expanded-ensemble accumulators over `n` lambda states.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeEnergyHistory {
    pub sum_weights: Vec<f64>,
    pub sum_dg: Vec<f64>,
    pub sum_min_variance: Vec<f64>,
    pub sum_variance: Vec<f64>,
    pub visits: Vec<u64>,
    pub wang_landau_histogram: Vec<f64>,
    pub wang_landau_delta: f64,
    pub accum_p: DMatrix<f64>,
    pub accum_m: DMatrix<f64>,
    pub accum_p2: DMatrix<f64>,
    pub accum_m2: DMatrix<f64>,
    pub transitions: DMatrix<f64>,
    pub transitions_empirical: DMatrix<f64>,
}

impl FreeEnergyHistory {
    pub fn zeroed(lambdas: usize) -> Self {
        let square = || DMatrix::zeros(lambdas, lambdas);
        Self {
            sum_weights: vec![0.0; lambdas],
            sum_dg: vec![0.0; lambdas],
            sum_min_variance: vec![0.0; lambdas],
            sum_variance: vec![0.0; lambdas],
            visits: vec![0; lambdas],
            wang_landau_histogram: vec![0.0; lambdas],
            wang_landau_delta: 0.0,
            accum_p: square(),
            accum_m: square(),
            accum_p2: square(),
            accum_m2: square(),
            transitions: square(),
            transitions_empirical: square(),
        }
    }

    pub fn lambdas(&self) -> usize {
        self.sum_weights.len()
    }
}

/// Which compartment boundary the ion/water swapping protocol acts along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapAxis {
    X,
    Y,
    Z,
}

/// Computational electrophysiology (ion/water position swapping) bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapState {
    pub axis: SwapAxis,
    pub ion_types: usize,
    pub averaging_window: usize,
    pub flux_leak: i64,
    pub from_checkpoint: bool,
    /// Whole-molecule reference positions of the two split groups.
    pub old_whole_positions: [Vec<Vec3>; 2],
}

impl SwapState {
    pub fn new(axis: SwapAxis, ion_types: usize, averaging_window: usize) -> Self {
        Self {
            axis,
            ion_types,
            averaging_window,
            flux_leak: 0,
            from_checkpoint: false,
            old_whole_positions: [Vec::new(), Vec::new()],
        }
    }
}
