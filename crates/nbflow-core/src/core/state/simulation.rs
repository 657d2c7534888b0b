use super::error::StateError;
use super::fields::{FreeEnergyComponent, StateFields};
use super::history::{
    EnergyHistory, FreeEnergyHistory, KineticEnergyState, RestraintHistory, SwapState,
};
use crate::core::models::geometry::{Mat3, Vec3};
use crate::core::models::padded::PaddedVector;
use tracing::debug;

/// Run-time parameters that determine the shape of every sequence in the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateDimensions {
    pub atom_count: usize,
    pub num_thermostats: usize,
    pub num_barostat_vars: usize,
    pub chain_length: usize,
    pub free_energy_dimension: usize,
}

/// Positions and velocities of a chained set of coupling variables, stored flat as
/// `groups x chain_length`, group-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CouplingChain {
    groups: usize,
    chain_length: usize,
    positions: Vec<f64>,
    velocities: Vec<f64>,
}

impl CouplingChain {
    pub fn zeroed(groups: usize, chain_length: usize) -> Self {
        let len = groups * chain_length;
        Self {
            groups,
            chain_length,
            positions: vec![0.0; len],
            velocities: vec![0.0; len],
        }
    }

    /// Reshapes the chain, keeping existing leading entries and zero-filling new ones.
    pub fn resize(&mut self, groups: usize, chain_length: usize) {
        let len = groups * chain_length;
        self.groups = groups;
        self.chain_length = chain_length;
        self.positions.resize(len, 0.0);
        self.velocities.resize(len, 0.0);
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn chain_length(&self) -> usize {
        self.chain_length
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn velocities(&self) -> &[f64] {
        &self.velocities
    }

    pub fn positions_mut(&mut self) -> &mut [f64] {
        &mut self.positions
    }

    pub fn velocities_mut(&mut self) -> &mut [f64] {
        &mut self.velocities
    }

    /// The chain positions belonging to one coupling group.
    pub fn group_positions(&self, group: usize) -> Option<&[f64]> {
        let start = group.checked_mul(self.chain_length)?;
        self.positions.get(start..start + self.chain_length)
    }
}

/// All dynamical state of one simulation snapshot.
///
/// Owned by the integrator driving the timestep loop. Per-atom and coupling sequences
/// are private so their lengths can only change through [`initialize`](Self::initialize)
/// and [`resize_thermostat_state`](Self::resize_thermostat_state); their contents are
/// freely accessible through slices.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    dims: StateDimensions,
    pub flags: StateFields,

    positions: PaddedVector<Vec3>,
    velocities: PaddedVector<Vec3>,

    pub box_matrix: Mat3,
    pub box_rel: Mat3,
    pub box_velocity: Mat3,
    pub pressure_prev: Mat3,
    pub shake_virial_prev: Mat3,
    pub force_virial_prev: Mat3,
    /// Barostat velocity of the isotropic MTTK barostat.
    pub barostat_velocity: f64,

    thermostat: CouplingChain,
    thermostat_integral: Vec<f64>,
    barostat: CouplingChain,

    lambda: Vec<f64>,
    pub current_fep_state: usize,

    pub restraint_history: RestraintHistory,
    pub kinetic_energy: Option<KineticEnergyState>,
    pub energy_history: Option<EnergyHistory>,
    pub free_energy_history: Option<FreeEnergyHistory>,
    pub swap_state: Option<SwapState>,

    pub global_group_index: Vec<usize>,
    partition_generation: u64,
    partition_generation_cg: u64,
}

impl SimulationState {
    pub fn new(dims: StateDimensions) -> Self {
        let mut state = Self {
            dims,
            flags: StateFields::empty(),
            positions: PaddedVector::new(),
            velocities: PaddedVector::new(),
            box_matrix: Mat3::zeros(),
            box_rel: Mat3::zeros(),
            box_velocity: Mat3::zeros(),
            pressure_prev: Mat3::zeros(),
            shake_virial_prev: Mat3::zeros(),
            force_virial_prev: Mat3::zeros(),
            barostat_velocity: 0.0,
            thermostat: CouplingChain::default(),
            thermostat_integral: Vec::new(),
            barostat: CouplingChain::default(),
            lambda: Vec::new(),
            current_fep_state: 0,
            restraint_history: RestraintHistory::default(),
            kinetic_energy: None,
            energy_history: None,
            free_energy_history: None,
            swap_state: None,
            global_group_index: Vec::new(),
            partition_generation: 0,
            partition_generation_cg: 0,
        };
        state.initialize(dims);
        state
    }

    /// Allocates every sequence for `dims` and zero-fills all numeric state.
    ///
    /// Clears the active-field mask, rebuilds the optional sub-objects whose governing
    /// dimension is non-zero and drops the others. Calling this twice with the same
    /// dimensions yields identical states.
    pub fn initialize(&mut self, dims: StateDimensions) {
        debug!(?dims, "Initializing simulation state.");
        self.dims = dims;
        self.flags = StateFields::empty();
        self.current_fep_state = 0;
        self.lambda.clear();
        self.lambda.resize(FreeEnergyComponent::COUNT, 0.0);
        self.barostat_velocity = 0.0;

        for m in [
            &mut self.box_matrix,
            &mut self.box_rel,
            &mut self.box_velocity,
            &mut self.pressure_prev,
            &mut self.shake_virial_prev,
            &mut self.force_virial_prev,
        ] {
            m.fill(0.0);
        }

        self.thermostat = CouplingChain::zeroed(dims.num_thermostats, dims.chain_length);
        self.thermostat_integral = vec![0.0; dims.num_thermostats];
        self.barostat = CouplingChain::zeroed(dims.num_barostat_vars, dims.chain_length);

        self.positions.reset(dims.atom_count);
        self.velocities.reset(dims.atom_count);

        self.restraint_history.clear();
        self.kinetic_energy =
            (dims.num_thermostats > 0).then(|| KineticEnergyState::zeroed(dims.num_thermostats));
        self.energy_history = Some(EnergyHistory::default());
        self.free_energy_history = (dims.free_energy_dimension > 0)
            .then(|| FreeEnergyHistory::zeroed(dims.free_energy_dimension));
        self.swap_state = None;

        self.global_group_index.clear();
        self.partition_generation = 0;
        self.partition_generation_cg = 0;
    }

    /// Reshapes only the thermostat and barostat chains (and the per-thermostat
    /// integrals), keeping existing entries and zero-filling new ones.
    ///
    /// The kinetic-energy accumulators follow the thermostat count: they are created
    /// when it becomes non-zero, resized with it, and dropped when it reaches zero.
    pub fn resize_thermostat_state(
        &mut self,
        num_thermostats: usize,
        num_barostat_vars: usize,
        chain_length: usize,
    ) {
        debug!(
            num_thermostats,
            num_barostat_vars, chain_length, "Resizing coupling chains."
        );
        self.dims.num_thermostats = num_thermostats;
        self.dims.num_barostat_vars = num_barostat_vars;
        self.dims.chain_length = chain_length;
        self.thermostat.resize(num_thermostats, chain_length);
        self.thermostat_integral.resize(num_thermostats, 0.0);
        self.barostat.resize(num_barostat_vars, chain_length);
        if num_thermostats == 0 {
            self.kinetic_energy = None;
        } else if let Some(ekin) = self.kinetic_energy.as_mut() {
            ekin.resize(num_thermostats);
        } else {
            self.kinetic_energy = Some(KineticEnergyState::zeroed(num_thermostats));
        }
    }

    /// Returns an owned copy of the first `n` positions.
    pub fn extract_positions(&self, n: usize) -> Result<Vec<Vec3>, StateError> {
        let available = self.positions.len();
        if n > available {
            return Err(StateError::OutOfRange {
                requested: n,
                available,
            });
        }
        Ok(self.positions[..n].to_vec())
    }

    pub fn dimensions(&self) -> StateDimensions {
        self.dims
    }

    pub fn atom_count(&self) -> usize {
        self.dims.atom_count
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    pub fn padded_positions(&self) -> &PaddedVector<Vec3> {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        &mut self.velocities
    }

    pub fn thermostat(&self) -> &CouplingChain {
        &self.thermostat
    }

    pub fn thermostat_mut(&mut self) -> &mut CouplingChain {
        &mut self.thermostat
    }

    pub fn thermostat_integral(&self) -> &[f64] {
        &self.thermostat_integral
    }

    pub fn thermostat_integral_mut(&mut self) -> &mut [f64] {
        &mut self.thermostat_integral
    }

    pub fn barostat(&self) -> &CouplingChain {
        &self.barostat
    }

    pub fn barostat_mut(&mut self) -> &mut CouplingChain {
        &mut self.barostat
    }

    pub fn lambda(&self, component: FreeEnergyComponent) -> f64 {
        self.lambda[component.index()]
    }

    pub fn set_lambda(&mut self, component: FreeEnergyComponent, value: f64) {
        self.lambda[component.index()] = value;
    }

    pub fn lambdas(&self) -> &[f64] {
        &self.lambda
    }

    /// Generation counter of the non-local atom partition.
    pub fn partition_generation(&self) -> u64 {
        self.partition_generation
    }

    /// Partition generation at which `global_group_index` was last rebuilt.
    pub fn partition_generation_cg(&self) -> u64 {
        self.partition_generation_cg
    }

    /// Records a repartitioning of atoms across domains.
    pub fn advance_partition_generation(&mut self) -> u64 {
        self.partition_generation += 1;
        self.partition_generation
    }

    pub fn mark_group_index_current(&mut self) {
        self.partition_generation_cg = self.partition_generation;
    }

    /// Re-sizes the per-atom arrays after a repartitioning changed the home atom count.
    ///
    /// Leading atoms keep their values; other fields are untouched.
    pub fn resize_atoms(&mut self, atom_count: usize) {
        self.dims.atom_count = atom_count;
        self.positions.resize(atom_count);
        self.velocities.resize(atom_count);
    }
}
