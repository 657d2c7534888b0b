use super::force_step;
use crate::core::kernel::PairEnergies;
use crate::core::models::geometry::Vec3;
use crate::core::pairlist::PartitionSource;
use crate::core::state::{SimulationState, StateFields};
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::pipeline::OffloadPipeline;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicsConfig {
    pub steps: u64,
    pub time_step: f64,
    /// Repartition every this many steps.
    pub nstlist: u64,
}

#[derive(Default)]
pub struct DynamicsConfigBuilder {
    steps: Option<u64>,
    time_step: Option<f64>,
    nstlist: Option<u64>,
}

impl DynamicsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(mut self, steps: u64) -> Self {
        self.steps = Some(steps);
        self
    }
    pub fn time_step(mut self, dt: f64) -> Self {
        self.time_step = Some(dt);
        self
    }
    pub fn nstlist(mut self, nstlist: u64) -> Self {
        self.nstlist = Some(nstlist);
        self
    }

    pub fn build(self) -> Result<DynamicsConfig, ConfigError> {
        let config = DynamicsConfig {
            steps: self.steps.ok_or(ConfigError::MissingParameter("steps"))?,
            time_step: self
                .time_step
                .ok_or(ConfigError::MissingParameter("time_step"))?,
            nstlist: self.nstlist.unwrap_or(10),
        };
        if config.nstlist == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "nstlist",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(config.time_step > 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "time_step",
                reason: format!("{} is not positive", config.time_step),
            });
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRecord {
    pub step: u64,
    pub nonbonded: PairEnergies,
    /// Kinetic energy at the start of the step, unit masses.
    pub kinetic: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicsSummary {
    pub steps_completed: u64,
    pub partitions_built: u64,
    pub energies: Vec<EnergyRecord>,
}

/// Runs `config.steps` leap-frog steps with unit masses.
///
/// Every `nstlist` steps the atoms are wrapped into the (rectangular) box, the partition
/// generation is advanced and `source` builds the next partition. Kinetic energy is
/// evaluated on the host while the nonbonded kernels run.
#[instrument(skip_all, name = "dynamics_workflow")]
pub fn run<S: PartitionSource>(
    pipeline: &mut OffloadPipeline,
    state: &mut SimulationState,
    source: &mut S,
    config: &DynamicsConfig,
    reporter: &ProgressReporter,
) -> Result<DynamicsSummary, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Dynamics" });
    info!(
        steps = config.steps,
        dt = config.time_step,
        nstlist = config.nstlist,
        atoms = state.atom_count(),
        "Starting dynamics."
    );

    let policy = pipeline.config().force_requests;
    let mut summary = DynamicsSummary::default();
    reporter.report(Progress::TaskStart {
        total_steps: config.steps,
    });

    for step in 0..config.steps {
        if step % config.nstlist == 0 {
            repartition(pipeline, state, source)?;
            summary.partitions_built += 1;
        }

        let flags = policy.flags_for_step(step);
        let mut kinetic = 0.0;
        let forces = force_step::run(pipeline, state, flags, || {
            kinetic = kinetic_energy(state.velocities());
        })?;

        if let Some(nonbonded) = forces.energies {
            debug!(
                step,
                lj = nonbonded.lennard_jones,
                coulomb = nonbonded.coulomb,
                kinetic,
                "Step energies"
            );
            summary.energies.push(EnergyRecord {
                step,
                nonbonded,
                kinetic,
            });
            reporter.report(Progress::StepEnergies {
                step,
                energies: nonbonded,
            });
        }

        leap_frog(state, &forces.forces, config.time_step);
        summary.steps_completed += 1;
        reporter.report(Progress::TaskIncrement);
    }

    state.flags |= StateFields::POSITIONS | StateFields::VELOCITIES;
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    info!(
        steps = summary.steps_completed,
        partitions = summary.partitions_built,
        "Dynamics finished."
    );
    Ok(summary)
}

fn repartition<S: PartitionSource>(
    pipeline: &mut OffloadPipeline,
    state: &mut SimulationState,
    source: &mut S,
) -> Result<(), EngineError> {
    wrap_into_box(state);
    let generation = state.advance_partition_generation();
    let partition = source.partition(state, generation)?;
    state.global_group_index = (0..partition.total_atoms()).collect();
    state.mark_group_index_current();
    pipeline.set_partition(partition)?;
    debug!(generation, "Repartitioned");
    Ok(())
}

fn wrap_into_box(state: &mut SimulationState) {
    let lengths = Vec3::new(
        state.box_matrix[(0, 0)],
        state.box_matrix[(1, 1)],
        state.box_matrix[(2, 2)],
    );
    for x in state.positions_mut() {
        for k in 0..3 {
            if lengths[k] > 0.0 {
                x[k] -= (x[k] / lengths[k]).floor() * lengths[k];
            }
        }
    }
}

fn kinetic_energy(velocities: &[Vec3]) -> f64 {
    0.5 * velocities.iter().map(|v| v.norm_squared()).sum::<f64>()
}

fn leap_frog(state: &mut SimulationState, forces: &[Vec3], dt: f64) {
    for (v, f) in state.velocities_mut().iter_mut().zip(forces) {
        *v += f * dt;
    }
    let velocities = state.velocities().to_vec();
    for (x, v) in state.positions_mut().iter_mut().zip(&velocities) {
        *x += v * dt;
    }
}
