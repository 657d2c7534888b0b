use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::system::{Coupling, LatticeSystem};
use crate::utils::parser;
use nbflow::core::models::locality::LocalityClass;
use nbflow::engine::config::PipelineConfig;
use nbflow::engine::queue::Stage;
use nbflow::workflows::dynamics::{DynamicsConfig, DynamicsConfigBuilder};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSystemConfig {
    lattice: Option<usize>,
    spacing: Option<f64>,
    charge: Option<f64>,
    local_fraction: Option<f64>,
    c6: Option<f64>,
    c12: Option<f64>,
    cutoff: Option<f64>,
    jitter: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialCouplingConfig {
    thermostats: Option<usize>,
    barostat_vars: Option<usize>,
    chain_length: Option<usize>,
    free_energy_dimension: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRunSection {
    steps: Option<u64>,
    time_step: Option<f64>,
    nstlist: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    system: Option<PartialSystemConfig>,
    coupling: Option<PartialCouplingConfig>,
    pipeline: Option<PipelineConfig>,
    run: Option<PartialRunSection>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub system: LatticeSystem,
    pub coupling: Coupling,
    pub pipeline: PipelineConfig,
    pub dynamics: DynamicsConfig,
    pub faults: Vec<(LocalityClass, Stage)>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<RunConfig> {
        let sys = self.system.take().unwrap_or_default();
        let coupling = self.coupling.take().unwrap_or_default();
        let run = self.run.take().unwrap_or_default();
        let mut pipeline = self.pipeline.take().unwrap_or_default();

        let system = LatticeSystem {
            cells: args.lattice.or(sys.lattice).unwrap_or(4),
            spacing: sys.spacing.unwrap_or(0.5),
            charge: sys.charge.unwrap_or(0.3),
            local_fraction: sys.local_fraction.unwrap_or(0.5),
            c6: sys.c6.unwrap_or(1.0e-3),
            c12: sys.c12.unwrap_or(1.0e-6),
            cutoff: sys.cutoff.unwrap_or(0.9),
            jitter: sys.jitter.unwrap_or(0.05),
        };
        if !(0.0..=1.0).contains(&system.local_fraction) {
            return Err(CliError::Config(format!(
                "`system.local-fraction` must lie in [0, 1], got {}",
                system.local_fraction
            )));
        }
        if system.cells == 0 {
            return Err(CliError::Config("`system.lattice` must be at least 1".to_string()));
        }

        let coupling = Coupling {
            thermostats: coupling.thermostats.unwrap_or(0),
            barostat_vars: coupling.barostat_vars.unwrap_or(0),
            chain_length: coupling.chain_length.unwrap_or(1),
            free_energy_dimension: coupling.free_energy_dimension.unwrap_or(0),
        };

        if let Some(order) = args.wait_order {
            pipeline.wait_order = order.into();
        }
        if let Some(interval) = args.energy_interval {
            pipeline.force_requests.energy_interval = interval;
        }
        if let Some(limit) = args.memory_limit {
            pipeline.device_memory_limit = Some(limit);
        }
        pipeline
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let dynamics = DynamicsConfigBuilder::new()
            .steps(args.steps.or(run.steps).unwrap_or(100))
            .time_step(args.time_step.or(run.time_step).unwrap_or(0.002))
            .nstlist(args.nstlist.or(run.nstlist).unwrap_or(10))
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let faults = args
            .inject_faults
            .iter()
            .map(|spec| parser::parse_fault(spec).map_err(|e| CliError::Argument(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        Ok(RunConfig {
            system,
            coupling,
            pipeline,
            dynamics,
            faults,
        })
    }
}
