use crate::cli::RunArgs;
use crate::config::{PartialRunConfig, RunConfig};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use nbflow::core::models::locality::LocalityClass;
use nbflow::engine::context::DeviceContext;
use nbflow::engine::error::EngineError;
use nbflow::engine::pipeline::OffloadPipeline;
use nbflow::engine::progress::ProgressReporter;
use nbflow::workflows::{self, dynamics::DynamicsSummary};
use std::sync::Arc;
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    let partial = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => PartialRunConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial.merge_with_cli(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let summary = execute(&config, reporter)?;
    print_summary(&config, &summary);
    Ok(())
}

pub fn execute(config: &RunConfig, reporter: ProgressReporter) -> Result<DynamicsSummary> {
    let mut state = config.system.build_state(&config.coupling);
    let mut partitioner = config.system.partitioner().map_err(EngineError::from)?;

    let context = DeviceContext::new("host-emulated", config.pipeline.device_memory_limit);
    for &(locality, stage) in &config.faults {
        context.inject_fault(locality, stage);
    }
    let kernel = Arc::new(config.system.kernel());
    let mut pipeline = OffloadPipeline::new(context, config.pipeline.clone(), kernel)
        .map_err(EngineError::from)?;

    println!(
        "Running {} steps on {} atoms ({} local)...",
        config.dynamics.steps,
        config.system.atom_count(),
        config.system.local_atoms()
    );
    info!("Invoking the dynamics workflow...");
    let summary = workflows::dynamics::run(
        &mut pipeline,
        &mut state,
        &mut partitioner,
        &config.dynamics,
        &reporter,
    )?;

    for locality in LocalityClass::ALL {
        let stats = pipeline.stats().get(locality);
        info!(
            %locality,
            launches = stats.launches,
            waits = stats.waits,
            rebuilds = stats.rebuilds,
            "Pipeline statistics"
        );
    }
    Ok(summary)
}

fn print_summary(config: &RunConfig, summary: &DynamicsSummary) {
    println!(
        "Completed {} of {} steps, {} partition(s) built.",
        summary.steps_completed, config.dynamics.steps, summary.partitions_built
    );
    if let Some(last) = summary.energies.last() {
        println!(
            "Step {}: LJ {:.4}  Coulomb {:.4}  kinetic {:.4}",
            last.step, last.nonbonded.lennard_jones, last.nonbonded.coulomb, last.kinetic
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use crate::system::{Coupling, LatticeSystem};
    use nbflow::engine::config::PipelineConfig;
    use nbflow::engine::error::OffloadError;
    use nbflow::engine::queue::Stage;
    use nbflow::workflows::dynamics::DynamicsConfigBuilder;

    fn config(steps: u64) -> RunConfig {
        RunConfig {
            system: LatticeSystem {
                cells: 3,
                spacing: 0.6,
                charge: 0.3,
                local_fraction: 0.5,
                c6: 1e-3,
                c12: 1e-6,
                cutoff: 0.8,
                jitter: 0.05,
            },
            coupling: Coupling {
                thermostats: 1,
                chain_length: 2,
                ..Default::default()
            },
            pipeline: PipelineConfig::default(),
            dynamics: DynamicsConfigBuilder::new()
                .steps(steps)
                .time_step(0.001)
                .nstlist(2)
                .build()
                .unwrap(),
            faults: Vec::new(),
        }
    }

    #[test]
    fn generated_system_runs_to_completion() {
        let summary = execute(&config(4), ProgressReporter::new()).unwrap();
        assert_eq!(summary.steps_completed, 4);
        assert_eq!(summary.partitions_built, 2);
        assert_eq!(summary.energies.len(), 1);
    }

    #[test]
    fn injected_fault_aborts_the_run() {
        let mut cfg = config(3);
        cfg.faults.push((LocalityClass::NonLocal, Stage::ResultCopy));
        let err = execute(&cfg, ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(EngineError::Offload(OffloadError::Device {
                stage: Stage::ResultCopy,
                ..
            }))
        ));
    }

    #[test]
    fn tiny_memory_budget_aborts_with_allocation_error() {
        let mut cfg = config(1);
        cfg.pipeline.device_memory_limit = Some(4096);
        let err = execute(&cfg, ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(EngineError::Offload(OffloadError::Allocation { .. }))
        ));
    }
}
