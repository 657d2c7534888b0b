use clap::{Args, Parser, Subcommand, ValueEnum};
use nbflow::engine::config::WaitOrder;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The nbflow developers",
    version,
    about = "nbflow CLI - drive the asynchronous nonbonded offload pipeline on generated test systems and inspect simulation-state layouts.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used by the reference kernel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run leap-frog dynamics on a generated lattice system through the offload pipeline.
    Run(RunArgs),
    /// Print the layout of a freshly initialized simulation state.
    Inspect(InspectArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOrderArg {
    NonLocalFirst,
    LocalFirst,
}

impl From<WaitOrderArg> for WaitOrder {
    fn from(arg: WaitOrderArg) -> Self {
        match arg {
            WaitOrderArg::NonLocalFirst => WaitOrder::NonLocalFirst,
            WaitOrderArg::LocalFirst => WaitOrder::LocalFirst,
        }
    }
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a run configuration file in TOML format. Built-in defaults apply without one.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Run Overrides ---
    /// Override the number of steps.
    #[arg(short = 'n', long, value_name = "INT")]
    pub steps: Option<u64>,

    /// Override the timestep.
    #[arg(long, value_name = "FLOAT")]
    pub time_step: Option<f64>,

    /// Override the repartitioning interval.
    #[arg(long, value_name = "INT")]
    pub nstlist: Option<u64>,

    // --- System Overrides ---
    /// Override the lattice edge length (cells per box edge).
    #[arg(long, value_name = "INT")]
    pub lattice: Option<usize>,

    // --- Pipeline Overrides ---
    /// Override the order in which the two locality classes are waited on.
    #[arg(long, value_enum, value_name = "ORDER")]
    pub wait_order: Option<WaitOrderArg>,

    /// Override how often energies are requested (0 disables them).
    #[arg(long, value_name = "INT")]
    pub energy_interval: Option<u64>,

    /// Override the device memory budget in bytes.
    #[arg(long, value_name = "BYTES")]
    pub memory_limit: Option<usize>,

    /// Arm a one-shot device fault, e.g. `non-local:kernel`. Can be used multiple times.
    #[arg(long = "inject-fault", value_name = "CLASS:STAGE")]
    pub inject_faults: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Number of atoms.
    #[arg(short, long, default_value_t = 0, value_name = "INT")]
    pub atoms: usize,

    /// Number of thermostat coupling groups.
    #[arg(short, long, default_value_t = 0, value_name = "INT")]
    pub thermostats: usize,

    /// Number of barostat variables.
    #[arg(short, long, default_value_t = 0, value_name = "INT")]
    pub barostat_vars: usize,

    /// Thermostat/barostat chain length.
    #[arg(short = 'l', long, default_value_t = 1, value_name = "INT")]
    pub chain_length: usize,

    /// Number of free-energy (expanded-ensemble) states.
    #[arg(short, long, default_value_t = 0, value_name = "INT")]
    pub free_energy_dimension: usize,
}
