use crate::cli::InspectArgs;
use crate::error::Result;
use nbflow::core::state::{SimulationState, StateDimensions};
use tracing::info;

pub fn run(args: InspectArgs) -> Result<()> {
    let dims = StateDimensions {
        atom_count: args.atoms,
        num_thermostats: args.thermostats,
        num_barostat_vars: args.barostat_vars,
        chain_length: args.chain_length,
        free_energy_dimension: args.free_energy_dimension,
    };
    info!(?dims, "Initializing state for inspection.");
    let state = SimulationState::new(dims);
    for (name, value) in describe(&state) {
        println!("{name:<28} {value}");
    }
    Ok(())
}

fn presence<T>(value: &Option<T>, detail: impl FnOnce(&T) -> String) -> String {
    match value {
        Some(v) => format!("present ({})", detail(v)),
        None => "absent".to_string(),
    }
}

/// One `(field, layout)` row per state member.
pub fn describe(state: &SimulationState) -> Vec<(&'static str, String)> {
    let dims = state.dimensions();
    vec![
        ("atoms", dims.atom_count.to_string()),
        (
            "positions (padded)",
            format!(
                "{} ({})",
                state.positions().len(),
                state.padded_positions().padded_len()
            ),
        ),
        ("velocities", state.velocities().len().to_string()),
        (
            "thermostat chain",
            format!(
                "{} x {} = {}",
                state.thermostat().groups(),
                state.thermostat().chain_length(),
                state.thermostat().len()
            ),
        ),
        (
            "thermostat integrals",
            state.thermostat_integral().len().to_string(),
        ),
        (
            "barostat chain",
            format!(
                "{} x {} = {}",
                state.barostat().groups(),
                state.barostat().chain_length(),
                state.barostat().len()
            ),
        ),
        ("lambda components", state.lambdas().len().to_string()),
        ("active fields", format!("{:?}", state.flags)),
        (
            "kinetic energy state",
            presence(&state.kinetic_energy, |k| format!("{} groups", k.groups())),
        ),
        (
            "energy history",
            presence(&state.energy_history, |_| "zeroed".to_string()),
        ),
        (
            "free-energy history",
            presence(&state.free_energy_history, |h| {
                format!("{} lambdas", h.lambdas())
            }),
        ),
        (
            "swap state",
            presence(&state.swap_state, |_| "configured".to_string()),
        ),
        (
            "partition generation",
            format!(
                "{} (group index {})",
                state.partition_generation(),
                state.partition_generation_cg()
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rows: &[(&'static str, String)], name: &str) -> String {
        rows.iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
            .unwrap()
    }

    #[test]
    fn describes_sizes_and_optional_members() {
        let state = SimulationState::new(StateDimensions {
            atom_count: 5,
            num_thermostats: 2,
            num_barostat_vars: 1,
            chain_length: 3,
            free_energy_dimension: 0,
        });
        let rows = describe(&state);
        assert_eq!(row(&rows, "positions (padded)"), "5 (6)");
        assert_eq!(row(&rows, "thermostat chain"), "2 x 3 = 6");
        assert_eq!(row(&rows, "barostat chain"), "1 x 3 = 3");
        assert_eq!(row(&rows, "lambda components"), "7");
        assert_eq!(row(&rows, "kinetic energy state"), "present (2 groups)");
        assert_eq!(row(&rows, "free-energy history"), "absent");
        assert_eq!(row(&rows, "energy history"), "present (zeroed)");
    }

    #[test]
    fn empty_state_has_no_padding_slot() {
        let rows = describe(&SimulationState::new(StateDimensions::default()));
        assert_eq!(row(&rows, "positions (padded)"), "0 (0)");
        assert_eq!(row(&rows, "kinetic energy state"), "absent");
    }
}
