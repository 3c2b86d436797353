use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use epitensor::io::inputs::load_scenario;
use epitensor::io::report::{by_health_stage, long_form_rows, write_csv};
use epitensor::io::run_log::{write_run_log, RunSummary};
use epitensor::{Simulation, SolverMethod};

/// Run the age-structured epidemic model over a scenario directory.
#[derive(Debug, Parser)]
#[command(name = "epitensor", version)]
struct Args {
    /// Directory holding population.csv, the mixing matrices and age_parameters.json.
    #[arg(long, default_value = "inputs")]
    inputs: PathBuf,

    /// Output CSV path.
    #[arg(long, default_value = "output/epitensor.csv")]
    out: PathBuf,

    /// Number of whole days to simulate.
    #[arg(long, default_value_t = 200)]
    days: usize,

    /// Use fixed-step Euler with this many steps per day instead of the adaptive solver.
    #[arg(long)]
    euler_steps: Option<usize>,

    /// Collapse isolation and test states in the output.
    #[arg(long)]
    by_health_stage: bool,

    /// Also write a per-day summary log into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Identifier used in the summary log file name.
    #[arg(long)]
    run_id: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut scenario = load_scenario(&args.inputs)
        .with_context(|| format!("failed to load scenario from {}", args.inputs.display()))?;
    if let Some(steps_per_day) = args.euler_steps {
        anyhow::ensure!(steps_per_day > 0, "--euler-steps must be > 0");
        scenario.config.solver.method = SolverMethod::Euler { steps_per_day };
    }
    info!(
        "loaded {} age groups, {:.0} people from {}",
        scenario.inputs.n_age(),
        scenario.inputs.population.iter().sum::<f64>(),
        args.inputs.display()
    );

    let sim = Simulation::from_inputs(&scenario.inputs, &scenario.config)?;
    let init = sim.initial_state();
    let trajectory = sim.run(&init, args.days).context("simulation failed")?;

    let start = scenario.config.policies.reference_start;
    let labels = Some(scenario.age_labels.as_slice());
    if args.by_health_stage {
        write_csv(&args.out, &by_health_stage(&trajectory, start, labels))?;
    } else {
        write_csv(&args.out, &long_form_rows(&trajectory, start, labels))?;
    }
    info!("wrote {}", args.out.display());

    if let Some(dir) = &args.log_dir {
        let run_id = args
            .run_id
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string());
        let path = write_run_log(
            dir,
            &RunSummary {
                run_id: &run_id,
                start,
                days: args.days,
                solver: format!("{:?}", scenario.config.solver.method),
                age_groups: scenario.inputs.n_age(),
            },
            &trajectory,
        )?;
        info!("wrote {}", path.display());
    }
    Ok(())
}
