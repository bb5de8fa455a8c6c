//! CLI entrypoint. Grounded on
//! `examples/iaas-experiment/src/main.rs`'s `clap::Parser` + `env_logger`
//! setup, adapted from "run one fixed experiment" to "load three JSON
//! files, run, write a results JSON" (spec.md §6/§7).

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use dslab_cell_sim::core::cell::Cell;
use dslab_cell_sim::core::simulator::Simulator;
use dslab_cell_sim::error::SimError;
use dslab_cell_sim::io::{broker_config, cell_config, results, task_config};

fn init_logger(level: &str) {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Discrete-time cloud datacenter cell simulator", long_about = None)]
struct Args {
    #[clap(long)]
    cell_data: String,
    #[clap(long)]
    broker_data: String,
    #[clap(long)]
    task_data: String,
    #[clap(long)]
    output: String,
    #[clap(long, default_value = "info")]
    log_level: String,
    /// Seeds every broker's RNG; fixed so a run is reproducible unless the
    /// caller asks otherwise.
    #[clap(long, default_value_t = 0)]
    seed: u64,
}

fn run(args: &Args) -> Result<(), SimError> {
    let cell_json = fs::read_to_string(&args.cell_data).map_err(|e| SimError::InputError(e.to_string()))?;
    let broker_json = fs::read_to_string(&args.broker_data).map_err(|e| SimError::InputError(e.to_string()))?;
    let task_json = fs::read_to_string(&args.task_data).map_err(|e| SimError::InputError(e.to_string()))?;

    let parsed_cells = cell_config::parse_cell_config(&cell_json)?;
    let mechanism = broker_config::parse_mechanism(&broker_json)?;

    let mut cells = Vec::with_capacity(parsed_cells.cells.len());
    for (cell_index, parsed) in parsed_cells.cells.into_iter().enumerate() {
        let broker = broker_config::build_broker(&broker_json, cell_index, &parsed, args.seed)?;
        cells.push(Cell::new(
            parsed.cell_id,
            parsed.resources,
            parsed.network,
            parsed.power_models,
            broker,
            StdRng::seed_from_u64(args.seed.wrapping_add(cell_index as u64)),
        ));
    }

    let tasks = task_config::parse_task_config(&task_json)?;
    let total_submitted = tasks.len() as u64;

    let mut sim = Simulator::new(cells, parsed_cells.max_simulation_time, parsed_cells.update_interval, tasks);
    sim.run();

    let mechanism_name = match mechanism {
        broker_config::Mechanism::Traditional => "Traditional",
        broker_config::Mechanism::Sosm => "SOSM",
        broker_config::Mechanism::ImprovedSosm => "Improved SOSM",
    };
    let doc = results::build_results(&sim, mechanism_name, total_submitted);
    let json = results::to_json_string(&doc)?;
    fs::write(&args.output, json).map_err(|e| SimError::InvariantViolation(e.to_string()))?;

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(&args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
