use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use traffic_grid::simulation::{
    compare_strategies, Cell, GridWorld, Pathfinder, SearchStrategy, SimConfig, SimWorld,
};

#[derive(Parser)]
#[command(name = "traffic_grid")]
#[command(about = "Headless grid traffic simulation with a path-following agent")]
struct Cli {
    /// Number of simulation ticks to run (60 ticks per simulated second)
    #[arg(long, default_value = "1800")]
    ticks: u64,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Number of AI cars
    #[arg(long, default_value = "12")]
    cars: usize,

    /// Search strategy used to route the agent
    #[arg(long, value_enum, default_value = "a-star")]
    strategy: SearchStrategy,

    /// Spawn the agent at ROW COL
    #[arg(long, num_args = 2, value_names = ["ROW", "COL"])]
    agent: Option<Vec<i32>>,

    /// Route the agent to ROW COL
    #[arg(long, num_args = 2, value_names = ["ROW", "COL"])]
    goal: Option<Vec<i32>>,

    /// Run without pedestrians
    #[arg(long)]
    no_pedestrians: bool,

    /// Load the map from an ASCII file instead of the built-in city
    #[arg(long)]
    map: Option<PathBuf>,

    /// Print the summary and map every N ticks
    #[arg(long)]
    print_every: Option<u64>,

    /// Compare all search strategies on N random routes and exit
    #[arg(long, value_name = "N")]
    compare: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,traffic_grid=info"),
    )
    .init();

    let cli = Cli::parse();
    let grid = load_grid(cli.map.as_ref())?;

    if let Some(count) = cli.compare {
        run_comparison(&grid, count, cli.seed);
        return Ok(());
    }

    let config = SimConfig {
        cars: cli.cars,
        seed: cli.seed,
        pedestrians: !cli.no_pedestrians,
        agent_start: parse_cell(cli.agent.as_deref(), "--agent")?,
        agent_goal: parse_cell(cli.goal.as_deref(), "--goal")?,
        strategy: cli.strategy,
    };
    if config.agent_goal.is_some() && config.agent_start.is_none() {
        bail!("--goal needs an agent, pass --agent ROW COL as well");
    }

    run_headless(grid, &config, cli.ticks, cli.print_every)
}

fn load_grid(path: Option<&PathBuf>) -> Result<GridWorld> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read map {}", path.display()))?;
            GridWorld::from_ascii(&text)
                .with_context(|| format!("Failed to parse map {}", path.display()))
        }
        None => GridWorld::demo_city().context("Failed to build the demo city"),
    }
}

fn parse_cell(values: Option<&[i32]>, flag: &str) -> Result<Option<Cell>> {
    match values {
        None => Ok(None),
        Some([row, col]) => Ok(Some(Cell::new(*row, *col))),
        Some(other) => bail!("{} expects ROW COL, got {:?}", flag, other),
    }
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(
    grid: GridWorld,
    config: &SimConfig,
    ticks: u64,
    print_every: Option<u64>,
) -> Result<()> {
    info!(
        "Running traffic simulation for {} ticks with {} cars",
        ticks, config.cars
    );

    let mut world = SimWorld::from_config(grid, config)?;
    let pathfinder = Pathfinder::new(config.strategy);

    if print_every.is_some() {
        println!("Initial state:");
        world.print_summary();
        world.draw_map();
    }

    for tick in 1..=ticks {
        world.tick();
        world.service_replan(&pathfinder);

        if let Some(every) = print_every.filter(|every| *every > 0) {
            if tick % every == 0 {
                println!("--- After tick {} ---", tick);
                world.print_summary();
                world.draw_map();
            }
        }
    }

    if print_every.is_some() {
        println!("=== Final State ===");
        world.print_summary();
        world.draw_map();
    }

    world.log_report();
    Ok(())
}

/// Plan `count` random lane-to-lane routes with every strategy and print
/// the search cost next to the path cost
fn run_comparison(grid: &GridWorld, count: usize, seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let lanes = grid.lane_cells();
    let queries: Vec<(Cell, Cell)> = (0..count)
        .filter_map(|_| Some((*lanes.choose(&mut rng)?, *lanes.choose(&mut rng)?)))
        .collect();

    println!("=== Strategy Comparison ({} routes) ===", queries.len());
    println!(
        "{:<8} {:>6} {:>14} {:>14}",
        "Strategy", "Found", "Mean expanded", "Mean path cost"
    );
    for report in compare_strategies(grid, &queries) {
        println!(
            "{:<8} {:>6} {:>14.1} {:>14.1}",
            report.strategy.label(),
            report.found,
            report.mean_expanded(),
            report.mean_path_cost()
        );
    }
}
