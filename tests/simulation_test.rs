use std::collections::HashSet;
use std::process::{Command, Output};

use traffic_grid::simulation::{
    Cell, GridWorld, Pathfinder, SearchStrategy, SimConfig, SimError, SimWorld,
};

fn run_binary(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_traffic_grid"))
        .args(args)
        .env("RUST_LOG", "warn,traffic_grid=info")
        .output()
        .expect("Failed to execute simulation")
}

fn city_config(cars: usize, seed: u64) -> SimConfig {
    SimConfig {
        cars,
        seed: Some(seed),
        ..SimConfig::default()
    }
}

/// Test that the simulation runs in headless mode without crashing
#[test]
fn test_headless_simulation_runs() {
    let output = run_binary(&["--ticks", "300", "--seed", "7"]);

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    assert!(
        stderr.contains("Total cars spawned: 12"),
        "Missing 'Total cars spawned' statistic"
    );
    assert!(
        stderr.contains("Active pedestrians:"),
        "Missing 'Active pedestrians' statistic"
    );
}

/// Test that an agent given on the command line is routed and reported
#[test]
fn test_headless_agent_run() {
    let output = run_binary(&[
        "--ticks", "600", "--seed", "3", "--cars", "4", "--agent", "22", "6", "--goal", "5", "30",
    ]);
    assert!(
        output.status.success(),
        "Simulation with agent failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Destinations reached:"),
        "Missing 'Destinations reached' statistic"
    );
    assert!(stderr.contains("Agent"), "Agent placement was not logged");
}

#[test]
fn test_strategy_comparison_table() {
    let output = run_binary(&["--compare", "5", "--seed", "11"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Strategy Comparison (5 routes)"));
    assert!(stdout.contains("A*"));
}

#[test]
fn test_agent_on_grass_is_rejected() {
    let output = run_binary(&["--ticks", "10", "--agent", "0", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to place the agent"), "stderr: {}", stderr);
}

#[test]
fn test_goal_without_agent_is_rejected() {
    let output = run_binary(&["--ticks", "10", "--goal", "5", "30"]);
    assert!(!output.status.success());
}

#[test]
fn test_cars_spawn_on_distinct_lanes() {
    let world = SimWorld::from_config(GridWorld::demo_city().expect("demo city"), &city_config(30, 5))
        .expect("world");
    assert_eq!(world.cars.len(), 30);
    assert_eq!(world.stats.cars_spawned, 30);

    let cells: HashSet<Cell> = world.cars.iter().map(|car| car.cell).collect();
    assert_eq!(cells.len(), 30);
    for cell in cells {
        assert!(world.grid.tile_at(cell).and_then(|tile| tile.lane_direction()).is_some());
    }
}

#[test]
fn test_spawning_stops_when_lanes_run_out() {
    let grid = GridWorld::from_ascii(
        "
        ....
        >>>>
        ",
    )
    .expect("valid map");
    let mut world = SimWorld::new_with_seed(grid, 1);
    assert_eq!(world.spawn_cars(10), 4);
    assert_eq!(world.stats.cars_spawned, 4);
}

#[test]
fn test_vehicles_stay_on_the_road() {
    let mut world =
        SimWorld::from_config(GridWorld::demo_city().expect("demo city"), &city_config(20, 9))
            .expect("world");

    for _ in 0..600 {
        world.tick();
        for car in &world.cars {
            assert_eq!(car.cell, Cell::containing(car.position), "car {:?}", car.id);
            assert!(
                world.grid.is_passable(car.cell),
                "car {:?} off the road at {:?}",
                car.id,
                car.cell
            );
            assert!(car.speed >= 0.0 && car.speed <= car.max_speed);
        }
    }
    assert_eq!(world.stats.ticks, 600);
    assert_eq!(world.active_vehicles(), 20);
}

#[test]
fn test_same_seed_same_run() {
    let run = |seed: u64| {
        let mut world =
            SimWorld::from_config(GridWorld::demo_city().expect("demo city"), &city_config(15, seed))
                .expect("world");
        for _ in 0..300 {
            world.tick();
        }
        let cars: Vec<(Cell, f32, f32)> = world
            .cars
            .iter()
            .map(|car| (car.cell, car.position.x, car.position.y))
            .collect();
        (cars, world.stats.clone(), world.active_pedestrians())
    };

    assert_eq!(run(21), run(21));
}

#[test]
fn test_agent_reaches_destination() {
    let config = SimConfig {
        cars: 0,
        seed: Some(4),
        pedestrians: false,
        agent_start: Some(Cell::new(22, 6)),
        agent_goal: Some(Cell::new(5, 30)),
        strategy: SearchStrategy::AStar,
    };
    let mut world =
        SimWorld::from_config(GridWorld::demo_city().expect("demo city"), &config).expect("world");
    let pathfinder = Pathfinder::new(config.strategy);

    let agent = world.agent.as_ref().expect("agent");
    assert_eq!(agent.destination(), Some(Cell::new(5, 30)));
    assert!(agent.is_active());

    for _ in 0..3000 {
        world.tick();
        world.service_replan(&pathfinder);
        if world.stats.destinations_reached > 0 {
            break;
        }
    }

    assert_eq!(world.stats.destinations_reached, 1);
    let agent = world.agent.as_ref().expect("agent");
    assert_eq!(agent.cell(), Cell::new(5, 30));
    assert!(!agent.is_active());
}

#[test]
fn test_obstacle_triggers_replan_around_it() {
    let config = SimConfig {
        cars: 0,
        seed: Some(4),
        pedestrians: false,
        agent_start: Some(Cell::new(22, 6)),
        agent_goal: Some(Cell::new(5, 30)),
        strategy: SearchStrategy::AStar,
    };
    let mut world =
        SimWorld::from_config(GridWorld::demo_city().expect("demo city"), &config).expect("world");
    let pathfinder = Pathfinder::new(SearchStrategy::BreadthFirst);

    world.tick();
    let obstacle = world
        .agent
        .as_ref()
        .expect("agent")
        .path()
        .iter()
        .skip(4)
        .copied()
        .find(|cell| {
            world
                .grid
                .tile_at(*cell)
                .and_then(|tile| tile.lane_direction())
                .is_some()
        })
        .expect("lane waypoint ahead");

    // Nothing to serve until the agent notices
    assert!(!world.service_replan(&pathfinder));
    world.place_obstacle(obstacle);
    world.tick();
    assert_eq!(world.stats.replans_requested, 1);
    assert!(world.service_replan(&pathfinder));
    assert_eq!(world.stats.replans_served, 1);
    assert_eq!(world.stats.replans_failed, 0);

    let agent = world.agent.as_ref().expect("agent");
    assert!(!agent.replan_needed());
    assert!(!agent.path().is_empty());
    assert!(!agent.path().contains(&obstacle));
    assert_eq!(agent.destination(), Some(Cell::new(5, 30)));
}

#[test]
fn test_agent_placement_errors() {
    let mut world = SimWorld::new_with_seed(GridWorld::demo_city().expect("demo city"), 1);
    assert!(matches!(
        world.spawn_agent(Cell::new(0, 0)),
        Err(SimError::InvalidPosition { .. })
    ));
    assert!(world.agent.is_none());
    assert!(world.move_agent_to(Cell::new(22, 6)).is_err());

    world.spawn_agent(Cell::new(22, 6)).expect("road cell");
    assert!(world.move_agent_to(Cell::new(-1, 6)).is_err());
    assert_eq!(world.agent.as_ref().expect("agent").cell(), Cell::new(22, 6));
    world.move_agent_to(Cell::new(5, 30)).expect("road cell");
    assert_eq!(world.agent.as_ref().expect("agent").cell(), Cell::new(5, 30));
}

#[test]
fn test_unreachable_goal_leaves_agent_stopped() {
    let mut world = SimWorld::new_with_seed(GridWorld::demo_city().expect("demo city"), 1);
    world.spawn_agent(Cell::new(22, 6)).expect("road cell");
    assert!(!world.route_agent(Cell::new(0, 0), &Pathfinder::new(SearchStrategy::AStar)));
    let agent = world.agent.as_ref().expect("agent");
    assert!(!agent.is_active());
    assert_eq!(agent.speed(), 0.0);
}
