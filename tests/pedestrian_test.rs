//! Crosswalk clustering and the pedestrian crossing model

use rand::rngs::StdRng;
use rand::SeedableRng;

use traffic_grid::simulation::{
    decide_to_cross, find_crossings, Cell, GridWorld, LightState, Orientation, Pedestrian,
    PedestrianId, PedestrianManager, PedestrianPhase, Position, SimId, Tile, TrafficLight,
    MAX_ACTIVE, TICK_SECONDS,
};

fn two_crossings() -> GridWorld {
    GridWorld::from_ascii(
        "
        .v^......
        .||r.....
        .v^......
        .........
        <<<<-<<<<
        >>>>->>>>
        ....g....
        ",
    )
    .expect("valid map")
}

fn yellow_crossing() -> GridWorld {
    GridWorld::from_ascii(
        "
        .v^..
        .||y.
        .v^..
        ",
    )
    .expect("valid map")
}

#[test]
fn test_crosswalks_cluster_with_nearest_light() {
    let grid = two_crossings();
    let crossings = find_crossings(&grid);
    assert_eq!(crossings.len(), 2);

    let vertical = &crossings[0];
    assert_eq!(vertical.cells, vec![Cell::new(1, 1), Cell::new(1, 2)]);
    assert_eq!(vertical.orientation, Orientation::Vertical);
    assert_eq!(vertical.light, Some(Cell::new(1, 3)));
    // Waits beside the light and walks across to the other kerb
    assert_eq!(Cell::containing(vertical.near), Cell::new(1, 3));
    assert_eq!(Cell::containing(vertical.far), Cell::new(1, 1));
    assert!(vertical.near.x > vertical.far.x);

    let horizontal = &crossings[1];
    assert_eq!(horizontal.cells, vec![Cell::new(4, 4), Cell::new(5, 4)]);
    assert_eq!(horizontal.orientation, Orientation::Horizontal);
    assert_eq!(horizontal.light, Some(Cell::new(6, 4)));
    assert_eq!(Cell::containing(horizontal.near), Cell::new(6, 4));
    assert_eq!(Cell::containing(horizontal.far), Cell::new(4, 4));
}

#[test]
fn test_closest_of_several_lights_wins() {
    let grid = GridWorld::from_ascii(
        "
        .v^..
        r||r.
        .v^..
        ",
    )
    .expect("valid map");
    let crossings = find_crossings(&grid);
    assert_eq!(crossings.len(), 1);
    // Both lights touch the crossing, but (1, 3) is nearer the middle tile
    assert_eq!(crossings[0].light, Some(Cell::new(1, 3)));
}

#[test]
fn test_unsignalled_crossing() {
    let grid = GridWorld::from_ascii(
        "
        .v^.
        .||.
        .v^.
        ",
    )
    .expect("valid map");
    let crossings = find_crossings(&grid);
    assert_eq!(crossings.len(), 1);
    assert_eq!(crossings[0].light, None);
    assert!(crossings[0].near.x < crossings[0].far.x);
    assert_eq!(crossings[0].light_state(&grid), None);
}

#[test]
fn test_crossing_probabilities() {
    let mut rng = StdRng::seed_from_u64(2024);
    let trials = 10_000;
    let count = |light: Option<LightState>, rng: &mut StdRng| {
        (0..trials).filter(|_| decide_to_cross(light, rng)).count()
    };

    let red = count(Some(LightState::Red), &mut rng);
    let green = count(Some(LightState::Green), &mut rng);
    assert!((800..1200).contains(&red), "red crossings {}", red);
    assert!((8800..9200).contains(&green), "green crossings {}", green);
    assert_eq!(count(Some(LightState::Yellow), &mut rng), 0);
    assert_eq!(count(None, &mut rng), 0);
}

#[test]
fn test_pedestrian_lifecycle() {
    let near = Position::new(70.0, 30.0);
    let far = Position::new(10.0, 30.0);
    let mut pedestrian = Pedestrian {
        id: PedestrianId(SimId(0)),
        position: near,
        near,
        far,
        speed: 60.0,
        phase: PedestrianPhase::WalkingToEdge,
        crossing: 0,
    };

    pedestrian.update(TICK_SECONDS);
    assert_eq!(pedestrian.phase, PedestrianPhase::Waiting);

    // Waiting pedestrians do not move
    pedestrian.update(TICK_SECONDS);
    assert_eq!(pedestrian.position, near);

    pedestrian.phase = PedestrianPhase::Crossing;
    let mut ticks = 0;
    while pedestrian.phase == PedestrianPhase::Crossing {
        pedestrian.update(TICK_SECONDS);
        ticks += 1;
        assert!(ticks <= 61, "pedestrian never arrived");
    }
    assert_eq!(pedestrian.phase, PedestrianPhase::Done);
    assert_eq!(pedestrian.position, far);
    assert_eq!(pedestrian.cell(), Cell::new(1, 0));
}

#[test]
fn test_yellow_light_holds_everyone_until_it_changes() {
    let mut grid = yellow_crossing();
    let mut rng = StdRng::seed_from_u64(6);
    let mut manager = PedestrianManager::empty(&grid);
    assert_eq!(manager.spawn_batch(10, &mut rng), 10);

    manager.update(&grid, TICK_SECONDS, &mut rng);
    assert!(manager
        .pedestrians()
        .iter()
        .all(|pedestrian| pedestrian.phase == PedestrianPhase::Waiting));
    assert_eq!(manager.crossings()[0].waiting().count(), 10);

    grid.set_tile(
        Cell::new(1, 3),
        Tile::TrafficLight(TrafficLight::new(LightState::Green)),
    );
    manager.update(&grid, TICK_SECONDS, &mut rng);

    let crossing = manager
        .pedestrians()
        .iter()
        .filter(|pedestrian| pedestrian.phase == PedestrianPhase::Crossing)
        .count();
    let waiting = manager
        .pedestrians()
        .iter()
        .filter(|pedestrian| pedestrian.phase == PedestrianPhase::Waiting)
        .count();
    assert!(crossing > 0);
    assert_eq!(crossing + waiting, 10);
    assert_eq!(manager.crossings()[0].waiting().count(), waiting);
}

#[test]
fn test_population_is_capped() {
    let grid = yellow_crossing();
    let mut rng = StdRng::seed_from_u64(9);
    let mut manager = PedestrianManager::new(&grid, &mut rng);
    assert_eq!(manager.active_count(), 15);

    let mut spawned = 0;
    for _ in 0..600 {
        let update = manager.update(&grid, TICK_SECONDS, &mut rng);
        spawned += update.spawned;
        assert_eq!(update.finished, 0);
        assert!(manager.active_count() <= MAX_ACTIVE);
    }
    assert_eq!(manager.active_count(), MAX_ACTIVE);
    assert_eq!(spawned, MAX_ACTIVE - 15);
}

#[test]
fn test_pedestrians_reach_the_far_side() {
    let grid = GridWorld::from_ascii(
        "
        .v^..
        .||g.
        .v^..
        ",
    )
    .expect("valid map");
    let mut rng = StdRng::seed_from_u64(12);
    let mut manager = PedestrianManager::empty(&grid);
    manager.spawn_batch(5, &mut rng);

    let mut finished = 0;
    let mut saw_on_crosswalk = false;
    for _ in 0..180 {
        finished += manager.update(&grid, TICK_SECONDS, &mut rng).finished;
        saw_on_crosswalk |= manager
            .occupied_cells()
            .iter()
            .any(|cell| matches!(grid.tile_at(*cell), Some(Tile::Crosswalk { .. })));
    }
    assert!(finished > 0);
    assert!(saw_on_crosswalk);
}

#[test]
fn test_no_crossings_means_no_pedestrians() {
    let grid = GridWorld::from_ascii(">>>>").expect("valid map");
    let mut rng = StdRng::seed_from_u64(1);
    let mut manager = PedestrianManager::new(&grid, &mut rng);
    assert_eq!(manager.active_count(), 0);
    for _ in 0..200 {
        manager.update(&grid, TICK_SECONDS, &mut rng);
    }
    assert_eq!(manager.active_count(), 0);
}
