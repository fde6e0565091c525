//! Tile grid, traffic lights and map construction

use traffic_grid::simulation::{
    Cell, Direction, GridWorld, LightState, Orientation, Tile, TrafficLight, GREEN_LIGHT_TICKS,
    RED_LIGHT_TICKS, YELLOW_LIGHT_TICKS,
};

#[test]
fn test_from_ascii_parses_legend() {
    let grid = GridWorld::from_ascii(
        "
        .#>
        <^v
        +-|
        ryg
        ",
    )
    .expect("valid map");

    assert_eq!(grid.width(), 3);
    assert_eq!(grid.height(), 4);
    assert_eq!(grid.tile_at(Cell::new(0, 0)), Some(&Tile::Grass));
    assert_eq!(grid.tile_at(Cell::new(0, 1)), Some(&Tile::Building));
    assert_eq!(grid.tile_at(Cell::new(0, 2)), Some(&Tile::lane(Direction::East)));
    assert_eq!(grid.tile_at(Cell::new(1, 0)), Some(&Tile::lane(Direction::West)));
    assert_eq!(grid.tile_at(Cell::new(1, 1)), Some(&Tile::lane(Direction::North)));
    assert_eq!(grid.tile_at(Cell::new(1, 2)), Some(&Tile::lane(Direction::South)));
    assert!(grid.tile_at(Cell::new(2, 0)).is_some_and(Tile::is_intersection));
    assert_eq!(
        grid.tile_at(Cell::new(2, 1)),
        Some(&Tile::Crosswalk {
            orientation: Orientation::Horizontal
        })
    );
    assert_eq!(
        grid.tile_at(Cell::new(2, 2)),
        Some(&Tile::Crosswalk {
            orientation: Orientation::Vertical
        })
    );
    assert_eq!(grid.light_state_at(Cell::new(3, 0)), Some(LightState::Red));
    assert_eq!(grid.light_state_at(Cell::new(3, 1)), Some(LightState::Yellow));
    assert_eq!(grid.light_state_at(Cell::new(3, 2)), Some(LightState::Green));
    assert_eq!(grid.light_state_at(Cell::new(2, 2)), None);
}

#[test]
fn test_from_ascii_rejects_bad_maps() {
    assert!(GridWorld::from_ascii("").is_err());
    assert!(GridWorld::from_ascii(">>>\n>>").is_err());
    assert!(GridWorld::from_ascii(">x>").is_err());
}

#[test]
fn test_bounds_and_passability() {
    let grid = GridWorld::from_ascii(">#\n-.").expect("valid map");
    assert!(grid.in_bounds(Cell::new(1, 1)));
    assert!(!grid.in_bounds(Cell::new(2, 0)));
    assert!(!grid.in_bounds(Cell::new(0, -1)));
    assert_eq!(grid.tile_at(Cell::new(-1, 0)), None);

    assert!(grid.is_passable(Cell::new(0, 0)));
    assert!(grid.is_passable(Cell::new(1, 0)));
    assert!(!grid.is_passable(Cell::new(0, 1)));
    assert!(!grid.is_passable(Cell::new(1, 1)));
    assert!(!grid.is_passable(Cell::new(5, 5)));
}

#[test]
fn test_traffic_light_cycle() {
    let mut light = TrafficLight::new(LightState::Red);
    for _ in 0..RED_LIGHT_TICKS - 1 {
        light.update();
    }
    assert_eq!(light.state, LightState::Red);
    light.update();
    assert_eq!(light.state, LightState::Green);

    for _ in 0..GREEN_LIGHT_TICKS {
        light.update();
    }
    assert_eq!(light.state, LightState::Yellow);

    for _ in 0..YELLOW_LIGHT_TICKS {
        light.update();
    }
    assert_eq!(light.state, LightState::Red);
    assert_eq!(light.timer, 0);
}

#[test]
fn test_grid_update_ticks_every_light() {
    let mut grid = GridWorld::from_ascii("ry").expect("valid map");
    for _ in 0..YELLOW_LIGHT_TICKS {
        grid.update();
    }
    assert_eq!(grid.light_state_at(Cell::new(0, 0)), Some(LightState::Red));
    assert_eq!(grid.light_state_at(Cell::new(0, 1)), Some(LightState::Red));
}

#[test]
fn test_paint_road_makes_intersections() {
    let mut grid = GridWorld::new(6, 6);
    grid.paint_road(Cell::new(0, 2), Cell::new(5, 2)).expect("vertical road");
    grid.paint_road(Cell::new(2, 0), Cell::new(2, 5)).expect("horizontal road");

    assert_eq!(grid.tile_at(Cell::new(0, 2)), Some(&Tile::lane(Direction::South)));
    assert_eq!(grid.tile_at(Cell::new(0, 3)), Some(&Tile::lane(Direction::North)));
    assert_eq!(grid.tile_at(Cell::new(2, 0)), Some(&Tile::lane(Direction::West)));
    assert_eq!(grid.tile_at(Cell::new(3, 0)), Some(&Tile::lane(Direction::East)));
    for cell in [(2, 2), (2, 3), (3, 2), (3, 3)] {
        assert!(
            grid.tile_at(Cell::from(cell)).is_some_and(Tile::is_intersection),
            "{:?} should be an intersection",
            cell
        );
    }

    assert!(grid.paint_road(Cell::new(0, 0), Cell::new(3, 3)).is_err());
}

#[test]
fn test_place_crosswalk_and_light() {
    let mut grid = GridWorld::new(6, 6);
    grid.paint_road(Cell::new(0, 1), Cell::new(5, 1)).expect("vertical road");
    grid.place_crosswalk_and_light(Cell::new(3, 1), Orientation::Vertical, LightState::Green);

    let crosswalk = Tile::Crosswalk {
        orientation: Orientation::Vertical,
    };
    assert_eq!(grid.tile_at(Cell::new(3, 1)), Some(&crosswalk));
    assert_eq!(grid.tile_at(Cell::new(3, 2)), Some(&crosswalk));
    assert_eq!(grid.light_state_at(Cell::new(3, 3)), Some(LightState::Green));
}

#[test]
fn test_lane_cells_exclude_intersections_and_crosswalks() {
    let grid = GridWorld::from_ascii(">+-<\n.r..").expect("valid map");
    assert_eq!(grid.lane_cells(), vec![Cell::new(0, 0), Cell::new(0, 3)]);
}

#[test]
fn test_demo_city_is_connected_road_network() {
    let grid = GridWorld::demo_city().expect("demo city");
    assert_eq!(grid.width(), 40);
    assert_eq!(grid.height(), 24);
    assert!(!grid.lane_cells().is_empty());
    assert!(grid
        .tile_at(Cell::new(4, 5))
        .is_some_and(Tile::is_intersection));
    assert_eq!(grid.light_state_at(Cell::new(8, 7)), Some(LightState::Green));
}

#[test]
fn test_pedestrian_registry_and_render() {
    let mut grid = GridWorld::from_ascii(">-<").expect("valid map");
    grid.set_pedestrian_cells([Cell::new(0, 1)]);
    assert!(grid.has_pedestrian(Cell::new(0, 1)));
    assert!(!grid.has_pedestrian(Cell::new(0, 0)));

    let drawn = grid.render_ascii(&[(Cell::new(0, 0), 'C')]);
    assert_eq!(drawn, "Cp<\n");

    grid.set_pedestrian_cells(Vec::new());
    assert!(!grid.has_pedestrian(Cell::new(0, 1)));
    assert_eq!(grid.render_ascii(&[]), ">-<\n");
}

#[test]
fn test_render_ends_every_row_with_newline() {
    let grid = GridWorld::from_ascii(
        "
        .^.
        >+>
        .v.
        ",
    )
    .expect("valid map");
    let drawn = grid.render_ascii(&[(Cell::new(2, 1), 'C')]);
    assert_eq!(drawn.lines().count(), 3);
    assert!(drawn.ends_with('\n'));
    assert_eq!(drawn.lines().nth(1), Some(">+>"));
    assert_eq!(drawn.lines().nth(2).map(|line| &line[1..2]), Some("C"));
}
