use gateway_town_core::{Coordinate, Direction, GridService, WorldBounds};
use gateway_town_system_autotile::{retile, RoadRuleSet};
use gateway_town_system_road_graph::RoadGraph;
use gateway_town_system_spawning::{CarFactory, CarPool, Config};
use gateway_town_world::{
    BusinessCatalog, Map, MapObject, ObjectTemplate, RoadTile, RoadVariant,
};
use glam::Vec2;

fn bounds() -> WorldBounds {
    WorldBounds::new(Vec2::splat(-3.0), Vec2::splat(3.0))
}

fn town(with_diner: bool) -> RoadGraph {
    let mut map = Map::new(GridService::new(1.0), bounds());
    let mut events = Vec::new();
    let through = RoadVariant::parse("EW").expect("label");
    for x in [-3, 3] {
        map.put_at(
            MapObject::locked(ObjectTemplate::Road(RoadTile::starter(through))),
            Coordinate::new(x, 0),
            true,
            &mut events,
        );
    }
    for x in -2..=2 {
        map.put_at(
            MapObject::road(RoadVariant::ISOLATED),
            Coordinate::new(x, 0),
            false,
            &mut events,
        );
    }
    if with_diner {
        let diner = BusinessCatalog::standard()
            .find("Diner")
            .cloned()
            .expect("diner")
            .facing(Direction::South);
        map.put_at(
            MapObject::new(ObjectTemplate::Business(diner)),
            Coordinate::new(0, 1),
            false,
            &mut events,
        );
    }
    let _ = retile(&mut map, &RoadRuleSet::standard());

    let mut road = RoadGraph::new(*map.grid(), bounds());
    road.redraw(&map);
    road
}

fn factory(seed: u64) -> CarFactory {
    CarFactory::new(Config::new(seed, None)).expect("car machine")
}

#[test]
fn cars_start_on_an_entrance_facing_into_town() {
    let mut road = town(false);
    let mut factory = factory(1);

    for _ in 0..20 {
        let car = factory.create(&mut road, 0).expect("network has entrances");
        let start = car.path().next().expect("routed car");
        assert!(road.entrances().contains(&start));
        let node = road.graph().node(start).expect("start node");
        assert_eq!(Some(car.heading()), node.dir_to_next());
        assert!(car.has_route(), "spawned cars can depart");
    }
}

#[test]
fn cars_never_leave_through_their_own_entrance_cell() {
    let mut road = town(false);
    let mut factory = factory(9);

    for _ in 0..50 {
        let car = factory.create(&mut road, 100).expect("network has entrances");
        let start = car.path().next().expect("routed car");
        let goal = car.destination().expect("routed car");
        assert!(road.exits().contains(&goal), "no destinations, so always an exit");
        assert!(
            !road.same_cell(start, goal),
            "exit must lie on the far side of town"
        );
    }
}

#[test]
fn higher_rating_sends_more_visitors_to_businesses() {
    let count_detours = |rating: i64| {
        let mut road = town(true);
        let mut factory = factory(42);
        let cars: Vec<_> = (0..400)
            .filter_map(|_| factory.create(&mut road, rating))
            .collect();
        cars.iter()
            .filter(|car| {
                car.destination()
                    .is_some_and(|goal| road.destinations().contains(&goal))
            })
            .count()
    };

    let quiet = count_detours(0);
    let popular = count_detours(80);

    assert!(quiet > 0, "even an unknown town gets some visitors");
    assert!(
        popular > quiet * 2,
        "popular towns attract far more detours ({popular} vs {quiet})"
    );
}

#[test]
fn empty_network_spawns_nothing() {
    let map = Map::new(GridService::new(1.0), bounds());
    let mut road = RoadGraph::new(*map.grid(), bounds());
    road.redraw(&map);
    let mut factory = factory(3);
    let mut pool = CarPool::new();

    assert!(factory.create(&mut road, 10).is_none());
    assert_eq!(pool.spawn(&mut factory, &mut road, 10), None);
    assert!(pool.is_empty());
}

#[test]
fn exited_cars_are_recycled_before_new_ones() {
    let mut road = town(false);
    let mut factory = factory(5);
    let mut pool = CarPool::new();

    let first = pool.spawn(&mut factory, &mut road, 0).expect("spawned");
    let second = pool.spawn(&mut factory, &mut road, 0).expect("spawned");
    assert_ne!(first, second);
    assert_eq!(pool.active_count(), 2);

    pool.get_mut(first).expect("pooled").exit();
    assert!(!pool.all_inactive());
    let reused = pool.spawn(&mut factory, &mut road, 0).expect("spawned");

    assert_eq!(reused, first, "exited car is reused");
    assert_eq!(pool.len(), 2);
    let car = pool.get(reused).expect("pooled");
    assert!(car.is_active());
    assert!(car.has_route(), "reset routes the car like a fresh spawn");

    pool.exit_all();
    assert!(pool.all_inactive());
}

#[test]
fn speed_override_applies_to_new_and_recycled_cars() {
    let mut road = town(false);
    let mut factory = CarFactory::new(Config::new(5, Some(4.0))).expect("car machine");
    let mut pool = CarPool::new();

    let id = pool.spawn(&mut factory, &mut road, 0).expect("spawned");
    assert_eq!(pool.get(id).map(|car| car.speed()), Some(4.0));
    pool.get_mut(id).expect("pooled").set_speed(1.0);
    pool.get_mut(id).expect("pooled").exit();

    let reused = pool.spawn(&mut factory, &mut road, 0).expect("spawned");
    assert_eq!(pool.get(reused).map(|car| car.speed()), Some(4.0));
}
