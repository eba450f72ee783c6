use glam::Vec2;
use rigid2d::{Aabb, BodyType, CollisionFilter, FixtureDef, PhysicsWorld, RaycastQuery, RigidBody, Shape};

fn make_world() -> PhysicsWorld {
    PhysicsWorld::new(1.0 / 60.0)
}

fn static_body_at(world: &mut PhysicsWorld, position: Vec2) -> rigid2d::EntityId {
    world.create_body(RigidBody::builder(BodyType::Static).position(position).build()).unwrap()
}

#[test]
fn raycast_finds_closest_hit_by_default() {
    let mut world = make_world();

    let near = static_body_at(&mut world, Vec2::new(0.0, 4.0));
    world.create_fixture(near, Shape::Circle { radius: 0.5 });

    let far = static_body_at(&mut world, Vec2::new(0.0, 8.0));
    world.create_fixture(far, Shape::Circle { radius: 0.5 });

    let query = RaycastQuery::new(Vec2::ZERO, Vec2::new(0.0, 20.0));
    let hits = world.ray_cast(&query);

    assert_eq!(hits.len(), 1, "closest_only defaults to true");
    assert!(hits[0].fraction < 0.3, "closest hit should belong to the nearer circle");
}

#[test]
fn raycast_respects_layer_mask_filter() {
    let mut world = make_world();

    let allowed = static_body_at(&mut world, Vec2::new(0.0, 3.0));
    world.create_fixture_with(
        allowed,
        FixtureDef::new(Shape::Circle { radius: 0.5 }).filter(CollisionFilter { layer: 0b01, mask: u32::MAX, group: 0 }),
    );

    let blocked = static_body_at(&mut world, Vec2::new(0.0, 1.0));
    world.create_fixture_with(
        blocked,
        FixtureDef::new(Shape::Circle { radius: 0.5 }).filter(CollisionFilter { layer: 0b10, mask: u32::MAX, group: 0 }),
    );

    let mut query = RaycastQuery::new(Vec2::ZERO, Vec2::new(0.0, 20.0));
    query.layer_mask = 0b01;
    query.closest_only = false;

    let hits = world.ray_cast(&query);
    assert_eq!(hits.len(), 1, "the differently-layered fixture should be filtered out");
}

#[test]
fn raycast_can_ignore_sensors() {
    let mut world = make_world();

    let sensor = static_body_at(&mut world, Vec2::new(0.0, 3.0));
    world.create_fixture_with(sensor, FixtureDef::new(Shape::Circle { radius: 0.5 }).sensor(true));

    let mut query = RaycastQuery::new(Vec2::ZERO, Vec2::new(0.0, 20.0));
    query.ignore_sensors = true;
    assert!(world.ray_cast(&query).is_empty());

    query.ignore_sensors = false;
    assert_eq!(world.ray_cast(&query).len(), 1);
}

#[test]
fn query_aabb_returns_overlapping_fixtures() {
    let mut world = make_world();
    let body = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    world.create_fixture(body, Shape::Circle { radius: 0.5 });

    let hits = world.query_aabb(&Aabb { lower: Vec2::new(-1.0, -1.0), upper: Vec2::new(1.0, 1.0) });
    assert_eq!(hits.len(), 1);
}
