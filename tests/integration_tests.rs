use glam::Vec2;
use rigid2d::{BodyType, PhysicsWorld, RigidBody, Shape};

#[test]
fn bodies_fall_under_gravity() {
    let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -9.81)).build();

    let body_id = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.0, 10.0)).build()).unwrap();
    world.create_fixture(body_id, Shape::Circle { radius: 0.5 });

    world.step(1.0 / 60.0);

    let position_y = world.body(body_id).expect("body should exist").transform().position.y;
    assert!(position_y < 10.0, "body should start falling, y = {position_y}");
}

#[test]
fn static_body_does_not_move() {
    let mut world = PhysicsWorld::new(1.0 / 60.0);
    let ground = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    world.create_fixture(ground, Shape::Circle { radius: 1.0 });

    for _ in 0..60 {
        world.step(1.0 / 60.0);
    }

    assert_eq!(world.body(ground).unwrap().transform().position, Vec2::ZERO);
}

#[test]
fn destroying_a_body_drops_its_fixtures() {
    let mut world = PhysicsWorld::new(1.0 / 60.0);
    let body_id = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::ZERO).build()).unwrap();
    let fixture_id = world.create_fixture(body_id, Shape::Circle { radius: 0.5 }).unwrap();

    world.destroy_body(body_id);

    assert!(world.body(body_id).is_none());
    assert!(world.fixture(fixture_id).is_none());
}

#[test]
fn world_step_is_deterministic_for_identical_initial_state() {
    let build = || {
        let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -9.81)).build();
        let id = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.0, 5.0)).build()).unwrap();
        world.create_fixture(id, Shape::Circle { radius: 0.5 });
        (world, id)
    };

    let (mut world_a, id_a) = build();
    let (mut world_b, id_b) = build();

    for _ in 0..120 {
        world_a.step(1.0 / 60.0);
        world_b.step(1.0 / 60.0);
    }

    let pos_a = world_a.body(id_a).unwrap().transform().position;
    let pos_b = world_b.body(id_b).unwrap().transform().position;
    assert_eq!(pos_a, pos_b);
}
