use glam::Vec2;
use rigid2d::{BodyType, PhysicsWorld, PolygonData, RigidBody, Shape};

fn make_world() -> PhysicsWorld {
    PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::ZERO).build()
}

#[test]
fn bullet_does_not_tunnel_through_thin_wall() {
    let mut world = make_world();

    // Thin vertical wall at x = 5, spanning y in [-10, 10].
    let wall_id = world.create_body(RigidBody::builder(BodyType::Static).position(Vec2::new(5.0, 0.0)).build()).unwrap();
    world.create_fixture(wall_id, Shape::Polygon(PolygonData::box_half_extents(Vec2::new(0.05, 10.0))));

    // Fast bullet at x = 0 moving at 600 units/s (10 units per 1/60s frame), enough to skip
    // clean past the wall in one step without CCD.
    let bullet = RigidBody::builder(BodyType::Dynamic)
        .position(Vec2::new(0.0, 0.0))
        .velocity(Vec2::new(600.0, 0.0), 0.0)
        .bullet(true)
        .build();
    let bullet_id = world.create_body(bullet).unwrap();
    world.create_fixture(bullet_id, Shape::Circle { radius: 0.1 });

    world.step(1.0 / 60.0);

    let final_pos = world.body(bullet_id).unwrap().transform().position;
    assert!(final_pos.x < 5.5, "bullet tunneled through the wall, x = {}", final_pos.x);
}

#[test]
fn non_bullet_dynamic_pair_is_not_toi_eligible() {
    let mut world = make_world();

    let a = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.0, 0.0)).velocity(Vec2::new(1.0, 0.0), 0.0).build()).unwrap();
    world.create_fixture(a, Shape::Circle { radius: 0.5 });
    let b = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(2.0, 0.0)).build()).unwrap();
    world.create_fixture(b, Shape::Circle { radius: 0.5 });

    // Neither body is a bullet and both are dynamic, so this pair never enters the TOI path;
    // it should still simulate without panicking.
    for _ in 0..10 {
        world.step(1.0 / 60.0);
    }
}
