use glam::Vec2;
use rigid2d::{BodyType, PhysicsWorld, PolygonData, RigidBody, Shape};

fn make_world() -> PhysicsWorld {
    PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::ZERO).build()
}

/// A moderate-speed (non-CCD-eligible) impact should still be caught by the regular position
/// solver within a handful of steps, rather than leaving the circle buried inside the wall.
#[test]
fn regular_solver_resolves_penetration_from_a_moderate_speed_impact() {
    let mut world = make_world();

    let wall_id = world.create_body(RigidBody::builder(BodyType::Static).position(Vec2::new(0.0, 2.0)).build()).unwrap();
    world.create_fixture(wall_id, Shape::Polygon(PolygonData::box_half_extents(Vec2::new(5.0, 0.5))));

    let ball = RigidBody::builder(BodyType::Dynamic)
        .position(Vec2::new(0.0, 0.9))
        .velocity(Vec2::new(0.0, 3.0), 0.0)
        .build();
    let ball_id = world.create_body(ball).unwrap();
    world.create_fixture(ball_id, Shape::Circle { radius: 0.5 });

    for _ in 0..30 {
        world.step(1.0 / 60.0);
    }

    let final_y = world.body(ball_id).unwrap().transform().position.y;
    assert!(final_y <= 1.55, "ball penetrated too far into the wall, y = {final_y}");
}
