use glam::Vec2;
use rigid2d::{BodyType, PhysicsWorld, PolygonData, RigidBody, Shape};

fn main() {
    let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -9.81)).build();

    let ground = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    world.create_fixture(ground, Shape::Polygon(PolygonData::box_half_extents(Vec2::new(10.0, 0.5))));

    for i in 0..5 {
        let body = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.0, i as f32 + 0.5)).build()).unwrap();
        world.create_fixture(body, Shape::Polygon(PolygonData::box_half_extents(Vec2::splat(0.45))));
    }

    for _ in 0..120 {
        world.step(1.0 / 60.0);
    }

    println!("Simulated a stack of 5 boxes for 2 seconds, solved {} contacts last step", world.last_solver_metrics().contacts_solved);
}
