use glam::Vec2;
use rigid2d::{BodyType, PhysicsWorld, RaycastQuery, RigidBody, Shape};

fn main() {
    let mut world = PhysicsWorld::new(1.0 / 60.0);
    let body_id = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    world.create_fixture(body_id, Shape::Circle { radius: 1.0 });

    let query = RaycastQuery::new(Vec2::new(-5.0, 0.0), Vec2::new(10.0, 0.0));
    let hits = world.ray_cast(&query);
    println!("Ray hits: {}", hits.len());
}
