use glam::Vec2;
use rigid2d::{BodyType, PhysicsWorld, RigidBody, Shape};

fn main() {
    let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -9.81)).parallel(true).build();

    let ground = world.create_body(RigidBody::builder(BodyType::Static).position(Vec2::new(0.0, -5.0)).build()).unwrap();
    world.create_fixture(ground, Shape::Circle { radius: 5.0 });

    let body = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.0, 1.0)).build()).unwrap();
    world.create_fixture(body, Shape::Circle { radius: 0.5 });

    world.step(1.0 / 60.0);

    if let Some(body) = world.body(body) {
        println!("Body position after one step: {:?}", body.transform().position);
    }
}
