use glam::Vec2;
use rigid2d::{BodyType, DistanceJoint, Joint, PhysicsWorld, RevoluteJoint, RigidBody, Shape, WeldJoint};

fn make_world() -> PhysicsWorld {
    PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -9.81)).build()
}

#[test]
fn revolute_joint_keeps_pendulum_bob_at_fixed_distance_from_pivot() {
    let mut world = make_world();

    let anchor = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    let bob = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(2.0, 0.0)).build()).unwrap();
    world.create_fixture(bob, Shape::Circle { radius: 0.2 });

    let joint = Joint::Revolute(RevoluteJoint::new(anchor, bob, Vec2::ZERO, Vec2::ZERO, Vec2::new(-2.0, 0.0)));
    world.add_joint(joint).unwrap();

    for _ in 0..180 {
        world.step(1.0 / 60.0);
    }

    let bob_pos = world.body(bob).unwrap().transform().position;
    let distance_from_pivot = bob_pos.length();
    assert!(
        (distance_from_pivot - 2.0).abs() < 0.3,
        "pendulum bob drifted away from its constrained radius: distance = {distance_from_pivot}"
    );
}

#[test]
fn distance_joint_holds_two_bodies_apart_at_rest_length() {
    let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::ZERO).build();

    let a = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    let b = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(3.0, 0.0)).build()).unwrap();
    world.create_fixture(b, Shape::Circle { radius: 0.2 });

    let joint = Joint::Distance(DistanceJoint::new(a, b, Vec2::ZERO, Vec2::ZERO, 1.0));
    world.add_joint(joint).unwrap();

    for _ in 0..120 {
        world.step(1.0 / 60.0);
    }

    let separation = world.body(b).unwrap().transform().position.length();
    assert!((separation - 1.0).abs() < 0.2, "distance joint failed to hold rest length, got {separation}");
}

#[test]
fn weld_joint_locks_relative_angle_between_bodies() {
    let mut world = make_world();

    let a = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    let b = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(1.0, 0.0)).build()).unwrap();
    world.create_fixture(b, Shape::Circle { radius: 0.2 });

    let joint = Joint::Weld(WeldJoint::new(a, b, Vec2::ZERO, Vec2::new(-1.0, 0.0), 0.0));
    world.add_joint(joint).unwrap();

    for _ in 0..120 {
        world.step(1.0 / 60.0);
    }

    let angle = world.body(b).unwrap().transform().angle;
    assert!(angle.abs() < 0.1, "weld joint allowed relative rotation, angle = {angle}");
}

#[test]
fn destroying_a_joint_removes_it_from_the_active_set() {
    let mut world = make_world();
    let a = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
    let b = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(1.0, 0.0)).build()).unwrap();
    world.create_fixture(b, Shape::Circle { radius: 0.2 });

    let index = world.add_joint(Joint::Distance(DistanceJoint::new(a, b, Vec2::ZERO, Vec2::ZERO, 1.0))).unwrap();
    assert_eq!(world.joints.len(), 1);

    world.destroy_joint(index);
    assert_eq!(world.joints.len(), 0);
}
