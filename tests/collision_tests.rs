use glam::Vec2;
use rigid2d::collision::contact::collide_shapes;
use rigid2d::{BodyType, PhysicsWorld, PolygonData, RigidBody, Shape, Transform};

fn box_shape() -> Shape {
    Shape::Polygon(PolygonData::box_half_extents(Vec2::splat(0.5)))
}

#[test]
fn overlapping_boxes_produce_a_manifold() {
    let xf_a = Transform::from_position(Vec2::ZERO);
    let xf_b = Transform::from_position(Vec2::new(0.4, 0.0));

    let manifold = collide_shapes(&box_shape(), 0, &xf_a, &box_shape(), 0, &xf_b);

    assert!(!manifold.points.is_empty(), "overlapping boxes should generate contact points");
    assert!(manifold.points[0].separation < 0.0, "overlapping boxes should report negative separation");
}

#[test]
fn flush_box_on_box_produces_two_clipped_points() {
    let xf_a = Transform::from_position(Vec2::ZERO);
    let xf_b = Transform::from_position(Vec2::new(0.9, 0.0));

    let manifold = collide_shapes(&box_shape(), 0, &xf_a, &box_shape(), 0, &xf_b);

    assert_eq!(manifold.points.len(), 2, "a flush edge-on-edge box contact should clip to two points");
}

#[test]
fn separated_boxes_produce_no_manifold_points() {
    let xf_a = Transform::from_position(Vec2::ZERO);
    let xf_b = Transform::from_position(Vec2::new(5.0, 0.0));

    let manifold = collide_shapes(&box_shape(), 0, &xf_a, &box_shape(), 0, &xf_b);

    assert!(manifold.points.is_empty());
}

#[test]
fn world_broadphase_detects_overlapping_fixtures() {
    let mut world = PhysicsWorld::new(1.0 / 60.0);
    let a = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::ZERO).build()).unwrap();
    world.create_fixture(a, Shape::Circle { radius: 0.5 });
    let b = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.2, 0.0)).build()).unwrap();
    world.create_fixture(b, Shape::Circle { radius: 0.5 });

    world.step(1.0 / 60.0);

    assert!(world.last_solver_metrics().contacts_solved > 0, "overlapping circles should produce a solved contact");
}
