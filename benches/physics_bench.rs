use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use rigid2d::{BodyType, PhysicsWorld, RigidBody, Shape};

fn bench_broad_and_narrow_phase(c: &mut Criterion) {
    c.bench_function("step_100_falling_circles", |b| {
        b.iter(|| {
            let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -9.81)).build();
            for i in 0..100 {
                let body = RigidBody::builder(BodyType::Dynamic).position(Vec2::new(i as f32 * 0.2, (i % 10) as f32)).build();
                let id = world.create_body(body).unwrap();
                world.create_fixture(id, Shape::Circle { radius: 0.1 });
            }
            world.step(black_box(1.0 / 60.0));
        })
    });
}

fn bench_resting_stack(c: &mut Criterion) {
    c.bench_function("settled_stack_of_30_boxes", |b| {
        use rigid2d::PolygonData;

        let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -9.81)).build();
        let ground = world.create_body(RigidBody::new(Default::default(), BodyType::Static)).unwrap();
        world.create_fixture(ground, Shape::Polygon(PolygonData::box_half_extents(Vec2::new(20.0, 0.5))));

        for i in 0..30 {
            let body = RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.0, 1.0 + i as f32 * 1.05)).build();
            let id = world.create_body(body).unwrap();
            world.create_fixture(id, Shape::Polygon(PolygonData::box_half_extents(Vec2::splat(0.5))));
        }

        for _ in 0..300 {
            world.step(1.0 / 60.0);
        }

        b.iter(|| {
            world.step(black_box(1.0 / 60.0));
        })
    });
}

criterion_group!(benches, bench_broad_and_narrow_phase, bench_resting_stack);
criterion_main!(benches);
