//! GJK-style closest-point distance engine between two convex proxies. Used directly by the
//! general closest-point query and, with a cached simplex, as the inner iteration of conservative
//! advancement TOI.

use glam::Vec2;

use crate::core::shapes::DistanceProxy;
use crate::core::types::Transform;

/// Caches the simplex vertex indices between calls so the next query (often against a slightly
/// moved pair of shapes) can warm-start from the previous result instead of GJK's default
/// single-point start.
#[derive(Debug, Clone, Default)]
pub struct SimplexCache {
    pub count: u8,
    pub index_a: [u8; 3],
    pub index_b: [u8; 3],
}

pub struct DistanceInput<'a> {
    pub proxy_a: &'a DistanceProxy,
    pub proxy_b: &'a DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceOutput {
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub distance: f32,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy)]
struct SimplexVertex {
    w_a: Vec2,
    w_b: Vec2,
    w: Vec2,
    a: f32,
    index_a: u8,
    index_b: u8,
}

struct Simplex {
    vertices: Vec<SimplexVertex>,
}

impl Simplex {
    fn from_cache(cache: &SimplexCache, input: &DistanceInput<'_>) -> Self {
        let mut vertices = Vec::with_capacity(3);
        let count = cache.count.min(3);
        for i in 0..count as usize {
            let index_a = cache.index_a[i];
            let index_b = cache.index_b[i];
            let w_a = input.transform_a.transform_point(input.proxy_a.vertex(index_a as usize));
            let w_b = input.transform_b.transform_point(input.proxy_b.vertex(index_b as usize));
            vertices.push(SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 0.0,
                index_a,
                index_b,
            });
        }
        if vertices.is_empty() {
            let w_a = input.transform_a.transform_point(input.proxy_a.vertex(0));
            let w_b = input.transform_b.transform_point(input.proxy_b.vertex(0));
            vertices.push(SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 1.0,
                index_a: 0,
                index_b: 0,
            });
        }
        Self { vertices }
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.count = self.vertices.len() as u8;
        for (i, v) in self.vertices.iter().enumerate() {
            cache.index_a[i] = v.index_a;
            cache.index_b[i] = v.index_b;
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.vertices.len() {
            1 => self.vertices[0].w,
            2 => self.vertices[0].w * self.vertices[0].a + self.vertices[1].w * self.vertices[1].a,
            3 => Vec2::ZERO,
            _ => unreachable!(),
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.vertices.len() {
            1 => -self.vertices[0].w,
            2 => {
                let e = self.vertices[1].w - self.vertices[0].w;
                let sgn = cross(e, -self.vertices[0].w);
                if sgn > 0.0 {
                    Vec2::new(-e.y, e.x)
                } else {
                    Vec2::new(e.y, -e.x)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.vertices.len() {
            1 => (self.vertices[0].w_a, self.vertices[0].w_b),
            2 => {
                let a = &self.vertices[0];
                let b = &self.vertices[1];
                (a.w_a * a.a + b.w_a * b.a, a.w_b * a.a + b.w_b * b.a)
            }
            3 => {
                let a = &self.vertices[0];
                (a.w_a, a.w_a)
            }
            _ => unreachable!(),
        }
    }

    /// Reduces the simplex to the subset that contains the closest point to the origin,
    /// barycentric-weighting the surviving vertices.
    fn solve(&mut self) {
        match self.vertices.len() {
            1 => {
                self.vertices[0].a = 1.0;
            }
            2 => self.solve2(),
            3 => self.solve3(),
            _ => unreachable!(),
        }
    }

    fn solve2(&mut self) {
        let w1 = self.vertices[0].w;
        let w2 = self.vertices[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.vertices[0].a = 1.0;
            self.vertices.truncate(1);
            return;
        }

        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.vertices[0] = self.vertices[1];
            self.vertices[0].a = 1.0;
            self.vertices.truncate(1);
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.vertices[0].a = d12_1 * inv_d12;
        self.vertices[1].a = d12_2 * inv_d12;
    }

    fn solve3(&mut self) {
        let w1 = self.vertices[0].w;
        let w2 = self.vertices[1].w;
        let w3 = self.vertices[2].w;

        let e12 = w2 - w1;
        let w1e12 = -w1.dot(e12);
        let w2e12 = w2.dot(e12);
        let d12_1 = w2e12;
        let d12_2 = w1e12;

        let e13 = w3 - w1;
        let w1e13 = -w1.dot(e13);
        let w3e13 = w3.dot(e13);
        let d13_1 = w3e13;
        let d13_2 = w1e13;

        let e23 = w3 - w2;
        let w2e23 = -w2.dot(e23);
        let w3e23 = w3.dot(e23);
        let d23_1 = w3e23;
        let d23_2 = w2e23;

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.vertices[0].a = 1.0;
            self.vertices.truncate(1);
            return;
        }
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.vertices[0].a = d12_1 * inv;
            self.vertices[1].a = d12_2 * inv;
            self.vertices.truncate(2);
            return;
        }
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.vertices[0].a = d13_1 * inv;
            self.vertices[2].a = d13_2 * inv;
            self.vertices[1] = self.vertices[2];
            self.vertices.truncate(2);
            return;
        }
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.vertices[1].a = 1.0;
            self.vertices[0] = self.vertices[1];
            self.vertices.truncate(1);
            return;
        }
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.vertices[2].a = 1.0;
            self.vertices[0] = self.vertices[2];
            self.vertices.truncate(1);
            return;
        }
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv = 1.0 / (d23_1 + d23_2);
            self.vertices[1].a = d23_1 * inv;
            self.vertices[2].a = d23_2 * inv;
            self.vertices[0] = self.vertices[2];
            self.vertices.truncate(2);
            return;
        }

        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.vertices[0].a = d123_1 * inv;
        self.vertices[1].a = d123_2 * inv;
        self.vertices[2].a = d123_3 * inv;
    }
}

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Runs GJK to convergence, returning the closest witness points and their separation. When
/// `use_radii` is set the caller should subtract each proxy's vertex radius from `distance`
/// (and along the normal for the witness points) to get the true shape-to-shape separation.
pub fn distance(input: &DistanceInput<'_>, cache: &mut SimplexCache, max_iters: u32) -> DistanceOutput {
    let mut simplex = Simplex::from_cache(cache, input);
    let mut save_a = [0u8; 3];
    let mut save_b = [0u8; 3];

    let mut iterations = 0;
    while iterations < max_iters {
        let count = simplex.vertices.len();
        for i in 0..count {
            save_a[i] = simplex.vertices[i].index_a;
            save_b[i] = simplex.vertices[i].index_b;
        }

        if count == 3 {
            break;
        }

        simplex.solve();
        if simplex.vertices.len() == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < 1e-12 {
            break;
        }

        let index_a = input.proxy_a.support(rotate_into_local(&input.transform_a, -d));
        let index_b = input.proxy_b.support(rotate_into_local(&input.transform_b, d));

        let w_a = input.transform_a.transform_point(input.proxy_a.vertex(index_a));
        let w_b = input.transform_b.transform_point(input.proxy_b.vertex(index_b));

        iterations += 1;

        let duplicate = (0..count).any(|i| save_a[i] == index_a as u8 && save_b[i] == index_b as u8);
        if duplicate {
            break;
        }

        simplex.vertices.push(SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 0.0,
            index_a: index_a as u8,
            index_b: index_b as u8,
        });
    }

    let (point_a, point_b) = simplex.witness_points();
    let distance_value = simplex.closest_point().length();

    simplex.write_cache(cache);

    DistanceOutput {
        point_a,
        point_b,
        distance: distance_value,
        iterations,
    }
}

fn rotate_into_local(xf: &Transform, world_direction: Vec2) -> Vec2 {
    xf.rotation_matrix().transpose() * world_direction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::Shape;

    #[test]
    fn distance_between_separated_circles_matches_gap() {
        let shape_a = Shape::Circle { radius: 1.0 };
        let shape_b = Shape::Circle { radius: 1.0 };
        let proxy_a = shape_a.get_child(0);
        let proxy_b = shape_b.get_child(0);

        let xf_a = Transform::default();
        let xf_b = Transform::from_position(Vec2::new(5.0, 0.0));

        let input = DistanceInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: true,
        };
        let mut cache = SimplexCache::default();
        let output = distance(&input, &mut cache, 20);

        let expected = 5.0 - proxy_a.radius - proxy_b.radius;
        assert!((output.distance - expected).abs() < 1e-2, "distance was {}", output.distance);
    }

    #[test]
    fn cache_round_trips_between_calls() {
        let shape_a = Shape::Polygon(crate::core::shapes::PolygonData::box_half_extents(Vec2::new(1.0, 1.0)));
        let shape_b = Shape::Polygon(crate::core::shapes::PolygonData::box_half_extents(Vec2::new(1.0, 1.0)));
        let proxy_a = shape_a.get_child(0);
        let proxy_b = shape_b.get_child(0);

        let xf_a = Transform::default();
        let xf_b = Transform::from_position(Vec2::new(4.0, 0.0));

        let input = DistanceInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: false,
        };
        let mut cache = SimplexCache::default();
        let _ = distance(&input, &mut cache, 20);
        assert!(cache.count >= 1);
    }
}
