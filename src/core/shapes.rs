//! The four 2D shape variants and the small operation set every shape-pair algorithm needs.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::types::Transform;

/// Two-corner axis-aligned bounding box. The empty AABB (`lower = +inf`, `upper = -inf`) is the
/// identity element for [`Aabb::union`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            lower: Vec2::splat(f32::INFINITY),
            upper: Vec2::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower.x > self.upper.x || self.lower.y > self.upper.y
    }

    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Aabb {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.lower.x <= other.upper.x
            && other.lower.x <= self.upper.x
            && self.lower.y <= other.upper.y
            && other.lower.y <= self.upper.y
    }

    pub fn extents(&self) -> Vec2 {
        self.upper - self.lower
    }

    pub fn perimeter(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extents();
        2.0 * (e.x + e.y)
    }

    pub fn center(&self) -> Vec2 {
        0.5 * (self.lower + self.upper)
    }

    pub fn enlarged(&self, amount: f32) -> Aabb {
        Aabb {
            lower: self.lower - Vec2::splat(amount),
            upper: self.upper + Vec2::splat(amount),
        }
    }

    /// Slab-test ray vs AABB. Returns the entry fraction if the segment `p1 + t*(p2-p1)` for
    /// `t in [0, max_fraction]` hits this box.
    pub fn ray_cast(&self, p1: Vec2, p2: Vec2, max_fraction: f32) -> Option<f32> {
        let d = p2 - p1;
        let mut t_min: f32 = 0.0;
        let mut t_max: f32 = max_fraction;

        for axis in 0..2 {
            let (origin, dir, lower, upper) = match axis {
                0 => (p1.x, d.x, self.lower.x, self.upper.x),
                _ => (p1.y, d.y, self.lower.y, self.upper.y),
            };
            if dir.abs() < 1e-9 {
                if origin < lower || origin > upper {
                    return None;
                }
            } else {
                let inv = 1.0 / dir;
                let mut t1 = (lower - origin) * inv;
                let mut t2 = (upper - origin) * inv;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }
        Some(t_min)
    }
}

/// Vertex loop, edge normals, and a per-shape vertex radius used by the GJK-like distance engine
/// and by manifold generation. Circles and capped edges are represented as a 1- or 2-vertex loop
/// with a nonzero `radius`.
#[derive(Debug, Clone)]
pub struct DistanceProxy {
    pub vertices: Vec<Vec2>,
    pub radius: f32,
}

impl DistanceProxy {
    /// Farthest vertex (plus radius padding, handled by callers) in the given direction.
    pub fn support(&self, direction: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_dot = self.vertices[0].dot(direction);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let d = v.dot(direction);
            if d > best_dot {
                best_dot = d;
                best_index = i;
            }
        }
        best_index
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }
}

/// Raw polygon geometry: vertices in counter-clockwise order with matching outward edge normals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolygonData {
    pub vertices: Vec<Vec2>,
    pub normals: Vec<Vec2>,
    pub centroid: Vec2,
    pub radius: f32,
}

impl PolygonData {
    /// Builds a polygon from a convex vertex hull in counter-clockwise order.
    pub fn new(vertices: Vec<Vec2>, radius: f32) -> Self {
        let n = vertices.len();
        let mut normals = Vec::with_capacity(n);
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            normals.push(Vec2::new(edge.y, -edge.x).normalize_or_zero());
        }
        let centroid = Self::compute_centroid(&vertices);
        Self {
            vertices,
            normals,
            centroid,
            radius,
        }
    }

    pub fn box_half_extents(half_extents: Vec2) -> Self {
        let hx = half_extents.x;
        let hy = half_extents.y;
        Self::new(
            vec![
                Vec2::new(-hx, -hy),
                Vec2::new(hx, -hy),
                Vec2::new(hx, hy),
                Vec2::new(-hx, hy),
            ],
            0.0,
        )
    }

    fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
        let n = vertices.len();
        let mut area = 0.0;
        let mut centroid = Vec2::ZERO;
        let origin = vertices[0];
        for i in 1..n - 1 {
            let e1 = vertices[i] - origin;
            let e2 = vertices[i + 1] - origin;
            let cross = e1.x * e2.y - e1.y * e2.x;
            let tri_area = 0.5 * cross;
            area += tri_area;
            centroid += tri_area * (e1 + e2) / 3.0;
        }
        if area.abs() < 1e-9 {
            return origin;
        }
        origin + centroid / area
    }
}

/// A shape value type, polymorphic over the four supported kinds per the component contract:
/// `child_count`, `get_child`, `compute_aabb`, `compute_mass_data`, `ray_cast`, `test_point`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Polygon(PolygonData),
    Edge { v0: Vec2, v1: Vec2 },
    Chain { vertices: Vec<Vec2>, loop_: bool },
}

impl Shape {
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Circle { .. } | Shape::Polygon(_) => 1,
            Shape::Edge { .. } => 1,
            Shape::Chain { vertices, loop_ } => {
                if *loop_ {
                    vertices.len()
                } else {
                    vertices.len().saturating_sub(1)
                }
            }
        }
    }

    pub fn get_child(&self, index: usize) -> DistanceProxy {
        match self {
            Shape::Circle { radius } => DistanceProxy {
                vertices: vec![Vec2::ZERO],
                radius: *radius,
            },
            Shape::Polygon(poly) => DistanceProxy {
                vertices: poly.vertices.clone(),
                radius: poly.radius,
            },
            Shape::Edge { v0, v1 } => DistanceProxy {
                vertices: vec![*v0, *v1],
                radius: 0.0,
            },
            Shape::Chain { vertices, loop_ } => {
                let n = vertices.len();
                let a = vertices[index % n];
                let b = if *loop_ {
                    vertices[(index + 1) % n]
                } else {
                    vertices[index + 1]
                };
                DistanceProxy {
                    vertices: vec![a, b],
                    radius: 0.0,
                }
            }
        }
    }

    pub fn compute_aabb(&self, index: usize, xf: &Transform) -> Aabb {
        let proxy = self.get_child(index);
        let mut aabb = Aabb::empty();
        for v in &proxy.vertices {
            let world = xf.transform_point(*v);
            aabb = aabb.union(&Aabb::from_points(
                world - Vec2::splat(proxy.radius),
                world + Vec2::splat(proxy.radius),
            ));
        }
        aabb
    }

    pub fn compute_mass_data(&self, density: f32) -> super::types::MassProperties {
        match self {
            Shape::Circle { radius } => {
                let mass = density * std::f32::consts::PI * radius * radius;
                let inertia = 0.5 * mass * radius * radius;
                super::types::MassProperties {
                    mass,
                    center: Vec2::ZERO,
                    inertia,
                }
            }
            Shape::Polygon(poly) => Self::polygon_mass_data(poly, density),
            Shape::Edge { .. } | Shape::Chain { .. } => super::types::MassProperties::zero(),
        }
    }

    fn polygon_mass_data(poly: &PolygonData, density: f32) -> super::types::MassProperties {
        let n = poly.vertices.len();
        if n < 3 {
            return super::types::MassProperties::zero();
        }
        let origin = poly.vertices[0];
        let mut area = 0.0;
        let mut center = Vec2::ZERO;
        let mut rot_inertia = 0.0;
        const INV3: f32 = 1.0 / 3.0;

        for i in 1..n - 1 {
            let e1 = poly.vertices[i] - origin;
            let e2 = poly.vertices[i + 1] - origin;
            let cross = e1.x * e2.y - e1.y * e2.x;
            let tri_area = 0.5 * cross;
            area += tri_area;
            center += tri_area * INV3 * (e1 + e2);

            let intx2 = e1.x * e1.x + e1.x * e2.x + e2.x * e2.x;
            let inty2 = e1.y * e1.y + e1.y * e2.y + e2.y * e2.y;
            rot_inertia += (0.25 * INV3 * cross) * (intx2 + inty2);
        }

        let mass = density * area;
        let center = if area.abs() > 1e-9 { center / area } else { Vec2::ZERO };
        let inertia = density * rot_inertia - mass * center.dot(center);

        super::types::MassProperties {
            mass,
            center: origin + center,
            inertia,
        }
    }

    pub fn ray_cast(&self, p1: Vec2, p2: Vec2, max_fraction: f32, xf: &Transform, index: usize) -> Option<(f32, Vec2)> {
        let local_p1 = xf.inverse_transform_point(p1);
        let local_p2 = xf.inverse_transform_point(p2);
        let hit = match self {
            Shape::Circle { radius } => Self::ray_circle(local_p1, local_p2, max_fraction, *radius),
            Shape::Polygon(poly) => Self::ray_polygon(local_p1, local_p2, max_fraction, poly),
            Shape::Edge { v0, v1 } => Self::ray_segment(local_p1, local_p2, max_fraction, *v0, *v1),
            Shape::Chain { .. } => {
                let proxy = self.get_child(index);
                Self::ray_segment(local_p1, local_p2, max_fraction, proxy.vertices[0], proxy.vertices[1])
            }
        };
        hit.map(|(t, local_normal)| (t, xf.transform_vector(local_normal)))
    }

    fn ray_circle(p1: Vec2, p2: Vec2, max_fraction: f32, radius: f32) -> Option<(f32, Vec2)> {
        let d = p2 - p1;
        let a = d.length_squared();
        if a < 1e-12 {
            return None;
        }
        let b = 2.0 * p1.dot(d);
        let c = p1.length_squared() - radius * radius;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let t = (-b - disc.sqrt()) / (2.0 * a);
        if (0.0..=max_fraction).contains(&t) {
            let point = p1 + d * t;
            Some((t, point.normalize_or_zero()))
        } else {
            None
        }
    }

    fn ray_segment(p1: Vec2, p2: Vec2, max_fraction: f32, v0: Vec2, v1: Vec2) -> Option<(f32, Vec2)> {
        let d = p2 - p1;
        let e = v1 - v0;
        let normal = Vec2::new(e.y, -e.x).normalize_or_zero();
        let denom = d.dot(normal);
        if denom.abs() < 1e-9 {
            return None;
        }
        let t = (v0 - p1).dot(normal) / denom;
        if !(0.0..=max_fraction).contains(&t) {
            return None;
        }
        let point = p1 + d * t;
        let s = (point - v0).dot(e) / e.length_squared().max(1e-12);
        if !(0.0..=1.0).contains(&s) {
            return None;
        }
        let normal = if denom < 0.0 { normal } else { -normal };
        Some((t, normal))
    }

    fn ray_polygon(p1: Vec2, p2: Vec2, max_fraction: f32, poly: &PolygonData) -> Option<(f32, Vec2)> {
        let d = p2 - p1;
        let mut lower = 0.0;
        let mut upper = max_fraction;
        let mut index = usize::MAX;

        for i in 0..poly.vertices.len() {
            let numerator = poly.normals[i].dot(poly.vertices[i] - p1);
            let denominator = poly.normals[i].dot(d);
            if denominator.abs() < 1e-12 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                lower = numerator / denominator;
                index = i;
            } else if denominator > 0.0 && numerator < upper * denominator {
                upper = numerator / denominator;
            }
            if upper < lower {
                return None;
            }
        }

        if index == usize::MAX {
            return None;
        }
        Some((lower, poly.normals[index]))
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        let local = xf.inverse_transform_point(point);
        match self {
            Shape::Circle { radius } => local.length_squared() <= radius * radius,
            Shape::Polygon(poly) => poly
                .normals
                .iter()
                .zip(poly.vertices.iter())
                .all(|(n, v)| n.dot(local - *v) <= 0.0),
            Shape::Edge { .. } | Shape::Chain { .. } => false,
        }
    }

    pub fn bounding_radius(&self) -> f32 {
        match self {
            Shape::Circle { radius } => *radius,
            Shape::Polygon(poly) => poly
                .vertices
                .iter()
                .map(|v| v.length())
                .fold(0.0_f32, f32::max)
                + poly.radius,
            Shape::Edge { v0, v1 } => v0.length().max(v1.length()),
            Shape::Chain { vertices, .. } => {
                vertices.iter().map(|v| v.length()).fold(0.0_f32, f32::max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_mass_data_matches_analytic_formula() {
        let poly = PolygonData::box_half_extents(Vec2::new(1.0, 2.0));
        let shape = Shape::Polygon(poly);
        let md = shape.compute_mass_data(1.0);
        assert!((md.mass - 4.0).abs() < 1e-4);
        let expected_inertia = (4.0 / 12.0) * ((2.0_f32 * 1.0).powi(2) + (2.0_f32 * 2.0).powi(2));
        assert!((md.inertia - expected_inertia).abs() < 1e-2);
    }

    #[test]
    fn circle_aabb_is_padded_by_radius() {
        let shape = Shape::Circle { radius: 1.5 };
        let xf = Transform::from_position(Vec2::new(3.0, 4.0));
        let aabb = shape.compute_aabb(0, &xf);
        assert!((aabb.lower - Vec2::new(1.5, 2.5)).length() < 1e-5);
        assert!((aabb.upper - Vec2::new(4.5, 5.5)).length() < 1e-5);
    }

    #[test]
    fn test_point_inside_and_outside_circle() {
        let shape = Shape::Circle { radius: 1.0 };
        let xf = Transform::default();
        assert!(shape.test_point(&xf, Vec2::new(0.5, 0.0)));
        assert!(!shape.test_point(&xf, Vec2::new(2.0, 0.0)));
    }
}
