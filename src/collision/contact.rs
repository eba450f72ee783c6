//! Manifold generation (SAT + Sutherland-Hodgman clip for polygon pairs, specialized routines
//! for circle/edge/chain pairs) and the contact lifecycle manager.

use glam::Vec2;
use log::trace;

use crate::core::fixture::{CollisionFilter, ContactMaterial, Fixture};
use crate::core::shapes::Shape;
use crate::core::types::Transform;
use crate::utils::allocator::{Arena, EntityId};

const FEATURE_QUANTIZATION_SCALE: f32 = 1000.0;
const FEATURE_QUANTIZATION_MAX: i32 = 1 << 20;

/// One persisted contact point, carrying its accumulated impulses across steps so long as its
/// feature id matches between regenerations (warm starting).
#[derive(Debug, Clone, Copy)]
pub struct ManifoldPoint {
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub separation: f32,
    pub feature_id: u64,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
}

/// Freshly generated contact geometry, normal pointing from fixture A toward fixture B.
#[derive(Debug, Clone, Default)]
pub struct Manifold {
    pub normal: Vec2,
    pub points: Vec<ManifoldPoint>,
}

/// Dispatches on the fixtures' shape kinds and returns world-space manifold points (A toward B).
pub fn collide_shapes(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    child_b: usize,
    xf_b: &Transform,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            collide_circles(xf_a.position, *ra, xf_b.position, *rb)
        }
        (Shape::Circle { radius }, _) => {
            let poly_b = polygon_faces(shape_b, child_b, xf_b);
            collide_polygon_circle(&poly_b, xf_a.position, *radius, true)
        }
        (_, Shape::Circle { radius }) => {
            let poly_a = polygon_faces(shape_a, child_a, xf_a);
            collide_polygon_circle(&poly_a, xf_b.position, *radius, false)
        }
        _ => {
            let poly_a = polygon_faces(shape_a, child_a, xf_a);
            let poly_b = polygon_faces(shape_b, child_b, xf_b);
            collide_polygons(&poly_a, &poly_b)
        }
    }
}

/// World-space vertex loop, per-edge outward normals, and the shape's vertex radius. `Polygon`
/// contributes its real face list; `Edge`/`Chain` contribute a two-vertex "face" per child with
/// a normal picked at query time (two-sided, oriented toward whichever shape queries it).
struct FaceSet {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
    radius: f32,
}

fn polygon_faces(shape: &Shape, child_index: usize, xf: &Transform) -> FaceSet {
    match shape {
        Shape::Polygon(poly) => FaceSet {
            vertices: poly.vertices.iter().map(|v| xf.transform_point(*v)).collect(),
            normals: poly.normals.iter().map(|n| xf.transform_vector(*n)).collect(),
            radius: poly.radius,
        },
        Shape::Edge { v0, v1 } => two_sided_face(xf.transform_point(*v0), xf.transform_point(*v1)),
        Shape::Chain { .. } => {
            let proxy = shape.get_child(child_index);
            two_sided_face(xf.transform_point(proxy.vertex(0)), xf.transform_point(proxy.vertex(1)))
        }
        Shape::Circle { .. } => unreachable!("circles are handled by a dedicated dispatch arm"),
    }
}

/// Two vertices, two normals: edge 0 runs `v0 -> v1` with the outward normal on one side, edge 1
/// the reverse `v1 -> v0` with the opposite normal, so the polygon convention `edge i spans
/// vertices[i]..vertices[(i+1) % n]` holds for a bare two-sided edge too.
fn two_sided_face(v0: Vec2, v1: Vec2) -> FaceSet {
    let edge = v1 - v0;
    let normal = Vec2::new(edge.y, -edge.x).normalize_or_zero();
    FaceSet {
        vertices: vec![v0, v1],
        normals: vec![normal, -normal],
        radius: 0.0,
    }
}

fn collide_circles(center_a: Vec2, radius_a: f32, center_b: Vec2, radius_b: f32) -> Manifold {
    let d = center_b - center_a;
    let dist_sq = d.length_squared();
    let total_radius = radius_a + radius_b;
    if dist_sq > total_radius * total_radius {
        return Manifold::default();
    }

    let distance = dist_sq.sqrt();
    let normal = if distance > 1e-9 { d / distance } else { Vec2::X };
    let point_a = center_a + normal * radius_a;
    let point_b = center_b - normal * radius_b;
    let midpoint = 0.5 * (point_a + point_b);

    Manifold {
        normal,
        points: vec![ManifoldPoint {
            point_a: midpoint,
            point_b: midpoint,
            separation: distance - total_radius,
            feature_id: 0,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
        }],
    }
}

/// `polygon_is_a` tells the caller which side the circle was on, so the returned normal always
/// points from fixture A to fixture B regardless of dispatch order.
fn collide_polygon_circle(poly: &FaceSet, circle_center: Vec2, circle_radius: f32, polygon_is_a: bool) -> Manifold {
    let n = poly.vertices.len();
    if n < 2 {
        return Manifold::default();
    }

    let mut best_separation = f32::MIN;
    let mut best_edge = 0;
    for i in 0..n {
        let separation = poly.normals[i].dot(circle_center - poly.vertices[i]);
        if separation > best_separation {
            best_separation = separation;
            best_edge = i;
        }
    }

    let total_radius = poly.radius + circle_radius;
    if best_separation > total_radius {
        return Manifold::default();
    }

    let v1 = poly.vertices[best_edge];
    let v2 = poly.vertices[(best_edge + 1) % n];

    let (point, normal_from_polygon) = if best_separation < 1e-9 {
        (poly.vertices[best_edge], poly.normals[best_edge])
    } else {
        let u1 = (circle_center - v1).dot(v2 - v1);
        let u2 = (circle_center - v2).dot(v1 - v2);
        if u1 <= 0.0 {
            (v1, (circle_center - v1).normalize_or_zero())
        } else if u2 <= 0.0 {
            (v2, (circle_center - v2).normalize_or_zero())
        } else {
            (poly.vertices[best_edge], poly.normals[best_edge])
        }
    };

    let separation = (circle_center - point).dot(normal_from_polygon) - poly.radius;
    if separation > total_radius {
        return Manifold::default();
    }

    let contact_point = point + normal_from_polygon * poly.radius;
    let normal = if polygon_is_a { normal_from_polygon } else { -normal_from_polygon };

    Manifold {
        normal,
        points: vec![ManifoldPoint {
            point_a: contact_point,
            point_b: contact_point,
            separation,
            feature_id: best_edge as u64,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
        }],
    }
}

struct AxisResult {
    separation: f32,
    edge: usize,
}

fn max_separation(reference: &FaceSet, incident: &FaceSet) -> AxisResult {
    let mut best = AxisResult {
        separation: f32::MIN,
        edge: 0,
    };
    for i in 0..reference.vertices.len() {
        let n = reference.normals[i];
        let v = reference.vertices[i];
        let min_support = incident
            .vertices
            .iter()
            .map(|b| n.dot(*b - v))
            .fold(f32::MAX, f32::min);
        if min_support > best.separation {
            best.separation = min_support;
            best.edge = i;
        }
    }
    best
}

fn collide_polygons(poly_a: &FaceSet, poly_b: &FaceSet) -> Manifold {
    let total_radius = poly_a.radius + poly_b.radius;
    let tolerance = 1e-4;

    let edge_a = max_separation(poly_a, poly_b);
    if edge_a.separation > total_radius {
        return Manifold::default();
    }
    let edge_b = max_separation(poly_b, poly_a);
    if edge_b.separation > total_radius {
        return Manifold::default();
    }

    let (reference, incident, reference_edge, flip) = if edge_b.separation > edge_a.separation + tolerance {
        (poly_b, poly_a, edge_b.edge, true)
    } else {
        (poly_a, poly_b, edge_a.edge, false)
    };

    let ref_normal = reference.normals[reference_edge];
    let mut incident_edge = 0;
    let mut min_dot = f32::MAX;
    for i in 0..incident.normals.len() {
        let dot = incident.normals[i].dot(ref_normal);
        if dot < min_dot {
            min_dot = dot;
            incident_edge = i;
        }
    }

    let i1 = incident.vertices[incident_edge];
    let i2 = incident.vertices[(incident_edge + 1) % incident.vertices.len()];

    let r1 = reference.vertices[reference_edge];
    let r2 = reference.vertices[(reference_edge + 1) % reference.vertices.len()];
    let tangent = (r2 - r1).normalize_or_zero();

    let clipped = match clip_segment(i1, i2, -tangent, -tangent.dot(r1), (incident_edge as u64, 0)) {
        Some(pair) => pair,
        None => return Manifold::default(),
    };
    let clipped = match clip_segment(clipped[0].0, clipped[1].0, tangent, tangent.dot(r2), (clipped[0].1, clipped[1].1)) {
        Some(pair) => pair,
        None => return Manifold::default(),
    };

    let mut points = Vec::with_capacity(2);
    for (point, feature) in clipped {
        let raw_separation = ref_normal.dot(point - r1);
        if raw_separation <= total_radius {
            let true_separation = raw_separation - total_radius;
            let contact_point = point - ref_normal * (poly_a.radius.min(poly_b.radius));
            points.push(ManifoldPoint {
                point_a: contact_point,
                point_b: contact_point,
                separation: true_separation,
                feature_id: feature_id(reference_edge as u64, feature, flip),
                normal_impulse: 0.0,
                tangent_impulse: 0.0,
            });
        }
    }

    if points.is_empty() {
        return Manifold::default();
    }

    let normal = if flip { -ref_normal } else { ref_normal };
    Manifold { normal, points }
}

/// Clips a two-point segment to the half-plane `dot(normal, p) <= offset`, carrying each surviving
/// or newly-created point's feature tag along (standard `b2ClipSegmentToLine`).
fn clip_segment(v1: Vec2, v2: Vec2, normal: Vec2, offset: f32, features: (u64, u64)) -> Option<[(Vec2, u64); 2]> {
    let d1 = normal.dot(v1) - offset;
    let d2 = normal.dot(v2) - offset;

    let mut out = Vec::with_capacity(2);
    if d1 <= 0.0 {
        out.push((v1, features.0));
    }
    if d2 <= 0.0 {
        out.push((v2, features.1));
    }
    if d1 * d2 < 0.0 {
        let t = d1 / (d1 - d2);
        let point = v1 + (v2 - v1) * t;
        out.push((point, features.0.max(features.1).wrapping_add(1 << 16)));
    }

    if out.len() < 2 {
        None
    } else {
        Some([out[0], out[1]])
    }
}

fn feature_id(reference_edge: u64, incident_feature: u64, flip: bool) -> u64 {
    let base = (reference_edge << 8) ^ (incident_feature.wrapping_mul(FEATURE_QUANTIZATION_SCALE as u64) & 0xFFFF);
    let base = base & ((FEATURE_QUANTIZATION_MAX as u64) - 1);
    if flip {
        base | (1 << 62)
    } else {
        base
    }
}

/// Per-step contact between two fixtures. Owned by `ContactManager`; referenced by both bodies'
/// edge lists per DESIGN.md's generational-handle redesign.
#[derive(Debug, Clone)]
pub struct Contact {
    pub fixture_a: EntityId,
    pub fixture_b: EntityId,
    pub child_a: usize,
    pub child_b: usize,
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub is_sensor: bool,
    pub touching: bool,
    pub enabled: bool,
    pub filter_flag: bool,
    pub material: ContactMaterial,
    pub manifold: Manifold,
}

impl Contact {
    fn new(fixture_a: &Fixture, child_a: usize, fixture_b: &Fixture, child_b: usize, material: ContactMaterial) -> Self {
        Self {
            fixture_a: fixture_a.id,
            fixture_b: fixture_b.id,
            child_a,
            child_b,
            body_a: fixture_a.body_id,
            body_b: fixture_b.body_id,
            is_sensor: fixture_a.is_sensor || fixture_b.is_sensor,
            touching: false,
            enabled: true,
            filter_flag: false,
            material,
            manifold: Manifold::default(),
        }
    }

    /// Regenerates the manifold, carries over matching points' accumulated impulses by feature
    /// id, and updates `touching`. Returns `(began_touching, stopped_touching)`.
    pub fn update(&mut self, fixture_a: &Fixture, xf_a: &Transform, fixture_b: &Fixture, xf_b: &Transform) -> (bool, bool) {
        let was_touching = self.touching;
        let mut manifold = if self.is_sensor {
            Manifold::default()
        } else {
            collide_shapes(
                &fixture_a.shape,
                self.child_a,
                xf_a,
                &fixture_b.shape,
                self.child_b,
                xf_b,
            )
        };

        if self.is_sensor {
            let touching = shapes_overlap(&fixture_a.shape, self.child_a, xf_a, &fixture_b.shape, self.child_b, xf_b);
            self.touching = touching;
            return (touching && !was_touching, was_touching && !touching);
        }

        for point in &mut manifold.points {
            if let Some(old) = self.manifold.points.iter().find(|p| p.feature_id == point.feature_id) {
                point.normal_impulse = old.normal_impulse;
                point.tangent_impulse = old.tangent_impulse;
            }
        }

        self.touching = !manifold.points.is_empty();
        self.manifold = manifold;

        trace!(
            "contact {:?}-{:?} touching={} points={}",
            self.body_a,
            self.body_b,
            self.touching,
            self.manifold.points.len()
        );

        (self.touching && !was_touching, was_touching && !self.touching)
    }
}

fn shapes_overlap(shape_a: &Shape, child_a: usize, xf_a: &Transform, shape_b: &Shape, child_b: usize, xf_b: &Transform) -> bool {
    let proxy_a = shape_a.get_child(child_a);
    let proxy_b = shape_b.get_child(child_b);
    let input = crate::collision::distance::DistanceInput {
        proxy_a: &proxy_a,
        proxy_b: &proxy_b,
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = crate::collision::distance::SimplexCache::default();
    let output = crate::collision::distance::distance(&input, &mut cache, 20);
    output.distance < proxy_a.radius + proxy_b.radius + 1e-4
}

/// Events a caller can subscribe to for contact lifecycle transitions.
pub trait ContactListener: Send + Sync {
    fn begin_contact(&mut self, _contact: &Contact) {}
    fn end_contact(&mut self, _contact: &Contact) {}
    fn pre_solve(&mut self, _contact: &Contact) {}
    fn post_solve(&mut self, _contact: &Contact, _normal_impulse: f32, _tangent_impulse: f32) {}
}

/// Owns the world's contact set and drives `AddPair`/`FindNewContacts`/`Collide`/`Destroy`.
pub struct ContactManager {
    pub contacts: Arena<Contact>,
}

impl Default for ContactManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactManager {
    pub fn new() -> Self {
        Self { contacts: Arena::new() }
    }

    /// Invoked by the broad-phase for every newly-overlapping proxy pair. Rejects same-body
    /// pairs, duplicate contacts, and filter-rejected pairs before creating a `Contact`.
    pub fn add_pair(
        &mut self,
        fixture_a: &Fixture,
        child_a: usize,
        fixture_b: &Fixture,
        child_b: usize,
        bodies: &mut crate::core::soa::BodiesSoA,
        existing: impl Fn(EntityId, usize, EntityId, usize) -> bool,
    ) -> Option<EntityId> {
        if fixture_a.body_id == fixture_b.body_id {
            return None;
        }
        if existing(fixture_a.id, child_a, fixture_b.id, child_b) {
            return None;
        }
        if !CollisionFilter::should_collide(&fixture_a.filter, &fixture_b.filter) {
            return None;
        }

        let material_a = bodies.get(fixture_a.body_id).map(|b| *b.material()).unwrap_or_default();
        let material_b = bodies.get(fixture_b.body_id).map(|b| *b.material()).unwrap_or_default();
        let material = ContactMaterial::mix(&material_a, &material_b);

        let is_sensor = fixture_a.is_sensor || fixture_b.is_sensor;
        if !is_sensor {
            if let Some(mut a) = bodies.get_mut(fixture_a.body_id) {
                a.set_awake(true);
            }
            if let Some(mut b) = bodies.get_mut(fixture_b.body_id) {
                b.set_awake(true);
            }
        }

        let contact = Contact::new(fixture_a, child_a, fixture_b, child_b, material);
        Some(self.contacts.insert(contact))
    }

    pub fn destroy(&mut self, id: EntityId, listener: &mut dyn ContactListener) {
        if let Some(contact) = self.contacts.remove(id) {
            if contact.touching {
                listener.end_contact(&contact);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::PolygonData;

    #[test]
    fn circle_circle_manifold_has_single_point_when_overlapping() {
        let manifold = collide_circles(Vec2::ZERO, 1.0, Vec2::new(1.5, 0.0), 1.0);
        assert_eq!(manifold.points.len(), 1);
        assert!((manifold.normal - Vec2::X).length() < 1e-5);
    }

    #[test]
    fn circle_circle_manifold_empty_when_separated() {
        let manifold = collide_circles(Vec2::ZERO, 1.0, Vec2::new(3.0, 0.0), 1.0);
        assert!(manifold.points.is_empty());
    }

    #[test]
    fn overlapping_boxes_produce_two_point_manifold() {
        let box_a = Shape::Polygon(PolygonData::box_half_extents(Vec2::new(1.0, 1.0)));
        let box_b = Shape::Polygon(PolygonData::box_half_extents(Vec2::new(1.0, 1.0)));
        let xf_a = Transform::default();
        let xf_b = Transform::from_position(Vec2::new(1.9, 0.0));

        let manifold = collide_shapes(&box_a, 0, &xf_a, &box_b, 0, &xf_b);
        assert!(!manifold.points.is_empty());
        assert!(manifold.normal.x > 0.5);
    }

    #[test]
    fn separated_boxes_produce_empty_manifold() {
        let box_a = Shape::Polygon(PolygonData::box_half_extents(Vec2::new(1.0, 1.0)));
        let box_b = Shape::Polygon(PolygonData::box_half_extents(Vec2::new(1.0, 1.0)));
        let xf_a = Transform::default();
        let xf_b = Transform::from_position(Vec2::new(5.0, 0.0));

        let manifold = collide_shapes(&box_a, 0, &xf_a, &box_b, 0, &xf_b);
        assert!(manifold.points.is_empty());
    }
}
