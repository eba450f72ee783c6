use glam::Vec2;

const EPSILON: f32 = 1e-4;

/// A clip edge: a line through `point` with outward `normal`; points with positive signed
/// distance are clipped away.
#[derive(Debug, Clone, Copy)]
pub struct ClipLine {
    normal: Vec2,
    distance: f32,
}

impl ClipLine {
    pub fn from_point_normal(point: Vec2, normal: Vec2) -> Self {
        let n = normal.normalize_or_zero();
        Self {
            normal: n,
            distance: n.dot(point),
        }
    }

    fn signed_distance(&self, point: Vec2) -> f32 {
        self.normal.dot(point) - self.distance
    }
}

/// Sutherland-Hodgman polygon clip against a sequence of half-plane edges. Each edge may drop the
/// polygon to nothing; callers should treat an empty result as "no overlap."
pub fn clip_polygon(vertices: &[Vec2], edges: &[ClipLine]) -> Vec<Vec2> {
    let mut output = vertices.to_vec();
    for edge in edges {
        output = clip_against_line(&output, *edge);
        if output.is_empty() {
            break;
        }
    }
    output
}

fn clip_against_line(vertices: &[Vec2], edge: ClipLine) -> Vec<Vec2> {
    if vertices.is_empty() {
        return Vec::new();
    }

    let mut clipped = Vec::new();
    for i in 0..vertices.len() {
        let current = vertices[i];
        let next = vertices[(i + 1) % vertices.len()];

        let current_dist = edge.signed_distance(current);
        let next_dist = edge.signed_distance(next);

        let current_inside = current_dist <= EPSILON;
        let next_inside = next_dist <= EPSILON;

        if current_inside && next_inside {
            clipped.push(next);
        } else if current_inside && !next_inside {
            if let Some(intersection) = line_intersection(current, next, current_dist, next_dist) {
                clipped.push(intersection);
            }
        } else if !current_inside && next_inside {
            if let Some(intersection) = line_intersection(current, next, current_dist, next_dist) {
                clipped.push(intersection);
            }
            clipped.push(next);
        }
    }

    clipped
}

fn line_intersection(start: Vec2, end: Vec2, start_dist: f32, end_dist: f32) -> Option<Vec2> {
    let denom = start_dist - end_dist;
    if denom.abs() <= EPSILON {
        return None;
    }
    let t = start_dist / denom;
    Some(start + (end - start) * t)
}

/// Clip edges bounding an incident segment/face to the reference face's side planes, along the
/// tangent direction within `half_extent` of `center`.
pub fn side_planes(center: Vec2, tangent: Vec2, half_extent: f32) -> [ClipLine; 2] {
    [
        ClipLine::from_point_normal(center + tangent * half_extent, tangent),
        ClipLine::from_point_normal(center - tangent * half_extent, -tangent),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipping_against_containing_square_is_identity() {
        let square = vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let edges = side_planes(Vec2::ZERO, Vec2::X, 10.0);
        let clipped = clip_polygon(&square, &edges);
        assert_eq!(clipped.len(), square.len());
    }

    #[test]
    fn clipping_drops_points_outside_half_extent() {
        let segment = vec![Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)];
        let edges = side_planes(Vec2::ZERO, Vec2::X, 1.0);
        let clipped = clip_polygon(&segment, &edges);
        for p in &clipped {
            assert!(p.x <= 1.0 + 1e-3 && p.x >= -1.0 - 1e-3);
        }
    }
}
