//! Conservative-advancement time of impact, built on the cached simplex the distance engine
//! already maintains (`collision::distance`).

use glam::Vec2;
use log::warn;

use super::distance::{self, DistanceInput, SimplexCache};
use crate::core::shapes::DistanceProxy;
use crate::core::types::Sweep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    Overlapped,
    Touching,
    Separated,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
}

pub struct ToiInput<'a> {
    pub proxy_a: &'a DistanceProxy,
    pub sweep_a: Sweep,
    pub proxy_b: &'a DistanceProxy,
    pub sweep_b: Sweep,
    pub t_max: f32,
}

enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Fixes a separating axis in one body's local frame (from the cached simplex at `t1`) and
/// evaluates the signed separation of that axis at any later time without re-running GJK.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);
        let count = cache.count as usize;

        if count == 1 {
            let local_a = proxy_a.vertex(cache.index_a[0] as usize);
            let local_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_a = xf_a.transform_point(local_a);
            let point_b = xf_b.transform_point(local_b);
            let axis = (point_b - point_a).normalize_or_zero();
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::Points,
                local_point: Vec2::ZERO,
                axis,
            }
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two distinct points on B, one shared on A: the axis is B's edge normal, expressed
            // in A's local frame relative to local_point.
            let local_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_b2 = proxy_b.vertex(cache.index_b[1] as usize);
            let axis_local = perp_normalized(local_b2 - local_b1);
            let local_point = 0.5 * (local_b1 + local_b2);

            let point_b = xf_b.transform_point(local_point);
            let point_a = xf_a.transform_point(proxy_a.vertex(cache.index_a[0] as usize));
            let mut axis = xf_b.transform_vector(axis_local);
            if axis.dot(point_a - point_b) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceB,
                local_point,
                axis,
            }
        } else {
            let local_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_a2 = proxy_a.vertex(cache.index_a[1] as usize);
            let axis_local = perp_normalized(local_a2 - local_a1);
            let local_point = 0.5 * (local_a1 + local_a2);

            let point_a = xf_a.transform_point(local_point);
            let point_b = xf_b.transform_point(proxy_b.vertex(cache.index_b[0] as usize));
            let mut axis = xf_a.transform_vector(axis_local);
            if axis.dot(point_b - point_a) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// Finds the vertex pair minimizing separation along the fixed axis at time `t`.
    fn find_min_separation(&self, t: f32) -> (usize, usize, f32) {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.rotation_matrix().transpose() * self.axis;
                let axis_b = xf_b.rotation_matrix().transpose() * (-self.axis);
                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceA => {
                let axis_b = xf_b.rotation_matrix().transpose() * (-self.axis);
                let index_b = self.proxy_b.support(axis_b);
                let point_a = xf_a.transform_point(self.local_point);
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (0, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceB => {
                let axis_a = xf_a.rotation_matrix().transpose() * self.axis;
                let index_a = self.proxy_a.support(axis_a);
                let point_b = xf_b.transform_point(self.local_point);
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                (index_a, 0, (point_b - point_a).dot(self.axis))
            }
        }
    }

    /// Separation along the fixed axis for a specific vertex pair (not re-searched) at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);
        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let point_a = xf_a.transform_point(self.local_point);
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceB => {
                let point_b = xf_b.transform_point(self.local_point);
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                (point_b - point_a).dot(self.axis)
            }
        }
    }
}

fn perp_normalized(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x).normalize_or_zero()
}

/// Computes the time of impact between two swept convex proxies. `max_root_iters`/`max_iters`
/// bound the inner secant+bisection solve and the outer advancement loop respectively.
pub fn time_of_impact(
    input: &ToiInput<'_>,
    target_depth: f32,
    tolerance: f32,
    max_iters: u32,
    max_root_iters: u32,
) -> ToiOutput {
    let total_radius = input.proxy_a.radius + input.proxy_b.radius;
    let target = (total_radius - target_depth).max(tolerance);
    let max_target = target + tolerance;
    let min_target = (target - tolerance).max(0.0);

    let mut cache = SimplexCache::default();
    let mut t1 = 0.0f32;

    for _outer in 0..max_iters {
        let xf_a = input.sweep_a.get_transform(t1);
        let xf_b = input.sweep_b.get_transform(t1);

        let distance_input = DistanceInput {
            proxy_a: input.proxy_a,
            proxy_b: input.proxy_b,
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: false,
        };
        let output = distance::distance(&distance_input, &mut cache, 20);

        if output.distance <= 0.0 {
            return ToiOutput { state: ToiState::Overlapped, t: 0.0 };
        }
        if output.distance < max_target {
            return ToiOutput { state: ToiState::Touching, t: t1 };
        }

        let fcn = SeparationFunction::new(&cache, input.proxy_a, input.sweep_a, input.proxy_b, input.sweep_b, t1);

        let mut done = false;
        let mut t2 = input.t_max;
        let mut push_back_iter = 0;
        let mut pair = (0usize, 0usize);

        loop {
            let (index_a, index_b, s2) = fcn.find_min_separation(t2);
            pair = (index_a, index_b);

            if s2 > max_target {
                return ToiOutput { state: ToiState::Separated, t: input.t_max };
            }
            if s2 > min_target {
                t1 = t2;
                break;
            }

            let s1 = fcn.evaluate(index_a, index_b, t1);
            if s1 < min_target {
                warn!("time_of_impact failed: separation {s1:.5} dropped below target {min_target:.5} at t={t1:.5}");
                return ToiOutput { state: ToiState::Failed, t: t1 };
            }
            if s1 <= max_target {
                done = true;
                break;
            }

            let mut a1 = t1;
            let mut a2 = t2;
            let mut root_iter = 0;
            let mut s1_local = s1;
            let mut s2_local = s2;

            loop {
                let t = if root_iter & 1 == 1 {
                    a1 + (target - s1_local) * (a2 - a1) / (s2_local - s1_local)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iter += 1;

                let s = fcn.evaluate(pair.0, pair.1, t);
                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }
                if s > target {
                    a1 = t;
                    s1_local = s;
                } else {
                    a2 = t;
                    s2_local = s;
                }
                if root_iter >= max_root_iters {
                    t2 = t;
                    break;
                }
            }

            push_back_iter += 1;
            if push_back_iter >= input.proxy_a.vertices.len() + input.proxy_b.vertices.len() {
                break;
            }
        }

        if done {
            return ToiOutput { state: ToiState::Touching, t: t2 };
        }
        let _ = pair;
    }

    warn!("time_of_impact failed: exceeded {max_iters} outer advancement iterations without converging");
    ToiOutput { state: ToiState::Failed, t: t1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::Shape;

    #[test]
    fn fast_approaching_circles_report_separated_or_touching() {
        let shape_a = Shape::Circle { radius: 0.5 };
        let shape_b = Shape::Circle { radius: 0.5 };
        let proxy_a = shape_a.get_child(0);
        let proxy_b = shape_b.get_child(0);

        let sweep_a = Sweep {
            local_center: Vec2::ZERO,
            pos0: Vec2::new(-10.0, 0.0),
            pos1: Vec2::new(10.0, 0.0),
            angle0: 0.0,
            angle1: 0.0,
            alpha0: 0.0,
        };
        let sweep_b = Sweep {
            local_center: Vec2::ZERO,
            pos0: Vec2::new(0.0, 0.0),
            pos1: Vec2::new(0.0, 0.0),
            angle0: 0.0,
            angle1: 0.0,
            alpha0: 0.0,
        };

        let input = ToiInput {
            proxy_a: &proxy_a,
            sweep_a,
            proxy_b: &proxy_b,
            sweep_b,
            t_max: 1.0,
        };
        let output = time_of_impact(&input, 0.015, 0.00125, 20, 50);
        assert!(matches!(output.state, ToiState::Touching | ToiState::Failed));
        assert!(output.t > 0.0 && output.t < 1.0);
    }

    #[test]
    fn non_intersecting_sweep_reports_separated() {
        let shape_a = Shape::Circle { radius: 0.5 };
        let shape_b = Shape::Circle { radius: 0.5 };
        let proxy_a = shape_a.get_child(0);
        let proxy_b = shape_b.get_child(0);

        let far = Sweep {
            local_center: Vec2::ZERO,
            pos0: Vec2::new(-10.0, 100.0),
            pos1: Vec2::new(10.0, 100.0),
            angle0: 0.0,
            angle1: 0.0,
            alpha0: 0.0,
        };
        let still = Sweep {
            local_center: Vec2::ZERO,
            pos0: Vec2::ZERO,
            pos1: Vec2::ZERO,
            angle0: 0.0,
            angle1: 0.0,
            alpha0: 0.0,
        };

        let input = ToiInput {
            proxy_a: &proxy_a,
            sweep_a: far,
            proxy_b: &proxy_b,
            sweep_b: still,
            t_max: 1.0,
        };
        let output = time_of_impact(&input, 0.015, 0.00125, 20, 50);
        assert_eq!(output.state, ToiState::Separated);
    }
}
