//! Bounding volumes.
//!
//! The mirror is sized from the model's bounding sphere and the camera homes
//! onto the bound of the whole scene, so both are computed on the CPU from the
//! loaded vertex data.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Transform, Vector3};

/// A sphere enclosing a set of points.
///
/// A negative radius marks an empty (invalid) sphere that absorbs the first
/// thing it is expanded by.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingSphere {
    pub fn new(center: Point3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn empty() -> Self {
        Self {
            center: Point3::origin(),
            radius: -1.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.radius >= 0.0
    }

    /// Centre of the axis-aligned box around `points`, radius to the farthest point.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        let points: Vec<Point3<f32>> = points.into_iter().collect();
        let Some(first) = points.first() else {
            return Self::empty();
        };
        let (min, max) = points.iter().fold((*first, *first), |(min, max), p| {
            (
                Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
                Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
            )
        });
        let center = min.midpoint(max);
        let radius = points
            .iter()
            .map(|p| (*p - center).magnitude())
            .fold(0.0_f32, f32::max);
        Self { center, radius }
    }

    pub fn expand_by_point(&mut self, point: Point3<f32>) {
        if !self.is_valid() {
            *self = Self::new(point, 0.0);
            return;
        }
        let offset = point - self.center;
        let distance = offset.magnitude();
        if distance > self.radius {
            let new_radius = (self.radius + distance) * 0.5;
            self.center = self.center + offset.normalize() * (new_radius - self.radius);
            self.radius = new_radius;
        }
    }

    pub fn expand_by_sphere(&mut self, other: &BoundingSphere) {
        if !other.is_valid() {
            return;
        }
        if !self.is_valid() {
            *self = *other;
            return;
        }
        let offset = other.center - self.center;
        let distance = offset.magnitude();
        // other already inside
        if distance + other.radius <= self.radius {
            return;
        }
        // self inside other
        if distance + self.radius <= other.radius {
            *self = *other;
            return;
        }
        let new_radius = (self.radius + distance + other.radius) * 0.5;
        self.center = self.center + offset.normalize() * (new_radius - self.radius);
        self.radius = new_radius;
    }

    /// Conservative bound after applying `matrix`.
    pub fn transform(&self, matrix: &Matrix4<f32>) -> Self {
        if !self.is_valid() {
            return *self;
        }
        let scale = [Vector3::unit_x(), Vector3::unit_y(), Vector3::unit_z()]
            .into_iter()
            .map(|axis| matrix.transform_vector(axis).magnitude())
            .fold(0.0_f32, f32::max);
        Self {
            center: matrix.transform_point(self.center),
            radius: self.radius * scale,
        }
    }

    pub fn contains(&self, point: Point3<f32>) -> bool {
        self.is_valid() && (point - self.center).magnitude() <= self.radius + 1e-4
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Matrix4};

    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn empty_input_is_invalid() {
        let sphere = BoundingSphere::from_points(Vec::new());
        assert!(!sphere.is_valid());
    }

    #[test]
    fn box_centre_and_farthest_point() {
        let sphere = BoundingSphere::from_points([
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ]);
        assert_eq!(sphere.center, Point3::new(1.0, 1.0, 0.0));
        // farthest is (3,0,0) or (-1,0,0): sqrt(4 + 1)
        assert!(close(sphere.radius, 5.0_f32.sqrt()));
    }

    #[test]
    fn expanding_keeps_all_points_inside() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(5.0, 7.0, -3.0),
            Point3::new(-2.0, 1.0, 4.0),
        ];
        let mut sphere = BoundingSphere::empty();
        for p in points {
            sphere.expand_by_point(p);
        }
        for p in points {
            assert!(sphere.contains(p), "{p:?} outside {sphere:?}");
        }
    }

    #[test]
    fn expanding_by_a_contained_sphere_is_a_no_op() {
        let mut outer = BoundingSphere::new(Point3::origin(), 10.0);
        outer.expand_by_sphere(&BoundingSphere::new(Point3::new(1.0, 1.0, 1.0), 2.0));
        assert_eq!(outer, BoundingSphere::new(Point3::origin(), 10.0));
    }

    #[test]
    fn expanding_by_a_disjoint_sphere_covers_both() {
        let mut a = BoundingSphere::new(Point3::new(-5.0, 0.0, 0.0), 1.0);
        let b = BoundingSphere::new(Point3::new(5.0, 0.0, 0.0), 1.0);
        a.expand_by_sphere(&b);
        assert!(close(a.radius, 6.0));
        assert!(close(a.center.x, 0.0));
    }

    #[test]
    fn transform_moves_centre_and_scales_radius() {
        let sphere = BoundingSphere::new(Point3::new(1.0, 0.0, 0.0), 2.0);
        let matrix = Matrix4::from_translation(Vector3::new(0.0, 0.0, 3.0))
            * Matrix4::from_angle_z(Deg(90.0))
            * Matrix4::from_scale(2.0);
        let moved = sphere.transform(&matrix);
        assert!(close(moved.center.x, 0.0));
        assert!(close(moved.center.y, 2.0));
        assert!(close(moved.center.z, 3.0));
        assert!(close(moved.radius, 4.0));
    }
}
