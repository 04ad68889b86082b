//! Mirror geometry.
//!
//! Everything here is plain math on the CPU: where the mirror quad sits, the
//! matrix that reflects the model through it, the plane that clips the
//! reflected copy and the transform of the scene root. [`crate::scene`]
//! turns a [`MirrorLayout`] into GPU resources.

use cgmath::{Matrix4, Point3, Rad, Vector3, Vector4};

use crate::{
    config::Settings,
    data_structures::{bounds::BoundingSphere, model::ModelVertex},
};

/// A horizontal rectangle at height `z`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MirrorPlane {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z: f32,
}

impl MirrorPlane {
    /// Sizes the mirror around `bound`.
    ///
    /// The half-extent in x and y is `radius * width_factor`, the height is
    /// `center.z - radius * height_factor`.
    pub fn from_bound(bound: &BoundingSphere, width_factor: f32, height_factor: f32) -> Self {
        let c = bound.center;
        let r = bound.radius.max(0.0);
        Self {
            x_min: c.x - r * width_factor,
            x_max: c.x + r * width_factor,
            y_min: c.y - r * width_factor,
            y_max: c.y + r * width_factor,
            z: c.z - r * height_factor,
        }
    }

    /// Corners in the order (min x, max y), (min x, min y), (max x, min y), (max x, max y).
    pub fn corners(&self) -> [Point3<f32>; 4] {
        [
            Point3::new(self.x_min, self.y_max, self.z),
            Point3::new(self.x_min, self.y_min, self.z),
            Point3::new(self.x_max, self.y_min, self.z),
            Point3::new(self.x_max, self.y_max, self.z),
        ]
    }

    /// Up-facing, textured vertices for the quad.
    pub fn vertices(&self) -> [ModelVertex; 4] {
        const TEX_COORDS: [[f32; 2]; 4] = [[0.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        let corners = self.corners();
        std::array::from_fn(|i| ModelVertex {
            position: corners[i].into(),
            tex_coords: TEX_COORDS[i],
            normal: [0.0, 0.0, 1.0],
        })
    }

    /// The quad as two counter-clockwise triangles seen from above.
    pub fn indices(&self) -> [u32; 6] {
        [0, 1, 2, 0, 2, 3]
    }

    /// Mirrors points through the plane `z = self.z`.
    pub fn reflection_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(Vector3::new(0.0, 0.0, self.z))
            * Matrix4::from_nonuniform_scale(1.0, 1.0, -1.0)
            * Matrix4::from_translation(Vector3::new(0.0, 0.0, -self.z))
    }

    /// Plane equation keeping everything at or below the mirror.
    ///
    /// A point `p` survives when `dot(plane, (p, 1)) >= 0`.
    pub fn clip_plane(&self) -> Vector4<f32> {
        Vector4::new(0.0, 0.0, -1.0, self.z)
    }

    pub fn keeps(&self, point: Point3<f32>) -> bool {
        let plane = self.clip_plane();
        plane.x * point.x + plane.y * point.y + plane.z * point.z + plane.w >= 0.0
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn depth(&self) -> f32 {
        self.y_max - self.y_min
    }
}

/// Where everything sits in the mirrored scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MirrorLayout {
    pub plane: MirrorPlane,
    pub model_bound: BoundingSphere,
    /// Scene-to-world transform applied to the model, its reflection and the mirror.
    pub root: Matrix4<f32>,
    pub reflection: Matrix4<f32>,
}

impl MirrorLayout {
    pub fn new(model_bound: BoundingSphere, settings: &Settings) -> Self {
        let plane = MirrorPlane::from_bound(&model_bound, settings.width_factor, settings.height_factor);
        Self {
            plane,
            model_bound,
            root: Matrix4::from_angle_x(Rad::from(settings.tilt)),
            reflection: plane.reflection_matrix(),
        }
    }

    /// Bound of the model and the mirror after the root transform.
    pub fn world_bound(&self) -> BoundingSphere {
        let mut bound = self.model_bound.transform(&self.root);
        let mirror = BoundingSphere::from_points(self.plane.corners()).transform(&self.root);
        bound.expand_by_sphere(&mirror);
        bound
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, Transform};

    use super::*;

    fn unit_bound() -> BoundingSphere {
        BoundingSphere::new(Point3::new(1.0, 2.0, 3.0), 2.0)
    }

    #[test]
    fn plane_is_sized_from_the_bound() {
        let plane = MirrorPlane::from_bound(&unit_bound(), 1.5, 0.3);
        assert_eq!(plane.x_min, 1.0 - 3.0);
        assert_eq!(plane.x_max, 1.0 + 3.0);
        assert_eq!(plane.y_min, 2.0 - 3.0);
        assert_eq!(plane.y_max, 2.0 + 3.0);
        assert!((plane.z - (3.0 - 0.6)).abs() < 1e-6);
        assert_eq!(plane.width(), 6.0);
        assert_eq!(plane.depth(), 6.0);
    }

    #[test]
    fn invalid_bound_collapses_to_the_centre() {
        let plane = MirrorPlane::from_bound(&BoundingSphere::empty(), 1.5, 0.3);
        assert_eq!(plane.width(), 0.0);
        assert_eq!(plane.z, 0.0);
    }

    #[test]
    fn quad_vertices_follow_the_corner_order() {
        let plane = MirrorPlane::from_bound(&unit_bound(), 1.5, 0.3);
        let v = plane.vertices();
        assert_eq!(v[0].position[0], plane.x_min);
        assert_eq!(v[0].position[1], plane.y_max);
        assert_eq!(v[2].position[0], plane.x_max);
        assert_eq!(v[2].position[1], plane.y_min);
        assert_eq!(v[0].tex_coords, [0.0, 1.0]);
        assert_eq!(v[1].tex_coords, [0.0, 0.0]);
        assert_eq!(v[2].tex_coords, [1.0, 0.0]);
        assert_eq!(v[3].tex_coords, [1.0, 1.0]);
        assert!(v.iter().all(|v| v.normal == [0.0, 0.0, 1.0] && v.position[2] == plane.z));
    }

    #[test]
    fn triangles_face_up() {
        let plane = MirrorPlane::from_bound(&unit_bound(), 1.5, 0.3);
        let corners = plane.corners();
        for tri in plane.indices().chunks(3) {
            let a = corners[tri[0] as usize];
            let b = corners[tri[1] as usize];
            let c = corners[tri[2] as usize];
            let normal = (b - a).cross(c - a);
            assert!(normal.z > 0.0);
        }
    }

    #[test]
    fn reflection_mirrors_through_the_plane() {
        let plane = MirrorPlane::from_bound(&unit_bound(), 1.5, 0.3);
        let m = plane.reflection_matrix();
        let above = Point3::new(0.5, -1.0, plane.z + 2.0);
        let below = m.transform_point(above);
        assert!((below.z - (plane.z - 2.0)).abs() < 1e-5);
        assert_eq!(below.x, 0.5);
        assert_eq!(below.y, -1.0);
        // reflecting twice is the identity
        let back = m.transform_point(below);
        assert!((back - above).magnitude() < 1e-5);
        // points on the plane stay put
        let on = Point3::new(7.0, 7.0, plane.z);
        assert!((m.transform_point(on) - on).magnitude() < 1e-5);
    }

    #[test]
    fn clip_plane_keeps_the_reflected_side() {
        let plane = MirrorPlane::from_bound(&unit_bound(), 1.5, 0.3);
        assert!(plane.keeps(Point3::new(0.0, 0.0, plane.z - 1.0)));
        assert!(plane.keeps(Point3::new(0.0, 0.0, plane.z)));
        assert!(!plane.keeps(Point3::new(0.0, 0.0, plane.z + 0.01)));
        // the reflection of the model centre always survives the clip
        let centre = plane.reflection_matrix().transform_point(unit_bound().center);
        assert!(plane.keeps(centre));
    }

    #[test]
    fn layout_tilts_the_root() {
        let layout = MirrorLayout::new(unit_bound(), &Settings::default());
        let up = layout.root.transform_vector(Vector3::unit_z());
        let expected = Vector3::new(0.0, -(45.0_f32.to_radians().sin()), 45.0_f32.to_radians().cos());
        assert!((up - expected).magnitude() < 1e-5);

        let flat = MirrorLayout::new(
            unit_bound(),
            &Settings {
                tilt: Deg(0.0),
                ..Settings::default()
            },
        );
        assert_eq!(flat.root, Matrix4::from_angle_x(Rad(0.0)));
    }

    #[test]
    fn world_bound_covers_model_and_mirror() {
        let layout = MirrorLayout::new(unit_bound(), &Settings::default());
        let bound = layout.world_bound();
        for corner in layout.plane.corners() {
            assert!(bound.contains(layout.root.transform_point(corner)));
        }
        assert!(bound.contains(layout.root.transform_point(unit_bound().center)));
        assert!(bound.radius >= unit_bound().radius);
    }
}
