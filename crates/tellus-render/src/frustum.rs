//! Object-space frustum culling for planetary terrain.
//!
//! All containment tests run in the coordinate frame of the object being
//! culled (the planet), not in world or camera space. Transforming the
//! frustum once per frame keeps the per-triangle math in well-conditioned
//! f32 regardless of how far the planet sits from the world origin.

use glam::{Mat4, Vec3};

use crate::camera::Camera;

/// Three-way containment result for frustum tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    /// Fully outside the frustum; the volume can be discarded.
    Outside,
    /// Partially inside; descendants still need individual tests.
    Intersect,
    /// Fully inside; descendants are trivially inside as well.
    Contains,
}

/// A single frustum plane stored as an inward-facing normal and a point
/// on the plane, so containment is one dot-product sign test.
#[derive(Clone, Copy, Debug)]
pub struct FrustumPlane {
    pub normal: Vec3,
    pub point: Vec3,
}

impl FrustumPlane {
    /// Build a plane from three points. The normal direction follows the
    /// winding of the points (counter-clockwise seen from the normal side).
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            normal: (b - a).cross(c - a).normalize(),
            point: a,
        }
    }

    /// Signed distance from a point to the plane; positive on the side
    /// the normal faces.
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p - self.point)
    }
}

/// Corner indices into [`Frustum::corners`].
const NEAR_TL: usize = 0;
const NEAR_TR: usize = 1;
const NEAR_BL: usize = 2;
const NEAR_BR: usize = 3;
const FAR_TL: usize = 4;
const FAR_TR: usize = 5;
const FAR_BL: usize = 6;
const FAR_BR: usize = 7;

/// A view frustum expressed in the cull target's local space.
///
/// Per frame: copy the camera pose with [`set_to_camera`], store the cull
/// target's transform with [`set_cull_transform`], then [`update`] to
/// rebuild corners and planes. The six planes are re-derived from the
/// transformed corners rather than transformed directly, which keeps them
/// consistent under any affine cull transform.
///
/// [`set_to_camera`]: Frustum::set_to_camera
/// [`set_cull_transform`]: Frustum::set_cull_transform
/// [`update`]: Frustum::update
#[derive(Clone, Debug)]
pub struct Frustum {
    // Camera pose in world space.
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    near: f32,
    far: f32,
    fov_y: f32,
    aspect: f32,

    // Cull target transform and its inverse.
    cull_world: Mat4,
    cull_inverse: Mat4,

    // Derived per frame by `update`.
    planes: [FrustumPlane; 6],
    corners: [Vec3; 8],
    position_os: Vec3,
    rad_inv_fov: f32,
}

impl Frustum {
    /// Create a frustum with an identity cull transform and a default pose.
    /// Call [`set_to_camera`](Frustum::set_to_camera) and
    /// [`update`](Frustum::update) before running containment tests.
    pub fn new() -> Self {
        let mut frustum = Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            near: 0.1,
            far: 10000.0,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            cull_world: Mat4::IDENTITY,
            cull_inverse: Mat4::IDENTITY,
            planes: [FrustumPlane {
                normal: Vec3::Z,
                point: Vec3::ZERO,
            }; 6],
            corners: [Vec3::ZERO; 8],
            position_os: Vec3::ZERO,
            rad_inv_fov: 0.0,
        };
        frustum.update();
        frustum
    }

    /// Store the cull target's world transform and its inverse. All
    /// subsequent tests are expressed relative to this transform.
    pub fn set_cull_transform(&mut self, world: Mat4) {
        self.cull_world = world;
        self.cull_inverse = world.inverse();
    }

    /// Copy position, basis vectors, and projection parameters from a camera.
    pub fn set_to_camera(&mut self, camera: &Camera) {
        self.position = camera.position;
        self.forward = camera.forward();
        self.up = camera.up();
        self.right = camera.right();
        self.near = camera.near;
        self.far = camera.far;
        self.fov_y = camera.fov_y;
        self.aspect = camera.aspect_ratio;
    }

    /// Recompute the eight corners and six planes in the cull target's
    /// local space from the current camera pose.
    pub fn update(&mut self) {
        // Camera pose in object space. Directions go through the inverse
        // without translation and are renormalized in case the cull
        // transform carries uniform scale.
        let position = self.cull_inverse.transform_point3(self.position);
        let forward = self.cull_inverse.transform_vector3(self.forward).normalize();
        let up = self.cull_inverse.transform_vector3(self.up).normalize();
        let right = self.cull_inverse.transform_vector3(self.right).normalize();

        let tan_half_fov = (self.fov_y * 0.5).tan();
        let near_hh = tan_half_fov * self.near;
        let near_hw = near_hh * self.aspect;
        let far_hh = tan_half_fov * self.far;
        let far_hw = far_hh * self.aspect;

        let near_center = position + forward * self.near;
        let far_center = position + forward * self.far;

        self.corners[NEAR_TL] = near_center + up * near_hh - right * near_hw;
        self.corners[NEAR_TR] = near_center + up * near_hh + right * near_hw;
        self.corners[NEAR_BL] = near_center - up * near_hh - right * near_hw;
        self.corners[NEAR_BR] = near_center - up * near_hh + right * near_hw;
        self.corners[FAR_TL] = far_center + up * far_hh - right * far_hw;
        self.corners[FAR_TR] = far_center + up * far_hh + right * far_hw;
        self.corners[FAR_BL] = far_center - up * far_hh - right * far_hw;
        self.corners[FAR_BR] = far_center - up * far_hh + right * far_hw;

        // Corner triples wound so every normal points into the frustum.
        self.planes = [
            // Near
            FrustumPlane::from_points(
                self.corners[NEAR_TL],
                self.corners[NEAR_TR],
                self.corners[NEAR_BL],
            ),
            // Far
            FrustumPlane::from_points(
                self.corners[FAR_TL],
                self.corners[FAR_BL],
                self.corners[FAR_TR],
            ),
            // Left
            FrustumPlane::from_points(
                self.corners[NEAR_TL],
                self.corners[NEAR_BL],
                self.corners[FAR_TL],
            ),
            // Right
            FrustumPlane::from_points(
                self.corners[NEAR_TR],
                self.corners[FAR_TR],
                self.corners[NEAR_BR],
            ),
            // Top
            FrustumPlane::from_points(
                self.corners[NEAR_TL],
                self.corners[FAR_TL],
                self.corners[NEAR_TR],
            ),
            // Bottom
            FrustumPlane::from_points(
                self.corners[NEAR_BL],
                self.corners[NEAR_BR],
                self.corners[FAR_BL],
            ),
        ];

        self.position_os = position;
        self.rad_inv_fov = 1.0 / self.fov_y;
    }

    /// The camera position in the cull target's local space.
    pub fn position_object_space(&self) -> Vec3 {
        self.position_os
    }

    /// Inverse of the vertical field of view in radians. Used by the
    /// triangulator to estimate on-screen triangle sizes.
    pub fn rad_inv_fov(&self) -> f32 {
        self.rad_inv_fov
    }

    /// Vertical field of view in radians.
    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// The eight frustum corners (4 near then 4 far) in object space.
    pub fn corners(&self) -> &[Vec3; 8] {
        &self.corners
    }

    /// Test a single point. Any negative plane distance means outside.
    pub fn contains_point(&self, p: Vec3) -> Containment {
        for plane in &self.planes {
            if plane.signed_distance(p) < 0.0 {
                return Containment::Outside;
            }
        }
        Containment::Contains
    }

    /// Test a sphere against all six planes.
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> Containment {
        let mut intersecting = false;
        for plane in &self.planes {
            let distance = plane.signed_distance(center);
            if distance < -radius {
                return Containment::Outside;
            }
            if distance < radius {
                intersecting = true;
            }
        }
        if intersecting {
            Containment::Intersect
        } else {
            Containment::Contains
        }
    }

    /// Conservative test of a flat triangle.
    ///
    /// A triangle is rejected only when one plane excludes all three
    /// corners, so this never culls a visible triangle but may keep one
    /// that actually lies outside (false positives near frustum corners).
    pub fn contains_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Containment {
        self.contains_corners(&[a, b, c])
    }

    /// Conservative test of a triangle extruded radially away from the
    /// origin by `height_mult` (> 1), bounding the maximum displacement
    /// of bumpy terrain above the flat triangle.
    pub fn contains_tri_volume(
        &self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        height_mult: f32,
    ) -> Containment {
        self.contains_corners(&[a, b, c, a * height_mult, b * height_mult, c * height_mult])
    }

    fn contains_corners(&self, corners: &[Vec3]) -> Containment {
        let mut any_outside = false;
        for plane in &self.planes {
            let mut rejected = 0;
            for &corner in corners {
                if plane.signed_distance(corner) < 0.0 {
                    rejected += 1;
                }
            }
            if rejected == corners.len() {
                return Containment::Outside;
            }
            if rejected > 0 {
                any_outside = true;
            }
        }
        if any_outside {
            Containment::Intersect
        } else {
            Containment::Contains
        }
    }
}

impl Default for Frustum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn default_frustum() -> Frustum {
        let camera = Camera {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        };
        let mut frustum = Frustum::new();
        frustum.set_to_camera(&camera);
        frustum.update();
        frustum
    }

    #[test]
    fn test_all_planes_face_frustum_interior() {
        let frustum = default_frustum();
        let centroid =
            frustum.corners().iter().copied().sum::<Vec3>() / frustum.corners().len() as f32;
        for (i, plane) in frustum.planes.iter().enumerate() {
            assert!(
                plane.signed_distance(centroid) > 0.0,
                "plane {i} does not face the frustum interior"
            );
        }
    }

    #[test]
    fn test_plane_normals_are_unit_length() {
        let frustum = default_frustum();
        for plane in &frustum.planes {
            assert!((plane.normal.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_point_in_front_of_camera_is_contained() {
        let frustum = default_frustum();
        assert_eq!(
            frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)),
            Containment::Contains
        );
    }

    #[test]
    fn test_point_behind_camera_is_outside() {
        let frustum = default_frustum();
        assert_eq!(
            frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)),
            Containment::Outside
        );
    }

    #[test]
    fn test_point_far_to_the_side_is_outside() {
        let frustum = default_frustum();
        assert_eq!(
            frustum.contains_point(Vec3::new(500.0, 0.0, -5.0)),
            Containment::Outside
        );
    }

    #[test]
    fn test_sphere_three_way_classification() {
        let frustum = default_frustum();

        // Entirely in the middle of the view volume.
        assert_eq!(
            frustum.contains_sphere(Vec3::new(0.0, 0.0, -100.0), 1.0),
            Containment::Contains
        );
        // Straddling the near plane.
        assert_eq!(
            frustum.contains_sphere(Vec3::new(0.0, 0.0, -0.1), 1.0),
            Containment::Intersect
        );
        // Behind the camera.
        assert_eq!(
            frustum.contains_sphere(Vec3::new(0.0, 0.0, 50.0), 1.0),
            Containment::Outside
        );
    }

    #[test]
    fn test_triangle_classification() {
        let frustum = default_frustum();

        let contained = frustum.contains_triangle(
            Vec3::new(-1.0, 0.0, -50.0),
            Vec3::new(1.0, 0.0, -50.0),
            Vec3::new(0.0, 1.0, -50.0),
        );
        assert_eq!(contained, Containment::Contains);

        let outside = frustum.contains_triangle(
            Vec3::new(-1.0, 0.0, 50.0),
            Vec3::new(1.0, 0.0, 50.0),
            Vec3::new(0.0, 1.0, 50.0),
        );
        assert_eq!(outside, Containment::Outside);

        // One vertex inside, two far off to the left.
        let straddling = frustum.contains_triangle(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(-500.0, 0.0, -50.0),
            Vec3::new(-500.0, 1.0, -50.0),
        );
        assert_eq!(straddling, Containment::Intersect);
    }

    /// The volume test must never cull a triangle whose flat base is
    /// visible: extrusion only adds test points.
    #[test]
    fn test_tri_volume_is_conservative() {
        let frustum = default_frustum();
        let (a, b, c) = (
            Vec3::new(-1.0, 0.0, -50.0),
            Vec3::new(1.0, 0.0, -50.0),
            Vec3::new(0.0, 1.0, -50.0),
        );
        let flat = frustum.contains_triangle(a, b, c);
        let volume = frustum.contains_tri_volume(a, b, c, 1.5);
        assert_ne!(flat, Containment::Outside);
        assert_ne!(
            volume,
            Containment::Outside,
            "volume test culled a triangle whose base is visible"
        );
    }

    /// A flat triangle on the camera side of the near plane whose radial
    /// extrusion reaches past it must classify as Intersect, not Outside.
    #[test]
    fn test_tri_volume_catches_protruding_extrusion() {
        let frustum = default_frustum();
        // Flat corners at z = -0.05 sit in front of the near plane
        // (z = -0.1); scaled by 3 they land at z = -0.15, inside.
        let a = Vec3::new(-0.01, 0.0, -0.05);
        let b = Vec3::new(0.01, 0.0, -0.05);
        let c = Vec3::new(0.0, 0.01, -0.05);
        assert_eq!(frustum.contains_triangle(a, b, c), Containment::Outside);
        assert_eq!(
            frustum.contains_tri_volume(a, b, c, 3.0),
            Containment::Intersect
        );
    }

    /// Containment must be expressed in the cull target's local space.
    #[test]
    fn test_cull_transform_moves_tests_into_object_space() {
        let camera = Camera {
            position: Vec3::new(0.0, 0.0, 100.0),
            ..Camera::default()
        };
        let mut frustum = Frustum::new();
        frustum.set_to_camera(&camera);
        // The cull target sits 100 units down -Z in front of the camera.
        frustum.set_cull_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, -100.0)));
        frustum.update();

        // The object's local origin is 200 units in front of the camera.
        assert_eq!(frustum.contains_point(Vec3::ZERO), Containment::Contains);
        assert!(
            (frustum.position_object_space() - Vec3::new(0.0, 0.0, 200.0)).length() < 1e-3,
            "camera position not transformed into object space"
        );
    }

    #[test]
    fn test_rad_inv_fov_matches_camera() {
        let frustum = default_frustum();
        let expected = 1.0 / std::f32::consts::FRAC_PI_4;
        assert!((frustum.rad_inv_fov() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_corners_span_near_and_far_planes() {
        let frustum = default_frustum();
        let corners = frustum.corners();
        for corner in &corners[..4] {
            assert!((corner.z + 0.1).abs() < 1e-4, "near corner at {corner}");
        }
        for corner in &corners[4..] {
            assert!((corner.z + 1000.0).abs() < 1e-2, "far corner at {corner}");
        }
    }
}
