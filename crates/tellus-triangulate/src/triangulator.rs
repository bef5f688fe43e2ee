//! Recursive per-frame sphere subdivision.
//!
//! Each frame the 20 base icosahedron faces are walked recursively. A
//! triangle is horizon-culled, frustum-culled, split into four children
//! with midpoints renormalized onto the sphere, or emitted as a leaf
//! instance. No triangle tree is materialized; the recursion appends
//! directly to the output list and nothing survives to the next frame.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use tellus_render::{Containment, Frustum, Viewport};

use crate::icosahedron;
use crate::lut;

/// One leaf triangle, consumed by the patch renderer as a GPU instance.
///
/// The reference grid's `(u, v)` axes map onto the edge vectors: a grid
/// point `(u, v)` lands at `a + u * r + v * s`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PatchInstance {
    /// Subdivision level of this leaf (0 = base icosahedron face).
    pub level: u32,
    /// Triangle origin (the first corner).
    pub a: [f32; 3],
    /// First edge vector (origin to second corner).
    pub r: [f32; 3],
    /// Second edge vector (origin to third corner).
    pub s: [f32; 3],
}

impl PatchInstance {
    /// Build an instance from a leaf triangle's corners.
    pub fn from_corners(level: u32, a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            level,
            a: a.to_array(),
            r: (b - a).to_array(),
            s: (c - a).to_array(),
        }
    }

    /// Triangle origin.
    pub fn origin(&self) -> Vec3 {
        Vec3::from(self.a)
    }

    /// First edge vector.
    pub fn edge_r(&self) -> Vec3 {
        Vec3::from(self.r)
    }

    /// Second edge vector.
    pub fn edge_s(&self) -> Vec3 {
        Vec3::from(self.s)
    }

    /// The three corner positions of the leaf triangle.
    pub fn corners(&self) -> [Vec3; 3] {
        let a = self.origin();
        [a, a + self.edge_r(), a + self.edge_s()]
    }
}

/// Per-triangle decision of the split heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TriNext {
    /// Discard the triangle and its descendants.
    Cull,
    /// Emit the triangle as one patch instance.
    Leaf,
    /// Subdivide; the parent was fully inside the frustum, so children
    /// skip further frustum tests.
    Split,
    /// Subdivide; children keep frustum-testing.
    SplitCull,
}

/// Recursive icosahedron triangulator for one planet.
///
/// Owns the parameter-dependent LUTs and the per-frame leaf list. LUTs are
/// rebuilt lazily when a parameter setter marks them dirty, not every
/// frame.
pub struct Triangulator {
    radius: f32,
    max_height: f32,
    max_level: u32,
    allowed_pixels: f32,

    base_faces: [[Vec3; 3]; icosahedron::FACE_COUNT],
    dot_lut: Vec<f32>,
    height_mult_lut: Vec<f32>,
    lut_dirty: bool,

    distance_lut: Vec<f32>,
    /// (fov_y, viewport width) the distance LUT was last built for.
    distance_params: Option<(f32, u32)>,

    instances: Vec<PatchInstance>,
}

impl Triangulator {
    /// Create a triangulator for a sphere of the given radius.
    ///
    /// `max_height` bounds shader-side displacement (0 for a bare sphere),
    /// `max_level` caps recursion depth, and `allowed_pixels` is the
    /// on-screen edge size below which a triangle stops splitting.
    pub fn new(radius: f32, max_height: f32, max_level: u32, allowed_pixels: f32) -> Self {
        Self {
            radius,
            max_height,
            max_level,
            allowed_pixels,
            base_faces: icosahedron::base_faces(radius),
            dot_lut: Vec::new(),
            height_mult_lut: Vec::new(),
            lut_dirty: true,
            distance_lut: Vec::new(),
            distance_params: None,
            instances: Vec::new(),
        }
    }

    /// Planet radius in local units.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Maximum displacement height above the sphere surface.
    pub fn max_height(&self) -> f32 {
        self.max_height
    }

    /// Recursion depth cap.
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Change the planet radius. Invalidates all LUTs and the base faces.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.base_faces = icosahedron::base_faces(radius);
        self.lut_dirty = true;
        self.distance_params = None;
    }

    /// Change the maximum displacement height. Invalidates the cull LUTs.
    pub fn set_max_height(&mut self, max_height: f32) {
        self.max_height = max_height;
        self.lut_dirty = true;
    }

    /// Change the recursion depth cap. Invalidates all LUTs.
    pub fn set_max_level(&mut self, max_level: u32) {
        self.max_level = max_level;
        self.lut_dirty = true;
        self.distance_params = None;
    }

    /// Change the allowed on-screen triangle size. Invalidates the
    /// distance LUT.
    pub fn set_allowed_pixels(&mut self, allowed_pixels: f32) {
        self.allowed_pixels = allowed_pixels;
        self.distance_params = None;
    }

    /// Rebuild the horizon-cull and height-multiplier LUTs if a parameter
    /// changed since the last call. Cheap no-op otherwise.
    pub fn precalculate(&mut self) {
        if !self.lut_dirty {
            return;
        }
        self.dot_lut = lut::build_dot_lut(self.max_level, self.radius, self.max_height);
        self.height_mult_lut =
            lut::build_height_mult_lut(self.max_level, self.radius, self.max_height);
        self.lut_dirty = false;
        log::debug!(
            "Rebuilt cull LUTs: radius={} max_height={} max_level={}",
            self.radius,
            self.max_height,
            self.max_level
        );
    }

    fn ensure_distance_lut(&mut self, fov_y: f32, viewport_width: u32) {
        if self.distance_params == Some((fov_y, viewport_width)) {
            return;
        }
        self.distance_lut = lut::build_distance_lut(
            self.max_level,
            self.radius,
            fov_y,
            viewport_width,
            self.allowed_pixels,
        );
        self.distance_params = Some((fov_y, viewport_width));
    }

    /// Per-level split distances, for upload to the patch morph uniform.
    pub fn distance_lut(&self) -> &[f32] {
        &self.distance_lut
    }

    /// The leaf list produced by the last
    /// [`generate_geometry`](Triangulator::generate_geometry) call.
    pub fn instances(&self) -> &[PatchInstance] {
        &self.instances
    }

    /// Number of leaves emitted by the last regeneration.
    pub fn leaf_count(&self) -> usize {
        self.instances.len()
    }

    /// Regenerate the leaf list for the current frame.
    ///
    /// The frustum must already be updated for this frame's camera pose
    /// and the planet's cull transform.
    pub fn generate_geometry(&mut self, frustum: &Frustum, viewport: Viewport) {
        self.generate_geometry_with_culling(frustum, viewport, true);
    }

    /// Regenerate with frustum/horizon culling optionally disabled.
    ///
    /// The unculled path yields full-sphere coverage regardless of camera
    /// pose, which diagnostics and offline tooling rely on.
    pub fn generate_geometry_with_culling(
        &mut self,
        frustum: &Frustum,
        viewport: Viewport,
        cull: bool,
    ) {
        self.precalculate();
        self.ensure_distance_lut(frustum.fov_y(), viewport.width);

        self.instances.clear();
        for [a, b, c] in self.base_faces {
            self.recursive_triangle(frustum, a, b, c, 0, cull, cull);
        }
        log::debug!("Generated {} leaf instances", self.instances.len());
    }

    /// Decide whether to cull, emit, or subdivide a triangle.
    fn split_heuristic(
        &self,
        frustum: &Frustum,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        level: u32,
        horizon_cull: bool,
        frustum_cull: bool,
    ) -> TriNext {
        let level_idx = level as usize;
        let center = (a + b + c) / 3.0;
        let camera = frustum.position_object_space();

        // Horizon/backface cull. The view vector degenerates when the
        // camera sits exactly on the triangle center; treat that triangle
        // as facing the camera instead of propagating NaN.
        if horizon_cull {
            let view = (center - camera).normalize_or_zero();
            if view != Vec3::ZERO
                && center.normalize().dot(view) >= self.dot_lut[level_idx]
            {
                return TriNext::Cull;
            }
        }

        if frustum_cull {
            match frustum.contains_tri_volume(a, b, c, self.height_mult_lut[level_idx]) {
                Containment::Outside => return TriNext::Cull,
                Containment::Contains => {
                    // Fully inside: descendants skip frustum tests and
                    // split on distance alone.
                    if level >= self.max_level {
                        return TriNext::Leaf;
                    }
                    if lut::min_corner_distance(camera, a, b, c) < self.distance_lut[level_idx] {
                        return TriNext::Split;
                    }
                    return TriNext::Leaf;
                }
                Containment::Intersect => {}
            }
        }

        if level >= self.max_level {
            return TriNext::Leaf;
        }
        if lut::min_corner_distance(camera, a, b, c) < self.distance_lut[level_idx] {
            if frustum_cull {
                TriNext::SplitCull
            } else {
                TriNext::Split
            }
        } else {
            TriNext::Leaf
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn recursive_triangle(
        &mut self,
        frustum: &Frustum,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        level: u32,
        horizon_cull: bool,
        frustum_cull: bool,
    ) {
        match self.split_heuristic(frustum, a, b, c, level, horizon_cull, frustum_cull) {
            TriNext::Cull => {}
            TriNext::Leaf => {
                self.instances.push(PatchInstance::from_corners(level, a, b, c));
            }
            next @ (TriNext::Split | TriNext::SplitCull) => {
                // Midpoints projected back onto the sphere keep the mesh
                // spherical rather than faceting out the base icosahedron.
                let mid_ab = ((a + b) * 0.5).normalize() * self.radius;
                let mid_bc = ((b + c) * 0.5).normalize() * self.radius;
                let mid_ca = ((c + a) * 0.5).normalize() * self.radius;

                let child_cull = next == TriNext::SplitCull;
                let next_level = level + 1;
                self.recursive_triangle(frustum, a, mid_ab, mid_ca, next_level, horizon_cull, child_cull);
                self.recursive_triangle(frustum, mid_ab, b, mid_bc, next_level, horizon_cull, child_cull);
                self.recursive_triangle(frustum, mid_ca, mid_bc, c, next_level, horizon_cull, child_cull);
                self.recursive_triangle(frustum, mid_ab, mid_bc, mid_ca, next_level, horizon_cull, child_cull);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use tellus_render::Camera;

    const RADIUS: f32 = 1000.0;
    const VIEWPORT: Viewport = Viewport {
        width: 1920,
        height: 1080,
    };

    fn camera_looking_at_origin(position: Vec3, fov_deg: f32) -> Camera {
        let mut camera = Camera {
            position,
            fov_y: fov_deg.to_radians(),
            aspect_ratio: VIEWPORT.aspect_ratio(),
            near: 10.0,
            far: 100000.0,
            ..Camera::default()
        };
        camera.look_at(Vec3::ZERO, Vec3::Y);
        camera
    }

    fn updated_frustum(camera: &Camera) -> Frustum {
        let mut frustum = Frustum::new();
        frustum.set_to_camera(camera);
        frustum.update();
        frustum
    }

    fn sort_key(instance: &PatchInstance) -> (u32, u32, u32, u32) {
        (
            instance.level,
            instance.a[0].to_bits(),
            instance.a[1].to_bits(),
            instance.a[2].to_bits(),
        )
    }

    /// With splitting disabled the unculled sphere is exactly the base
    /// icosahedron, regardless of camera pose.
    #[test]
    fn test_max_level_zero_covers_sphere_with_20_leaves() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 0, 300.0);
        for position in [
            Vec3::new(0.0, 0.0, 5000.0),
            Vec3::new(-3000.0, 2000.0, 100.0),
            Vec3::new(200.0, 1500.0, -400.0),
        ] {
            let frustum = updated_frustum(&camera_looking_at_origin(position, 45.0));
            triangulator.generate_geometry_with_culling(&frustum, VIEWPORT, false);
            assert_eq!(triangulator.leaf_count(), 20, "camera at {position}");
            for instance in triangulator.instances() {
                assert_eq!(instance.level, 0);
            }
        }
    }

    #[test]
    fn test_no_leaf_exceeds_max_level() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 4, 300.0);
        // Close to the surface, where refinement pressure is highest.
        let frustum = updated_frustum(&camera_looking_at_origin(Vec3::new(0.0, 0.0, 1100.0), 45.0));
        triangulator.generate_geometry(&frustum, VIEWPORT);
        assert!(triangulator.leaf_count() > 0);
        for instance in triangulator.instances() {
            assert!(instance.level <= 4, "leaf at level {}", instance.level);
        }
    }

    /// Every leaf corner must stay on the sphere after any number of
    /// midpoint splits.
    #[test]
    fn test_leaf_corners_stay_on_sphere() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 5, 300.0);
        let frustum = updated_frustum(&camera_looking_at_origin(Vec3::new(0.0, 0.0, 1200.0), 45.0));
        triangulator.generate_geometry(&frustum, VIEWPORT);
        for instance in triangulator.instances() {
            for corner in instance.corners() {
                assert!(
                    (corner.length() - RADIUS).abs() < RADIUS * 1e-4,
                    "corner {corner} off the sphere (|p| = {})",
                    corner.length()
                );
            }
        }
    }

    /// A camera far away and facing away from the planet sees nothing.
    #[test]
    fn test_camera_facing_away_culls_everything() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 3, 300.0);
        let camera = Camera {
            position: Vec3::new(0.0, 0.0, 50000.0),
            // Identity rotation faces -Z (toward the planet); flip it.
            rotation: Quat::from_rotation_y(std::f32::consts::PI),
            fov_y: 45.0_f32.to_radians(),
            aspect_ratio: VIEWPORT.aspect_ratio(),
            near: 10.0,
            far: 100000.0,
        };
        let frustum = updated_frustum(&camera);
        triangulator.generate_geometry(&frustum, VIEWPORT);
        assert_eq!(triangulator.leaf_count(), 0);
    }

    /// Regeneration is a pure function of camera state: two runs with the
    /// same pose emit the same leaf set.
    #[test]
    fn test_regeneration_is_deterministic() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 3, 300.0);
        let frustum = updated_frustum(&camera_looking_at_origin(Vec3::new(500.0, 800.0, 2000.0), 45.0));

        triangulator.generate_geometry(&frustum, VIEWPORT);
        let mut first: Vec<_> = triangulator.instances().to_vec();
        triangulator.generate_geometry(&frustum, VIEWPORT);
        let mut second: Vec<_> = triangulator.instances().to_vec();

        first.sort_by_key(sort_key);
        second.sort_by_key(sort_key);
        assert_eq!(first, second);
    }

    /// Radius 1000, camera 5000 out on +Z, FOV 50 degrees.
    /// Everything emitted must touch the near hemisphere; leaves stay at
    /// coarse levels at this distance.
    #[test]
    fn test_distant_camera_scenario() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 2, 300.0);
        let frustum = updated_frustum(&camera_looking_at_origin(Vec3::new(0.0, 0.0, 5000.0), 50.0));
        triangulator.generate_geometry(&frustum, VIEWPORT);

        let leaf_count = triangulator.leaf_count();
        assert!(
            leaf_count > 0 && leaf_count < 100,
            "expected a small near-hemisphere leaf set, got {leaf_count}"
        );

        let camera_dir = Vec3::Z;
        for instance in triangulator.instances() {
            assert!(instance.level <= 2);
            // No leaf may lie entirely on the far hemisphere: at least
            // one corner direction must point toward the camera side.
            let best = instance
                .corners()
                .iter()
                .map(|corner| corner.normalize().dot(camera_dir))
                .fold(f32::MIN, f32::max);
            assert!(
                best > 0.0,
                "leaf {:?} lies entirely on the far hemisphere",
                instance.a
            );
        }
    }

    /// Refinement increases monotonically as the camera approaches.
    #[test]
    fn test_closer_camera_produces_more_leaves() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 5, 300.0);

        let far = updated_frustum(&camera_looking_at_origin(Vec3::new(0.0, 0.0, 20000.0), 45.0));
        triangulator.generate_geometry(&far, VIEWPORT);
        let far_count = triangulator.leaf_count();

        let near = updated_frustum(&camera_looking_at_origin(Vec3::new(0.0, 0.0, 1200.0), 45.0));
        triangulator.generate_geometry(&near, VIEWPORT);
        let near_count = triangulator.leaf_count();

        assert!(
            near_count > far_count,
            "near {near_count} should exceed far {far_count}"
        );
    }

    /// A camera sitting exactly on a triangle center (the degenerate
    /// normalize case) must not produce NaN geometry.
    #[test]
    fn test_camera_on_triangle_center_is_safe() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 3, 300.0);
        let [a, b, c] = base_face_zero();
        let center = (a + b + c) / 3.0;

        let camera = Camera {
            position: center,
            ..camera_looking_at_origin(center, 45.0)
        };
        let frustum = updated_frustum(&camera);
        triangulator.generate_geometry(&frustum, VIEWPORT);

        for instance in triangulator.instances() {
            for corner in instance.corners() {
                assert!(corner.is_finite(), "non-finite corner {corner}");
            }
        }
    }

    /// A camera at the exact planet center sees no surface; the leaf list
    /// is empty rather than NaN-degenerate.
    #[test]
    fn test_camera_at_planet_center_is_safe() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 3, 300.0);
        let camera = Camera {
            position: Vec3::ZERO,
            ..Camera::default()
        };
        let frustum = updated_frustum(&camera);
        triangulator.generate_geometry(&frustum, VIEWPORT);
        assert_eq!(triangulator.leaf_count(), 0);
    }

    /// Changing the radius rebuilds the LUTs and base faces through the
    /// dirty flag.
    #[test]
    fn test_set_radius_invalidates_geometry() {
        let mut triangulator = Triangulator::new(RADIUS, 0.0, 1, 300.0);
        let frustum = updated_frustum(&camera_looking_at_origin(Vec3::new(0.0, 0.0, 5000.0), 45.0));
        triangulator.generate_geometry(&frustum, VIEWPORT);

        triangulator.set_radius(2.0 * RADIUS);
        triangulator.generate_geometry_with_culling(&frustum, VIEWPORT, false);
        for instance in triangulator.instances() {
            for corner in instance.corners() {
                assert!(
                    (corner.length() - 2.0 * RADIUS).abs() < 2.0 * RADIUS * 1e-4,
                    "corner {corner} not on the rescaled sphere"
                );
            }
        }
    }

    fn base_face_zero() -> [Vec3; 3] {
        crate::icosahedron::base_faces(RADIUS)[0]
    }
}
