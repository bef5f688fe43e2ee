//! Per-level lookup tables driving the split heuristic.
//!
//! All three tables are indexed by subdivision level and carry exactly
//! `max_level + 1` entries. They derive from the actual base icosahedron
//! geometry rather than hard-coded angles, so they stay consistent when
//! the radius changes.

use glam::Vec3;

use crate::icosahedron;

/// Angular radius (center to corner) of the representative triangle per
/// level, in radians. Halves with each subdivision.
fn angular_radius(level: u32) -> f32 {
    let [a, b, c] = icosahedron::base_faces(1.0)[0];
    let center = ((a + b + c) / 3.0).normalize();
    let base = a.normalize().dot(center).clamp(-1.0, 1.0).acos();
    base * 0.5_f32.powi(level as i32)
}

/// Horizon-cull thresholds.
///
/// A triangle center more than its own angular radius (plus the height
/// allowance) past the horizon cannot contribute any visible geometry.
/// The dot product of the center's outward direction with the normalized
/// camera-to-center view vector equals the sine of the angle by which the
/// center sits past the horizon, so the threshold for level `l` is
/// `sin(angular_radius(l) + culling_angle)`.
pub fn build_dot_lut(max_level: u32, radius: f32, max_height: f32) -> Vec<f32> {
    // Extra visibility allowance: terrain displaced up to max_height can
    // peek over the horizon from slightly further around the sphere.
    let culling_angle = (radius / (radius + max_height)).clamp(-1.0, 1.0).acos();

    (0..=max_level)
        .map(|level| (angular_radius(level) + culling_angle).sin().min(1.0))
        .collect()
}

/// Radial bulge multipliers for the triangle-volume frustum test.
///
/// A flat triangle's interior sags below the sphere surface; scaling its
/// corners by `1 / cos(angular_radius)` raises the extruded top face above
/// every point of the spherical cap, and the normalized max height covers
/// displacement on top of that.
pub fn build_height_mult_lut(max_level: u32, radius: f32, max_height: f32) -> Vec<f32> {
    let norm_max_height = max_height / radius;
    let mut lut = Vec::with_capacity(max_level as usize + 1);

    // Walk a representative corner child down the levels, renormalizing
    // midpoints exactly as the triangulator does.
    let [mut a, mut b, mut c] = icosahedron::base_faces(radius)[0];
    for _ in 0..=max_level {
        let center = (a + b + c) / 3.0;
        let cos_corner = a.normalize().dot(center.normalize());
        lut.push(1.0 / cos_corner + norm_max_height);

        let mid_ab = ((a + b) * 0.5).normalize() * radius;
        let mid_ca = ((c + a) * 0.5).normalize() * radius;
        (b, c) = (mid_ab, mid_ca);
    }
    lut
}

/// Split-distance thresholds.
///
/// A triangle edge shorter than `allowed_pixels` on screen should not be
/// split further. Converting the pixel budget into an angle via the
/// vertical FOV and viewport width gives the camera distance at which a
/// level's edge length subtends exactly that angle; the edge halves per
/// level, so the threshold does too.
pub fn build_distance_lut(
    max_level: u32,
    radius: f32,
    fov_y: f32,
    viewport_width: u32,
    allowed_pixels: f32,
) -> Vec<f32> {
    let frac = (allowed_pixels * fov_y / viewport_width as f32).tan();
    let mut edge = icosahedron::edge_length(radius);

    (0..=max_level)
        .map(|_| {
            let threshold = edge / frac;
            edge *= 0.5;
            threshold
        })
        .collect()
}

/// Minimum distance from the camera to any of the three corners.
pub fn min_corner_distance(camera: Vec3, a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (a - camera)
        .length()
        .min((b - camera).length())
        .min((c - camera).length())
}
