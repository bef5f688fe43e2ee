//! Per-planet orchestration: one frustum, one triangulator, one patch
//! grid, driven once per frame in update → upload → draw order.

use glam::Mat4;

use tellus_patch::{PatchGrid, PatchRenderer, PatchUniforms};
use tellus_render::{Camera, Frustum, Viewport};
use tellus_triangulate::{PatchInstance, Triangulator};

use crate::config::{PlanetConfig, PlanetConfigError};

/// Fraction of each level's distance band over which vertices morph
/// toward the coarser level.
pub const MORPH_RANGE: f32 = 0.5;

/// A camera or lifecycle violation caught at the body boundary.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanetError {
    /// Configuration rejected at construction.
    #[error(transparent)]
    Config(#[from] PlanetConfigError),

    /// Near plane must sit strictly in front of the far plane.
    #[error("camera near plane {near} must be positive and less than far plane {far}")]
    InvalidClipPlanes { near: f32, far: f32 },

    /// Vertical field of view must be a proper angle.
    #[error("camera fov {0} is outside (0, pi)")]
    InvalidFov(f32),

    /// Aspect ratio must be strictly positive.
    #[error("camera aspect ratio {0} must be positive")]
    InvalidAspect(f32),

    /// `upload` or `draw` called before `init_renderer`.
    #[error("patch renderer was not initialized")]
    RendererNotInitialized,
}

/// A single adaptive planet.
///
/// Positions are f32 in the planet's local frame; keeping the camera
/// near the local origin (rebasing the f64 world position) is the
/// caller's concern, as everywhere else in the engine.
pub struct PlanetBody {
    config: PlanetConfig,
    transform: Mat4,
    frustum: Frustum,
    triangulator: Triangulator,
    grid: PatchGrid,
    renderer: Option<PatchRenderer>,
}

impl PlanetBody {
    /// Validate the configuration and build the body. No GPU resources
    /// are created until [`Self::init_renderer`].
    pub fn new(config: PlanetConfig) -> Result<Self, PlanetError> {
        config.validate()?;

        let triangulator = Triangulator::new(
            config.radius,
            config.max_height,
            config.max_level,
            config.allowed_pixel_error,
        );
        let grid = PatchGrid::generate(config.patch_levels);

        log::info!(
            "Planet body created: radius {}, max level {}, patch grid {} triangles",
            config.radius,
            config.max_level,
            grid.triangle_count()
        );

        Ok(Self {
            config,
            transform: Mat4::IDENTITY,
            frustum: Frustum::new(),
            triangulator,
            grid,
            renderer: None,
        })
    }

    /// Planet-local transform used both for culling and for the model
    /// matrix in the patch shader.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn config(&self) -> &PlanetConfig {
        &self.config
    }

    /// Leaves selected by the last [`Self::update`].
    pub fn instances(&self) -> &[PatchInstance] {
        self.triangulator.instances()
    }

    pub fn leaf_count(&self) -> usize {
        self.triangulator.leaf_count()
    }

    /// Vertices submitted to the instanced draw for the current leaf list.
    pub fn vertex_count(&self) -> usize {
        self.leaf_count() * self.grid.triangle_count() * 3
    }

    /// Recompute the frustum and regenerate the leaf list for this
    /// camera pose. Must run before [`Self::upload`] each frame.
    pub fn update(&mut self, camera: &Camera, viewport: Viewport) -> Result<(), PlanetError> {
        Self::check_camera(camera)?;

        self.frustum.set_cull_transform(self.transform);
        self.frustum.set_to_camera(camera);
        self.frustum.update();

        self.triangulator.precalculate();
        self.triangulator.generate_geometry(&self.frustum, viewport);

        log::debug!(
            "Planet update: {} leaves, {} vertices",
            self.leaf_count(),
            self.vertex_count()
        );
        Ok(())
    }

    fn check_camera(camera: &Camera) -> Result<(), PlanetError> {
        if !(camera.near > 0.0 && camera.near < camera.far) {
            return Err(PlanetError::InvalidClipPlanes {
                near: camera.near,
                far: camera.far,
            });
        }
        if !(camera.fov_y > 0.0 && camera.fov_y < std::f32::consts::PI) {
            return Err(PlanetError::InvalidFov(camera.fov_y));
        }
        if !(camera.aspect_ratio > 0.0) {
            return Err(PlanetError::InvalidAspect(camera.aspect_ratio));
        }
        Ok(())
    }

    /// Create the GPU pipeline and grid buffers. Idempotent.
    pub fn init_renderer(&mut self, device: &wgpu::Device, target_format: wgpu::TextureFormat) {
        if self.renderer.is_none() {
            self.renderer = Some(PatchRenderer::new(device, target_format, &self.grid));
        }
    }

    /// Push the current leaf list, split distances and per-frame
    /// uniforms to the GPU.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera: &Camera,
    ) -> Result<(), PlanetError> {
        let camera_pos = self.frustum.position_object_space();
        let Some(renderer) = &mut self.renderer else {
            return Err(PlanetError::RendererNotInitialized);
        };

        renderer.bind_instances(device, self.triangulator.instances());
        renderer.upload_distance_lut(queue, self.triangulator.distance_lut());
        renderer.write_uniforms(
            queue,
            &PatchUniforms {
                model: self.transform.to_cols_array_2d(),
                view_proj: (camera.projection_matrix() * camera.view_matrix()).to_cols_array_2d(),
                camera_pos: camera_pos.to_array(),
                radius: self.config.radius,
                morph_range: MORPH_RANGE,
                _padding: [0.0; 3],
            },
        );
        Ok(())
    }

    /// Issue the instanced draw into an already-bound render pass.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) -> Result<(), PlanetError> {
        let Some(renderer) = &self.renderer else {
            return Err(PlanetError::RendererNotInitialized);
        };
        renderer.draw(pass);
        Ok(())
    }
}
