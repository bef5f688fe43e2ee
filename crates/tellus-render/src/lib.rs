//! Rendering support for the tellus terrain system: camera state, the
//! object-space culling frustum, and headless GPU context initialization.

mod camera;
mod frustum;
mod gpu;

pub use camera::{Camera, Viewport};
pub use frustum::{Containment, Frustum, FrustumPlane};
pub use gpu::{RenderContext, RenderContextError};
