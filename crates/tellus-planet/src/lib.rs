//! Planet orchestration: validated configuration plus the `PlanetBody`
//! that drives frustum culling, adaptive triangulation and patch
//! rendering once per frame.

mod body;
mod config;

pub use body::{PlanetBody, PlanetError, MORPH_RANGE};
pub use config::{ConfigError, PlanetConfig, PlanetConfigError};
