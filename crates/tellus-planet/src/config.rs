//! Planet configuration with sensible defaults, validation and RON
//! persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use tellus_patch::MAX_LUT_LEVELS;

/// Upper bound on the patch grid subdivision. `patch_levels = 8` already
/// means 257 rows and 33k vertices per instance.
const MAX_PATCH_LEVELS: u32 = 10;

/// Planet shape and LOD tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    /// Planet radius in meters (planet-local units).
    pub radius: f32,
    /// Maximum terrain displacement above the radius, in meters.
    pub max_height: f32,
    /// Deepest subdivision level of the icosahedron triangulation.
    pub max_level: u32,
    /// Subdivision level of the per-leaf reference grid.
    pub patch_levels: u32,
    /// Screen-space edge budget in pixels; smaller splits more eagerly.
    pub allowed_pixel_error: f32,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius: 1737.1,
            max_height: 10.0,
            max_level: 15,
            patch_levels: 4,
            allowed_pixel_error: 300.0,
        }
    }
}

/// A configuration value that would produce degenerate geometry.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanetConfigError {
    /// Radius must be strictly positive.
    #[error("planet radius must be positive, got {0}")]
    NonPositiveRadius(f32),

    /// Max height must not be negative.
    #[error("max height must not be negative, got {0}")]
    NegativeMaxHeight(f32),

    /// Max level must fit the shader-visible distance table.
    #[error("max level {level} exceeds the supported maximum of {max}")]
    MaxLevelTooDeep { level: u32, max: u32 },

    /// Patch levels have a hard cap on grid resolution.
    #[error("patch levels {levels} exceed the supported maximum of {max}")]
    PatchLevelsTooDeep { levels: u32, max: u32 },

    /// Pixel budget must be strictly positive.
    #[error("allowed pixel error must be positive, got {0}")]
    NonPositivePixelError(f32),
}

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read planet config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write planet config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse planet config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize planet config: {0}")]
    SerializeError(#[source] ron::Error),
}

impl PlanetConfig {
    /// Reject values that would produce NaN geometry or overflow the
    /// renderer's lookup tables. Called by `PlanetBody::new`.
    pub fn validate(&self) -> Result<(), PlanetConfigError> {
        if !(self.radius > 0.0) {
            return Err(PlanetConfigError::NonPositiveRadius(self.radius));
        }
        if !(self.max_height >= 0.0) {
            return Err(PlanetConfigError::NegativeMaxHeight(self.max_height));
        }
        let max_level_cap = MAX_LUT_LEVELS as u32 - 1;
        if self.max_level > max_level_cap {
            return Err(PlanetConfigError::MaxLevelTooDeep {
                level: self.max_level,
                max: max_level_cap,
            });
        }
        if self.patch_levels > MAX_PATCH_LEVELS {
            return Err(PlanetConfigError::PatchLevelsTooDeep {
                levels: self.patch_levels,
                max: MAX_PATCH_LEVELS,
            });
        }
        if !(self.allowed_pixel_error > 0.0) {
            return Err(PlanetConfigError::NonPositivePixelError(
                self.allowed_pixel_error,
            ));
        }
        Ok(())
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("planet.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: PlanetConfig = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded planet config from {}", config_path.display());
            Ok(config)
        } else {
            let config = PlanetConfig::default();
            config.save(config_dir)?;
            log::info!("Created default planet config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `planet.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("planet.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .separate_tuple_members(true);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PlanetConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PlanetConfig::default();
        config.radius = 0.0;
        assert_eq!(
            config.validate(),
            Err(PlanetConfigError::NonPositiveRadius(0.0))
        );

        let mut config = PlanetConfig::default();
        config.max_height = -1.0;
        assert!(matches!(
            config.validate(),
            Err(PlanetConfigError::NegativeMaxHeight(_))
        ));

        let mut config = PlanetConfig::default();
        config.max_level = 64;
        assert!(matches!(
            config.validate(),
            Err(PlanetConfigError::MaxLevelTooDeep { .. })
        ));

        let mut config = PlanetConfig::default();
        config.allowed_pixel_error = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(PlanetConfigError::NonPositivePixelError(_))
        ));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = PlanetConfig::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: PlanetConfig = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let config: PlanetConfig = ron::from_str("(radius: 6371.0)").unwrap();
        assert_eq!(config.radius, 6371.0);
        assert_eq!(config.max_level, PlanetConfig::default().max_level);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PlanetConfig::default();
        config.radius = 6371.0;
        config.max_level = 20;

        config.save(dir.path()).unwrap();
        let loaded = PlanetConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlanetConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, PlanetConfig::default());
        assert!(dir.path().join("planet.ron").exists());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<PlanetConfig, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
