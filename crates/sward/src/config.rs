//! Driver configuration: the batch sections plus field, run and camera.

use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use sward_batch::{BatchConfig, Camera};

use crate::error::{AppError, AppResult};

/// Grass field scatter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Seed of the jitter and height generator.
    pub seed: u64,
    /// Blades along each terrain axis before jitter.
    pub instances_per_axis: u32,
    /// Radius of the disc each blade is jittered within.
    pub randomize_position_multiplier: f32,
    /// Inclusive per-blade height range.
    pub min_max_height: Vec2,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            seed: 7,
            instances_per_axis: 256,
            randomize_position_multiplier: 0.4,
            min_max_height: Vec2::new(0.6, 1.2),
        }
    }
}

/// Which culler drives the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// CPU evaluation of the culling test.
    #[default]
    Host,
    /// WGSL compute kernel through wgpu.
    Gpu,
}

/// Run length and backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Frames to render.
    pub frames: u32,
    /// Culling backend.
    pub backend: Backend,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            frames: 8,
            backend: Backend::Host,
        }
    }
}

/// Perspective camera orbiting its target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Position at frame 0.
    pub position: Vec3,
    /// Look-at and orbit center.
    pub target: Vec3,
    /// Vertical field of view.
    pub fov_degrees: f32,
    /// Near plane.
    pub near: f32,
    /// Far plane.
    pub far: f32,
    /// Width over height.
    pub aspect: f32,
    /// Orbit step around the target's vertical axis.
    pub orbit_degrees_per_frame: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(128.0, 12.0, -20.0),
            target: Vec3::new(128.0, 0.0, 128.0),
            fov_degrees: 60.0,
            near: 0.1,
            far: 300.0,
            aspect: 16.0 / 9.0,
            orbit_degrees_per_frame: 15.0,
        }
    }
}

impl CameraSettings {
    /// Camera for `frame`, rotated around the target.
    #[must_use]
    pub fn camera_at(&self, frame: u32) -> Camera {
        let angle = (self.orbit_degrees_per_frame * frame as f32).to_radians();
        let offset = glam::Quat::from_rotation_y(angle) * (self.position - self.target);
        Camera::look_at(
            self.target + offset,
            self.target,
            self.fov_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[partition]`, `[buffer]` and `[culling]`.
    #[serde(flatten)]
    pub batch: BatchConfig,
    /// `[field]`.
    pub field: FieldSettings,
    /// `[run]`.
    pub run: RunSettings,
    /// `[camera]`.
    pub camera: CameraSettings,
}

impl AppConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or out-of-range values.
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, or as [`AppConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> AppResult<()> {
        self.batch.validate()?;

        let field = &self.field;
        let radius = field.randomize_position_multiplier;
        if radius.is_nan() || radius < 0.0 {
            return Err(AppError::Config(format!(
                "randomize_position_multiplier must be non-negative, got {radius}"
            )));
        }
        let [low, high] = field.min_max_height.to_array();
        if low.is_nan() || high.is_nan() || low > high {
            return Err(AppError::Config(format!(
                "min_max_height must be ordered, got [{low}, {high}]"
            )));
        }

        let camera = &self.camera;
        let planes_ok = camera.near > 0.0 && camera.far > camera.near && camera.aspect > 0.0;
        if !planes_ok {
            return Err(AppError::Config(format!(
                "camera planes must satisfy 0 < near < far with positive aspect, got near {} far {} aspect {}",
                camera.near, camera.far, camera.aspect
            )));
        }
        Ok(())
    }
}
