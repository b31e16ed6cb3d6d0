//! Pipeline configuration and its JSON storage.

use crate::SettingsError;
use depthcast_calib::CalibrationParams;
use depthcast_core::MorphStep;
use depthcast_segment::SegmentationParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Camera capture resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraResolution {
    Hd2k,
    Hd1080,
    #[default]
    Hd720,
    Vga,
    Custom {
        width: usize,
        height: usize,
    },
}

impl CameraResolution {
    pub const MAX_SIDE: usize = 4096;

    pub fn size(&self) -> (usize, usize) {
        match *self {
            Self::Hd2k => (2208, 1242),
            Self::Hd1080 => (1920, 1080),
            Self::Hd720 => (1280, 720),
            Self::Vga => (672, 376),
            Self::Custom { width, height } => (width, height),
        }
    }
}

/// Depth computation quality requested from the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    Performance,
    #[default]
    Quality,
    Ultra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub resolution: CameraResolution,
    pub depth_mode: DepthMode,
    pub confidence_threshold: u8,
    pub texture_confidence_threshold: u8,
    /// Fill holes in the depth map.
    pub fill_mode: bool,
    /// Depth beyond this distance (metres) reads as background.
    pub max_distance_m: f32,
    /// Consecutive depth frames combined into one.
    pub frames_to_aggregate: usize,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            resolution: CameraResolution::default(),
            depth_mode: DepthMode::default(),
            confidence_threshold: 50,
            texture_confidence_threshold: 100,
            fill_mode: false,
            max_distance_m: 2.0,
            frames_to_aggregate: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorSettings {
    pub width: usize,
    pub height: usize,
    /// Gray level of the solid render mode.
    pub solid_level: u8,
}

impl Default for ProjectorSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            solid_level: 255,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub save_debug_images: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Result"),
            save_debug_images: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Pause at the end of every producer cycle.
    pub producer_sleep_ms: u64,
    /// How long the consumer waits for a key after each shown frame.
    pub key_poll_ms: u64,
    /// Upper bound on a single wait for settings or the calibration frame.
    pub wait_timeout_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            producer_sleep_ms: 10,
            key_poll_ms: 30,
            wait_timeout_ms: 500,
        }
    }
}

impl TimingSettings {
    pub fn producer_sleep(&self) -> Duration {
        Duration::from_millis(self.producer_sleep_ms)
    }

    pub fn key_poll(&self) -> Duration {
        Duration::from_millis(self.key_poll_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Everything the pipeline reads at runtime. Missing JSON fields fall back
/// to their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub segmentation: SegmentationParams,
    pub calibration: CalibrationParams,
    /// Morphology applied to each depth frame before warping.
    pub preprocessing: Vec<MorphStep>,
    pub camera: CameraSettings,
    pub projector: ProjectorSettings,
    pub output: OutputSettings,
    pub timing: TimingSettings,
}

impl Settings {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.segmentation.validate()?;

        let (width, height) = self.camera.resolution.size();
        let max = CameraResolution::MAX_SIDE;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(SettingsError::UnsupportedResolution { width, height });
        }
        if self.camera.frames_to_aggregate == 0 {
            return Err(SettingsError::ZeroAggregation);
        }
        let ProjectorSettings { width, height, .. } = self.projector;
        if width == 0 || height == 0 {
            return Err(SettingsError::InvalidProjector { width, height });
        }
        Ok(())
    }

    pub fn projector_size(&self) -> (usize, usize) {
        (self.projector.width, self.projector.height)
    }
}

/// Where the pipeline re-reads its settings from on a reload request.
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Result<Settings, SettingsError>;

    fn describe(&self) -> String;
}

/// Settings stored in a JSON file.
#[derive(Clone, Debug)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSource for JsonFileSource {
    fn load(&self) -> Result<Settings, SettingsError> {
        Settings::load_json(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Always returns the same settings.
#[derive(Clone, Debug, Default)]
pub struct FixedSource {
    settings: Settings,
}

impl FixedSource {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl SettingsSource for FixedSource {
    fn load(&self) -> Result<Settings, SettingsError> {
        self.settings.validate()?;
        Ok(self.settings.clone())
    }

    fn describe(&self) -> String {
        "built-in settings".to_string()
    }
}

/// Segmentation thresholds that can be nudged from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustableSetting {
    ZLimit,
    MinDistance,
    MediumLimit,
    MinArea,
    MaxObjects,
}

impl AdjustableSetting {
    pub const ALL: [AdjustableSetting; 5] = [
        Self::ZLimit,
        Self::MinDistance,
        Self::MediumLimit,
        Self::MinArea,
        Self::MaxObjects,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ZLimit => "z_limit",
            Self::MinDistance => "min_distance",
            Self::MediumLimit => "medium_limit",
            Self::MinArea => "min_area",
            Self::MaxObjects => "max_objects",
        }
    }

    /// Apply `steps` increments and return the new value. Values saturate
    /// at their type bounds; `max_objects` never drops below 1 and
    /// `min_distance` never reaches 255.
    pub fn nudge(self, params: &mut SegmentationParams, steps: i32) -> usize {
        fn step_u8(v: u8, steps: i32, max: u8) -> u8 {
            (v as i32 + steps).clamp(0, max as i32) as u8
        }
        match self {
            Self::ZLimit => {
                params.z_limit = step_u8(params.z_limit, steps, u8::MAX);
                params.z_limit as usize
            }
            Self::MinDistance => {
                params.min_distance = step_u8(params.min_distance, steps, u8::MAX - 1);
                params.min_distance as usize
            }
            Self::MediumLimit => {
                params.medium_limit = step_u8(params.medium_limit, steps, u8::MAX);
                params.medium_limit as usize
            }
            Self::MinArea => {
                let delta = steps as i64 * 100;
                params.min_area = (params.min_area as i64 + delta).max(0) as usize;
                params.min_area
            }
            Self::MaxObjects => {
                params.max_objects = (params.max_objects as i64 + steps as i64).max(1) as usize;
                params.max_objects
            }
        }
    }
}
