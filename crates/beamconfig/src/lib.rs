use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BeamConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub gpu: GpuSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    /// Initial inner width in logical pixels.
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Frame rate cap; unset or `0` follows the display.
    pub fps: Option<f32>,
    /// Upper bound on the device pixel ratio used for the pixel buffer.
    pub pixel_ratio_cap: Option<f64>,
    /// Frames slower than this are logged; `0` disables the warning.
    #[serde(
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt"
    )]
    pub slow_frame: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    #[default]
    #[serde(alias = "low-power")]
    Low,
    #[serde(alias = "high-performance")]
    High,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GpuSettings {
    pub power: PowerSetting,
    pub vsync: bool,
    /// Desired maximum frame latency in frames (1-3).
    pub latency: u32,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            window: WindowSettings::default(),
            render: RenderSettings::default(),
            gpu: GpuSettings::default(),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "beamshade".into(),
            width: 1280,
            height: 720,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: None,
            pixel_ratio_cap: None,
            slow_frame: Some(default_slow_frame()),
        }
    }
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            power: PowerSetting::default(),
            vsync: true,
            latency: 2,
        }
    }
}

fn default_slow_frame() -> Duration {
    Duration::from_millis(50)
}

fn serialize_duration_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(duration) => {
            serializer.serialize_str(&humantime::format_duration(*duration).to_string())
        }
        None => serializer.serialize_none(),
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v).map(Some).map_err(E::custom)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl BeamConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BeamConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Slow-frame threshold, or `None` when the warning is disabled.
    pub fn slow_frame_warning(&self) -> Option<Duration> {
        self.render.slow_frame.filter(|threshold| !threshold.is_zero())
    }

    /// Frame rate cap, or `None` when frames follow the display.
    pub fn fps_cap(&self) -> Option<f32> {
        self.render.fps.filter(|fps| *fps > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if let Some(fps) = self.render.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("render.fps must be >= 0".into()));
            }
        }

        if let Some(cap) = self.render.pixel_ratio_cap {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "render.pixel_ratio_cap must be greater than zero, got {cap}"
                )));
            }
        }

        if !(1..=3).contains(&self.gpu.latency) {
            return Err(ConfigError::Invalid(format!(
                "gpu.latency must be between 1 and 3, got {}",
                self.gpu.latency
            )));
        }

        Ok(())
    }
}
