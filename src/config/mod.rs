//! Application Configuration
//!
//! Scanner settings stored in TOML format. Every section falls back to its
//! defaults when omitted, so a config file only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default recognition endpoint
pub const DEFAULT_ENDPOINT: &str = "https://plate-scanner-server.onrender.com/api/detect-plate";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frame source settings
    pub capture: CaptureSettings,
    /// Region detection and candidate filtering
    pub detection: DetectionSettings,
    /// Debounce and cooldown gate
    pub throttle: ThrottleSettings,
    /// Capture payload encoding
    pub encoder: EncoderSettings,
    /// Remote recognition service
    pub recognition: RecognitionSettings,
    /// Result feedback timing
    pub feedback: FeedbackSettings,
    /// Frame loop cadence
    pub pipeline: PipelineSettings,
}

/// How a device frame is mapped onto the fixed output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Aspect-preserving center crop, scaled to fill the output exactly
    #[default]
    Fill,
    /// Scale the whole device frame to the output size, ignoring aspect
    Stretch,
}

/// Frame source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Output frame width in pixels
    pub output_width: u32,
    /// Output frame height in pixels
    pub output_height: u32,
    /// Crop strategy for device frames
    pub crop_mode: CropMode,
    /// Frame rate cap requested from the device
    pub max_fps: u32,
    /// Resolution hint (width) requested from the device
    pub ideal_width: u32,
    /// Resolution hint (height) requested from the device
    pub ideal_height: u32,
    /// Case-insensitive label fragments identifying a rear-facing device
    pub rear_label_hints: Vec<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            output_width: 640,
            output_height: 480,
            crop_mode: CropMode::Fill,
            max_fps: 30,
            ideal_width: 1280,
            ideal_height: 720,
            rear_label_hints: vec!["back".to_string(), "rear".to_string()],
        }
    }
}

/// Guide area around which detection is restricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindowSettings {
    /// Width of the guide box, centered in the output frame
    pub guide_width: u32,
    /// Height of the guide box, centered in the output frame
    pub guide_height: u32,
    /// Margin added on every side of the guide box
    pub margin: u32,
}

/// Region detection and candidate filtering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Canny hysteresis low threshold
    pub canny_low: f32,
    /// Canny hysteresis high threshold
    pub canny_high: f32,
    /// Exclusive lower bound on width / height
    pub min_aspect: f64,
    /// Exclusive upper bound on width / height
    pub max_aspect: f64,
    /// Exclusive lower bound on candidate width
    pub min_width: u32,
    /// Restrict detection to a window around the guide box
    pub search_window: Option<SearchWindowSettings>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            min_aspect: 1.8,
            max_aspect: 5.0,
            min_width: 120,
            search_window: None,
        }
    }
}

/// Debounce and cooldown settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    /// Consecutive frames with a candidate required before capturing
    pub detection_frame_threshold: u32,
    /// Minimum time between two captures, in milliseconds
    pub cooldown_ms: u64,
}

impl ThrottleSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            detection_frame_threshold: 60,
            cooldown_ms: 3000,
        }
    }
}

/// Capture payload encoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Pixels trimmed from both top and bottom of the crop
    pub vertical_trim_margin: u32,
    /// JPEG quality (1 - 100)
    pub jpeg_quality: u8,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            vertical_trim_margin: 0,
            jpeg_quality: 92,
        }
    }
}

/// Recognition service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Endpoint receiving the JSON capture request
    pub endpoint: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl RecognitionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Feedback timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    /// How long a success/failure result stays visible, in milliseconds
    pub revert_after_ms: u64,
}

impl FeedbackSettings {
    pub fn revert_after(&self) -> Duration {
        Duration::from_millis(self.revert_after_ms)
    }
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self { revert_after_ms: 3000 }
    }
}

/// Frame loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Loop cadence, standing in for the display refresh rate
    pub refresh_hz: u32,
    /// Stop after this many cycles (0 = run until interrupted)
    pub max_cycles: u64,
}

impl PipelineSettings {
    /// Interval between two loop cycles
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz.max(1) as f64)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            refresh_hz: 60,
            max_cycles: 0,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.capture.output_width, 640);
        assert_eq!(config.capture.output_height, 480);
        assert_eq!(config.capture.crop_mode, CropMode::Fill);
        assert_eq!(config.capture.rear_label_hints, vec!["back", "rear"]);

        assert!((config.detection.canny_low - 50.0).abs() < f32::EPSILON);
        assert!((config.detection.canny_high - 150.0).abs() < f32::EPSILON);
        assert_eq!(config.detection.min_width, 120);
        assert!(config.detection.search_window.is_none());

        assert_eq!(config.throttle.detection_frame_threshold, 60);
        assert_eq!(config.throttle.cooldown(), Duration::from_millis(3000));

        assert_eq!(config.encoder.vertical_trim_margin, 0);
        assert_eq!(config.recognition.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.detection.search_window = Some(SearchWindowSettings {
            guide_width: 300,
            guide_height: 100,
            margin: 40,
        });

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.detection.search_window, config.detection.search_window);
        assert_eq!(parsed.capture.crop_mode, config.capture.crop_mode);
        assert_eq!(parsed.throttle.cooldown_ms, config.throttle.cooldown_ms);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [throttle]
            detection_frame_threshold = 10

            [capture]
            crop_mode = "stretch"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.throttle.detection_frame_threshold, 10);
        assert_eq!(parsed.throttle.cooldown_ms, 3000);
        assert_eq!(parsed.capture.crop_mode, CropMode::Stretch);
        assert_eq!(parsed.capture.output_width, 640);
        assert_eq!(parsed.feedback.revert_after_ms, 3000);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.encoder.vertical_trim_margin = 6;
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.encoder.vertical_trim_margin, 6);
        assert_eq!(loaded.capture.max_fps, config.capture.max_fps);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_cycle_interval() {
        let settings = PipelineSettings {
            refresh_hz: 50,
            max_cycles: 0,
        };
        assert_eq!(settings.cycle_interval(), Duration::from_millis(20));

        let zero = PipelineSettings {
            refresh_hz: 0,
            max_cycles: 0,
        };
        assert_eq!(zero.cycle_interval(), Duration::from_secs(1));
    }
}
