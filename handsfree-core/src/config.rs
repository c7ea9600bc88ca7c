//! Tuning parameters shared by the gesture and voice paths.
//!
//! `ControlConfig` is built once at startup (usually from the app's settings
//! file) and handed to both loops by value or behind an `Arc`. Nothing mutates
//! it afterwards. Times are stored as seconds so the JSON stays readable; use
//! the `Duration` accessors in code.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Extra pixels added to `pinch_threshold` when no explicit right-click
/// threshold is configured.
pub const RIGHT_CLICK_MARGIN: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ControlConfig {
    /// Camera device index handed to the landmark helper.
    pub camera_index: u32,
    pub camera_width: u32,
    pub camera_height: u32,
    /// Flip camera coordinates horizontally so hand motion matches a mirror.
    pub mirror_camera: bool,
    /// Hands scored below this are treated as absent.
    pub detection_confidence: f32,
    /// Forwarded to the landmark helper; not interpreted here.
    pub tracking_confidence: f32,
    /// Exponential smoothing divisor. `1.0` follows the raw target exactly.
    pub smoothing_factor: f32,
    /// Pixels trimmed from every camera edge before mapping onto the screen.
    pub frame_reduction_margin: f32,
    /// Thumb-tip to index-tip distance (px) that engages the left pinch.
    pub pinch_threshold: f32,
    /// Thumb-tip to middle-tip distance (px) for a right click.
    /// `None` means `pinch_threshold + RIGHT_CLICK_MARGIN`.
    pub right_click_threshold: Option<f32>,
    pub click_cooldown_secs: f64,
    pub double_click_window_secs: f64,
    pub drag_hold_secs: f64,
    pub scroll_sensitivity: f32,
    pub auth_hold_secs: f64,
    pub shortcut_cooldown_secs: f64,
    /// Speech energy floor in 16-bit sample units (RMS).
    pub voice_energy_threshold: f32,
    pub voice_noise_duration_secs: f64,
    pub voice_listen_timeout_secs: f64,
    pub voice_phrase_time_limit_secs: f64,
    /// Wheel notches per "scroll up" / "scroll down" voice command.
    pub voice_scroll_step: i32,
    /// Where captured screenshots are written. `None` uses `~/Desktop/Screenshots`.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            camera_width: 640,
            camera_height: 480,
            mirror_camera: true,
            detection_confidence: 0.7,
            tracking_confidence: 0.7,
            smoothing_factor: 6.0,
            frame_reduction_margin: 80.0,
            pinch_threshold: 35.0,
            right_click_threshold: None,
            click_cooldown_secs: 0.25,
            double_click_window_secs: 0.35,
            drag_hold_secs: 0.25,
            scroll_sensitivity: 2.8,
            auth_hold_secs: 1.0,
            shortcut_cooldown_secs: 1.8,
            voice_energy_threshold: 4000.0,
            voice_noise_duration_secs: 0.5,
            voice_listen_timeout_secs: 5.0,
            voice_phrase_time_limit_secs: 10.0,
            voice_scroll_step: 5,
            screenshot_dir: None,
        }
    }
}

impl ControlConfig {
    /// Clamp every field into a usable range. Non-finite values fall back to
    /// the default for that field.
    pub fn normalize(&mut self) {
        let d = Self::default();
        self.camera_width = self.camera_width.clamp(160, 3840);
        self.camera_height = self.camera_height.clamp(120, 2160);
        self.detection_confidence =
            clamp_f32(self.detection_confidence, 0.0, 1.0, d.detection_confidence);
        self.tracking_confidence =
            clamp_f32(self.tracking_confidence, 0.0, 1.0, d.tracking_confidence);
        self.smoothing_factor = clamp_f32(self.smoothing_factor, 1.0, 50.0, d.smoothing_factor);
        // Keep at least a 2 px wide active region on the smallest frame.
        let max_margin = (self.camera_width.min(self.camera_height) as f32 / 2.0) - 1.0;
        self.frame_reduction_margin = clamp_f32(
            self.frame_reduction_margin,
            0.0,
            max_margin,
            d.frame_reduction_margin.min(max_margin),
        );
        self.pinch_threshold = clamp_f32(self.pinch_threshold, 1.0, 500.0, d.pinch_threshold);
        self.right_click_threshold = self
            .right_click_threshold
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(1.0, 500.0));
        self.click_cooldown_secs = clamp_f64(self.click_cooldown_secs, 0.0, 5.0, d.click_cooldown_secs);
        self.double_click_window_secs = clamp_f64(
            self.double_click_window_secs,
            0.05,
            2.0,
            d.double_click_window_secs,
        );
        self.drag_hold_secs = clamp_f64(self.drag_hold_secs, 0.05, 5.0, d.drag_hold_secs);
        self.scroll_sensitivity =
            clamp_f32(self.scroll_sensitivity, 0.1, 50.0, d.scroll_sensitivity);
        self.auth_hold_secs = clamp_f64(self.auth_hold_secs, 0.1, 10.0, d.auth_hold_secs);
        self.shortcut_cooldown_secs = clamp_f64(
            self.shortcut_cooldown_secs,
            0.0,
            30.0,
            d.shortcut_cooldown_secs,
        );
        self.voice_energy_threshold = clamp_f32(
            self.voice_energy_threshold,
            1.0,
            32_767.0,
            d.voice_energy_threshold,
        );
        self.voice_noise_duration_secs = clamp_f64(
            self.voice_noise_duration_secs,
            0.0,
            5.0,
            d.voice_noise_duration_secs,
        );
        self.voice_listen_timeout_secs = clamp_f64(
            self.voice_listen_timeout_secs,
            0.5,
            60.0,
            d.voice_listen_timeout_secs,
        );
        self.voice_phrase_time_limit_secs = clamp_f64(
            self.voice_phrase_time_limit_secs,
            0.5,
            60.0,
            d.voice_phrase_time_limit_secs,
        );
        self.voice_scroll_step = self.voice_scroll_step.clamp(1, 50);
    }

    pub fn right_click_threshold(&self) -> f32 {
        self.right_click_threshold
            .unwrap_or(self.pinch_threshold + RIGHT_CLICK_MARGIN)
    }

    pub fn click_cooldown(&self) -> Duration {
        secs(self.click_cooldown_secs)
    }

    pub fn double_click_window(&self) -> Duration {
        secs(self.double_click_window_secs)
    }

    pub fn drag_hold(&self) -> Duration {
        secs(self.drag_hold_secs)
    }

    pub fn auth_hold(&self) -> Duration {
        secs(self.auth_hold_secs)
    }

    pub fn shortcut_cooldown(&self) -> Duration {
        secs(self.shortcut_cooldown_secs)
    }

    pub fn voice_noise_duration(&self) -> Duration {
        secs(self.voice_noise_duration_secs)
    }

    pub fn voice_listen_timeout(&self) -> Duration {
        secs(self.voice_listen_timeout_secs)
    }

    pub fn voice_phrase_time_limit(&self) -> Duration {
        secs(self.voice_phrase_time_limit_secs)
    }

    /// `voice_energy_threshold` rescaled to the f32 sample range [-1, 1].
    pub fn voice_rms_threshold(&self) -> f32 {
        self.voice_energy_threshold / 32_768.0
    }

    /// Screenshot directory, defaulting to `~/Desktop/Screenshots`.
    pub fn screenshot_dir(&self) -> PathBuf {
        self.screenshot_dir.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir)
                .join("Desktop")
                .join("Screenshots")
        })
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn clamp_f64(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
