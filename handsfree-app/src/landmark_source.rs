//! Landmarks from a helper process (camera + hand model) over stdout.
//!
//! The helper prints one JSON object per camera frame:
//!
//! ```text
//! {"width":640,"height":480,"hands":[{"score":0.93,"landmarks":[{"x":0.41,"y":0.62,"z":-0.01}, ...21]}]}
//! {"error":"camera 0 unavailable"}
//! ```
//!
//! Coordinates are normalised to [0, 1]. `width`/`height` are optional and
//! default to the configured capture size. An `error` line means the camera
//! is gone.

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Instant;

use handsfree_core::{
    ControlConfig, FrameSize, HandDetection, HandsfreeError, LandmarkFrame, LandmarkSource, Point,
    Result, SourceFrame,
};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct WireLandmark {
    x: f32,
    y: f32,
}

#[derive(Debug, Deserialize)]
struct WireHand {
    #[serde(default)]
    score: f32,
    landmarks: Vec<WireLandmark>,
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    width: Option<f32>,
    height: Option<f32>,
    #[serde(default)]
    hands: Vec<WireHand>,
    error: Option<String>,
}

/// Parse one stdout line into frame size and best-scoring hand.
fn parse_line(line: &str, default_size: FrameSize, mirror: bool) -> Result<(FrameSize, Option<HandDetection>)> {
    let wire: WireFrame = serde_json::from_str(line)
        .map_err(|e| HandsfreeError::LandmarkSource(format!("bad landmark line: {e}")))?;
    if let Some(error) = wire.error {
        return Err(HandsfreeError::CameraUnavailable(error));
    }

    let size = FrameSize::new(
        wire.width.unwrap_or(default_size.width),
        wire.height.unwrap_or(default_size.height),
    );
    let Some(best) = wire
        .hands
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
    else {
        return Ok((size, None));
    };

    let points: Vec<Point> = best
        .landmarks
        .iter()
        .map(|lm| {
            let x = if mirror { 1.0 - lm.x } else { lm.x };
            Point::new(x * size.width, lm.y * size.height)
        })
        .collect();
    let landmarks = LandmarkFrame::from_slice(&points)?;
    Ok((
        size,
        Some(HandDetection {
            landmarks,
            confidence: best.score,
        }),
    ))
}

pub struct SubprocessLandmarkSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    line: String,
    size: FrameSize,
    mirror: bool,
}

impl SubprocessLandmarkSource {
    /// Launch `command` (program + args) with the camera options appended.
    pub fn spawn(command: &[String], config: &ControlConfig) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(HandsfreeError::CameraUnavailable(
                "no landmark helper configured".into(),
            ));
        };

        let mut child = Command::new(program)
            .args(args)
            .arg("--camera")
            .arg(config.camera_index.to_string())
            .arg("--width")
            .arg(config.camera_width.to_string())
            .arg("--height")
            .arg(config.camera_height.to_string())
            .arg("--min-detection-confidence")
            .arg(config.detection_confidence.to_string())
            .arg("--min-tracking-confidence")
            .arg(config.tracking_confidence.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                HandsfreeError::CameraUnavailable(format!("failed to start {program}: {e}"))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            HandsfreeError::CameraUnavailable("landmark helper has no stdout".into())
        })?;
        info!(program = program.as_str(), pid = child.id(), "landmark helper started");

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            line: String::new(),
            size: FrameSize::new(config.camera_width as f32, config.camera_height as f32),
            mirror: config.mirror_camera,
        })
    }
}

impl LandmarkSource for SubprocessLandmarkSource {
    fn next_frame(&mut self) -> Result<Option<SourceFrame>> {
        loop {
            self.line.clear();
            let read = self
                .stdout
                .read_line(&mut self.line)
                .map_err(|e| HandsfreeError::CameraUnavailable(format!("landmark helper: {e}")))?;
            let captured_at = Instant::now();

            if read == 0 {
                let status = self.child.wait()?;
                if status.success() {
                    info!("landmark helper finished");
                    return Ok(None);
                }
                return Err(HandsfreeError::CameraUnavailable(format!(
                    "landmark helper exited with {status}"
                )));
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }

            let (size, hand) = parse_line(line, self.size, self.mirror)?;
            return Ok(Some(SourceFrame {
                captured_at,
                size,
                hand,
            }));
        }
    }
}

impl Drop for SubprocessLandmarkSource {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!("failed to stop landmark helper: {e}");
            }
            let _ = self.child.wait();
        }
        info!("landmark helper released");
    }
}
