use crate::error::{RenderError, Result};
use serde::Deserialize;

use slidecast_core::types::DEFAULT_SLIDE_SECS;

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub audio_channels: u32,
    pub audio_sample_rate: u32,
}

/// Run ffprobe against a local path or URL, reading stream metadata only
/// (no full decode).
pub fn probe_media(location: &str) -> Result<MediaProbe> {
    let output = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(location)
        .output()
        .map_err(|e| RenderError::FfprobeExec(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::FfprobeFailed(stderr.into_owned()));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    Ok(parse_probe_output(&probe))
}

/// Duration of a media source, defaulting to 5 seconds on any probe failure
/// rather than failing the slide.
pub fn probe_duration_or_default(location: &str) -> f64 {
    match probe_media(location) {
        Ok(probe) if probe.duration_secs > 0.0 => probe.duration_secs,
        Ok(_) => DEFAULT_SLIDE_SECS,
        Err(e) => {
            tracing::warn!("probe of {location} failed ({e}), defaulting duration");
            DEFAULT_SLIDE_SECS
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_probe_output(probe: &FfprobeOutput) -> MediaProbe {
    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration_secs = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = video_stream
        .and_then(|s| s.r_frame_rate.as_deref())
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    let codec = video_stream
        .and_then(|s| s.codec_name.clone())
        .or_else(|| audio_stream.and_then(|s| s.codec_name.clone()))
        .unwrap_or_default();

    MediaProbe {
        duration_secs,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        fps,
        codec,
        audio_channels: audio_stream.and_then(|s| s.channels).unwrap_or(0),
        audio_sample_rate: audio_stream
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse::<u32>().ok())
            .unwrap_or(0),
    }
}

/// Parse an ffprobe frame rate string like "30000/1001" or "30/1" into f64.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d == 0.0 {
            return None;
        }
        Some(n / d)
    } else {
        rate.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
