use crate::assets::{resolve_slide, RenderTemp, ResolvedSlide, VisualInput};
use crate::error::{RenderError, Result};
use serde::{Deserialize, Serialize};
use slidecast_core::types::{MusicSettings, RenderSettings, Slide};
use slidecast_core::CancelToken;
use std::path::PathBuf;

/// Inputs for one render invocation. The slide list and music settings are a
/// snapshot owned by the request; edits made after submission are invisible
/// to the running render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub slides: Vec<Slide>,
    pub music: MusicSettings,
    pub tts_volume: f64,
    pub output_path: PathBuf,
    pub settings: RenderSettings,
}

/// A compiled render plan ready for ffmpeg execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPlan {
    pub inputs: Vec<PlanInput>,
    pub filter_graph: String,
    pub output_args: Vec<String>,
    pub output_path: PathBuf,
}

/// One ffmpeg input plus the options that must precede its `-i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInput {
    pub location: String,
    pub pre_args: Vec<String>,
}

/// Progress update during rendering. Coarse: callers must tolerate jumps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderProgress {
    pub percent: f64,
    pub frame: u64,
    pub fps: f64,
    pub speed: String,
    pub eta_seconds: Option<f64>,
}

// ---------------------------------------------------------------------------
// compile
// ---------------------------------------------------------------------------

/// Compile resolved slides into an ffmpeg filter-graph plan.
///
/// Every slide contributes a visual stage and an audio stage that share one
/// duration constant, so the concatenated speech track is exactly as long as
/// the concatenated visual track and no offset bookkeeping is needed.
pub fn compile(request: &RenderRequest, resolved: &[ResolvedSlide]) -> Result<RenderPlan> {
    if resolved.is_empty() {
        return Err(RenderError::NoSlides);
    }

    let RenderSettings {
        width,
        height,
        fps,
        sample_rate,
    } = request.settings.clone();

    let mut inputs: Vec<PlanInput> = Vec::new();
    let mut video_filters: Vec<String> = Vec::new();
    let mut audio_filters: Vec<String> = Vec::new();

    for (i, slide) in resolved.iter().enumerate() {
        let duration = fmt_secs(slide.duration_secs);

        let visual_idx = inputs.len();
        match &slide.visual {
            VisualInput::Still(location) => inputs.push(PlanInput {
                location: location.clone(),
                pre_args: vec![
                    "-loop".into(),
                    "1".into(),
                    "-t".into(),
                    duration.clone(),
                ],
            }),
            VisualInput::Motion(location) => inputs.push(PlanInput {
                location: location.clone(),
                pre_args: vec![],
            }),
            VisualInput::Lavfi(spec) => inputs.push(PlanInput {
                location: spec.clone(),
                pre_args: vec![
                    "-f".into(),
                    "lavfi".into(),
                    "-t".into(),
                    duration.clone(),
                ],
            }),
        }

        // Normalize to the canvas resolution and frame rate, letterboxed,
        // single pixel format, then force the exact computed duration. The
        // trim is redundant for stills (capped by -t) but crucial for video.
        video_filters.push(format!(
            "[{visual_idx}:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p,\
trim=duration={duration},setpts=PTS-STARTPTS[v{i}]"
        ));

        match &slide.audio {
            Some(audio_location) => {
                let audio_idx = inputs.len();
                inputs.push(PlanInput {
                    location: audio_location.clone(),
                    pre_args: vec![],
                });
                // apad + atrim pads or trims narration to the exact slide
                // duration, which is what keeps speech and visuals in sync
                // after concatenation.
                audio_filters.push(format!(
                    "[{audio_idx}:a]aformat=sample_rates={sample_rate}:channel_layouts=stereo,\
apad,atrim=duration={duration}[a{i}]"
                ));
            }
            None => {
                audio_filters.push(format!(
                    "anullsrc=r={sample_rate}:cl=stereo,atrim=duration={duration}[a{i}]"
                ));
            }
        }
    }

    let n = resolved.len();
    let concat_v: String = (0..n).map(|i| format!("[v{i}]")).collect();
    let concat_a: String = (0..n).map(|i| format!("[a{i}]")).collect();
    video_filters.push(format!("{concat_v}concat=n={n}:v=1:a=0[vout]"));
    audio_filters.push(format!("{concat_a}concat=n={n}:v=0:a=1[aout_speech]"));

    let tts_volume = request.tts_volume;
    if let Some(music_url) = &request.music.url {
        let music_idx = inputs.len();
        let pre_args = if request.music.loop_playback {
            vec!["-stream_loop".into(), "-1".into()]
        } else {
            vec![]
        };
        inputs.push(PlanInput {
            location: music_url.clone(),
            pre_args,
        });

        // amix with duration=first: the speech track is authoritative, music
        // is truncated (or looped above) to fit, never the reverse.
        audio_filters.push(format!("[aout_speech]volume={tts_volume}[speech_vol]"));
        audio_filters.push(format!(
            "[{music_idx}:a]volume={}[music_vol]",
            request.music.volume
        ));
        audio_filters.push(
            "[speech_vol][music_vol]amix=inputs=2:duration=first:dropout_transition=0.5[aout]"
                .to_string(),
        );
    } else {
        audio_filters.push(format!("[aout_speech]volume={tts_volume}[aout]"));
    }

    let filter_graph = video_filters
        .into_iter()
        .chain(audio_filters)
        .collect::<Vec<_>>()
        .join(";");

    let output_args = vec![
        "-map".to_string(),
        "[vout]".to_string(),
        "-map".to_string(),
        "[aout]".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-crf".to_string(),
        "28".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ];

    Ok(RenderPlan {
        inputs,
        filter_graph,
        output_args,
        output_path: request.output_path.clone(),
    })
}

/// Shortest decimal form, identical wherever the same duration is reused.
fn fmt_secs(secs: f64) -> String {
    format!("{secs}")
}

/// Build ffmpeg args from a render plan.
pub fn build_ffmpeg_args(plan: &RenderPlan) -> Vec<String> {
    let mut args = vec!["-y".to_string()];

    for input in &plan.inputs {
        args.extend(input.pre_args.iter().cloned());
        args.push("-i".to_string());
        args.push(input.location.clone());
    }

    args.push("-filter_complex".to_string());
    args.push(plan.filter_graph.clone());

    args.extend(plan.output_args.clone());
    args.push(plan.output_path.to_string_lossy().to_string());

    args
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

/// Execute a render plan by spawning ffmpeg. Progress is parsed from stderr
/// and sent over the channel; the cancel token kills the encoder and yields
/// a distinct `Aborted` outcome.
pub async fn execute(
    plan: &RenderPlan,
    progress_tx: &tokio::sync::watch::Sender<RenderProgress>,
    cancel: &CancelToken,
    total_secs: f64,
) -> Result<()> {
    use std::process::Stdio;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::process::Command;

    if cancel.is_cancelled() {
        return Err(RenderError::Aborted);
    }

    let args = build_ffmpeg_args(plan);
    tracing::debug!("spawning ffmpeg with {} args", args.len());

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FfmpegNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    let stderr = child.stderr.take().expect("stderr was piped");
    let reader = BufReader::new(stderr);
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(progress) = parse_progress(&line, total_secs) {
                            let _ = progress_tx.send(progress);
                        }
                    }
                    _ => break,
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("render cancelled, killing ffmpeg");
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Err(RenderError::Aborted);
            }
        }
    }

    let status = child.wait().await.map_err(RenderError::Io)?;
    if !status.success() {
        if cancel.is_cancelled() {
            return Err(RenderError::Aborted);
        }
        return Err(RenderError::FfmpegFailed(format!(
            "ffmpeg exited with {status}"
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

/// Render a slide sequence into a single MP4.
///
/// Slides are resolved strictly in sequence (the cancel token is checked
/// between slides), compiled into one filter graph and encoded. Temporary
/// decoded assets are removed when this returns, on every path.
pub async fn render(
    request: &RenderRequest,
    progress_tx: &tokio::sync::watch::Sender<RenderProgress>,
    cancel: &CancelToken,
) -> Result<PathBuf> {
    if request.slides.is_empty() {
        return Err(RenderError::NoSlides);
    }

    tracing::info!(
        "rendering {} slides to {}",
        request.slides.len(),
        request.output_path.display()
    );

    let temp = RenderTemp::create()?;

    let mut resolved: Vec<ResolvedSlide> = Vec::with_capacity(request.slides.len());
    for (i, slide) in request.slides.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(RenderError::Aborted);
        }
        resolved.push(resolve_slide(slide, i, &request.settings, &temp));
        tokio::task::yield_now().await;
    }

    let plan = compile(request, &resolved)?;
    let total_secs: f64 = resolved.iter().map(|r| r.duration_secs).sum();

    execute(&plan, progress_tx, cancel, total_secs).await?;

    tracing::info!("render finished: {}", plan.output_path.display());
    Ok(plan.output_path)
}

// ---------------------------------------------------------------------------
// Progress parsing
// ---------------------------------------------------------------------------

/// Parse an ffmpeg stderr progress line.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
pub fn parse_progress(line: &str, total_secs: f64) -> Option<RenderProgress> {
    if !line.contains("time=") {
        return None;
    }

    let frame = extract_value(line, "frame=")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = extract_value(line, "fps=")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);

    let speed_str = extract_value(line, "speed=").unwrap_or_default();

    let time_secs = extract_value(line, "time=")
        .and_then(|v| parse_time_str(&v))
        .unwrap_or(0.0);

    let percent = if total_secs > 0.0 {
        (time_secs / total_secs * 100.0).min(100.0)
    } else {
        0.0
    };

    let speed_factor = speed_str
        .trim_end_matches('x')
        .parse::<f64>()
        .unwrap_or(0.0);

    let eta_seconds = if speed_factor > 0.0 && total_secs > time_secs {
        Some((total_secs - time_secs) / speed_factor)
    } else {
        None
    };

    Some(RenderProgress {
        percent,
        frame,
        fps,
        speed: speed_str,
        eta_seconds,
    })
}

/// Extract a value from an ffmpeg key=value progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let trimmed = rest.trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let val = trimmed[..end].to_string();
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
