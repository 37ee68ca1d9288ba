use crate::error::Result;
use base64::Engine;
use slidecast_core::types::{RenderSettings, Slide, SlideKind, VisualSource};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Data URI parsing
// ---------------------------------------------------------------------------

/// Outcome of parsing an embedded encoded image. Never an error: the caller's
/// placeholder fallback is a normal branch, not exception handling.
#[derive(Debug, Clone, PartialEq)]
pub enum DataUriParse {
    Parsed { mime: String, bytes: Vec<u8> },
    Unrecognized,
}

/// Parse a `data:<mime>;base64,<payload>` string.
///
/// Strict grammar first; if that fails, a permissive split-on-first-comma
/// recovery that still guesses a mime from the header substring and treats
/// everything after the comma as payload.
pub fn parse_data_uri(input: &str) -> DataUriParse {
    let trimmed = input.trim();

    if let Some(parsed) = parse_strict(trimmed) {
        return parsed;
    }
    parse_permissive(trimmed).unwrap_or(DataUriParse::Unrecognized)
}

fn parse_strict(input: &str) -> Option<DataUriParse> {
    let rest = input.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.split(';').next().unwrap_or_default();
    if mime.is_empty() || !mime.contains('/') || !header.ends_with("base64") {
        return None;
    }
    let bytes = decode_base64(payload)?;
    Some(DataUriParse::Parsed {
        mime: mime.to_string(),
        bytes,
    })
}

fn parse_permissive(input: &str) -> Option<DataUriParse> {
    let (header, payload) = input.split_once(',')?;
    let mime = if header.contains("jpeg") || header.contains("jpg") {
        "image/jpeg"
    } else if header.contains("webp") {
        "image/webp"
    } else if header.contains("gif") {
        "image/gif"
    } else {
        "image/png"
    };
    let bytes = decode_base64(payload)?;
    Some(DataUriParse::Parsed {
        mime: mime.to_string(),
        bytes,
    })
}

fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .ok()
}

/// File extension for a decoded image mime.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Accept only `http`, `https` and browser `blob` handles before any
/// media-facing use. Everything else is rejected so crafted URLs cannot
/// smuggle other schemes into the pipeline.
pub fn is_allowed_media_url(url: &str) -> bool {
    let trimmed = url.trim();
    let Some((scheme, rest)) = trimmed.split_once(':') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    matches!(
        scheme.to_ascii_lowercase().as_str(),
        "http" | "https" | "blob"
    )
}

// ---------------------------------------------------------------------------
// Media kind sniffing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Gif,
    Other,
}

/// Classify an uploaded media file by MIME type and extension.
pub fn detect_media_kind(file_name: &str, mime: &str) -> MediaKind {
    let lower = file_name.to_lowercase();
    if mime.starts_with("video/") || lower.ends_with(".mp4") {
        MediaKind::Video
    } else if mime == "image/gif" || lower.ends_with(".gif") {
        MediaKind::Gif
    } else {
        MediaKind::Other
    }
}

// ---------------------------------------------------------------------------
// RenderTemp
// ---------------------------------------------------------------------------

/// Per-render temp directory, uniquely named per invocation. Removed
/// unconditionally when dropped, so success, failure and cancellation all
/// clean up the same way.
#[derive(Debug)]
pub struct RenderTemp {
    dir: PathBuf,
}

impl RenderTemp {
    pub fn create() -> Result<Self> {
        let dir = std::env::temp_dir().join(format!("slidecast-render-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write decoded image bytes for slide `index`.
    pub fn write_decoded(&self, index: usize, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self
            .dir
            .join(format!("slide_{index}_{}.{ext}", Uuid::new_v4()));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

impl Drop for RenderTemp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

// ---------------------------------------------------------------------------
// Slide resolution
// ---------------------------------------------------------------------------

/// A visual normalized into something ffmpeg can take as an input.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualInput {
    /// Still image, looped for the slide duration.
    Still(String),
    /// Motion media (video/GIF); the filter chain trims it to duration.
    Motion(String),
    /// Synthesized lavfi source (flat-color placeholder).
    Lavfi(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlide {
    pub visual: VisualInput,
    /// Narration input location, present only when narration is active.
    pub audio: Option<String>,
    pub duration_secs: f64,
}

/// Resolve one slide into render inputs. Never fails: a malformed visual
/// degrades to the placeholder so one bad slide cannot abort a whole render.
pub fn resolve_slide(
    slide: &Slide,
    index: usize,
    settings: &RenderSettings,
    temp: &RenderTemp,
) -> ResolvedSlide {
    let placeholder = || {
        VisualInput::Lavfi(format!(
            "color=c=black:s={}x{}",
            settings.width, settings.height
        ))
    };

    let visual = match &slide.visual {
        VisualSource::DataUri(uri) => {
            let trimmed = uri.trim();
            // Some callers hand an HTTP URL through the embedded-image slot.
            if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                by_kind(slide.kind, trimmed.to_string())
            } else {
                match parse_data_uri(trimmed) {
                    DataUriParse::Parsed { mime, bytes } => {
                        let ext = extension_for_mime(&mime);
                        match temp.write_decoded(index, ext, &bytes) {
                            Ok(path) => {
                                VisualInput::Still(path.to_string_lossy().into_owned())
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "slide {index}: failed to write decoded visual: {e}"
                                );
                                placeholder()
                            }
                        }
                    }
                    DataUriParse::Unrecognized => {
                        tracing::warn!(
                            "slide {index}: unrecognized embedded visual, using placeholder"
                        );
                        placeholder()
                    }
                }
            }
        }
        VisualSource::Url(url) => {
            if is_allowed_media_url(url) {
                by_kind(slide.kind, url.trim().to_string())
            } else {
                tracing::warn!("slide {index}: rejected media URL scheme, using placeholder");
                placeholder()
            }
        }
        VisualSource::File(path) => {
            if path.exists() {
                by_kind(slide.kind, path.to_string_lossy().into_owned())
            } else {
                tracing::warn!(
                    "slide {index}: visual file {} missing, using placeholder",
                    path.display()
                );
                placeholder()
            }
        }
        VisualSource::None => placeholder(),
    };

    let audio = if slide.narration_active() {
        slide.narration.as_ref().map(|n| n.audio.location())
    } else {
        None
    };

    ResolvedSlide {
        visual,
        audio,
        duration_secs: slide.render_duration_secs(),
    }
}

fn by_kind(kind: SlideKind, location: String) -> VisualInput {
    match kind {
        SlideKind::Image => VisualInput::Still(location),
        SlideKind::Video => VisualInput::Motion(location),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
