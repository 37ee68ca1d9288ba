use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Fallback hold when a slide has no usable duration source.
pub const DEFAULT_SLIDE_SECS: f64 = 5.0;

/// Minimum per-slide duration for offline rendering. Several container/codec
/// combinations reject zero-length segments.
pub const MIN_RENDER_SECS: f64 = 0.1;

// ---------------------------------------------------------------------------
// SlideKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    Image,
    Video,
}

// ---------------------------------------------------------------------------
// VisualSource
// ---------------------------------------------------------------------------

/// The exclusively owned visual reference of a slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VisualSource {
    /// Embedded encoded image bytes (`data:<mime>;base64,<payload>` shape).
    DataUri(String),
    /// Remote/absolute media URL. Scheme is validated at resolution time.
    Url(String),
    /// Local media file.
    File(PathBuf),
    /// No visual at all; the pipeline substitutes a flat-color placeholder.
    None,
}

// ---------------------------------------------------------------------------
// AudioSource / Narration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AudioSource {
    Url(String),
    File(PathBuf),
}

impl AudioSource {
    /// Location string usable as a media input (path or URL).
    pub fn location(&self) -> String {
        match self {
            AudioSource::Url(u) => u.clone(),
            AudioSource::File(p) => p.to_string_lossy().into_owned(),
        }
    }
}

/// Synthesized narration attached to a slide. `duration_secs` is
/// authoritative only while narration is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Narration {
    pub audio: AudioSource,
    pub duration_secs: f64,
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Fade,
    Slide,
    Zoom,
    None,
}

// ---------------------------------------------------------------------------
// Slide
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    pub id: Uuid,
    pub kind: SlideKind,
    pub visual: VisualSource,
    pub narration: Option<Narration>,
    /// Extra hold after narration ends. When narration is disabled this is
    /// the entire slide hold (5s default when unset/zero).
    pub post_audio_delay_secs: f64,
    pub narration_disabled: bool,
    pub music_disabled: bool,
    pub video_music_paused: bool,
    pub transition: Transition,
    /// TTS voice id for the narration collaborator.
    pub voice: Option<String>,
}

impl Slide {
    pub fn new(kind: SlideKind, visual: VisualSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            visual,
            narration: None,
            post_audio_delay_secs: 0.0,
            narration_disabled: false,
            music_disabled: false,
            video_music_paused: false,
            transition: Transition::default(),
            voice: None,
        }
    }

    /// The single duration rule shared by the schedule builder, the render
    /// pipeline and the preview:
    /// - narration disabled: `post_audio_delay` is the whole hold (5s when
    ///   unset/zero, so a slide never becomes invisible);
    /// - otherwise: narration duration (5s default) plus the delay.
    pub fn raw_duration_secs(&self) -> f64 {
        if self.narration_disabled {
            return positive_or(self.post_audio_delay_secs, DEFAULT_SLIDE_SECS);
        }
        let narration = self
            .narration
            .as_ref()
            .map(|n| n.duration_secs)
            .filter(|d| *d > 0.0)
            .unwrap_or(DEFAULT_SLIDE_SECS);
        narration + self.post_audio_delay_secs.max(0.0)
    }

    /// Duration clamped to the offline rendering floor.
    pub fn render_duration_secs(&self) -> f64 {
        self.raw_duration_secs().max(MIN_RENDER_SECS)
    }

    /// True when this slide contributes a narration audio stage.
    pub fn narration_active(&self) -> bool {
        self.narration.is_some() && !self.narration_disabled
    }

    /// True when this slide mutes background music while on screen.
    pub fn mutes_music(&self) -> bool {
        self.music_disabled || self.video_music_paused
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        fallback
    }
}

// ---------------------------------------------------------------------------
// MusicSettings
// ---------------------------------------------------------------------------

/// Background music configuration, shared by the whole timeline. Gain is
/// modulated per schedule entry, never the source itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MusicSettings {
    pub url: Option<String>,
    /// Baseline gain 0..1. The preview may amplify up to 2x.
    pub volume: f64,
    pub loop_playback: bool,
    pub title: Option<String>,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            url: None,
            volume: 0.03,
            loop_playback: true,
            title: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RenderSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub sample_rate: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        preset_1080p()
    }
}

/// 1920x1080 30fps preset.
pub fn preset_1080p() -> RenderSettings {
    RenderSettings {
        width: 1920,
        height: 1080,
        fps: 30.0,
        sample_rate: 44100,
    }
}

/// 1080x1920 30fps (vertical/shorts) preset.
pub fn preset_shorts() -> RenderSettings {
    RenderSettings {
        width: 1080,
        height: 1920,
        fps: 30.0,
        sample_rate: 44100,
    }
}

/// 1280x720 30fps preset.
pub fn preset_720p() -> RenderSettings {
    RenderSettings {
        width: 1280,
        height: 720,
        fps: 30.0,
        sample_rate: 44100,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn narrated_slide(duration: f64, delay: f64) -> Slide {
        let mut slide = Slide::new(SlideKind::Image, VisualSource::None);
        slide.narration = Some(Narration {
            audio: AudioSource::Url("/audio/narration.wav".into()),
            duration_secs: duration,
        });
        slide.post_audio_delay_secs = delay;
        slide
    }

    #[test]
    fn duration_with_narration_and_delay() {
        let slide = narrated_slide(4.0, 1.0);
        assert!((slide.raw_duration_secs() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn duration_defaults_to_five_without_narration() {
        let slide = Slide::new(SlideKind::Image, VisualSource::None);
        assert!((slide.raw_duration_secs() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_narration_uses_delay_as_whole_hold() {
        let mut slide = narrated_slide(4.0, 3.0);
        slide.narration_disabled = true;
        // Stale narration duration must be ignored entirely.
        assert!((slide.raw_duration_secs() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_narration_with_zero_delay_falls_back_to_five() {
        let mut slide = Slide::new(SlideKind::Image, VisualSource::None);
        slide.narration_disabled = true;
        slide.post_audio_delay_secs = 0.0;
        assert!((slide.raw_duration_secs() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn render_duration_is_floored() {
        let mut slide = narrated_slide(0.0, 0.0);
        slide.narration_disabled = true;
        slide.post_audio_delay_secs = 0.01;
        assert!((slide.render_duration_secs() - MIN_RENDER_SECS).abs() < 1e-9);
    }

    #[test]
    fn narration_active_requires_audio_and_enabled() {
        let mut slide = narrated_slide(2.0, 0.0);
        assert!(slide.narration_active());
        slide.narration_disabled = true;
        assert!(!slide.narration_active());
        slide.narration = None;
        slide.narration_disabled = false;
        assert!(!slide.narration_active());
    }

    #[test]
    fn mutes_music_from_either_flag() {
        let mut slide = Slide::new(SlideKind::Video, VisualSource::None);
        assert!(!slide.mutes_music());
        slide.video_music_paused = true;
        assert!(slide.mutes_music());
        slide.video_music_paused = false;
        slide.music_disabled = true;
        assert!(slide.mutes_music());
    }

    #[test]
    fn music_settings_defaults() {
        let music = MusicSettings::default();
        assert!(music.url.is_none());
        assert!((music.volume - 0.03).abs() < 1e-9);
        assert!(music.loop_playback);
    }

    #[test]
    fn preset_values_are_correct() {
        let p1080 = preset_1080p();
        assert_eq!(p1080.width, 1920);
        assert_eq!(p1080.height, 1080);
        assert_eq!(p1080.fps, 30.0);
        assert_eq!(p1080.sample_rate, 44100);

        let shorts = preset_shorts();
        assert_eq!(shorts.width, 1080);
        assert_eq!(shorts.height, 1920);

        let p720 = preset_720p();
        assert_eq!(p720.width, 1280);
        assert_eq!(p720.height, 720);
    }

    #[test]
    fn serde_roundtrip_slide() {
        let mut slide = narrated_slide(3.5, 0.5);
        slide.visual = VisualSource::DataUri("data:image/png;base64,AAAA".into());
        slide.voice = Some("af_heart".into());
        let json = serde_json::to_string(&slide).unwrap();
        let back: Slide = serde_json::from_str(&json).unwrap();
        assert_eq!(slide, back);
    }

    #[test]
    fn serde_roundtrip_music_settings() {
        let music = MusicSettings {
            url: Some("/music/modern_edm.mp3".into()),
            volume: 0.2,
            loop_playback: false,
            title: Some("Modern Edm".into()),
        };
        let json = serde_json::to_string(&music).unwrap();
        let back: MusicSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(music, back);
    }

    #[test]
    fn audio_source_location() {
        assert_eq!(
            AudioSource::Url("http://host/a.wav".into()).location(),
            "http://host/a.wav"
        );
        assert_eq!(
            AudioSource::File(PathBuf::from("/tmp/a.wav")).location(),
            "/tmp/a.wav"
        );
    }
}
