use crate::error::Result;
use crate::mpv::MpvPlayer;
use slidecast_core::schedule::{build_schedule, Schedule};
use slidecast_core::types::{MusicSettings, Slide, VisualSource};
use slidecast_core::CancelToken;
use std::time::Duration;

/// Cooperative, frame-driven live preview of a slide timeline.
///
/// Takes an immutable snapshot of the slides and music settings at
/// construction; edits made afterwards do not affect a running preview.
/// The music gain is recomputed on every frame tick from the schedule entry
/// covering the current frame, so per-slide mutes land live without
/// re-deriving the timeline.
pub struct PreviewSession {
    slides: Vec<Slide>,
    music: MusicSettings,
    tts_volume: f64,
    schedule: Schedule,
}

impl PreviewSession {
    pub fn new(slides: Vec<Slide>, music: MusicSettings, tts_volume: f64, fps: f64) -> Self {
        let schedule = build_schedule(&slides, &music, fps);
        Self {
            slides,
            music,
            tts_volume,
            schedule,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Play the timeline once through native players. Returns when the
    /// timeline ends or the token is cancelled; cancellation is a normal
    /// way to stop a preview, not a failure.
    pub async fn run(&self, cancel: &CancelToken) -> Result<()> {
        tracing::info!(
            "preview: {} slides, {} frames at {} fps",
            self.slides.len(),
            self.schedule.total_frames,
            self.schedule.fps
        );

        let visual = MpvPlayer::spawn("preview-visual", true)?;
        let mut narration = MpvPlayer::spawn("preview-narration", false)?;
        narration.set_gain(self.tts_volume)?;

        let mut music = match &self.music.url {
            Some(url) => {
                let mut player = MpvPlayer::spawn("preview-music", false)?;
                player.set_loop(self.music.loop_playback)?;
                player.load(url)?;
                Some(player)
            }
            None => None,
        };

        let mut ticker = tokio::time::interval(Duration::from_secs_f64(
            1.0 / self.schedule.fps,
        ));
        let mut current_slide: Option<usize> = None;
        let mut current_gain: Option<f64> = None;

        for frame in 0..self.schedule.total_frames {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => {
                    tracing::info!("preview cancelled at frame {frame}");
                    return Ok(());
                }
            }

            let index = self.schedule.index_at(frame);

            if index != current_slide {
                current_slide = index;
                if let Some(i) = index {
                    self.enter_slide(i, &visual, &narration)?;
                }
            }

            if let Some(player) = music.as_mut() {
                let gain = music_gain_at(&self.schedule, frame);
                if current_gain != Some(gain) {
                    player.set_gain(gain)?;
                    current_gain = Some(gain);
                }
            }
        }

        Ok(())
    }

    fn enter_slide(&self, index: usize, visual: &MpvPlayer, narration: &MpvPlayer) -> Result<()> {
        let slide = &self.slides[index];
        tracing::debug!("preview: entering slide {index}");

        // The original URI goes straight to the player's own decoder.
        match preview_location(&slide.visual) {
            Some(location) => visual.load(&location)?,
            None => visual.halt()?,
        }

        if slide.narration_active() {
            if let Some(n) = &slide.narration {
                narration.load(&n.audio.location())?;
            }
        } else {
            narration.halt()?;
        }
        Ok(())
    }
}

/// Music gain for a frame: the covering entry's gain, silence outside the
/// timeline.
pub fn music_gain_at(schedule: &Schedule, frame: u64) -> f64 {
    schedule.entry_at(frame).map(|e| e.music_gain).unwrap_or(0.0)
}

/// Pass-through location for live preview playback.
fn preview_location(visual: &VisualSource) -> Option<String> {
    match visual {
        VisualSource::DataUri(uri) => Some(uri.clone()),
        VisualSource::Url(url) => Some(url.clone()),
        VisualSource::File(path) => Some(path.to_string_lossy().into_owned()),
        VisualSource::None => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
