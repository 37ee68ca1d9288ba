use crate::types::{MusicSettings, Slide};
use serde::{Deserialize, Serialize};

/// Total length used for a live preview with zero slides. Never used for a
/// real export; the renderer rejects empty input instead.
pub const EMPTY_PREVIEW_SECS: f64 = 10.0;

// ---------------------------------------------------------------------------
// ScheduleEntry / Schedule
// ---------------------------------------------------------------------------

/// One slide's place in the timeline, in frame units. Entries are contiguous:
/// entry i's `end` is entry i+1's `start`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub start: u64,
    pub end: u64,
    pub music_gain: f64,
}

impl ScheduleEntry {
    pub fn frames(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start && frame < self.end
    }
}

/// The full ordered timeline for one render/preview invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
    pub total_frames: u64,
    pub fps: f64,
}

impl Schedule {
    /// Index of the entry covering `frame`, if any.
    pub fn index_at(&self, frame: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.contains(frame))
    }

    pub fn entry_at(&self, frame: u64) -> Option<&ScheduleEntry> {
        self.index_at(frame).map(|i| &self.entries[i])
    }

    pub fn total_secs(&self) -> f64 {
        self.total_frames as f64 / self.fps
    }
}

// ---------------------------------------------------------------------------
// build_schedule
// ---------------------------------------------------------------------------

/// Derive the frame schedule for an ordered slide list.
///
/// Pure: identical inputs always yield identical entries, which is what keeps
/// the live preview and the offline encode from diverging. Rounding is
/// round-half-up and every slide is clamped to at least one frame.
pub fn build_schedule(slides: &[Slide], music: &MusicSettings, fps: f64) -> Schedule {
    if slides.is_empty() {
        return Schedule {
            entries: vec![],
            total_frames: frames_for(EMPTY_PREVIEW_SECS, fps),
            fps,
        };
    }

    let mut entries = Vec::with_capacity(slides.len());
    let mut cursor = 0u64;
    for slide in slides {
        let frames = frames_for(slide.raw_duration_secs(), fps);
        let music_gain = if music.url.is_none() || slide.mutes_music() {
            0.0
        } else {
            music.volume
        };
        entries.push(ScheduleEntry {
            start: cursor,
            end: cursor + frames,
            music_gain,
        });
        cursor += frames;
    }

    Schedule {
        entries,
        total_frames: cursor,
        fps,
    }
}

fn frames_for(secs: f64, fps: f64) -> u64 {
    ((secs * fps).round() as u64).max(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioSource, Narration, SlideKind, VisualSource};

    fn narrated(duration: f64, delay: f64) -> Slide {
        let mut slide = Slide::new(SlideKind::Image, VisualSource::None);
        slide.narration = Some(Narration {
            audio: AudioSource::Url("/audio/n.wav".into()),
            duration_secs: duration,
        });
        slide.post_audio_delay_secs = delay;
        slide
    }

    fn held(delay: f64) -> Slide {
        let mut slide = Slide::new(SlideKind::Image, VisualSource::None);
        slide.narration_disabled = true;
        slide.post_audio_delay_secs = delay;
        slide
    }

    fn with_music() -> MusicSettings {
        MusicSettings {
            url: Some("/music/track.mp3".into()),
            volume: 0.2,
            ..MusicSettings::default()
        }
    }

    #[test]
    fn worked_scenario_330_frames() {
        // [{duration:4,delay:1},{narration disabled,delay:6}] at fps=30
        let slides = vec![narrated(4.0, 1.0), held(6.0)];
        let schedule = build_schedule(&slides, &MusicSettings::default(), 30.0);

        assert_eq!(schedule.entries.len(), 2);
        assert_eq!(schedule.entries[0].start, 0);
        assert_eq!(schedule.entries[0].end, 150);
        assert_eq!(schedule.entries[1].start, 150);
        assert_eq!(schedule.entries[1].end, 330);
        assert_eq!(schedule.total_frames, 330);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let slides = vec![narrated(3.2, 0.5), held(2.0), narrated(7.77, 0.0)];
        let music = with_music();
        let a = build_schedule(&slides, &music, 30.0);
        let b = build_schedule(&slides, &music, 30.0);
        assert_eq!(a, b);
    }

    #[test]
    fn entries_are_contiguous_and_monotonic() {
        let slides = vec![narrated(1.0, 0.0), narrated(2.5, 1.0), held(4.0), held(0.2)];
        let schedule = build_schedule(&slides, &with_music(), 30.0);

        assert_eq!(schedule.entries[0].start, 0);
        for pair in schedule.entries.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
        assert_eq!(
            schedule.total_frames,
            schedule.entries.last().unwrap().end
        );
    }

    #[test]
    fn duration_floor_is_one_frame() {
        let mut slide = held(0.001);
        slide.post_audio_delay_secs = 0.001;
        let schedule = build_schedule(&[slide], &MusicSettings::default(), 30.0);
        assert_eq!(schedule.entries[0].frames(), 1);
    }

    #[test]
    fn rounding_is_half_up() {
        // 2.05s * 30fps = 61.5 frames, rounds to 62.
        let schedule = build_schedule(&[held(2.05)], &MusicSettings::default(), 30.0);
        assert_eq!(schedule.entries[0].frames(), 62);
    }

    #[test]
    fn disabled_narration_ignores_stale_duration() {
        let mut slide = narrated(10.0, 3.0);
        slide.narration_disabled = true;
        let schedule = build_schedule(&[slide], &MusicSettings::default(), 30.0);
        assert_eq!(schedule.entries[0].frames(), 90);
    }

    #[test]
    fn music_gain_follows_global_volume() {
        let slides = vec![narrated(2.0, 0.0)];
        let schedule = build_schedule(&slides, &with_music(), 30.0);
        assert!((schedule.entries[0].music_gain - 0.2).abs() < 1e-9);
    }

    #[test]
    fn music_gain_zero_when_slide_mutes() {
        let mut muted = narrated(2.0, 0.0);
        muted.music_disabled = true;
        let mut paused = narrated(2.0, 0.0);
        paused.video_music_paused = true;

        let schedule = build_schedule(&[muted, paused, narrated(2.0, 0.0)], &with_music(), 30.0);
        assert_eq!(schedule.entries[0].music_gain, 0.0);
        assert_eq!(schedule.entries[1].music_gain, 0.0);
        assert!((schedule.entries[2].music_gain - 0.2).abs() < 1e-9);
    }

    #[test]
    fn music_gain_zero_without_configured_track() {
        let schedule = build_schedule(&[narrated(2.0, 0.0)], &MusicSettings::default(), 30.0);
        assert_eq!(schedule.entries[0].music_gain, 0.0);
    }

    #[test]
    fn empty_slides_fall_back_to_preview_length() {
        let schedule = build_schedule(&[], &MusicSettings::default(), 30.0);
        assert!(schedule.entries.is_empty());
        assert_eq!(schedule.total_frames, 300);
    }

    #[test]
    fn entry_lookup_by_frame() {
        let slides = vec![narrated(4.0, 1.0), held(6.0)];
        let schedule = build_schedule(&slides, &with_music(), 30.0);

        assert_eq!(schedule.index_at(0), Some(0));
        assert_eq!(schedule.index_at(149), Some(0));
        assert_eq!(schedule.index_at(150), Some(1));
        assert_eq!(schedule.index_at(329), Some(1));
        assert_eq!(schedule.index_at(330), None);
    }

    #[test]
    fn total_secs_matches_frames() {
        let schedule = build_schedule(&[held(6.0)], &MusicSettings::default(), 30.0);
        assert!((schedule.total_secs() - 6.0).abs() < 1e-9);
    }
}
