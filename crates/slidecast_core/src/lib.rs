pub mod cancel;
pub mod error;
pub mod schedule;
pub mod traits;
pub mod types;

pub use cancel::CancelToken;
pub use error::{CoreError, Result};
pub use schedule::{build_schedule, Schedule, ScheduleEntry};
pub use types::{
    AudioSource, MusicSettings, Narration, RenderSettings, Slide, SlideKind, Transition,
    VisualSource,
};
