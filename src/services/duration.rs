use crate::models::{DurationBound, Timecode};
use crate::services::srt::{CUE_TIMING, timecode_at};

/// Scan raw SRT text for cue timings and return the latest end time.
///
/// Works on the text directly rather than on parsed cues, so timings inside
/// otherwise broken blocks still count. Returns a zero bound if no timing is
/// present at all.
pub fn max_end_time(input: &str) -> DurationBound {
    let mut max = Timecode::default();

    for captures in CUE_TIMING.captures_iter(input) {
        let Some(end) = timecode_at(&captures, 5) else {
            continue;
        };
        if end.total_millis() > max.total_millis() {
            max = end;
        }
    }

    DurationBound::new(max)
}
