use crate::models::{ChapterLine, DurationBound};
use regex::Regex;
use std::sync::LazyLock;

/// `H:MM:SS`/`HH:MM:SS` or `M:SS`/`MM:SS`, whitespace, then a description.
static CHAPTER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<hours>[0-9]{1,2}):(?P<minutes>[0-9]{2})|(?P<short_minutes>[0-9]{1,2})):(?P<seconds>[0-9]{2})\s+(?P<description>\S.*)$",
    )
    .expect("chapter line pattern is valid")
});

/// Parse a single trimmed line into a chapter line, ignoring the bound.
fn parse_line(line: &str) -> Option<ChapterLine> {
    let captures = CHAPTER_LINE.captures(line)?;
    let number = |name: &str| -> Option<u64> { captures.name(name)?.as_str().parse().ok() };

    let seconds = number("seconds")?;
    if seconds >= 60 {
        return None;
    }
    let (hours, minutes) = match number("hours") {
        Some(hours) => {
            let minutes = number("minutes")?;
            if minutes >= 60 {
                return None;
            }
            (hours, minutes)
        }
        None => (0, number("short_minutes")?),
    };

    let time_len = captures.name("seconds")?.end();
    Some(ChapterLine {
        time: line[..time_len].to_string(),
        description: captures.name("description")?.as_str().to_string(),
        line: line.to_string(),
        offset_ms: (hours * 3600 + minutes * 60 + seconds) * 1000,
    })
}

/// Keep the response lines that look like chapter lines and fall within the bound.
///
/// Order is the order of the response. Banners, commentary and anything
/// past `bound` are dropped silently.
pub fn filter_valid_lines(response: &str, bound: &DurationBound) -> Vec<ChapterLine> {
    let limit = bound.total_millis();

    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let chapter = parse_line(line)?;
            if chapter.offset_ms > limit {
                tracing::debug!("dropping out-of-range line {:?} (bound {})", line, bound);
                return None;
            }
            Some(chapter)
        })
        .collect()
}

/// Re-runs [`filter_valid_lines`] over a growing response and hands back
/// only the lines not returned before.
///
/// Only complete lines are evaluated; whatever follows the last newline waits
/// for more text. Push a final `"\n"` to flush it.
#[derive(Debug)]
pub struct StreamingFilter {
    bound: DurationBound,
    buffer: String,
    emitted: usize,
}

impl StreamingFilter {
    pub fn new(bound: DurationBound) -> Self {
        StreamingFilter {
            bound,
            buffer: String::new(),
            emitted: 0,
        }
    }

    pub fn push(&mut self, chunk: &str) -> Vec<ChapterLine> {
        self.buffer.push_str(chunk);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let accepted = filter_valid_lines(&self.buffer[..last_newline], &self.bound);
        let fresh: Vec<ChapterLine> = accepted.into_iter().skip(self.emitted).collect();
        self.emitted += fresh.len();
        fresh
    }
}
