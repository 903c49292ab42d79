use serde::{Deserialize, Serialize};
use std::fmt;

/// An offset into the media with millisecond precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timecode {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub millis: u32,
}

impl Timecode {
    pub fn new(hours: u32, minutes: u32, seconds: u32, millis: u32) -> Self {
        Timecode {
            hours,
            minutes,
            seconds,
            millis,
        }
    }

    pub fn total_millis(&self) -> u64 {
        let whole_seconds =
            u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds);
        whole_seconds * 1000 + u64::from(self.millis)
    }
}

impl fmt::Display for Timecode {
    /// SRT-style `HH:MM:SS.mmm`, with a dot instead of the comma.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }
}

/// One cue from an SRT file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    pub sequence_number: u32,
    pub start_time: Timecode,
    pub end_time: Timecode,
    pub text: String,
}

/// Latest cue end time found in a transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationBound {
    max: Timecode,
}

impl DurationBound {
    pub fn new(max: Timecode) -> Self {
        DurationBound { max }
    }

    pub fn total_millis(&self) -> u64 {
        self.max.total_millis()
    }

    /// A zero bound means no cue timing was found at all.
    pub fn is_established(&self) -> bool {
        self.total_millis() > 0
    }

    /// `MM:SS` for videos under an hour, `HH:MM:SS` otherwise.
    pub fn display(&self) -> String {
        if self.max.hours == 0 {
            format!("{:02}:{:02}", self.max.minutes, self.max.seconds)
        } else {
            format!(
                "{:02}:{:02}:{:02}",
                self.max.hours, self.max.minutes, self.max.seconds
            )
        }
    }
}

impl fmt::Display for DurationBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// A generated chapter line that passed shape and bound checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterLine {
    pub time: String,
    pub description: String,
    pub line: String,
    #[serde(skip)]
    pub offset_ms: u64,
}

/// What the generation step gets to see of the transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Plain,
    Timestamped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Text,
    Csv,
    Youtube,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub srt_content: String,
    #[serde(default)]
    pub mode: ExtractionMode,
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug)]
pub struct ProcessResult {
    pub id: String,
    pub duration: String,
    pub entry_count: usize,
    pub chapters: Vec<ChapterLine>,
}
