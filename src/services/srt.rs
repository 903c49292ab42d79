use crate::models::{SubtitleEntry, Timecode};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `HH:MM:SS,mmm --> HH:MM:SS,mmm`, one capture per component.
pub(crate) static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([0-9]{2}):([0-9]{2}):([0-9]{2}),([0-9]{3}) --> ([0-9]{2}):([0-9]{2}):([0-9]{2}),([0-9]{3})",
    )
    .expect("cue timing pattern is valid")
});

/// Read one side of a cue timing match starting at capture group `first`.
pub(crate) fn timecode_at(captures: &Captures<'_>, first: usize) -> Option<Timecode> {
    let component =
        |offset: usize| -> Option<u32> { captures.get(first + offset)?.as_str().parse().ok() };

    Some(Timecode::new(
        component(0)?,
        component(1)?,
        component(2)?,
        component(3)?,
    ))
}

/// Parse SRT text into cues, in the order they appear.
///
/// Blocks are separated by blank lines. A block needs an integer sequence
/// number, a cue timing line and at least one line of text; anything else is
/// dropped without failing the rest of the file.
pub fn parse(input: &str) -> Vec<SubtitleEntry> {
    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            if let Some(entry) = parse_block(&block) {
                entries.push(entry);
            }
            block.clear();
        } else {
            block.push(line);
        }
    }
    if let Some(entry) = parse_block(&block) {
        entries.push(entry);
    }

    tracing::debug!(
        "parsed {} subtitle entries, last sequence number {:?}",
        entries.len(),
        entries.last().map(|entry| entry.sequence_number)
    );
    entries
}

fn parse_block(lines: &[&str]) -> Option<SubtitleEntry> {
    if lines.len() < 3 {
        return None;
    }

    let sequence_line = lines[0].trim_start_matches('\u{feff}');
    let sequence_number = match sequence_line.parse::<u32>() {
        Ok(number) if sequence_line.bytes().all(|b| b.is_ascii_digit()) => number,
        _ => {
            tracing::trace!("skipping block with sequence line {:?}", lines[0]);
            return None;
        }
    };

    let Some(captures) = CUE_TIMING.captures(lines[1]) else {
        tracing::trace!("skipping block {} with timing line {:?}", sequence_number, lines[1]);
        return None;
    };

    Some(SubtitleEntry {
        sequence_number,
        start_time: timecode_at(&captures, 1)?,
        end_time: timecode_at(&captures, 5)?,
        text: lines[2..].join(" ").trim().to_string(),
    })
}

/// Cue texts joined by single spaces, without any timing.
pub fn flatten(entries: &[SubtitleEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One `[start - end] text` line per cue.
pub fn timestamped_transcript(entries: &[SubtitleEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("[{} - {}] {}", entry.start_time, entry.end_time, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}
