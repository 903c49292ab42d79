use crate::models::{ChapterLine, ExportFormat, ProcessResult};
use serde_json::json;

pub const KEY_MOMENTS_BANNER: &str = "🕒 Key moments:";

/// Rendered export and the content type to serve it with.
pub fn render(result: &ProcessResult, format: ExportFormat) -> (&'static str, String) {
    match format {
        ExportFormat::Json => ("application/json", to_json(result).to_string()),
        ExportFormat::Text => ("text/plain; charset=utf-8", to_text(&result.chapters)),
        ExportFormat::Csv => ("text/csv; charset=utf-8", to_csv(&result.chapters)),
        ExportFormat::Youtube => ("text/plain; charset=utf-8", to_youtube(&result.chapters)),
    }
}

pub fn to_text(chapters: &[ChapterLine]) -> String {
    chapters
        .iter()
        .map(|chapter| chapter.line.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn to_json(result: &ProcessResult) -> serde_json::Value {
    json!({
        "id": result.id,
        "duration": result.duration,
        "entryCount": result.entry_count,
        "count": result.chapters.len(),
        "timestamps": result.chapters,
    })
}

pub fn to_csv(chapters: &[ChapterLine]) -> String {
    let mut out = String::from("Time,Description\n");
    for chapter in chapters {
        out.push_str(&csv_field(&chapter.time));
        out.push(',');
        out.push_str(&csv_field(&chapter.description));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Banner plus the chapter lines, ready to paste into a video description.
pub fn to_youtube(chapters: &[ChapterLine]) -> String {
    let mut out = String::from(KEY_MOMENTS_BANNER);
    for chapter in chapters {
        out.push('\n');
        out.push_str(&chapter.line);
    }
    out.push('\n');
    out
}
