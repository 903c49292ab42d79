use crate::config::Config;
use crate::error::AppError;
use crate::models::{ChapterLine, DurationBound, ExtractionMode, ProcessResult};
use crate::services::llm::LLMClient;
use crate::services::validator::{StreamingFilter, filter_valid_lines};
use crate::services::{duration, srt};
use futures::{Stream, StreamExt, future, stream};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You write chapter timestamps for videos from their subtitle transcripts.

The video is {duration} long. Every timestamp must be between 00:00 and {duration}. \
Any timestamp later than {duration} is invalid and must not appear in your answer.

Pick 5 to 12 key moments: the opening, major topic shifts, demonstrations, \
important explanations and the conclusion. Describe each in 2 to 6 words, \
starting with an action verb where it reads naturally.

Answer with one moment per line, in chronological order, formatted exactly as
MM:SS Description
(or H:MM:SS Description for videos over an hour). The first line must be
00:00. Do not add any other text.

Transcript:
{transcript}
";

/// Everything the generation step needs, computed from one upload.
#[derive(Debug)]
pub struct PreparedTranscript {
    pub entry_count: usize,
    pub bound: DurationBound,
    pub prompt: String,
}

/// Size check, parse, text extraction and duration bound for a raw SRT file.
pub fn prepare(
    srt_content: &str,
    mode: ExtractionMode,
    config: &Config,
) -> Result<PreparedTranscript, AppError> {
    if srt_content.len() > config.max_payload_bytes {
        return Err(AppError::PayloadTooLarge {
            limit: config.max_payload_bytes,
        });
    }
    if srt_content.trim().is_empty() {
        return Err(AppError::BadRequest("SRT content is required".to_string()));
    }

    let entries = srt::parse(srt_content);
    if entries.is_empty() {
        return Err(AppError::NoEntries);
    }

    let transcript = match mode {
        ExtractionMode::Plain => srt::flatten(&entries),
        ExtractionMode::Timestamped => srt::timestamped_transcript(&entries),
    };
    if transcript.trim().is_empty() {
        return Err(AppError::NoEntries);
    }

    let bound = duration::max_end_time(srt_content);
    if !bound.is_established() {
        return Err(AppError::NoDurationBound);
    }

    tracing::info!(
        "prepared {} entries, video length {}, {:?} transcript of {} bytes",
        entries.len(),
        bound,
        mode,
        transcript.len()
    );

    Ok(PreparedTranscript {
        entry_count: entries.len(),
        bound,
        prompt: render_prompt(&config.prompt_template, &bound, &transcript),
    })
}

pub fn render_prompt(template: &str, bound: &DurationBound, transcript: &str) -> String {
    template
        .replace("{duration}", &bound.display())
        .replace("{transcript}", transcript)
}

/// Run the whole pipeline and return the accepted chapter lines.
pub async fn process_srt(
    srt_content: &str,
    mode: ExtractionMode,
    config: &Config,
    llm_client: &LLMClient,
) -> Result<ProcessResult, AppError> {
    let prepared = prepare(srt_content, mode, config)?;

    let response = llm_client
        .generate(&prepared.prompt)
        .await
        .map_err(AppError::Generation)?;

    let chapters = filter_valid_lines(&response, &prepared.bound);
    log_acceptance(&chapters, response.lines().count(), &prepared.bound);

    Ok(ProcessResult {
        id: uuid::Uuid::new_v4().to_string(),
        duration: prepared.bound.display(),
        entry_count: prepared.entry_count,
        chapters,
    })
}

fn log_acceptance(chapters: &[ChapterLine], response_lines: usize, bound: &DurationBound) {
    tracing::info!(
        "accepted {} of {} response lines within {}",
        chapters.len(),
        response_lines,
        bound
    );
    if let Some(first) = chapters.first() {
        if first.offset_ms != 0 {
            tracing::debug!("first chapter starts at {} rather than zero", first.time);
        }
    }
}

/// Filter a streamed model response, yielding each accepted line once,
/// newline terminated, as soon as it is complete.
pub fn accepted_line_stream<S>(
    fragments: S,
    bound: DurationBound,
) -> impl Stream<Item = anyhow::Result<String>> + Send + 'static
where
    S: Stream<Item = anyhow::Result<String>> + Send + 'static,
{
    let mut filter = StreamingFilter::new(bound);

    fragments
        .chain(stream::once(future::ready(Ok("\n".to_string()))))
        .map(move |fragment| {
            fragment
                .map(|text| {
                    filter
                        .push(&text)
                        .into_iter()
                        .map(|chapter| chapter.line + "\n")
                        .collect::<String>()
                })
                .inspect_err(|err| tracing::error!("model stream failed: {err:#}"))
        })
        .filter(|item| future::ready(!matches!(item, Ok(text) if text.is_empty())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timecode;
    use futures::TryStreamExt;

    const SRT: &str = "1\n00:00:00,000 --> 00:00:04,000\nWelcome to the talk\n\n2\n00:04:10,000 --> 00:04:15,500\nLet's build something\n\n3\n00:09:58,000 --> 00:10:00,250\nThanks for watching\n";

    #[test]
    fn prepare_embeds_bound_and_plain_text() {
        let prepared = prepare(SRT, ExtractionMode::Plain, &Config::default()).unwrap();
        assert_eq!(prepared.entry_count, 3);
        assert_eq!(prepared.bound.display(), "10:00");
        assert!(prepared.prompt.contains("The video is 10:00 long"));
        assert!(
            prepared
                .prompt
                .contains("Welcome to the talk Let's build something Thanks for watching")
        );
        assert!(!prepared.prompt.contains("00:04:10.000"));
    }

    #[test]
    fn prepare_timestamped_mode_includes_cue_times() {
        let prepared = prepare(SRT, ExtractionMode::Timestamped, &Config::default()).unwrap();
        assert!(
            prepared
                .prompt
                .contains("[00:04:10.000 - 00:04:15.500] Let's build something")
        );
    }

    #[test]
    fn prepare_rejects_oversize_input_before_parsing() {
        let config = Config {
            max_payload_bytes: 16,
            ..Config::default()
        };
        let err = prepare(SRT, ExtractionMode::Plain, &config).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { limit: 16 }));
    }

    #[test]
    fn prepare_rejects_files_without_entries() {
        let err = prepare("hello\nworld\n", ExtractionMode::Plain, &Config::default()).unwrap_err();
        assert!(matches!(err, AppError::NoEntries));

        let err = prepare("  \n ", ExtractionMode::Plain, &Config::default()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn prepare_rejects_zero_length_video() {
        let input = "1\n00:00:00,000 --> 00:00:00,000\nSilence\n";
        let err = prepare(input, ExtractionMode::Plain, &Config::default()).unwrap_err();
        assert!(matches!(err, AppError::NoDurationBound));
    }

    #[test]
    fn custom_template_placeholders_are_filled() {
        let bound = DurationBound::new(Timecode::new(1, 2, 3, 0));
        let prompt = render_prompt("len={duration}; text={transcript}", &bound, "abc");
        assert_eq!(prompt, "len=01:02:03; text=abc");
    }

    #[tokio::test]
    async fn accepted_line_stream_filters_fragments() {
        let fragments = stream::iter(vec![
            Ok("🕒 Key moments:\n00:00 Wel".to_string()),
            Ok("come\n04:10 Building\n15:00 Made up\n09:5".to_string()),
            Ok("8 Wrap up".to_string()),
        ]);
        let bound = DurationBound::new(Timecode::new(0, 10, 0, 250));

        let emitted: Vec<String> = accepted_line_stream(fragments, bound)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            emitted,
            vec!["00:00 Welcome\n04:10 Building\n", "09:58 Wrap up\n"]
        );
    }

    #[tokio::test]
    async fn accepted_line_stream_passes_errors_through() {
        let fragments = stream::iter(vec![
            Ok("00:00 Intro\n".to_string()),
            Err(anyhow::anyhow!("connection reset")),
        ]);
        let bound = DurationBound::new(Timecode::new(0, 1, 0, 0));

        let items: Vec<anyhow::Result<String>> =
            accepted_line_stream(fragments, bound).collect().await;

        assert_eq!(items[0].as_ref().unwrap(), "00:00 Intro\n");
        assert!(items[1].is_err());
    }
}
