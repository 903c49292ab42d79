pub mod chapterizer;
pub mod duration;
pub mod export;
pub mod llm;
pub mod srt;
pub mod validator;
