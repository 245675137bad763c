// File intake: reading uploads and summarizing them for the chat prompt

pub mod reader;
pub mod summarizer;

pub use reader::{FileHandle, ReadError};
pub use summarizer::{classify, summarize, FileKind, SummaryOutcome, SummaryPayload};
