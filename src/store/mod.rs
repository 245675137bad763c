// In-memory state shared by the HTTP handlers

pub mod forwarding;
pub mod upload;

pub use forwarding::{ForwardingStation, StagedFileSummary};
pub use upload::{FileState, ProcessingResult, UploadStore, UploadedFile};
