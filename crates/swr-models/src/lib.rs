//! Shared data models for the streetwarp job runner.

pub mod job;
pub mod progress;
pub mod response;

pub use job::{JobMode, JobRequest, RequestError};
pub use progress::{classify_line, stage_event, RelayEnvelope, ToolLine};
pub use response::{JobResponse, JobResult, VideoResult};
