//! Streetwarp job runner: pipelines, lifecycle, and dispatch.

pub mod config;
pub mod error;
pub mod generate;
pub mod handler;
pub mod join;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use handler::JobRunner;
pub use workspace::JobWorkspace;
