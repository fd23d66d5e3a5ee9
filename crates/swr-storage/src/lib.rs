//! Blob storage for the streetwarp job runner.

pub mod client;
pub mod error;

pub use client::{BlobClient, BlobConfig, DEFAULT_UPLOAD_REGION};
pub use error::{StorageError, StorageResult};
