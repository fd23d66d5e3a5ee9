//! Job request model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which pipeline a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    /// Run streetwarp over a single path input.
    Generate,
    /// Download previously generated segments and concatenate them.
    Join,
}

/// Error produced when a request fails validation.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("key {0:?} is not filesystem-safe")]
    UnsafeKey(String),

    #[error("join request has no video URLs")]
    NoVideoUrls,
}

/// A single job invocation, immutable for the job's duration.
///
/// Field names match the JSON the caller sends (camelCase). GENERATE-only
/// and JOIN-only fields default to empty so either mode deserializes from
/// the same envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Identifier used to name input and output artifacts.
    pub key: String,

    /// Mode flag: true selects the JOIN pipeline.
    #[serde(default)]
    pub join_videos: bool,

    /// Input file suffix (GENERATE).
    #[serde(default)]
    pub extension: String,

    /// Raw text payload written to the input file (GENERATE).
    #[serde(default)]
    pub contents: String,

    /// Caller-supplied tool flags, passed through in order (GENERATE).
    #[serde(default)]
    pub args: Vec<String>,

    /// Whether to point streetwarp at the co-located path optimizer.
    #[serde(default)]
    pub use_optimizer: bool,

    /// Disambiguates parallel segments of the same logical job.
    #[serde(default)]
    pub index: Option<u32>,

    /// Segment URLs in concatenation order (JOIN).
    #[serde(default)]
    pub video_urls: Vec<String>,

    /// Progress relay target; connect failures are tolerated.
    #[serde(default)]
    pub callback_endpoint: Option<String>,

    /// Selects which storage credential set to use.
    #[serde(default)]
    pub upload_region: Option<String>,
}

impl JobRequest {
    /// Derive the pipeline mode from the request flag.
    pub fn mode(&self) -> JobMode {
        if self.join_videos {
            JobMode::Join
        } else {
            JobMode::Generate
        }
    }

    /// Validate fields that name filesystem paths or drive the pipeline.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.key.is_empty() || !self.key.chars().all(is_key_char) {
            return Err(RequestError::UnsafeKey(self.key.clone()));
        }
        if self.mode() == JobMode::Join && self.video_urls.is_empty() {
            return Err(RequestError::NoVideoUrls);
        }
        Ok(())
    }

    /// Storage key for this job's artifact.
    ///
    /// Indexed segments are disambiguated so parallel segments of one
    /// logical job never overwrite each other.
    pub fn artifact_key(&self) -> String {
        match self.index {
            Some(index) => format!("seg_{}_{}.mp4", self.key, index),
            None => format!("{}.mp4", self.key),
        }
    }

    /// Whether the caller asked to skip the upload stage.
    pub fn is_dry_run(&self) -> bool {
        self.args.iter().any(|a| a == "--dry-run")
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_flag() {
        let req: JobRequest =
            serde_json::from_str(r#"{"key":"abc","joinVideos":true,"videoUrls":["http://x/a.mp4"]}"#)
                .unwrap();
        assert_eq!(req.mode(), JobMode::Join);

        let req: JobRequest = serde_json::from_str(r#"{"key":"abc"}"#).unwrap();
        assert_eq!(req.mode(), JobMode::Generate);
    }

    #[test]
    fn test_generate_fields_camel_case() {
        let req: JobRequest = serde_json::from_str(
            r#"{
                "key": "abc",
                "extension": "gpx",
                "contents": "<gpx/>",
                "args": ["--frames", "30"],
                "useOptimizer": true,
                "callbackEndpoint": "ws://localhost:9000",
                "uploadRegion": "eu"
            }"#,
        )
        .unwrap();
        assert_eq!(req.extension, "gpx");
        assert!(req.use_optimizer);
        assert_eq!(req.callback_endpoint.as_deref(), Some("ws://localhost:9000"));
        assert_eq!(req.upload_region.as_deref(), Some("eu"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_unsafe_key_rejected() {
        for key in ["../etc", "a b", "", "a/b"] {
            let req: JobRequest =
                serde_json::from_str(&format!(r#"{{"key":{}}}"#, serde_json::json!(key))).unwrap();
            assert!(req.validate().is_err(), "key {:?} should be rejected", key);
        }
    }

    #[test]
    fn test_join_requires_urls() {
        let req: JobRequest =
            serde_json::from_str(r#"{"key":"abc","joinVideos":true}"#).unwrap();
        assert!(matches!(req.validate(), Err(RequestError::NoVideoUrls)));
    }

    #[test]
    fn test_artifact_key() {
        let mut req: JobRequest = serde_json::from_str(r#"{"key":"abc"}"#).unwrap();
        assert_eq!(req.artifact_key(), "abc.mp4");
        req.index = Some(3);
        assert_eq!(req.artifact_key(), "seg_abc_3.mp4");
    }

    #[test]
    fn test_dry_run_flag() {
        let req: JobRequest =
            serde_json::from_str(r#"{"key":"abc","args":["--dry-run"]}"#).unwrap();
        assert!(req.is_dry_run());
    }
}
