//! Job response model (lambda-shaped status code + JSON string body).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Location of an uploaded artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoResult {
    pub url: String,
}

/// Successful job payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// The tool's final metadata object (last non-progress stdout line).
    pub metadata_result: Value,

    /// Present unless the request was a dry run or storage is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_result: Option<VideoResult>,
}

/// The invocation response: status code plus a JSON-encoded body, matching
/// the proxy-integration shape the caller expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub status_code: u16,
    pub body: String,
}

impl JobResponse {
    /// 200 with the serialized result as the body.
    pub fn ok(result: &JobResult) -> Self {
        Self {
            status_code: 200,
            // JobResult serialization cannot fail: it is a Value plus strings.
            body: serde_json::to_string(result).unwrap_or_default(),
        }
    }

    /// 500 with `{"error": message}` as the body.
    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self {
            status_code: 500,
            body: serde_json::json!({ "error": message.to_string() }).to_string(),
        }
    }
}
