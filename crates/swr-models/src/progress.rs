//! Classification of streetwarp stdout lines and the relay wire format.
//!
//! The tool emits newline-delimited JSON on stdout. Lines tagged PROGRESS
//! or PROGRESS_STAGE are live progress and get forwarded to the relay;
//! every other well-formed object is a candidate result, and the last one
//! emitted wins (the tool may echo intermediate result objects).

use serde::Serialize;
use serde_json::Value;

const PROGRESS_TYPES: [&str; 2] = ["PROGRESS", "PROGRESS_STAGE"];

/// One classified stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolLine {
    /// Forward to the progress relay, do not retain.
    Progress(Value),
    /// Retain as a candidate metadata result.
    Result(Value),
}

/// Parse one stdout line. Malformed JSON surfaces as the parse error so the
/// caller can log and discard it without aborting the job.
pub fn classify_line(line: &str) -> Result<ToolLine, serde_json::Error> {
    let value: Value = serde_json::from_str(line)?;
    let is_progress = value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| PROGRESS_TYPES.contains(&t));
    if is_progress {
        Ok(ToolLine::Progress(value))
    } else {
        Ok(ToolLine::Result(value))
    }
}

/// Build a synthetic stage event, used by the JOIN pipeline for the
/// download and concatenation stages.
pub fn stage_event(stage: &str) -> Value {
    serde_json::json!({ "type": "PROGRESS_STAGE", "stage": stage })
}

/// Envelope wrapping a progress payload before it goes over the relay.
#[derive(Debug, Serialize)]
pub struct RelayEnvelope<'a> {
    pub payload: &'a Value,
    pub key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}
