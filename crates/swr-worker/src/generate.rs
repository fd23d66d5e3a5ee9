//! GENERATE pipeline: run streetwarp over a single path input.
//!
//! PREPARING -> RUNNING_TOOL -> UPLOADING -> DONE, with failure reachable
//! from every stage. The caller owns workspace teardown and relay close.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use swr_media::{run_lines, CommandSpec, ExecError};
use swr_models::{classify_line, JobRequest, JobResult, ToolLine, VideoResult};
use swr_relay::ProgressRelay;
use swr_storage::BlobClient;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::workspace::JobWorkspace;

pub async fn run(
    req: &JobRequest,
    config: &WorkerConfig,
    workspace: &JobWorkspace,
    relay: &ProgressRelay,
    storage: Option<&BlobClient>,
) -> WorkerResult<JobResult> {
    // PREPARING: materialize the input and output locations.
    let input = workspace.file(format!("{}.{}", req.key, req.extension));
    tokio::fs::write(&input, &req.contents).await?;
    let output_dir = workspace.file("output");
    tokio::fs::create_dir_all(&output_dir).await?;
    let output = output_dir.join(format!("{}.mp4", req.key));

    let mut args = req.args.clone();
    args.push("--output-dir".to_string());
    args.push(output_dir.to_string_lossy().to_string());
    args.push("--output".to_string());
    args.push(output.to_string_lossy().to_string());
    args.push(input.to_string_lossy().to_string());
    if req.use_optimizer {
        match config.optimizer_entry() {
            Some(optimizer) => {
                args.push("--optimizer".to_string());
                args.push(optimizer);
            }
            None => warn!("optimizer requested but no optimizer entry point is configured"),
        }
    }

    // RUNNING_TOOL: classify stdout lines as progress vs candidate result;
    // the last non-progress object wins. stderr is diagnostics only.
    let spec = CommandSpec::new(&config.tool_bin)
        .args(args)
        .envs(config.tool_env());

    let mut last_result: Option<Value> = None;
    let mut stderr_lines: Vec<String> = Vec::new();
    let started = Instant::now();
    let code = run_lines(
        &spec,
        |line| {
            debug!(target: "streetwarp", "{}", truncate(line, 80));
            match classify_line(line) {
                Ok(ToolLine::Progress(payload)) => relay.send(&payload),
                Ok(ToolLine::Result(value)) => last_result = Some(value),
                Err(e) => warn!("could not parse streetwarp output: {e}"),
            }
        },
        |line| {
            debug!(target: "streetwarp", "err: {line}");
            stderr_lines.push(line.to_string());
        },
    )
    .await?;
    info!(
        key = %req.key,
        elapsed_ms = started.elapsed().as_millis() as u64,
        code,
        "streetwarp finished"
    );

    if code != 0 {
        error!(key = %req.key, args = ?spec.arg_vec(), "streetwarp failed");
        return Err(ExecError::tool_failed(
            &config.tool_bin,
            code,
            stderr_lines.join("\n"),
            spec.arg_vec().to_vec(),
        )
        .into());
    }
    let metadata = last_result.ok_or(WorkerError::NoResult)?;

    // UPLOADING: skipped on dry runs and when no backend is configured.
    let mut video_result = None;
    if !req.is_dry_run() {
        if let Some(storage) = storage {
            let artifact = req.artifact_key();
            let started = Instant::now();
            storage.upload_file(&output, &artifact, "video/mp4").await?;
            info!(
                key = %req.key,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "uploaded video"
            );
            video_result = Some(VideoResult {
                url: storage.object_url(&artifact),
            });
        }
    }

    Ok(JobResult {
        metadata_result: metadata,
        video_result,
    })
}

/// Char-boundary-safe prefix for log echoes of tool output.
fn truncate(line: &str, max_chars: usize) -> &str {
    match line.char_indices().nth(max_chars) {
        Some((i, _)) => &line[..i],
        None => line,
    }
}
