//! JOIN pipeline: download segments and concatenate them pairwise.
//!
//! DOWNLOADING -> CONCATENATING -> UPLOADING -> DONE. Any single segment
//! failure fails the whole join; a join with a missing segment is
//! meaningless. The caller owns workspace teardown and relay close.

use std::path::PathBuf;
use std::time::Instant;

use futures::future::try_join_all;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use swr_media::{check_muxer, concat_pair};
use swr_models::{stage_event, JobRequest, JobResult, VideoResult};
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
    // DOWNLOADING: all segments concurrently, each on its own deadline.
    relay.send(&stage_event("Downloading video segments"));
    let client = reqwest::Client::new();
    let started = Instant::now();
    let files: Vec<PathBuf> = try_join_all(
        req.video_urls
            .iter()
            .enumerate()
            .map(|(i, url)| download_segment(&client, url, i, workspace, config)),
    )
    .await?;
    info!(
        key = %req.key,
        segments = files.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "downloaded video segments"
    );

    // CONCATENATING: left fold by pairwise stream copy. Both fold inputs
    // are deleted after each step to bound disk usage.
    relay.send(&stage_event("Joining video segments"));
    check_muxer(&config.muxer_bin)?;
    let env = config.tool_env();
    let started = Instant::now();
    let mut accumulator = files[0].clone();
    for (i, next) in files.iter().enumerate().skip(1) {
        let fold = workspace.file(format!("fold_{i}.mp4"));
        concat_pair(&config.muxer_bin, &env, &accumulator, next, &fold).await?;
        tokio::fs::remove_file(&accumulator).await?;
        tokio::fs::remove_file(next).await?;
        accumulator = fold;
    }
    let output = workspace.file(format!("{}.mp4", req.key));
    tokio::fs::rename(&accumulator, &output).await?;
    info!(
        key = %req.key,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "joined video segments"
    );

    // UPLOADING.
    let mut video_result = None;
    if let Some(storage) = storage {
        let artifact = req.artifact_key();
        storage.upload_file(&output, &artifact, "video/mp4").await?;
        video_result = Some(VideoResult {
            url: storage.object_url(&artifact),
        });
    }

    Ok(JobResult {
        metadata_result: serde_json::json!({ "segments": req.video_urls.len() }),
        video_result,
    })
}

async fn download_segment(
    client: &reqwest::Client,
    url: &str,
    index: usize,
    workspace: &JobWorkspace,
    config: &WorkerConfig,
) -> WorkerResult<PathBuf> {
    let path = workspace.file(segment_file_name(url, index));
    debug!(url, dest = %path.display(), "fetching segment");

    let fetch = async {
        let mut response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| e.to_string())?;
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        }
        file.flush().await.map_err(|e| e.to_string())?;
        Ok::<(), String>(())
    };

    match tokio::time::timeout(config.download_timeout, fetch).await {
        Ok(Ok(())) => Ok(path),
        Ok(Err(e)) => Err(WorkerError::fetch_failed(format!("{url}: {e}"))),
        Err(_) => Err(WorkerError::fetch_failed(format!("{url}: timed out"))),
    }
}

/// Segment files are named by the URL's final path segment, sanitized for
/// the local filesystem and prefixed with the segment's position. Two URLs
/// sharing a final path segment must not download to the same file.
fn segment_file_name(url: &str, index: usize) -> String {
    let name = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let name: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        format!("segment_{index}.mp4")
    } else {
        format!("{index}_{name}")
    }
}
