//! Job dispatch: one request in, one response out.
//!
//! All fatal pipeline errors are caught here and mapped to the uniform
//! failure response; the working directory is removed and the relay closed
//! on every path out, including timeout.

use tracing::{error, info, warn};

use swr_models::{JobMode, JobRequest, JobResponse};
use swr_relay::ProgressRelay;
use swr_storage::{BlobClient, BlobConfig};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::workspace::JobWorkspace;
use crate::{generate, join};

/// Executes job requests with the process-wide configuration.
pub struct JobRunner {
    config: WorkerConfig,
}

impl JobRunner {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Run one job to completion and produce its response. Never panics or
    /// propagates an error; every outcome is a `JobResponse`.
    pub async fn handle(&self, req: JobRequest) -> JobResponse {
        info!(
            key = %req.key,
            mode = ?req.mode(),
            args = ?req.args,
            callback = ?req.callback_endpoint,
            contents = %req.contents.chars().take(100).collect::<String>(),
            "handling job request"
        );

        if let Err(e) = req.validate() {
            error!(key = %req.key, "rejected request: {e}");
            return JobResponse::failure(e);
        }

        let base = match req.mode() {
            JobMode::Generate => &self.config.work_dir,
            JobMode::Join => &self.config.join_work_dir,
        };

        // The relay connect runs concurrently with workspace allocation and
        // never blocks the job: the handshake deadline is capped by the job
        // deadline, and a missed handshake degrades to an inert relay.
        let (workspace, relay) = tokio::join!(
            JobWorkspace::create(base, &req.key),
            ProgressRelay::connect_with_timeout(
                req.callback_endpoint.as_deref(),
                req.key.as_str(),
                req.index,
                swr_relay::CONNECT_TIMEOUT.min(self.config.job_timeout),
            ),
        );
        let workspace = match workspace {
            Ok(w) => w,
            Err(e) => {
                relay.close().await;
                return JobResponse::failure(format!("could not allocate working directory: {e}"));
            }
        };

        let outcome = self.run_pipeline(&req, &workspace, &relay).await;

        let response = match outcome {
            Ok(result) => JobResponse::ok(&result),
            Err(e) => {
                error!(key = %req.key, "job failed: {e}");
                JobResponse::failure(e)
            }
        };

        // Guaranteed cleanup, success or failure.
        if let Err(e) = workspace.cleanup().await {
            warn!(key = %req.key, "could not remove working directory: {e}");
        }
        relay.close().await;

        response
    }

    async fn run_pipeline(
        &self,
        req: &JobRequest,
        workspace: &JobWorkspace,
        relay: &ProgressRelay,
    ) -> WorkerResult<swr_models::JobResult> {
        let job = async {
            // Storage selection is resolved per job from the request's
            // upload region; no configuration disables upload entirely.
            let storage = match BlobConfig::resolve(req.upload_region.as_deref()) {
                Some(config) => Some(BlobClient::new(config).await?),
                None => None,
            };
            match req.mode() {
                JobMode::Generate => {
                    generate::run(req, &self.config, workspace, relay, storage.as_ref()).await
                }
                JobMode::Join => {
                    join::run(req, &self.config, workspace, relay, storage.as_ref()).await
                }
            }
        };

        // On deadline the pipeline future is dropped; spawned tools die
        // with it (kill_on_drop) and cleanup still runs in the caller.
        match tokio::time::timeout(self.config.job_timeout, job).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout(self.config.job_timeout.as_secs())),
        }
    }
}
