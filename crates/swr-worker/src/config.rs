//! Runner configuration.

use std::time::Duration;

/// Runner configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch root for GENERATE working directories (ephemeral local storage)
    pub work_dir: String,
    /// Shared-volume root for JOIN working directories (join inputs can be
    /// large and are shared across worker instances)
    pub join_work_dir: String,
    /// Generation tool binary
    pub tool_bin: String,
    /// Muxer binary used for pairwise concatenation
    pub muxer_bin: String,
    /// Directory of co-located tool binaries, prepended to the child PATH
    pub bin_dir: Option<String>,
    /// Path optimizer entry point; derived from `bin_dir` when unset
    pub optimizer_path: Option<String>,
    /// Overall invocation deadline
    pub job_timeout: Duration,
    /// Per-segment download deadline (JOIN)
    pub download_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: "/tmp/streetwarp".to_string(),
            join_work_dir: "/mnt/shared/streetwarp".to_string(),
            tool_bin: "streetwarp".to_string(),
            muxer_bin: "ffmpeg".to_string(),
            bin_dir: None,
            optimizer_path: None,
            job_timeout: Duration::from_secs(900), // 15 minutes
            download_timeout: Duration::from_secs(120),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("RUNNER_WORK_DIR").unwrap_or(defaults.work_dir),
            join_work_dir: std::env::var("RUNNER_JOIN_WORK_DIR").unwrap_or(defaults.join_work_dir),
            tool_bin: std::env::var("RUNNER_TOOL_BIN").unwrap_or(defaults.tool_bin),
            muxer_bin: std::env::var("RUNNER_MUXER_BIN").unwrap_or(defaults.muxer_bin),
            bin_dir: std::env::var("RUNNER_BIN_DIR").ok(),
            optimizer_path: std::env::var("RUNNER_OPTIMIZER_PATH").ok(),
            job_timeout: Duration::from_secs(
                std::env::var("RUNNER_JOB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            download_timeout: Duration::from_secs(
                std::env::var("RUNNER_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }

    /// Explicit environment for spawned tools. The co-located bin directory
    /// is prepended to PATH since the tool binaries are not system
    /// resources.
    pub fn tool_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        let system_path = std::env::var("PATH").unwrap_or_default();
        let path = match &self.bin_dir {
            Some(bin) if !system_path.is_empty() => format!("{bin}:{system_path}"),
            Some(bin) => bin.clone(),
            None => system_path,
        };
        if !path.is_empty() {
            env.push(("PATH".to_string(), path));
        }
        env.push(("RUST_BACKTRACE".to_string(), "1".to_string()));
        env
    }

    /// Optimizer entry point for `--optimizer`, if one is available.
    pub fn optimizer_entry(&self) -> Option<String> {
        self.optimizer_path.clone().or_else(|| {
            self.bin_dir
                .as_ref()
                .map(|bin| format!("{bin}/path_optimizer/main.py"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_env_prepends_bin_dir() {
        let config = WorkerConfig {
            bin_dir: Some("/opt/res/bin".to_string()),
            ..Default::default()
        };
        let env = config.tool_env();
        let path = &env.iter().find(|(k, _)| k == "PATH").unwrap().1;
        assert!(path.starts_with("/opt/res/bin"));
        assert!(env.iter().any(|(k, v)| k == "RUST_BACKTRACE" && v == "1"));
    }

    #[test]
    fn test_optimizer_derived_from_bin_dir() {
        let config = WorkerConfig {
            bin_dir: Some("/opt/res/bin".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.optimizer_entry().as_deref(),
            Some("/opt/res/bin/path_optimizer/main.py")
        );

        let config = WorkerConfig {
            optimizer_path: Some("/custom/opt.py".to_string()),
            bin_dir: Some("/opt/res/bin".to_string()),
            ..Default::default()
        };
        assert_eq!(config.optimizer_entry().as_deref(), Some("/custom/opt.py"));
    }
}
