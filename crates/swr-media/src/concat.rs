//! Pairwise video concatenation through ffmpeg's concat demuxer.
//!
//! Each step consumes a two-entry file-list descriptor and stream-copies
//! (`-c copy`) the pair into a new file; no re-encode happens here.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::{run_lines, CommandSpec};
use crate::error::{ExecError, ExecResult};

/// Locate the muxer binary before starting a fold, so a missing tool fails
/// fast instead of on the first concatenation step.
pub fn check_muxer(program: &str) -> ExecResult<PathBuf> {
    which::which(program).map_err(|_| ExecError::NotFound {
        program: program.to_string(),
    })
}

/// Write the concat demuxer descriptor naming the accumulator and the next
/// segment, in that order.
pub async fn write_concat_list(path: &Path, first: &Path, second: &Path) -> std::io::Result<()> {
    let contents = format!("file '{}'\nfile '{}'\n", first.display(), second.display());
    tokio::fs::write(path, contents).await
}

/// Argument vector for one concatenation step.
pub fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Concatenate `first` and `second` into `output`. The descriptor file is
/// written next to the output and removed afterwards. Nonzero muxer exit is
/// fatal and carries the captured stderr.
pub async fn concat_pair(
    program: &str,
    env: &[(String, String)],
    first: &Path,
    second: &Path,
    output: &Path,
) -> ExecResult<()> {
    let list = output.with_extension("txt");
    write_concat_list(&list, first, second).await?;

    let spec = CommandSpec::new(program)
        .args(concat_args(&list, output))
        .envs(env.iter().cloned());

    let mut stderr_lines: Vec<String> = Vec::new();
    let code = run_lines(
        &spec,
        |line| debug!(target: "muxer", "{line}"),
        |line| stderr_lines.push(line.to_string()),
    )
    .await;

    let _ = tokio::fs::remove_file(&list).await;

    let code = code?;
    if code != 0 {
        return Err(ExecError::tool_failed(
            program,
            code,
            stderr_lines.join("\n"),
            spec.arg_vec().to_vec(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_descriptor_contents() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.txt");
        write_concat_list(&list, Path::new("/w/acc.mp4"), Path::new("/w/b.mp4"))
            .await
            .unwrap();
        let contents = tokio::fs::read_to_string(&list).await.unwrap();
        assert_eq!(contents, "file '/w/acc.mp4'\nfile '/w/b.mp4'\n");
    }

    #[test]
    fn test_concat_args_stream_copy() {
        let args = concat_args(Path::new("list.txt"), Path::new("out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f concat"));
        assert!(joined.contains("-c copy"));
        assert!(joined.ends_with("out.mp4"));
    }

    #[tokio::test]
    async fn test_concat_pair_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        // Stub muxer: complain on stderr and exit 1.
        let stub = dir.path().join("muxer");
        tokio::fs::write(&stub, "#!/bin/sh\necho 'broken input' >&2\nexit 1\n")
            .await
            .unwrap();
        make_executable(&stub);

        let err = concat_pair(
            &stub.to_string_lossy(),
            &[],
            &dir.path().join("a.mp4"),
            &dir.path().join("b.mp4"),
            &dir.path().join("out.mp4"),
        )
        .await
        .unwrap_err();

        match err {
            ExecError::ToolFailed { code, stderr, .. } => {
                assert_eq!(code, 1);
                assert!(stderr.contains("broken input"));
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
        // Descriptor cleaned up even on failure.
        assert!(!dir.path().join("out.txt").exists());
    }

    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
}
