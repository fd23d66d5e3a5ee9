//! External command runner with line-oriented dual-stream capture.
//!
//! `run_lines` spawns a tool with an explicit environment, drains stdout
//! and stderr concurrently (a stall on one stream never blocks the other),
//! invokes a callback per decoded line, and returns the exit code after
//! both streams close and the process terminates. Nonzero exit is not an
//! error here; that policy belongs to the caller.

use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::{ExecError, ExecResult};

/// Default per-line buffer ceiling, matching the runaway-output bound the
/// tool contract was tested against.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Specification of one external command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    line_limit: usize,
}

impl CommandSpec {
    /// Create a spec with an empty environment.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            line_limit: MAX_LINE_BYTES,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable. The child sees only what is set here;
    /// the parent environment is not inherited.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Override the per-line buffer ceiling.
    pub fn line_limit(mut self, limit: usize) -> Self {
        self.line_limit = limit;
        self
    }

    /// The program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector.
    pub fn arg_vec(&self) -> &[String] {
        &self.args
    }
}

/// Outcome of one bounded line read.
enum LineRead {
    Line,
    Eof,
    TooLong,
}

/// Read one line into `buf`, stopping at the limit instead of buffering a
/// runaway line. Built on `fill_buf` so a cancelled read loses nothing.
async fn read_line_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<LineRead> {
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead::Eof);
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if buf.len() + pos > limit {
                    return Ok(LineRead::TooLong);
                }
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                return Ok(LineRead::Line);
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
                if buf.len() > limit {
                    return Ok(LineRead::TooLong);
                }
            }
        }
    }
}

fn emit<F: FnMut(&str)>(buf: &mut Vec<u8>, callback: &mut F) {
    let text = String::from_utf8_lossy(buf);
    callback(text.trim_end_matches('\r'));
    buf.clear();
}

/// Run a command, invoking `on_stdout` / `on_stderr` once per line with the
/// terminator stripped. Returns the process exit code.
pub async fn run_lines<O, E>(
    spec: &CommandSpec,
    mut on_stdout: O,
    mut on_stderr: E,
) -> ExecResult<i32>
where
    O: FnMut(&str),
    E: FnMut(&str),
{
    debug!(program = %spec.program, "running: {} {}", spec.program, spec.args.join(" "));

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .env_clear()
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::SpawnFailed {
            program: spec.program.clone(),
            source,
        })?;

    let stdout = child.stdout.take().expect("stdout not captured");
    let stderr = child.stderr.take().expect("stderr not captured");
    let mut out_reader = BufReader::with_capacity(64 * 1024, stdout);
    let mut err_reader = BufReader::with_capacity(64 * 1024, stderr);

    let mut out_buf: Vec<u8> = Vec::new();
    let mut err_buf: Vec<u8> = Vec::new();
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        let (read, is_out) = tokio::select! {
            read = read_line_bounded(&mut out_reader, &mut out_buf, spec.line_limit), if out_open => {
                (read?, true)
            }
            read = read_line_bounded(&mut err_reader, &mut err_buf, spec.line_limit), if err_open => {
                (read?, false)
            }
        };
        let buf = if is_out { &mut out_buf } else { &mut err_buf };
        match read {
            LineRead::Line => {
                if is_out {
                    emit(buf, &mut on_stdout);
                } else {
                    emit(buf, &mut on_stderr);
                }
            }
            LineRead::Eof => {
                // Final line may arrive without a terminator.
                if !buf.is_empty() {
                    if is_out {
                        emit(buf, &mut on_stdout);
                    } else {
                        emit(buf, &mut on_stderr);
                    }
                }
                if is_out {
                    out_open = false;
                } else {
                    err_open = false;
                }
            }
            LineRead::TooLong => {
                let _ = child.kill().await;
                return Err(ExecError::LineTooLong {
                    program: spec.program.clone(),
                    limit: spec.line_limit,
                });
            }
        }
    }

    let status = child.wait().await?;
    Ok(status.code().unwrap_or(-1))
}
