use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};
use crate::ProgressUpdate;

/// Grace period between SIGTERM and SIGKILL.
pub const TERM_GRACE: Duration = Duration::from_secs(8);

const STDERR_RING_LINES: usize = 200;
const STDERR_TAIL_LINES: usize = 25;

/// Fully describes one external process invocation. Built deterministically
/// from an adapter's schema and the job's parameters.
#[derive(Debug, Clone)]
pub struct SubprocessSpec {
	pub program: String,
	pub args: Vec<String>,
	pub envs: Vec<(String, String)>,
	pub current_dir: Option<PathBuf>,
}

impl SubprocessSpec {
	#[must_use]
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
			envs: Vec::new(),
			current_dir: None,
		}
	}
}

/// Bounded buffer over a child's stderr, used for progress inference while
/// running and failure diagnostics afterwards.
#[derive(Debug)]
pub struct StderrRing {
	lines: VecDeque<String>,
	capacity: usize,
}

impl StderrRing {
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self {
			lines: VecDeque::with_capacity(capacity),
			capacity: capacity.max(1),
		}
	}

	pub fn push(&mut self, line: String) {
		if self.lines.len() == self.capacity {
			self.lines.pop_front();
		}
		self.lines.push_back(line);
	}

	#[must_use]
	pub fn tail(&self, count: usize) -> String {
		let skip = self.lines.len().saturating_sub(count);
		self.lines.iter().skip(skip).cloned().collect::<Vec<_>>().join("\n")
	}
}

#[cfg(unix)]
fn configure_process_group(cmd: &mut Command) {
	// The child becomes its own process-group leader so a signal to the
	// negative pid reaches everything it forked.
	unsafe {
		cmd.pre_exec(|| {
			libc::setpgid(0, 0);
			Ok(())
		});
	}
}

#[cfg(not(unix))]
fn configure_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
	unsafe {
		// Negative pid: signal the whole process group.
		libc::kill(-(pid as i32), libc::SIGTERM);
	}
}

async fn terminate(child: &mut Child) {
	#[cfg(unix)]
	if let Some(pid) = child.id() {
		debug!(pid, "sending SIGTERM");
		send_sigterm(pid);
		if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok() {
			return;
		}
		warn!(pid, "process ignored SIGTERM, escalating to SIGKILL");
	}

	let _ = child.start_kill();
	let _ = child.wait().await;
}

fn spawn(spec: &SubprocessSpec, stdout: Stdio) -> Result<Child> {
	let mut cmd = Command::new(&spec.program);
	cmd.args(&spec.args).stdin(Stdio::null()).stdout(stdout).stderr(Stdio::piped()).kill_on_drop(true);
	for (key, value) in &spec.envs {
		cmd.env(key, value);
	}
	if let Some(dir) = &spec.current_dir {
		cmd.current_dir(dir);
	}
	configure_process_group(&mut cmd);
	cmd.spawn().map_err(|e| AdapterError::Execution {
		message: format!("failed to spawn {}: {e}", spec.program),
		stderr_tail: String::new(),
	})
}

/// Run a process whose result is a JSON sidecar file. stderr is captured
/// into a bounded ring and surfaced line by line via `on_stderr`.
/// Cancellation delivers SIGTERM and escalates to SIGKILL after
/// [`TERM_GRACE`]. A missing or malformed sidecar is a failed outcome.
pub async fn run_to_sidecar(
	spec: &SubprocessSpec,
	sidecar_path: &Path,
	cancel: &CancellationToken,
	on_stderr: Option<&(dyn Fn(&str) + Send + Sync)>,
) -> Result<serde_json::Value> {
	let mut child = spawn(spec, Stdio::null())?;
	let stderr = child.stderr.take().ok_or_else(|| AdapterError::Execution {
		message: "child stderr was not captured".to_string(),
		stderr_tail: String::new(),
	})?;

	let mut lines = BufReader::new(stderr).lines();
	let mut ring = StderrRing::new(STDERR_RING_LINES);

	let status = loop {
		tokio::select! {
			line = lines.next_line() => match line {
				Ok(Some(line)) => {
					if let Some(callback) = on_stderr {
						callback(&line);
					}
					ring.push(line);
				}
				Ok(None) => break child.wait().await?,
				Err(e) => {
					ring.push(format!("stderr read failed: {e}"));
					break child.wait().await?;
				}
			},
			() = cancel.cancelled() => {
				terminate(&mut child).await;
				return Err(AdapterError::Cancelled);
			}
		}
	};

	if !status.success() {
		return Err(AdapterError::Execution {
			message: format!("{} exited with {status}", spec.program),
			stderr_tail: ring.tail(STDERR_TAIL_LINES),
		});
	}

	let bytes = tokio::fs::read(sidecar_path).await.map_err(|e| AdapterError::Execution {
		message: format!("result sidecar {} unreadable: {e}", sidecar_path.display()),
		stderr_tail: ring.tail(STDERR_TAIL_LINES),
	})?;

	serde_json::from_slice(&bytes).map_err(|e| AdapterError::ResultParse(format!("sidecar {} is not valid JSON: {e}", sidecar_path.display())))
}

/// Run a process and capture its stdout as UTF-8, under the same
/// cancellation rules as [`run_to_sidecar`].
pub async fn run_capture_stdout(spec: &SubprocessSpec, cancel: &CancellationToken) -> Result<String> {
	let mut child = spawn(spec, Stdio::piped())?;
	let stdout = child.stdout.take().ok_or_else(|| AdapterError::Execution {
		message: "child stdout was not captured".to_string(),
		stderr_tail: String::new(),
	})?;
	let stderr = child.stderr.take().ok_or_else(|| AdapterError::Execution {
		message: "child stderr was not captured".to_string(),
		stderr_tail: String::new(),
	})?;

	let mut out_lines = BufReader::new(stdout).lines();
	let mut err_lines = BufReader::new(stderr).lines();
	let mut ring = StderrRing::new(STDERR_RING_LINES);
	let mut collected = String::new();
	let mut out_done = false;
	let mut err_done = false;

	let status = loop {
		tokio::select! {
			line = out_lines.next_line(), if !out_done => match line {
				Ok(Some(line)) => {
					collected.push_str(&line);
					collected.push('\n');
				}
				_ => out_done = true,
			},
			line = err_lines.next_line(), if !err_done => match line {
				Ok(Some(line)) => ring.push(line),
				_ => err_done = true,
			},
			() = cancel.cancelled() => {
				terminate(&mut child).await;
				return Err(AdapterError::Cancelled);
			}
			status = child.wait(), if out_done && err_done => break status?,
		}
	};

	if !status.success() {
		return Err(AdapterError::Execution {
			message: format!("{} exited with {status}", spec.program),
			stderr_tail: ring.tail(STDERR_TAIL_LINES),
		});
	}

	Ok(collected)
}

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)(\d{1,3})(?:\.\d+)?%").expect("progress regex"));

/// Infer a progress fraction from an engine's stderr line. Engines print
/// tqdm-style `stage: 45%|...` lines; anything else yields nothing.
#[must_use]
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
	let captures = PROGRESS_RE.captures(line)?;
	let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
	if percent > 100.0 {
		return None;
	}

	let stage = line
		.split(':')
		.next()
		.map(str::trim)
		.filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic() || c == '_' || c == ' '))
		.unwrap_or("processing")
		.to_string();

	Some(ProgressUpdate {
		fraction: percent / 100.0,
		stage,
	})
}
