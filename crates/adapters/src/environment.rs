use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{AdapterError, Result};
use crate::subprocess::{run_capture_stdout, SubprocessSpec};

/// Declarative description of an adapter's external environment: the
/// directory holding its model weights and Python package set, plus the
/// binaries that must be reachable before anything can run.
#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
	pub name: String,
	pub root: PathBuf,
	pub python_packages: Vec<String>,
	pub required_binaries: Vec<String>,
}

/// Prepares and tracks readiness of one adapter's environment. Preparation
/// is idempotent per process lifetime; a failure leaves the environment
/// not-ready so selection retries it later.
pub struct AdapterEnvironment {
	spec: EnvironmentSpec,
	ready: AtomicBool,
}

impl AdapterEnvironment {
	#[must_use]
	pub fn new(spec: EnvironmentSpec) -> Self {
		Self {
			spec,
			ready: AtomicBool::new(false),
		}
	}

	#[must_use]
	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::Relaxed)
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.spec.root
	}

	/// Interpreter inside the materialized package environment.
	#[must_use]
	pub fn python(&self) -> PathBuf {
		self.spec.root.join("venv").join("bin").join("python")
	}

	pub async fn prepare(&self) -> Result<()> {
		if self.ready.load(Ordering::Relaxed) {
			return Ok(());
		}

		for binary in &self.spec.required_binaries {
			if find_binary(binary).is_none() {
				return Err(AdapterError::Preparation(format!("required binary `{binary}` not found on PATH")));
			}
		}

		tokio::fs::create_dir_all(&self.spec.root)
			.await
			.map_err(|e| AdapterError::Preparation(format!("cannot create {}: {e}", self.spec.root.display())))?;

		if !self.spec.python_packages.is_empty() {
			self.materialize_packages().await?;
		}

		self.ready.store(true, Ordering::Relaxed);
		info!(environment = %self.spec.name, "adapter environment ready");
		Ok(())
	}

	/// Builds the per-adapter venv once; a marker file skips the work on
	/// later processes sharing the same data root.
	async fn materialize_packages(&self) -> Result<()> {
		let marker = self.spec.root.join(".ready");
		if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
			debug!(environment = %self.spec.name, "package environment already materialized");
			return Ok(());
		}

		let cancel = CancellationToken::new();
		let venv = self.spec.root.join("venv");

		let create = SubprocessSpec::new("uv", vec!["venv".to_string(), venv.display().to_string()]);
		run_capture_stdout(&create, &cancel)
			.await
			.map_err(|e| AdapterError::Preparation(format!("uv venv failed for {}: {e}", self.spec.name)))?;

		let mut args = vec!["pip".to_string(), "install".to_string(), "--python".to_string(), self.python().display().to_string()];
		args.extend(self.spec.python_packages.iter().cloned());
		let install = SubprocessSpec::new("uv", args);
		run_capture_stdout(&install, &cancel)
			.await
			.map_err(|e| AdapterError::Preparation(format!("uv pip install failed for {}: {e}", self.spec.name)))?;

		tokio::fs::write(&marker, b"ok")
			.await
			.map_err(|e| AdapterError::Preparation(format!("cannot write readiness marker: {e}")))?;
		Ok(())
	}
}

/// PATH lookup without shelling out.
#[must_use]
pub fn find_binary(name: &str) -> Option<PathBuf> {
	let path = std::env::var_os("PATH")?;
	std::env::split_paths(&path).map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}
