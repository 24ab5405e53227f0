// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::sections::{AuditConfigLayer, ThreadPoolConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<AuditConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<AuditConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(AuditConfigLayer::default())
	}
}

/// Root of an audit config file; everything lives under `[audit]`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AuditFile {
	audit: Option<AuditConfigLayer>,
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/audit.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<AuditConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(AuditConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let file: AuditFile = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed audit config layer from TOML");
		Ok(file.audit.unwrap_or_default())
	}
}

/// Environment variable source.
///
/// Convention: LOOM_AUDIT_<SECTION>_<FIELD>. Only scalar settings are
/// reachable from the environment; sinks and routes come from the file.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<AuditConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_audit_from_env(|name| std::env::var(name).ok())
	}
}

fn load_audit_from_env<F>(lookup: F) -> Result<AuditConfigLayer, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

	let threadpool = ThreadPoolConfigLayer {
		size: parse_var(&var, "LOOM_AUDIT_THREADPOOL_SIZE")?,
		max_queue_len: parse_var(&var, "LOOM_AUDIT_THREADPOOL_MAX_QUEUE_LEN")?,
		shutdown_grace_ms: parse_var(&var, "LOOM_AUDIT_THREADPOOL_SHUTDOWN_GRACE_MS")?,
	};

	Ok(AuditConfigLayer {
		sink_type: var("LOOM_AUDIT_TYPE"),
		config: None,
		routing: None,
		threadpool: Some(threadpool),
	})
}

fn parse_var<T, F>(var: F, name: &str) -> Result<Option<T>, ConfigError>
where
	T: std::str::FromStr,
	F: Fn(&str) -> Option<String>,
{
	match var(name) {
		Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!(
				"invalid {} value '{v}'",
				std::any::type_name::<T>()
			),
		}),
		None => Ok(None),
	}
}
