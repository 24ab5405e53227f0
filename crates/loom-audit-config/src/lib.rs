// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for Loom audit routing and delivery.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - The `audit.*` key families: default/fallback/endpoint sinks, per-category
//!   routing and storage pool sizing
//! - Consistent environment variable naming (`LOOM_AUDIT_*`)
//!
//! # Usage
//!
//! ```ignore
//! use loom_audit_config::load_config_with_file;
//!
//! let config = load_config_with_file("/etc/loom/audit.toml")?;
//! println!("default sink type: {:?}", config.default_sink.sink_type);
//! ```

pub mod error;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_AUDIT_*`)
/// 2. Config file (`/etc/loom/audit.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<AuditConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<AuditConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<AuditConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<AuditConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuditConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: AuditConfigLayer) -> Result<AuditConfig, ConfigError> {
	let config = layer.finalize();

	validate_config(&config)?;

	info!(
		default_sink_type = config.default_sink.sink_type.as_deref().unwrap_or("<none>"),
		fallback_configured = config.fallback_sink.is_some(),
		endpoints = config.endpoints.len(),
		routed_categories = config.routing.as_ref().map_or(0, |r| r.len()),
		threadpool_size = config.threadpool.size,
		max_queue_len = config.threadpool.max_queue_len,
		"Audit configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
///
/// Sink-level problems (missing or unknown types) are not errors here: the
/// sink provider logs and substitutes them so a bad endpoint never disables
/// auditing as a whole.
pub fn validate_config(config: &AuditConfig) -> Result<(), ConfigError> {
	if config.threadpool.max_queue_len == 0 {
		return Err(ConfigError::Validation(
			"audit.threadpool.max_queue_len must be greater than zero".to_string(),
		));
	}

	Ok(())
}
