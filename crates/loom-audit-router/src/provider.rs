// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds the live set of sinks from configuration.
//!
//! Construction order is fixed: the fallback sink first, then the default
//! sink, then the named endpoints, each wired to the same fallback. The
//! fallback itself has no fallback, so every chain terminates after one hop.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use loom_audit_config::{AuditConfig, SinkConfig};
use tracing::{debug, error, info, warn};

use crate::error::{AuditError, AuditResult};
use crate::registry::{SinkContext, SinkRegistry};
use crate::sink::debug::{DebugTransport, DEBUG_SINK_TYPE};
use crate::sink::{close_sinks, panic_message, AuditSink, DeliveryMode};

/// Name of the default sink; usable in routing lists.
pub const DEFAULT_SINK_NAME: &str = "default";
/// Name of the fallback sink; reserved, not routable.
pub const FALLBACK_SINK_NAME: &str = "fallback";

pub struct SinkProvider {
	default_sink: Arc<AuditSink>,
	fallback_sink: Arc<AuditSink>,
	/// Keyed by lowercase name; includes the default sink.
	sinks: HashMap<String, Arc<AuditSink>>,
}

impl SinkProvider {
	pub fn new(config: &AuditConfig, registry: &SinkRegistry, ctx: &SinkContext) -> Self {
		let fallback_sink = Arc::new(build_fallback(config.fallback_sink.as_ref(), registry, ctx));
		let default_sink = Arc::new(build_default(
			&config.default_sink,
			registry,
			ctx,
			&fallback_sink,
		));

		let mut sinks = HashMap::new();
		sinks.insert(DEFAULT_SINK_NAME.to_string(), Arc::clone(&default_sink));

		for (name, sink_config) in &config.endpoints {
			match build_endpoint(name, sink_config, registry, ctx, &fallback_sink, &sinks) {
				Ok(sink) => {
					debug!(sink = %name, sink_type = %sink.sink_type(), "built audit endpoint");
					sinks.insert(name.trim().to_ascii_lowercase(), Arc::new(sink));
				}
				Err(e) => {
					error!(sink = %name, error = %e, "skipping invalid audit endpoint");
				}
			}
		}

		info!(
			default_sink_type = %default_sink.sink_type(),
			fallback_sink_type = %fallback_sink.sink_type(),
			endpoints = sinks.len() - 1,
			"audit sink provider built"
		);

		Self {
			default_sink,
			fallback_sink,
			sinks,
		}
	}

	/// Case-insensitive lookup. `default` resolves to the default sink.
	pub fn get_sink(&self, name: &str) -> Option<Arc<AuditSink>> {
		self.sinks.get(&name.to_ascii_lowercase()).cloned()
	}

	pub fn default_sink(&self) -> &Arc<AuditSink> {
		&self.default_sink
	}

	pub fn fallback_sink(&self) -> &Arc<AuditSink> {
		&self.fallback_sink
	}

	/// All routable sinks by lowercase name.
	pub fn sinks(&self) -> &HashMap<String, Arc<AuditSink>> {
		&self.sinks
	}

	pub fn sink_names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.sinks.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	/// Close every sink, the fallback last. Failures are logged and returned.
	pub async fn close(&self) -> Vec<AuditError> {
		let mut errors = close_sinks(self.sinks.values()).await;
		errors.extend(close_sinks(std::iter::once(&self.fallback_sink)).await);
		errors
	}
}

impl std::fmt::Debug for SinkProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SinkProvider")
			.field("default_sink", &self.default_sink.name())
			.field("fallback_sink", &self.fallback_sink.name())
			.field("sinks", &self.sink_names())
			.finish()
	}
}

fn build_fallback(
	config: Option<&SinkConfig>,
	registry: &SinkRegistry,
	ctx: &SinkContext,
) -> AuditSink {
	let Some(config) = config else {
		debug!("no fallback audit sink configured, using debug sink");
		return diagnostic_sink(FALLBACK_SINK_NAME, ctx, None);
	};

	match build_sink(FALLBACK_SINK_NAME, config, registry, ctx, None) {
		Ok(sink) => sink,
		Err(e) => {
			error!(error = %e, "invalid fallback audit sink, using debug sink");
			diagnostic_sink(FALLBACK_SINK_NAME, ctx, None)
		}
	}
}

fn build_default(
	config: &SinkConfig,
	registry: &SinkRegistry,
	ctx: &SinkContext,
	fallback: &Arc<AuditSink>,
) -> AuditSink {
	match build_sink(DEFAULT_SINK_NAME, config, registry, ctx, Some(fallback)) {
		Ok(sink) => sink,
		Err(AuditError::MissingSinkType { .. }) => {
			warn!("no default audit sink type configured, using debug sink");
			diagnostic_sink(DEFAULT_SINK_NAME, ctx, Some(fallback))
		}
		Err(e) => {
			error!(error = %e, "invalid default audit sink, using debug sink");
			diagnostic_sink(DEFAULT_SINK_NAME, ctx, Some(fallback))
		}
	}
}

fn build_endpoint(
	name: &str,
	config: &SinkConfig,
	registry: &SinkRegistry,
	ctx: &SinkContext,
	fallback: &Arc<AuditSink>,
	existing: &HashMap<String, Arc<AuditSink>>,
) -> AuditResult<AuditSink> {
	let key = name.trim().to_ascii_lowercase();
	if key.is_empty() {
		return Err(AuditError::InvalidSettings {
			sink: name.to_string(),
			message: "sink name must not be empty".to_string(),
		});
	}
	if key == DEFAULT_SINK_NAME || key == FALLBACK_SINK_NAME {
		return Err(AuditError::ReservedSinkName {
			sink: name.to_string(),
		});
	}
	if existing.contains_key(&key) {
		return Err(AuditError::DuplicateSinkName {
			sink: name.to_string(),
		});
	}
	build_sink(name, config, registry, ctx, Some(fallback))
}

fn build_sink(
	name: &str,
	config: &SinkConfig,
	registry: &SinkRegistry,
	ctx: &SinkContext,
	fallback: Option<&Arc<AuditSink>>,
) -> AuditResult<AuditSink> {
	let sink_type = config
		.sink_type
		.as_deref()
		.ok_or_else(|| AuditError::MissingSinkType {
			sink: name.to_string(),
		})?;
	let factory = registry
		.get(sink_type)
		.ok_or_else(|| AuditError::UnknownSinkType {
			sink: name.to_string(),
			sink_type: sink_type.to_string(),
		})?;

	let transport = catch_unwind(AssertUnwindSafe(|| {
		factory.build(name, &config.settings, ctx)
	}))
	.map_err(|panic| AuditError::InvalidSettings {
		sink: name.to_string(),
		message: format!("sink factory panicked: {}", panic_message(panic.as_ref())),
	})??;

	let sink = AuditSink::new(
		name,
		sink_type.to_ascii_lowercase(),
		factory.delivery_mode(),
		transport,
	)
	.with_diagnostics(ctx.diagnostics())
	.with_metrics(ctx.metrics());

	Ok(match fallback {
		Some(fallback) => sink.with_fallback(Arc::clone(fallback)),
		None => sink,
	})
}

/// Console sink used wherever a configured sink cannot be built.
fn diagnostic_sink(name: &str, ctx: &SinkContext, fallback: Option<&Arc<AuditSink>>) -> AuditSink {
	let sink = AuditSink::new(
		name,
		DEBUG_SINK_TYPE,
		DeliveryMode::Inline,
		Box::new(DebugTransport::default()),
	)
	.with_diagnostics(ctx.diagnostics())
	.with_metrics(ctx.metrics());

	match fallback {
		Some(fallback) => sink.with_fallback(Arc::clone(fallback)),
		None => sink,
	}
}
