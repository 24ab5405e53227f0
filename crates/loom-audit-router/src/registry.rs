// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sink type registry.
//!
//! Maps the `type` string of a sink declaration to a [`SinkFactory`]. The
//! built-in types are registered by [`SinkRegistry::with_builtins`]; hosts
//! add their own types with [`SinkRegistry::register`] (factories that need
//! host collaborators) or [`SinkRegistry::register_fn`] (factories that only
//! need the sink's name and settings).
//!
//! ```ignore
//! let mut registry = SinkRegistry::with_builtins();
//! registry.register_fn("syslog", DeliveryMode::Pooled, |name, settings| {
//!     Ok(Box::new(SyslogTransport::from_settings(name, settings)?))
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use loom_audit_config::SinkSettings;
use serde::de::DeserializeOwned;

use crate::error::{AuditError, AuditResult};
use crate::metrics::AuditMetrics;
use crate::sink::debug::{DebugSinkFactory, DEBUG_SINK_TYPE};
use crate::sink::internal_store::{DocumentStore, InternalStoreSinkFactory, INTERNAL_STORE_SINK_TYPE};
use crate::sink::kafka::{KafkaSinkFactory, MessageProducer, KAFKA_SINK_TYPE};
use crate::sink::log::{LogSinkFactory, LOG_SINK_TYPE};
use crate::sink::{DeliveryMode, DiagnosticWriter, SinkTransport, StderrDiagnostics};

#[cfg(feature = "sink-http")]
use crate::sink::external_store::{ExternalStoreSinkFactory, EXTERNAL_STORE_SINK_TYPE};
#[cfg(feature = "sink-http")]
use crate::sink::webhook::{WebhookSinkFactory, WEBHOOK_SINK_TYPE};

/// Host collaborators available to sink factories.
#[derive(Clone)]
pub struct SinkContext {
	cluster_name: Option<String>,
	document_store: Option<Arc<dyn DocumentStore>>,
	message_producer: Option<Arc<dyn MessageProducer>>,
	diagnostics: Arc<dyn DiagnosticWriter>,
	metrics: Arc<AuditMetrics>,
}

impl Default for SinkContext {
	fn default() -> Self {
		Self {
			cluster_name: None,
			document_store: None,
			message_producer: None,
			diagnostics: Arc::new(StderrDiagnostics),
			metrics: Arc::new(AuditMetrics::new()),
		}
	}
}

impl SinkContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
		self.cluster_name = Some(name.into());
		self
	}

	pub fn with_document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
		self.document_store = Some(store);
		self
	}

	pub fn with_message_producer(mut self, producer: Arc<dyn MessageProducer>) -> Self {
		self.message_producer = Some(producer);
		self
	}

	pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticWriter>) -> Self {
		self.diagnostics = diagnostics;
		self
	}

	pub fn with_metrics(mut self, metrics: Arc<AuditMetrics>) -> Self {
		self.metrics = metrics;
		self
	}

	pub fn cluster_name(&self) -> Option<&str> {
		self.cluster_name.as_deref()
	}

	pub fn document_store(&self) -> Option<Arc<dyn DocumentStore>> {
		self.document_store.clone()
	}

	pub fn message_producer(&self) -> Option<Arc<dyn MessageProducer>> {
		self.message_producer.clone()
	}

	pub fn diagnostics(&self) -> Arc<dyn DiagnosticWriter> {
		Arc::clone(&self.diagnostics)
	}

	pub fn metrics(&self) -> Arc<AuditMetrics> {
		Arc::clone(&self.metrics)
	}
}

impl fmt::Debug for SinkContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SinkContext")
			.field("cluster_name", &self.cluster_name)
			.field("document_store", &self.document_store.is_some())
			.field("message_producer", &self.message_producer.is_some())
			.finish_non_exhaustive()
	}
}

/// Builds the transport for one sink type.
pub trait SinkFactory: Send + Sync {
	/// Whether sinks of this type store inline or through the storage pool.
	fn delivery_mode(&self) -> DeliveryMode;

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>>;
}

type BuildFn =
	dyn Fn(&str, &SinkSettings) -> AuditResult<Box<dyn SinkTransport>> + Send + Sync + 'static;

/// Adapter for factories that ignore the host context.
struct FnSinkFactory {
	mode: DeliveryMode,
	build: Box<BuildFn>,
}

impl SinkFactory for FnSinkFactory {
	fn delivery_mode(&self) -> DeliveryMode {
		self.mode
	}

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		_ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>> {
		(self.build)(name, settings)
	}
}

/// Case-insensitive map from sink type identifier to factory.
#[derive(Clone)]
pub struct SinkRegistry {
	factories: HashMap<String, Arc<dyn SinkFactory>>,
}

impl Default for SinkRegistry {
	fn default() -> Self {
		Self::with_builtins()
	}
}

impl SinkRegistry {
	/// A registry with no types at all.
	pub fn empty() -> Self {
		Self {
			factories: HashMap::new(),
		}
	}

	pub fn with_builtins() -> Self {
		let mut registry = Self::empty();
		registry.register(DEBUG_SINK_TYPE, DebugSinkFactory);
		registry.register(LOG_SINK_TYPE, LogSinkFactory);
		registry.register(KAFKA_SINK_TYPE, KafkaSinkFactory);
		registry.register(INTERNAL_STORE_SINK_TYPE, InternalStoreSinkFactory);
		#[cfg(feature = "sink-http")]
		{
			registry.register(EXTERNAL_STORE_SINK_TYPE, ExternalStoreSinkFactory);
			registry.register(WEBHOOK_SINK_TYPE, WebhookSinkFactory);
		}
		registry
	}

	/// Register a factory, replacing any previous one for the same type.
	pub fn register<F>(&mut self, sink_type: &str, factory: F) -> &mut Self
	where
		F: SinkFactory + 'static,
	{
		self.factories
			.insert(sink_type.to_ascii_lowercase(), Arc::new(factory));
		self
	}

	/// Register a factory that only needs the sink's name and settings.
	pub fn register_fn<F>(&mut self, sink_type: &str, mode: DeliveryMode, build: F) -> &mut Self
	where
		F: Fn(&str, &SinkSettings) -> AuditResult<Box<dyn SinkTransport>> + Send + Sync + 'static,
	{
		self.register(
			sink_type,
			FnSinkFactory {
				mode,
				build: Box::new(build),
			},
		)
	}

	pub fn get(&self, sink_type: &str) -> Option<Arc<dyn SinkFactory>> {
		self.factories.get(&sink_type.to_ascii_lowercase()).cloned()
	}

	pub fn contains(&self, sink_type: &str) -> bool {
		self.factories.contains_key(&sink_type.to_ascii_lowercase())
	}

	/// Registered type identifiers, sorted.
	pub fn sink_types(&self) -> Vec<&str> {
		let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
		types.sort_unstable();
		types
	}
}

impl fmt::Debug for SinkRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SinkRegistry")
			.field("sink_types", &self.sink_types())
			.finish()
	}
}

/// Deserialize a sink's settings block into a typed settings struct.
pub fn parse_settings<T: DeserializeOwned>(sink: &str, settings: &SinkSettings) -> AuditResult<T> {
	serde_json::from_value(serde_json::Value::Object(settings.clone())).map_err(|e| {
		AuditError::InvalidSettings {
			sink: sink.to_string(),
			message: e.to_string(),
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sink::debug::DebugTransport;

	#[test]
	fn test_builtins_are_registered() {
		let registry = SinkRegistry::with_builtins();
		for sink_type in ["debug", "log", "kafka", "internal_elasticsearch"] {
			assert!(registry.contains(sink_type), "missing {sink_type}");
		}
		#[cfg(feature = "sink-http")]
		{
			assert!(registry.contains("external_elasticsearch"));
			assert!(registry.contains("webhook"));
		}
	}

	#[test]
	fn test_builtin_delivery_modes() {
		let registry = SinkRegistry::with_builtins();
		let mode = |t: &str| registry.get(t).unwrap().delivery_mode();
		assert_eq!(mode("debug"), DeliveryMode::Inline);
		assert_eq!(mode("log"), DeliveryMode::Inline);
		assert_eq!(mode("kafka"), DeliveryMode::Inline);
		assert_eq!(mode("internal_elasticsearch"), DeliveryMode::Pooled);
	}

	#[test]
	fn test_lookup_ignores_case() {
		let registry = SinkRegistry::with_builtins();
		assert!(registry.get("DEBUG").is_some());
		assert!(registry.get("Internal_ElasticSearch").is_some());
		assert!(registry.get("com.example.CustomSink").is_none());
	}

	#[test]
	fn test_register_fn_extends_registry() {
		let mut registry = SinkRegistry::empty();
		registry.register_fn("console", DeliveryMode::Pooled, |_, _| {
			Ok(Box::new(DebugTransport::default()))
		});

		let factory = registry.get("Console").unwrap();
		assert_eq!(factory.delivery_mode(), DeliveryMode::Pooled);
		assert!(factory
			.build("c", &SinkSettings::new(), &SinkContext::default())
			.is_ok());
		assert_eq!(registry.sink_types(), vec!["console"]);
	}

	#[test]
	fn test_register_replaces_existing_type() {
		let mut registry = SinkRegistry::with_builtins();
		registry.register_fn("debug", DeliveryMode::Pooled, |name, _| {
			Err(AuditError::InvalidSettings {
				sink: name.to_string(),
				message: "disabled".to_string(),
			})
		});
		assert_eq!(
			registry.get("debug").unwrap().delivery_mode(),
			DeliveryMode::Pooled
		);
	}

	#[test]
	fn test_parse_settings_reports_sink_name() {
		#[derive(serde::Deserialize)]
		#[allow(dead_code)]
		struct Needs {
			url: String,
		}
		let err = parse_settings::<Needs>("hook", &SinkSettings::new())
			.err()
			.unwrap();
		match err {
			AuditError::InvalidSettings { sink, message } => {
				assert_eq!(sink, "hook");
				assert!(message.contains("url"));
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn test_context_defaults_have_no_collaborators() {
		let ctx = SinkContext::default();
		assert!(ctx.document_store().is_none());
		assert!(ctx.message_producer().is_none());
		assert!(ctx.cluster_name().is_none());
	}
}
