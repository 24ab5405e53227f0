// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end routing tests driven by TOML configuration.
//!
//! Tests cover:
//! - Resolved routes for the documented endpoint scenarios
//! - Exactly-once delivery per resolved sink
//! - Default and fallback substitution for broken sink declarations
//! - Fallback exhaustion reaching the diagnostic stream
//! - Storage pool backpressure and synchronous mode
//! - Concurrent producers on a multi-threaded runtime
//! - Router reload through the shared handle

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use loom_audit_config::{validate_config, AuditConfig, AuditConfigLayer};
use loom_audit_router::{
	AuditCategory, AuditEvent, AuditMessageRouter, AuditRouterHandle, AuditSinkError,
	DeliveryMode, DiagnosticWriter, DropReason, SinkContext, SinkRegistry, SinkTransport,
};
use serde::Deserialize;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

#[derive(Deserialize)]
struct ConfigFile {
	audit: AuditConfigLayer,
}

fn load(source: &str) -> AuditConfig {
	let file: ConfigFile = toml::from_str(source).unwrap();
	let config = file.audit.finalize();
	validate_config(&config).unwrap();
	config
}

type Deliveries = Arc<Mutex<Vec<(String, Uuid)>>>;

struct RecordingTransport {
	sink: String,
	deliveries: Deliveries,
	fail: bool,
}

#[async_trait]
impl SinkTransport for RecordingTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		if self.fail {
			return Err(AuditSinkError::Transient("connection refused".to_string()));
		}
		self.deliveries
			.lock()
			.unwrap()
			.push((self.sink.clone(), event.id));
		Ok(())
	}
}

/// Built-in registry with the store types replaced by recording transports,
/// plus a `failing` type whose deliveries always fail.
fn recording_registry(deliveries: &Deliveries) -> SinkRegistry {
	let mut registry = SinkRegistry::with_builtins();
	for (sink_type, fail) in [
		("internal_elasticsearch", false),
		("external_elasticsearch", false),
		("failing", true),
	] {
		let deliveries = Arc::clone(deliveries);
		registry.register_fn(sink_type, DeliveryMode::Pooled, move |name, _| {
			Ok(Box::new(RecordingTransport {
				sink: name.to_string(),
				deliveries: Arc::clone(&deliveries),
				fail,
			}))
		});
	}
	registry
}

fn receivers(deliveries: &Deliveries, id: Uuid) -> Vec<String> {
	let mut sinks: Vec<String> = deliveries
		.lock()
		.unwrap()
		.iter()
		.filter(|(_, event)| *event == id)
		.map(|(sink, _)| sink.clone())
		.collect();
	sinks.sort();
	sinks
}

fn names(router: &AuditMessageRouter, category: AuditCategory) -> Vec<String> {
	router
		.sinks_for(category)
		.iter()
		.map(|s| s.name().to_string())
		.collect()
}

#[derive(Default)]
struct CapturedDiagnostics {
	writes: Mutex<Vec<(String, Uuid)>>,
}

impl DiagnosticWriter for CapturedDiagnostics {
	fn write(&self, sink: &str, event: &AuditEvent) {
		self.writes.lock().unwrap().push((sink.to_string(), event.id));
	}
}

// The default block plays the role of "endpoint2" from the store layout:
// internal store for endpoint1 and endpoint3, external store as default.
const STORE_LAYOUT: &str = r#"
[audit]
type = "external_elasticsearch"

[audit.config.default]
http_endpoints = ["http://es-external:9200"]

[audit.config.endpoints.endpoint1]
type = "internal_elasticsearch"

[audit.config.endpoints.endpoint3]
type = "internal_elasticsearch"

[audit.routing.MISSING_PRIVILEGES]
endpoints = ["endpoint1", "default"]

[audit.routing.COMPLIANCE_DOC_READ]
endpoints = ["endpoint3"]
include_default = false

[audit.threadpool]
size = 2
max_queue_len = 100
"#;

#[tokio::test]
async fn test_default_listed_explicitly_is_delivered_once() {
	let deliveries = Deliveries::default();
	let router = AuditMessageRouter::new(
		&load(STORE_LAYOUT),
		&recording_registry(&deliveries),
		SinkContext::default(),
	);

	assert_eq!(
		names(&router, AuditCategory::MissingPrivileges),
		vec!["endpoint1", "default"]
	);

	let event = AuditEvent::builder(AuditCategory::MissingPrivileges)
		.user("bob")
		.build();
	let id = event.id;
	router.route(event).await;
	router.close().await;

	assert_eq!(receivers(&deliveries, id), vec!["default", "endpoint1"]);
}

#[tokio::test]
async fn test_excluded_default_receives_nothing() {
	let deliveries = Deliveries::default();
	let router = AuditMessageRouter::new(
		&load(STORE_LAYOUT),
		&recording_registry(&deliveries),
		SinkContext::default(),
	);

	assert_eq!(names(&router, AuditCategory::ComplianceDocRead), vec!["endpoint3"]);

	let event = AuditEvent::builder(AuditCategory::ComplianceDocRead)
		.index("customers")
		.build();
	let id = event.id;
	router.route(event).await;
	router.close().await;

	assert_eq!(receivers(&deliveries, id), vec!["endpoint3"]);
}

#[tokio::test]
async fn test_unrouted_category_uses_default_only() {
	let deliveries = Deliveries::default();
	let router = AuditMessageRouter::new(
		&load(STORE_LAYOUT),
		&recording_registry(&deliveries),
		SinkContext::default(),
	);

	let event = AuditEvent::builder(AuditCategory::BadHeaders).build();
	let id = event.id;
	router.route(event).await;
	router.close().await;

	assert!(!router.routing_table().has_route(AuditCategory::BadHeaders));
	assert_eq!(receivers(&deliveries, id), vec!["default"]);
}

#[tokio::test]
async fn test_without_routing_every_category_goes_to_default() {
	let deliveries = Deliveries::default();
	let config = load(
		r#"
[audit]
type = "internal_elasticsearch"

[audit.config.endpoints.archive]
type = "internal_elasticsearch"
"#,
	);
	assert!(config.routing.is_none());
	let router = AuditMessageRouter::new(&config, &recording_registry(&deliveries), SinkContext::default());

	let mut ids = Vec::new();
	for category in AuditCategory::ALL {
		assert_eq!(names(&router, category), vec!["default"]);
		let event = AuditEvent::builder(category).build();
		ids.push(event.id);
		router.route(event).await;
	}
	router.close().await;

	for id in ids {
		assert_eq!(receivers(&deliveries, id), vec!["default"]);
	}
}

#[tokio::test]
async fn test_unusable_endpoints_are_dropped_from_routes() {
	let deliveries = Deliveries::default();
	let config = load(
		r#"
[audit]
type = "internal_elasticsearch"

[audit.config.endpoints.typeless]
config = { index = "nowhere" }

[audit.config.endpoints.mystery]
type = "com.example.MysterySink"

[audit.config.endpoints.archive]
type = "internal_elasticsearch"

[audit.routing.FAILED_LOGIN]
endpoints = ["typeless", "mystery", "archive", "ARCHIVE"]
include_default = false

[audit.routing.SSL_EXCEPTION]
endpoints = ["typeless", "mystery"]
include_default = false
"#,
	);
	let router = AuditMessageRouter::new(&config, &recording_registry(&deliveries), SinkContext::default());

	assert!(router.provider().get_sink("typeless").is_none());
	assert!(router.provider().get_sink("mystery").is_none());
	assert_eq!(names(&router, AuditCategory::FailedLogin), vec!["archive"]);
	assert!(router.routing_table().route(AuditCategory::SslException).is_none());
	assert_eq!(names(&router, AuditCategory::SslException), vec!["default"]);
	router.close().await;
}

#[tokio::test]
async fn test_invalid_default_is_replaced_by_debug_sink() {
	let deliveries = Deliveries::default();
	let config = load(
		r#"
[audit]
type = "no_such_type"

[audit.config.fallback]
type = "internal_elasticsearch"
"#,
	);
	let router = AuditMessageRouter::new(&config, &recording_registry(&deliveries), SinkContext::default());

	let default = router.provider().default_sink();
	assert_eq!(default.name(), "default");
	assert_eq!(default.sink_type(), "debug");
	assert_eq!(
		default.fallback().map(|f| f.sink_type().to_string()),
		Some("internal_elasticsearch".to_string())
	);
	router.close().await;
}

#[tokio::test]
async fn test_failed_delivery_is_retried_on_fallback() {
	let deliveries = Deliveries::default();
	let diagnostics = Arc::new(CapturedDiagnostics::default());
	let config = load(
		r#"
[audit]
type = "failing"

[audit.config.fallback]
type = "internal_elasticsearch"

[audit.threadpool]
size = 0
"#,
	);
	let ctx = SinkContext::default().with_diagnostics(diagnostics.clone());
	let router = AuditMessageRouter::new(&config, &recording_registry(&deliveries), ctx);

	let event = AuditEvent::builder(AuditCategory::GrantedPrivileges).build();
	let id = event.id;
	router.route(event).await;

	assert_eq!(receivers(&deliveries, id), vec!["fallback"]);
	assert!(diagnostics.writes.lock().unwrap().is_empty());
	router.close().await;
}

#[tokio::test]
async fn test_exhausted_delivery_reaches_diagnostic_stream() {
	let deliveries = Deliveries::default();
	let diagnostics = Arc::new(CapturedDiagnostics::default());
	let config = load(
		r#"
[audit]
type = "failing"

[audit.config.fallback]
type = "failing"

[audit.threadpool]
size = 1
"#,
	);
	let ctx = SinkContext::default().with_diagnostics(diagnostics.clone());
	let router = AuditMessageRouter::new(&config, &recording_registry(&deliveries), ctx);

	let event = AuditEvent::builder(AuditCategory::SecurityIndexAttempt).build();
	let id = event.id;
	router.route(event).await;
	router.close().await;

	assert!(deliveries.lock().unwrap().is_empty());
	assert_eq!(
		*diagnostics.writes.lock().unwrap(),
		vec![("default".to_string(), id)]
	);
	assert_eq!(router.metrics().exhausted("default"), 1);
}

struct GatedTransport {
	gate: Arc<Semaphore>,
	started: mpsc::UnboundedSender<Uuid>,
	deliveries: Deliveries,
}

#[async_trait]
impl SinkTransport for GatedTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let _ = self.started.send(event.id);
		self.gate
			.acquire()
			.await
			.map_err(|e| AuditSinkError::Transient(e.to_string()))?
			.forget();
		self.deliveries
			.lock()
			.unwrap()
			.push(("default".to_string(), event.id));
		Ok(())
	}
}

#[tokio::test]
async fn test_full_queue_drops_instead_of_blocking() {
	let deliveries = Deliveries::default();
	let gate = Arc::new(Semaphore::new(0));
	let (started_tx, mut started) = mpsc::unbounded_channel();

	let mut registry = SinkRegistry::empty();
	{
		let gate = Arc::clone(&gate);
		let deliveries = Arc::clone(&deliveries);
		registry.register_fn("gated", DeliveryMode::Pooled, move |_, _| {
			Ok(Box::new(GatedTransport {
				gate: Arc::clone(&gate),
				started: started_tx.clone(),
				deliveries: Arc::clone(&deliveries),
			}))
		});
	}
	let config = load(
		r#"
[audit]
type = "gated"

[audit.threadpool]
size = 1
max_queue_len = 1
"#,
	);
	let router = AuditMessageRouter::new(&config, &registry, SinkContext::default());

	router
		.route(AuditEvent::builder(AuditCategory::IndexEvent).build())
		.await;
	started.recv().await.unwrap();
	router
		.route(AuditEvent::builder(AuditCategory::IndexEvent).build())
		.await;
	router
		.route(AuditEvent::builder(AuditCategory::IndexEvent).build())
		.await;

	assert_eq!(router.metrics().dropped(DropReason::QueueFull), 1);

	gate.add_permits(10);
	router.close().await;
	assert_eq!(deliveries.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_zero_workers_store_before_route_returns() {
	let deliveries = Deliveries::default();
	let config = load(
		r#"
[audit]
type = "internal_elasticsearch"

[audit.threadpool]
size = 0
"#,
	);
	let router = AuditMessageRouter::new(&config, &recording_registry(&deliveries), SinkContext::default());
	assert!(router.pool().is_inline());

	let event = AuditEvent::builder(AuditCategory::Authenticated).build();
	let id = event.id;
	router.route(event).await;

	assert_eq!(receivers(&deliveries, id), vec!["default"]);
	router.close().await;
}

#[tokio::test]
async fn test_reload_switches_routes() {
	let deliveries = Deliveries::default();
	let registry = recording_registry(&deliveries);
	let before = load(
		r#"
[audit]
type = "internal_elasticsearch"

[audit.config.endpoints.primary]
type = "internal_elasticsearch"

[audit.routing.FAILED_LOGIN]
endpoints = ["primary"]
include_default = false
"#,
	);
	let after = load(
		r#"
[audit]
type = "internal_elasticsearch"

[audit.config.endpoints.secondary]
type = "external_elasticsearch"

[audit.routing.FAILED_LOGIN]
endpoints = ["secondary"]
include_default = false
"#,
	);

	let handle = AuditRouterHandle::new(AuditMessageRouter::new(
		&before,
		&registry,
		SinkContext::default(),
	));

	let first = AuditEvent::builder(AuditCategory::FailedLogin).build();
	let first_id = first.id;
	handle.route(first).await;

	let errors = handle
		.reload(AuditMessageRouter::new(&after, &registry, SinkContext::default()))
		.await;
	assert!(errors.is_empty());

	let second = AuditEvent::builder(AuditCategory::FailedLogin).build();
	let second_id = second.id;
	handle.route(second).await;
	handle.close().await;

	assert_eq!(receivers(&deliveries, first_id), vec!["primary"]);
	assert_eq!(receivers(&deliveries, second_id), vec!["secondary"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_deliver_each_event_at_most_once() {
	const PRODUCERS: usize = 8;
	const EVENTS_PER_PRODUCER: usize = 50;

	let deliveries = Deliveries::default();
	let mut registry = recording_registry(&deliveries);
	{
		let deliveries = Arc::clone(&deliveries);
		registry.register_fn("direct", DeliveryMode::Inline, move |name, _| {
			Ok(Box::new(RecordingTransport {
				sink: name.to_string(),
				deliveries: Arc::clone(&deliveries),
				fail: false,
			}))
		});
	}
	let config = load(
		r#"
[audit]
type = "internal_elasticsearch"

[audit.config.endpoints.inline]
type = "direct"

[audit.config.endpoints.pooled]
type = "internal_elasticsearch"

[audit.routing.FAILED_LOGIN]
endpoints = ["inline", "pooled"]

[audit.threadpool]
size = 4
max_queue_len = 16
shutdown_grace_ms = 30000
"#,
	);
	let router = Arc::new(AuditMessageRouter::new(&config, &registry, SinkContext::default()));
	assert_eq!(names(&router, AuditCategory::FailedLogin), vec!["inline", "pooled", "default"]);

	let mut producers = Vec::new();
	for _ in 0..PRODUCERS {
		let router = Arc::clone(&router);
		producers.push(tokio::spawn(async move {
			let mut ids = Vec::new();
			for _ in 0..EVENTS_PER_PRODUCER {
				let event = AuditEvent::builder(AuditCategory::FailedLogin).build();
				ids.push(event.id);
				router.route(event).await;
			}
			ids
		}));
	}
	let mut submitted = Vec::new();
	for producer in producers {
		submitted.extend(producer.await.unwrap());
	}
	router.close().await;

	let mut counts: HashMap<(String, Uuid), usize> = HashMap::new();
	for delivery in deliveries.lock().unwrap().iter() {
		*counts.entry(delivery.clone()).or_default() += 1;
	}

	assert_eq!(submitted.len(), PRODUCERS * EVENTS_PER_PRODUCER);
	assert!(counts.values().all(|&count| count == 1));
	for id in &submitted {
		assert_eq!(counts.get(&("inline".to_string(), *id)), Some(&1));
	}

	let pooled = counts.keys().filter(|(sink, _)| sink != "inline").count() as u64;
	let metrics = router.metrics();
	assert_eq!(
		pooled + metrics.dropped(DropReason::QueueFull),
		2 * submitted.len() as u64
	);
	assert_eq!(metrics.dropped(DropReason::Shutdown), 0);
}
