// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Why an event never reached a sink's delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
	/// The storage pool queue was at capacity.
	QueueFull,
	/// The storage pool was shutting down or had been closed.
	Shutdown,
}

impl DropReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			DropReason::QueueFull => "queue_full",
			DropReason::Shutdown => "shutdown",
		}
	}
}

/// Delivery counters shared by the router, its sinks and the storage pool.
pub struct AuditMetrics {
	registry: Registry,

	pub events_routed: IntCounterVec,
	pub events_stored: IntCounterVec,
	pub fallback_attempts: IntCounterVec,
	pub delivery_exhausted: IntCounterVec,
	pub events_dropped: IntCounterVec,
	pub pool_workers: IntGauge,
}

impl Default for AuditMetrics {
	fn default() -> Self {
		Self::new()
	}
}

impl AuditMetrics {
	pub fn new() -> Self {
		let registry = Registry::new();

		let events_routed = IntCounterVec::new(
			Opts::new("loom_audit_events_routed_total", "Events accepted for routing"),
			&["category"],
		)
		.expect("valid metric definition");
		registry
			.register(Box::new(events_routed.clone()))
			.expect("metric registered once");

		let events_stored = IntCounterVec::new(
			Opts::new(
				"loom_audit_events_stored_total",
				"Successful delivery attempts per sink",
			),
			&["sink"],
		)
		.expect("valid metric definition");
		registry
			.register(Box::new(events_stored.clone()))
			.expect("metric registered once");

		let fallback_attempts = IntCounterVec::new(
			Opts::new(
				"loom_audit_fallback_attempts_total",
				"Deliveries handed to the fallback sink after the primary failed",
			),
			&["sink"],
		)
		.expect("valid metric definition");
		registry
			.register(Box::new(fallback_attempts.clone()))
			.expect("metric registered once");

		let delivery_exhausted = IntCounterVec::new(
			Opts::new(
				"loom_audit_delivery_exhausted_total",
				"Events written to the diagnostic stream after every sink failed",
			),
			&["sink"],
		)
		.expect("valid metric definition");
		registry
			.register(Box::new(delivery_exhausted.clone()))
			.expect("metric registered once");

		let events_dropped = IntCounterVec::new(
			Opts::new(
				"loom_audit_events_dropped_total",
				"Deliveries discarded before reaching a sink",
			),
			&["reason"],
		)
		.expect("valid metric definition");
		registry
			.register(Box::new(events_dropped.clone()))
			.expect("metric registered once");

		let pool_workers = IntGauge::new("loom_audit_pool_workers", "Running storage pool workers")
			.expect("valid metric definition");
		registry
			.register(Box::new(pool_workers.clone()))
			.expect("metric registered once");

		Self {
			registry,
			events_routed,
			events_stored,
			fallback_attempts,
			delivery_exhausted,
			events_dropped,
			pool_workers,
		}
	}

	pub fn record_routed(&self, category: &str) {
		self.events_routed.with_label_values(&[category]).inc();
	}

	pub fn record_stored(&self, sink: &str) {
		self.events_stored.with_label_values(&[sink]).inc();
	}

	pub fn record_fallback(&self, sink: &str) {
		self.fallback_attempts.with_label_values(&[sink]).inc();
	}

	pub fn record_exhausted(&self, sink: &str) {
		self.delivery_exhausted.with_label_values(&[sink]).inc();
	}

	pub fn record_dropped(&self, reason: DropReason, count: u64) {
		self.events_dropped
			.with_label_values(&[reason.as_str()])
			.inc_by(count);
	}

	pub fn dropped(&self, reason: DropReason) -> u64 {
		self.events_dropped.with_label_values(&[reason.as_str()]).get()
	}

	pub fn stored(&self, sink: &str) -> u64 {
		self.events_stored.with_label_values(&[sink]).get()
	}

	pub fn exhausted(&self, sink: &str) -> u64 {
		self.delivery_exhausted.with_label_values(&[sink]).get()
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Render all metrics in the Prometheus text exposition format.
	pub fn encode(&self) -> String {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		let mut buffer = Vec::new();
		if encoder.encode(&metric_families, &mut buffer).is_err() {
			return String::new();
		}
		String::from_utf8(buffer).unwrap_or_default()
	}
}
