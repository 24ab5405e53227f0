// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit sinks: named delivery targets with a fallback chain.
//!
//! A sink is split in two. The [`SinkTransport`] is the type-specific delivery
//! attempt (HTTP, broker, logger, ...). The [`AuditSink`] wraps a transport
//! with its name, delivery mode and fallback, and owns the rule that an event
//! is never dropped without a trace: primary attempt, one fallback attempt,
//! then the diagnostic stream.

pub mod debug;
pub mod diagnostic;
pub mod index;
pub mod internal_store;
pub mod kafka;
pub mod log;

#[cfg(feature = "sink-http")]
pub mod external_store;
#[cfg(feature = "sink-http")]
mod http;
#[cfg(feature = "sink-http")]
pub mod webhook;

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, warn};

use crate::error::{AuditError, AuditSinkError};
use crate::event::AuditEvent;
use crate::metrics::AuditMetrics;

pub use diagnostic::{DiagnosticWriter, StderrDiagnostics};
#[cfg(feature = "sink-http")]
pub use http::sign_payload;

/// Type-specific delivery of a single event.
///
/// Implementations are shared between the router and pool workers and must
/// tolerate concurrent `deliver` calls.
#[async_trait]
pub trait SinkTransport: Send + Sync {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError>;

	async fn close(&self) -> Result<(), AuditSinkError> {
		Ok(())
	}
}

/// How the router hands events to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
	/// The transport manages its own buffering; store on the routing task.
	Inline,
	/// Deliveries are queued on the shared storage pool.
	Pooled,
}

pub struct AuditSink {
	name: String,
	sink_type: String,
	mode: DeliveryMode,
	transport: Box<dyn SinkTransport>,
	fallback: Option<Arc<AuditSink>>,
	diagnostics: Arc<dyn DiagnosticWriter>,
	metrics: Arc<AuditMetrics>,
	closed: AtomicBool,
}

impl AuditSink {
	pub fn new(
		name: impl Into<String>,
		sink_type: impl Into<String>,
		mode: DeliveryMode,
		transport: Box<dyn SinkTransport>,
	) -> Self {
		Self {
			name: name.into(),
			sink_type: sink_type.into(),
			mode,
			transport,
			fallback: None,
			diagnostics: Arc::new(StderrDiagnostics),
			metrics: Arc::new(AuditMetrics::new()),
			closed: AtomicBool::new(false),
		}
	}

	pub fn with_fallback(mut self, fallback: Arc<AuditSink>) -> Self {
		self.fallback = Some(fallback);
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

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn sink_type(&self) -> &str {
		&self.sink_type
	}

	pub fn delivery_mode(&self) -> DeliveryMode {
		self.mode
	}

	pub fn handles_backpressure(&self) -> bool {
		self.mode == DeliveryMode::Inline
	}

	pub fn fallback(&self) -> Option<&Arc<AuditSink>> {
		self.fallback.as_ref()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Deliver an event, falling back once and then to the diagnostic stream.
	///
	/// Never fails and never panics outward.
	pub async fn store(&self, event: &AuditEvent) {
		if self.do_store(event).await {
			return;
		}

		if let Some(fallback) = &self.fallback {
			self.metrics.record_fallback(&self.name);
			if fallback.do_store(event).await {
				return;
			}
		}

		self.metrics.record_exhausted(&self.name);
		error!(
			sink = %self.name,
			fallback = self.fallback.as_ref().map(|f| f.name()).unwrap_or("<none>"),
			event_id = %event.id,
			category = %event.category,
			"audit event could not be stored by any sink"
		);
		let written = std::panic::catch_unwind(AssertUnwindSafe(|| {
			self.diagnostics.write(&self.name, event)
		}));
		if let Err(panic) = written {
			error!(
				sink = %self.name,
				event_id = %event.id,
				panic = %panic_message(panic.as_ref()),
				"audit diagnostic writer panicked"
			);
		}
	}

	/// One delivery attempt on this sink's own transport.
	pub(crate) async fn do_store(&self, event: &AuditEvent) -> bool {
		if self.is_closed() {
			warn!(sink = %self.name, event_id = %event.id, "audit sink is closed");
			return false;
		}

		match AssertUnwindSafe(self.transport.deliver(event))
			.catch_unwind()
			.await
		{
			Ok(Ok(())) => {
				self.metrics.record_stored(&self.name);
				true
			}
			Ok(Err(e)) => {
				warn!(
					sink = %self.name,
					sink_type = %self.sink_type,
					event_id = %event.id,
					error = %e,
					"audit sink delivery failed"
				);
				false
			}
			Err(panic) => {
				warn!(
					sink = %self.name,
					sink_type = %self.sink_type,
					event_id = %event.id,
					panic = %panic_message(panic.as_ref()),
					"audit sink transport panicked"
				);
				false
			}
		}
	}

	/// Release transport resources. Repeated calls are no-ops.
	pub async fn close(&self) -> Result<(), AuditError> {
		if self.closed.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		self.transport
			.close()
			.await
			.map_err(|source| AuditError::Transport {
				sink: self.name.clone(),
				source,
			})
	}
}

impl PartialEq for AuditSink {
	fn eq(&self, other: &Self) -> bool {
		self.name.eq_ignore_ascii_case(&other.name)
	}
}

impl Eq for AuditSink {}

impl fmt::Debug for AuditSink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuditSink")
			.field("name", &self.name)
			.field("sink_type", &self.sink_type)
			.field("mode", &self.mode)
			.field("fallback", &self.fallback.as_ref().map(|s| s.name()))
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Close every sink, logging and collecting failures instead of stopping.
pub async fn close_sinks<'a, I>(sinks: I) -> Vec<AuditError>
where
	I: IntoIterator<Item = &'a Arc<AuditSink>>,
{
	let mut errors = Vec::new();
	for sink in sinks {
		if let Err(e) = sink.close().await {
			warn!(sink = %sink.name(), error = %e, "failed to close audit sink");
			errors.push(e);
		}
	}
	errors
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use std::sync::atomic::AtomicUsize;
	use std::sync::Mutex;

	use uuid::Uuid;

	use super::*;

	/// What a [`ScriptedTransport`] does on every delivery.
	#[derive(Clone, Copy)]
	pub enum Behavior {
		Succeed,
		Fail,
		Panic,
	}

	pub struct ScriptedTransport {
		behavior: Behavior,
		pub delivered: Arc<Mutex<Vec<Uuid>>>,
		pub closes: Arc<AtomicUsize>,
		fail_close: bool,
	}

	impl ScriptedTransport {
		pub fn new(behavior: Behavior) -> Self {
			Self {
				behavior,
				delivered: Arc::new(Mutex::new(Vec::new())),
				closes: Arc::new(AtomicUsize::new(0)),
				fail_close: false,
			}
		}

		pub fn failing_close(mut self) -> Self {
			self.fail_close = true;
			self
		}
	}

	#[async_trait]
	impl SinkTransport for ScriptedTransport {
		async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
			match self.behavior {
				Behavior::Succeed => {
					self.delivered.lock().unwrap().push(event.id);
					Ok(())
				}
				Behavior::Fail => Err(AuditSinkError::Transient("connection refused".to_string())),
				Behavior::Panic => panic!("transport blew up"),
			}
		}

		async fn close(&self) -> Result<(), AuditSinkError> {
			self.closes.fetch_add(1, Ordering::SeqCst);
			if self.fail_close {
				Err(AuditSinkError::Permanent("close failed".to_string()))
			} else {
				Ok(())
			}
		}
	}

	#[derive(Default)]
	pub struct RecordingDiagnostics {
		pub writes: Mutex<Vec<(String, Uuid)>>,
	}

	pub struct PanickingDiagnostics;

	impl DiagnosticWriter for PanickingDiagnostics {
		fn write(&self, _sink: &str, _event: &AuditEvent) {
			panic!("diagnostic stream unavailable");
		}
	}

	impl DiagnosticWriter for RecordingDiagnostics {
		fn write(&self, sink: &str, event: &AuditEvent) {
			self.writes
				.lock()
				.unwrap()
				.push((sink.to_string(), event.id));
		}
	}
}
