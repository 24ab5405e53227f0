// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded worker pool for sinks that do not manage their own backpressure.
//!
//! Submissions never wait for queue space: a full queue rejects the delivery
//! and counts it as dropped. With zero workers every submission is stored
//! inline on the submitting task.
//!
//! Shutdown happens in two phases. Workers first drain the queue for up to
//! the configured grace period. Whatever is still queued after that is
//! discarded and counted, while deliveries already in progress finish. Every
//! discard, whether a worker skips it or the final sweep finds it, is part of
//! the count `close` returns.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use loom_audit_config::ThreadPoolConfig;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::event::AuditEvent;
use crate::metrics::{AuditMetrics, DropReason};
use crate::sink::{panic_message, AuditSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
	QueueFull,
	ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
	/// Handed to a worker.
	Queued,
	/// Stored inline because the pool has no workers.
	Stored,
	Rejected(RejectReason),
}

struct DeliveryTask {
	event: Arc<AuditEvent>,
	sink: Arc<AuditSink>,
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<DeliveryTask>>>;

pub struct StoragePool {
	size: usize,
	max_queue_len: usize,
	grace: Duration,
	/// `None` in inline mode.
	queue: Option<(mpsc::Sender<DeliveryTask>, SharedReceiver)>,
	/// Each worker yields the deliveries it discarded after abort.
	workers: Mutex<JoinSet<usize>>,
	draining: CancellationToken,
	abort: CancellationToken,
	closed: AtomicBool,
	metrics: Arc<AuditMetrics>,
}

impl StoragePool {
	/// Start the pool. Spawns workers, so a Tokio runtime must be running
	/// unless `config.size` is zero.
	pub fn new(config: &ThreadPoolConfig, metrics: Arc<AuditMetrics>) -> Self {
		let max_queue_len = config.max_queue_len.max(1);
		let draining = CancellationToken::new();
		let abort = CancellationToken::new();
		let mut workers = JoinSet::new();

		let queue = if config.size == 0 {
			info!("audit storage pool disabled, deliveries run inline");
			None
		} else {
			let (tx, rx) = mpsc::channel(max_queue_len);
			let rx: SharedReceiver = Arc::new(Mutex::new(rx));
			for id in 0..config.size {
				workers.spawn(worker_loop(
					id,
					Arc::clone(&rx),
					draining.clone(),
					abort.clone(),
					Arc::clone(&metrics),
				));
			}
			info!(
				workers = config.size,
				max_queue_len, "audit storage pool started"
			);
			Some((tx, rx))
		};

		Self {
			size: config.size,
			max_queue_len,
			grace: config.shutdown_grace(),
			queue,
			workers: Mutex::new(workers),
			draining,
			abort,
			closed: AtomicBool::new(false),
			metrics,
		}
	}

	pub fn size(&self) -> usize {
		self.size
	}

	pub fn max_queue_len(&self) -> usize {
		self.max_queue_len
	}

	pub fn is_inline(&self) -> bool {
		self.queue.is_none()
	}

	/// Deliveries waiting for a worker.
	pub fn queued(&self) -> usize {
		match &self.queue {
			Some((tx, _)) => tx.max_capacity() - tx.capacity(),
			None => 0,
		}
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Schedule `sink.store(event)`.
	///
	/// Only waits when the pool is inline; otherwise returns immediately.
	pub async fn submit(&self, event: Arc<AuditEvent>, sink: Arc<AuditSink>) -> SubmitOutcome {
		if self.is_closed() {
			warn!(
				sink = %sink.name(),
				event_id = %event.id,
				"audit storage pool is closed, dropping event"
			);
			self.metrics.record_dropped(DropReason::Shutdown, 1);
			return SubmitOutcome::Rejected(RejectReason::ShuttingDown);
		}

		let Some((tx, _)) = &self.queue else {
			sink.store(&event).await;
			return SubmitOutcome::Stored;
		};

		match tx.try_send(DeliveryTask { event, sink }) {
			Ok(()) => SubmitOutcome::Queued,
			Err(TrySendError::Full(task)) => {
				warn!(
					sink = %task.sink.name(),
					event_id = %task.event.id,
					max_queue_len = self.max_queue_len,
					"audit storage queue full, dropping event"
				);
				self.metrics.record_dropped(DropReason::QueueFull, 1);
				SubmitOutcome::Rejected(RejectReason::QueueFull)
			}
			Err(TrySendError::Closed(task)) => {
				warn!(
					sink = %task.sink.name(),
					event_id = %task.event.id,
					"audit storage queue closed, dropping event"
				);
				self.metrics.record_dropped(DropReason::Shutdown, 1);
				SubmitOutcome::Rejected(RejectReason::ShuttingDown)
			}
		}
	}

	/// Stop accepting work, drain within the grace period, then discard.
	///
	/// Returns the number of deliveries discarded. Repeated calls return 0.
	pub async fn close(&self) -> usize {
		if self.closed.swap(true, Ordering::AcqRel) {
			return 0;
		}
		let Some((_, rx)) = &self.queue else {
			return 0;
		};

		self.draining.cancel();
		let mut workers = self.workers.lock().await;
		let mut discarded = 0;

		let timed_out = tokio::time::timeout(self.grace, join_all(&mut workers, &mut discarded))
			.await
			.is_err();
		if timed_out {
			self.abort.cancel();
			join_all(&mut workers, &mut discarded).await;
		}

		// A submit racing the close can land after the last worker exited.
		let mut rx = rx.lock().await;
		while let Ok(task) = rx.try_recv() {
			debug!(sink = %task.sink.name(), event_id = %task.event.id, "discarding queued delivery");
			discarded += 1;
		}

		if discarded > 0 {
			warn!(
				discarded,
				timed_out,
				grace_ms = self.grace.as_millis() as u64,
				"audit storage pool closed with undelivered events, dropping them"
			);
			self.metrics
				.record_dropped(DropReason::Shutdown, discarded as u64);
		}
		info!("audit storage pool closed");
		discarded
	}
}

/// Join every worker, adding their discard counts to `discarded` as each
/// one finishes so a timed-out join keeps what it already collected.
async fn join_all(workers: &mut JoinSet<usize>, discarded: &mut usize) {
	while let Some(result) = workers.join_next().await {
		match result {
			Ok(count) => *discarded += count,
			Err(e) => error!(error = %e, "audit storage worker terminated abnormally"),
		}
	}
}

async fn worker_loop(
	id: usize,
	rx: SharedReceiver,
	draining: CancellationToken,
	abort: CancellationToken,
	metrics: Arc<AuditMetrics>,
) -> usize {
	metrics.pool_workers.inc();
	debug!(worker = id, "audit storage worker started");
	let mut discarded = 0;

	loop {
		let task = {
			let mut rx = rx.lock().await;
			if draining.is_cancelled() {
				match rx.try_recv() {
					Ok(task) => task,
					Err(_) => break,
				}
			} else {
				tokio::select! {
					task = rx.recv() => match task {
						Some(task) => task,
						None => break,
					},
					_ = draining.cancelled() => continue,
				}
			}
		};

		if abort.is_cancelled() {
			debug!(
				worker = id,
				sink = %task.sink.name(),
				event_id = %task.event.id,
				"grace period over, discarding queued delivery"
			);
			discarded += 1;
			continue;
		}

		let DeliveryTask { event, sink } = task;
		if let Err(panic) = AssertUnwindSafe(sink.store(&event)).catch_unwind().await {
			error!(
				worker = id,
				sink = %sink.name(),
				event_id = %event.id,
				panic = %panic_message(panic.as_ref()),
				"audit storage task panicked"
			);
		}
	}

	metrics.pool_workers.dec();
	debug!(worker = id, discarded, "audit storage worker stopped");
	discarded
}
