// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Category-based dispatch of audit events to sinks.

use std::sync::Arc;

use loom_audit_config::AuditConfig;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::AuditError;
use crate::event::{AuditCategory, AuditEvent};
use crate::metrics::AuditMetrics;
use crate::pool::{StoragePool, SubmitOutcome};
use crate::provider::SinkProvider;
use crate::registry::{SinkContext, SinkRegistry};
use crate::routing::RoutingTable;
use crate::sink::{close_sinks, AuditSink};

/// Routes events to the sinks configured for their category.
///
/// Inline sinks are stored on the calling task; every other sink is handed to
/// the storage pool. Routing never returns an error: delivery failures are
/// absorbed by the sink fallback chain.
pub struct AuditMessageRouter {
	provider: SinkProvider,
	table: RoutingTable,
	pool: StoragePool,
	metrics: Arc<AuditMetrics>,
}

impl AuditMessageRouter {
	/// Build sinks, routes and the storage pool from configuration.
	///
	/// Spawns pool workers, so a Tokio runtime must be running unless the
	/// pool size is zero.
	pub fn new(config: &AuditConfig, registry: &SinkRegistry, ctx: SinkContext) -> Self {
		let metrics = ctx.metrics();
		let provider = SinkProvider::new(config, registry, &ctx);
		let table = RoutingTable::build(
			Arc::clone(provider.default_sink()),
			provider.sinks(),
			config.routing.as_ref(),
		);
		let pool = StoragePool::new(&config.threadpool, Arc::clone(&metrics));

		info!(
			default_sink = %provider.default_sink().name(),
			sinks = provider.sinks().len(),
			routed_categories = table.len(),
			pool_size = pool.size(),
			"audit message router built"
		);

		Self {
			provider,
			table,
			pool,
			metrics,
		}
	}

	pub async fn route(&self, event: impl Into<Arc<AuditEvent>>) {
		self.route_shared(event.into()).await
	}

	#[instrument(skip_all, fields(category = %event.category, event_id = %event.id))]
	async fn route_shared(&self, event: Arc<AuditEvent>) {
		self.metrics.record_routed(event.category.as_str());

		for sink in self.table.sinks_for(event.category) {
			if sink.handles_backpressure() {
				debug!(sink = %sink.name(), "storing inline");
				sink.store(&event).await;
				continue;
			}

			match self.pool.submit(Arc::clone(&event), Arc::clone(sink)).await {
				SubmitOutcome::Queued | SubmitOutcome::Stored => {
					debug!(sink = %sink.name(), "handed to storage pool");
				}
				SubmitOutcome::Rejected(reason) => {
					debug!(sink = %sink.name(), ?reason, "storage pool rejected delivery");
				}
			}
		}
	}

	/// The sinks `route` delivers an event of `category` to.
	pub fn sinks_for(&self, category: AuditCategory) -> &[Arc<AuditSink>] {
		self.table.sinks_for(category)
	}

	pub fn provider(&self) -> &SinkProvider {
		&self.provider
	}

	pub fn routing_table(&self) -> &RoutingTable {
		&self.table
	}

	pub fn pool(&self) -> &StoragePool {
		&self.pool
	}

	pub fn metrics(&self) -> &Arc<AuditMetrics> {
		&self.metrics
	}

	/// Drain the pool, then close the default sink and every other sink.
	///
	/// Close failures are logged and returned; they never stop the remaining
	/// sinks from closing.
	pub async fn close(&self) -> Vec<AuditError> {
		let discarded = self.pool.close().await;

		let mut errors = close_sinks(std::iter::once(self.provider.default_sink())).await;
		errors.extend(self.provider.close().await);

		info!(
			discarded,
			close_errors = errors.len(),
			"audit message router closed"
		);
		errors
	}
}

impl std::fmt::Debug for AuditMessageRouter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuditMessageRouter")
			.field("provider", &self.provider)
			.field("table", &self.table)
			.field("pool_size", &self.pool.size())
			.finish()
	}
}

/// Shared handle to the active router, swappable on configuration reload.
#[derive(Clone)]
pub struct AuditRouterHandle {
	current: Arc<RwLock<Arc<AuditMessageRouter>>>,
}

impl AuditRouterHandle {
	pub fn new(router: AuditMessageRouter) -> Self {
		Self {
			current: Arc::new(RwLock::new(Arc::new(router))),
		}
	}

	pub async fn route(&self, event: impl Into<Arc<AuditEvent>>) {
		let router = self.current.read().await;
		router.route(event).await;
	}

	pub async fn current(&self) -> Arc<AuditMessageRouter> {
		Arc::clone(&*self.current.read().await)
	}

	/// Install `router` and close the one it replaces.
	///
	/// Routing calls already in progress finish on the old router before the
	/// swap happens.
	pub async fn reload(&self, router: AuditMessageRouter) -> Vec<AuditError> {
		let previous = {
			let mut current = self.current.write().await;
			std::mem::replace(&mut *current, Arc::new(router))
		};
		info!("audit router reloaded");
		previous.close().await
	}

	pub async fn close(&self) -> Vec<AuditError> {
		self.current.read().await.close().await
	}
}

impl std::fmt::Debug for AuditRouterHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuditRouterHandle").finish_non_exhaustive()
	}
}
