// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use loom_audit_config::SinkSettings;
use serde::Deserialize;

use super::index::{IndexPattern, DEFAULT_INDEX_PATTERN};
use super::{DeliveryMode, SinkTransport};
use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::event::AuditEvent;
use crate::registry::{parse_settings, SinkContext, SinkFactory};

pub const INTERNAL_STORE_SINK_TYPE: &str = "internal_elasticsearch";

/// Client for the cluster's own document store, supplied by the host process.
#[async_trait]
pub trait DocumentStore: Send + Sync {
	async fn index(
		&self,
		index: &str,
		id: &str,
		document: &serde_json::Value,
	) -> Result<(), AuditSinkError>;
}

fn default_index() -> String {
	DEFAULT_INDEX_PATTERN.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InternalStoreSettings {
	#[serde(default = "default_index")]
	index: String,
}

/// Indexes events into the local cluster.
pub struct InternalStoreTransport {
	index: IndexPattern,
	store: Arc<dyn DocumentStore>,
}

impl InternalStoreTransport {
	pub fn new(index: IndexPattern, store: Arc<dyn DocumentStore>) -> Self {
		Self { index, store }
	}
}

#[async_trait]
impl SinkTransport for InternalStoreTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let document = event
			.to_json()
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize event: {e}")))?;
		let index = self.index.render(event.timestamp);
		self.store
			.index(&index, &event.id.to_string(), &document)
			.await
	}
}

pub struct InternalStoreSinkFactory;

impl SinkFactory for InternalStoreSinkFactory {
	fn delivery_mode(&self) -> DeliveryMode {
		DeliveryMode::Pooled
	}

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>> {
		let settings: InternalStoreSettings = parse_settings(name, settings)?;
		let index = IndexPattern::parse(name, &settings.index)?;
		let store = ctx
			.document_store()
			.ok_or_else(|| AuditError::MissingCollaborator {
				sink: name.to_string(),
				collaborator: "document store",
			})?;
		Ok(Box::new(InternalStoreTransport::new(index, store)))
	}
}
