// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use loom_audit_config::SinkSettings;
use serde::Deserialize;

use super::{DeliveryMode, SinkTransport};
use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::event::AuditEvent;
use crate::registry::{parse_settings, SinkContext, SinkFactory};

pub const KAFKA_SINK_TYPE: &str = "kafka";

/// Message broker client supplied by the host process.
///
/// The client owns its buffering and blocks `send` when that buffer is full,
/// which is why broker sinks are stored inline.
#[async_trait]
pub trait MessageProducer: Send + Sync {
	async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), AuditSinkError>;

	async fn flush(&self) -> Result<(), AuditSinkError> {
		Ok(())
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KafkaSettings {
	topic_name: String,
}

pub struct KafkaTransport {
	topic: String,
	producer: Arc<dyn MessageProducer>,
}

impl KafkaTransport {
	pub fn new(topic: impl Into<String>, producer: Arc<dyn MessageProducer>) -> Self {
		Self {
			topic: topic.into(),
			producer,
		}
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}
}

#[async_trait]
impl SinkTransport for KafkaTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let payload = serde_json::to_vec(event)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize event: {e}")))?;
		self.producer
			.send(&self.topic, &event.id.to_string(), payload)
			.await
	}

	async fn close(&self) -> Result<(), AuditSinkError> {
		self.producer.flush().await
	}
}

pub struct KafkaSinkFactory;

impl SinkFactory for KafkaSinkFactory {
	fn delivery_mode(&self) -> DeliveryMode {
		DeliveryMode::Inline
	}

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>> {
		let settings: KafkaSettings = parse_settings(name, settings)?;
		if settings.topic_name.trim().is_empty() {
			return Err(AuditError::InvalidSettings {
				sink: name.to_string(),
				message: "topic_name must not be empty".to_string(),
			});
		}
		let producer = ctx
			.message_producer()
			.ok_or_else(|| AuditError::MissingCollaborator {
				sink: name.to_string(),
				collaborator: "message producer",
			})?;
		Ok(Box::new(KafkaTransport::new(settings.topic_name, producer)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::AuditCategory;
	use serde_json::json;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Mutex;

	#[derive(Default)]
	struct RecordingProducer {
		sent: Mutex<Vec<(String, String, Vec<u8>)>>,
		flushed: AtomicBool,
	}

	#[async_trait]
	impl MessageProducer for RecordingProducer {
		async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), AuditSinkError> {
			self.sent
				.lock()
				.unwrap()
				.push((topic.to_string(), key.to_string(), payload));
			Ok(())
		}

		async fn flush(&self) -> Result<(), AuditSinkError> {
			self.flushed.store(true, Ordering::SeqCst);
			Ok(())
		}
	}

	fn settings(value: serde_json::Value) -> SinkSettings {
		value.as_object().cloned().unwrap()
	}

	#[tokio::test]
	async fn test_deliver_sends_json_keyed_by_event_id() {
		let producer = Arc::new(RecordingProducer::default());
		let transport = KafkaTransport::new("audit", producer.clone());
		let event = AuditEvent::builder(AuditCategory::FailedLogin).user("eve").build();

		transport.deliver(&event).await.unwrap();

		let sent = producer.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		let (topic, key, payload) = &sent[0];
		assert_eq!(topic, "audit");
		assert_eq!(key, &event.id.to_string());
		let decoded: AuditEvent = serde_json::from_slice(payload).unwrap();
		assert_eq!(decoded, event);
	}

	#[tokio::test]
	async fn test_close_flushes_producer() {
		let producer = Arc::new(RecordingProducer::default());
		let transport = KafkaTransport::new("audit", producer.clone());
		transport.close().await.unwrap();
		assert!(producer.flushed.load(Ordering::SeqCst));
	}

	#[test]
	fn test_factory_requires_producer() {
		let err = KafkaSinkFactory
			.build(
				"broker",
				&settings(json!({ "topic_name": "audit" })),
				&SinkContext::default(),
			)
			.err()
			.unwrap();
		assert!(matches!(
			err,
			AuditError::MissingCollaborator {
				collaborator: "message producer",
				..
			}
		));
	}

	#[test]
	fn test_factory_requires_topic() {
		let ctx = SinkContext::default().with_message_producer(Arc::new(RecordingProducer::default()));
		let missing = KafkaSinkFactory.build("broker", &SinkSettings::new(), &ctx);
		assert!(matches!(missing.err(), Some(AuditError::InvalidSettings { .. })));

		let blank = KafkaSinkFactory.build("broker", &settings(json!({ "topic_name": " " })), &ctx);
		assert!(matches!(blank.err(), Some(AuditError::InvalidSettings { .. })));
	}

	#[test]
	fn test_factory_builds_with_producer() {
		let ctx = SinkContext::default().with_message_producer(Arc::new(RecordingProducer::default()));
		let result = KafkaSinkFactory.build("broker", &settings(json!({ "topic_name": "audit" })), &ctx);
		assert!(result.is_ok());
	}
}
