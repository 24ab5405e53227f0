// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use loom_audit_config::SinkSettings;
use serde::Deserialize;

use super::{DeliveryMode, SinkTransport};
use crate::error::{AuditResult, AuditSinkError};
use crate::event::AuditEvent;
use crate::registry::{parse_settings, SinkContext, SinkFactory};

pub const LOG_SINK_TYPE: &str = "log";

/// Target every audit record is emitted on.
pub const AUDIT_LOG_TARGET: &str = "audit";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	Debug,
	#[default]
	Info,
	Warn,
	Error,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSettings {
	#[serde(default)]
	level: LogLevel,
}

/// Emits each event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport {
	level: LogLevel,
}

impl LogTransport {
	pub fn new(level: LogLevel) -> Self {
		Self { level }
	}

	pub fn level(&self) -> LogLevel {
		self.level
	}
}

#[async_trait]
impl SinkTransport for LogTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let record = serde_json::to_string(event)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize event: {e}")))?;

		macro_rules! emit {
			($level:ident) => {
				tracing::$level!(
					target: AUDIT_LOG_TARGET,
					event_id = %event.id,
					category = %event.category,
					record = %record,
					"audit event"
				)
			};
		}

		match self.level {
			LogLevel::Trace => emit!(trace),
			LogLevel::Debug => emit!(debug),
			LogLevel::Info => emit!(info),
			LogLevel::Warn => emit!(warn),
			LogLevel::Error => emit!(error),
		}
		Ok(())
	}
}

pub struct LogSinkFactory;

impl SinkFactory for LogSinkFactory {
	fn delivery_mode(&self) -> DeliveryMode {
		DeliveryMode::Inline
	}

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		_ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>> {
		let settings: LogSettings = parse_settings(name, settings)?;
		Ok(Box::new(LogTransport::new(settings.level)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::AuditCategory;
	use serde_json::json;

	#[test]
	fn test_level_defaults_to_info() {
		let settings: LogSettings = parse_settings("log", &SinkSettings::new()).unwrap();
		assert_eq!(settings.level, LogLevel::Info);
	}

	#[test]
	fn test_level_parses_lowercase() {
		let raw = json!({ "level": "error" }).as_object().cloned().unwrap();
		let settings: LogSettings = parse_settings("log", &raw).unwrap();
		assert_eq!(settings.level, LogLevel::Error);
	}

	#[test]
	fn test_unknown_setting_is_rejected() {
		let raw = json!({ "lvl": "error" }).as_object().cloned().unwrap();
		assert!(parse_settings::<LogSettings>("log", &raw).is_err());
	}

	#[tokio::test]
	async fn test_deliver_at_every_level() {
		let event = AuditEvent::builder(AuditCategory::IndexEvent).index("logs").build();
		for level in [
			LogLevel::Trace,
			LogLevel::Debug,
			LogLevel::Info,
			LogLevel::Warn,
			LogLevel::Error,
		] {
			assert!(LogTransport::new(level).deliver(&event).await.is_ok());
		}
	}
}
