// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;

use async_trait::async_trait;
use loom_audit_config::SinkSettings;
use serde::Deserialize;

use super::{DeliveryMode, SinkTransport};
use crate::error::{AuditResult, AuditSinkError};
use crate::event::AuditEvent;
use crate::registry::{parse_settings, SinkContext, SinkFactory};

pub const DEBUG_SINK_TYPE: &str = "debug";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
	#[default]
	Stdout,
	Stderr,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DebugSettings {
	#[serde(default)]
	stream: ConsoleStream,
}

/// Prints every event to the console.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugTransport {
	stream: ConsoleStream,
}

impl DebugTransport {
	pub fn new(stream: ConsoleStream) -> Self {
		Self { stream }
	}
}

pub fn format_debug_line(event: &AuditEvent) -> String {
	format!("AUDIT_LOG {} {}", event.category, event.render())
}

#[async_trait]
impl SinkTransport for DebugTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let line = format_debug_line(event);
		let result = match self.stream {
			ConsoleStream::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
			ConsoleStream::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
		};
		result.map_err(|e| AuditSinkError::Transient(format!("console write failed: {e}")))
	}
}

pub struct DebugSinkFactory;

impl SinkFactory for DebugSinkFactory {
	fn delivery_mode(&self) -> DeliveryMode {
		DeliveryMode::Inline
	}

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		_ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>> {
		let settings: DebugSettings = parse_settings(name, settings)?;
		Ok(Box::new(DebugTransport::new(settings.stream)))
	}
}
