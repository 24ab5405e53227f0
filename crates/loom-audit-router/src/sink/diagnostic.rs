// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;

use crate::event::AuditEvent;

/// Last-resort output for events no sink could store.
pub trait DiagnosticWriter: Send + Sync {
	fn write(&self, sink: &str, event: &AuditEvent);
}

/// Writes undeliverable events to the process error stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrDiagnostics;

impl DiagnosticWriter for StderrDiagnostics {
	fn write(&self, sink: &str, event: &AuditEvent) {
		let mut stderr = std::io::stderr().lock();
		// Nothing left to report a failed write to.
		let _ = writeln!(stderr, "{}", format_undeliverable(sink, event));
	}
}

pub fn format_undeliverable(sink: &str, event: &AuditEvent) -> String {
	format!(
		"AUDIT_LOG_UNDELIVERED sink={sink} category={} {}",
		event.category,
		event.render()
	)
}
