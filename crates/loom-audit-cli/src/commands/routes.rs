// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use loom_audit_config::AuditConfig;
use loom_audit_router::{
	AuditCategory, AuditSink, DeliveryMode, RoutingTable, SinkContext, SinkProvider, SinkRegistry,
};
use tracing::warn;

#[derive(Debug, Clone, clap::Args)]
pub struct RoutesArgs {
	/// Configuration file (defaults to /etc/loom/audit.toml)
	#[arg(short, long)]
	pub config: Option<PathBuf>,
}

pub async fn run(args: RoutesArgs) -> anyhow::Result<()> {
	let config = crate::load_config(args.config.as_deref())?;
	print!("{}", render(&config, &SinkRegistry::with_builtins()).await);
	Ok(())
}

/// Sink inventory followed by one line per category.
///
/// Every sink built for the listing is closed before this returns.
pub async fn render(config: &AuditConfig, registry: &SinkRegistry) -> String {
	let provider = SinkProvider::new(config, registry, &SinkContext::default());
	let table = RoutingTable::build(
		Arc::clone(provider.default_sink()),
		provider.sinks(),
		config.routing.as_ref(),
	);

	let mut out = String::new();
	let _ = writeln!(out, "sinks:");
	for name in provider.sink_names() {
		if let Some(sink) = provider.get_sink(name) {
			let _ = writeln!(out, "  {}", describe(&sink));
		}
	}
	let _ = writeln!(out, "  {}", describe(provider.fallback_sink()));

	let _ = writeln!(out, "routes:");
	for category in AuditCategory::ALL {
		let sinks = table
			.sinks_for(category)
			.iter()
			.map(|s| s.name())
			.collect::<Vec<_>>()
			.join(", ");
		let marker = if table.has_route(category) {
			""
		} else {
			" (implicit)"
		};
		let _ = writeln!(out, "  {category} -> {sinks}{marker}");
	}

	for e in provider.close().await {
		warn!(error = %e, "failed to close audit sink after listing routes");
	}
	out
}

fn describe(sink: &AuditSink) -> String {
	let mode = match sink.delivery_mode() {
		DeliveryMode::Inline => "inline",
		DeliveryMode::Pooled => "pooled",
	};
	format!("{} [{}, {}]", sink.name(), sink.sink_type(), mode)
}
