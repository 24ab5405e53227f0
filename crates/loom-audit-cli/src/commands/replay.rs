// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::Context;
use loom_audit_router::{AuditEvent, AuditMessageRouter, SinkContext, SinkRegistry};
use tracing::{info, warn};

#[derive(Debug, Clone, clap::Args)]
pub struct ReplayArgs {
	/// Configuration file (defaults to /etc/loom/audit.toml)
	#[arg(short, long)]
	pub config: Option<PathBuf>,

	/// JSON-lines file with one audit event per line
	pub file: PathBuf,
}

pub async fn run(args: ReplayArgs) -> anyhow::Result<()> {
	let config = crate::load_config(args.config.as_deref())?;
	let file = File::open(&args.file)
		.with_context(|| format!("failed to open {}", args.file.display()))?;
	let (events, skipped) = read_events(BufReader::new(file))?;

	let router = AuditMessageRouter::new(&config, &SinkRegistry::with_builtins(), SinkContext::default());
	let total = events.len();
	for event in events {
		router.route(event).await;
	}
	router.close().await;

	info!(routed = total, skipped, "replay finished");
	print!("{}", router.metrics().encode());
	Ok(())
}

/// Parse events, skipping blank lines. Malformed lines are logged and counted.
pub fn read_events(reader: impl BufRead) -> anyhow::Result<(Vec<AuditEvent>, usize)> {
	let mut events = Vec::new();
	let mut skipped = 0;

	for (index, line) in reader.lines().enumerate() {
		let line = line.context("failed to read event file")?;
		if line.trim().is_empty() {
			continue;
		}
		match serde_json::from_str::<AuditEvent>(&line) {
			Ok(event) => events.push(event),
			Err(e) => {
				warn!(line = index + 1, error = %e, "skipping malformed audit event");
				skipped += 1;
			}
		}
	}

	Ok((events, skipped))
}
