// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom audit operator tool.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use loom_audit_config::AuditConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Inspect audit routing and replay recorded audit events.
#[derive(Parser, Debug)]
#[command(name = "loom-audit", about = "Loom audit routing tool", version)]
struct Args {
	/// Default log filter; `RUST_LOG` takes precedence when set
	#[arg(long, global = true, default_value = "info", env = "LOOM_AUDIT_LOG_LEVEL")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the resolved sink list for every audit category
	Routes(commands::routes::RoutesArgs),
	/// Route JSON-lines audit events through a live router
	Replay(commands::replay::ReplayArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| args.log_level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	match args.command {
		Command::Routes(args) => commands::routes::run(args).await,
		Command::Replay(args) => commands::replay::run(args).await,
	}
}

/// Load configuration, from `path` when given, otherwise from the standard
/// locations.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<AuditConfig> {
	let config = match path {
		Some(path) => loom_audit_config::load_config_with_file(PathBuf::from(path))?,
		None => loom_audit_config::load_config()?,
	};
	Ok(config)
}
