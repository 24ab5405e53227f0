// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Category to sink-list routing table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use loom_audit_config::RouteConfig;
use tracing::{debug, error, warn};

use crate::event::AuditCategory;
use crate::provider::DEFAULT_SINK_NAME;
use crate::sink::AuditSink;

/// Resolved routes, immutable once built.
///
/// A category either has a non-empty, name-unique list of sinks in
/// configuration order, or no entry at all. Categories without an entry are
/// delivered to the default sink only.
pub struct RoutingTable {
	default_sink: Arc<AuditSink>,
	routes: HashMap<AuditCategory, Vec<Arc<AuditSink>>>,
}

impl RoutingTable {
	/// Build the table.
	///
	/// `sinks` is keyed by lowercase sink name. `routing` is `None` when no
	/// routing configuration exists at all.
	pub fn build(
		default_sink: Arc<AuditSink>,
		sinks: &HashMap<String, Arc<AuditSink>>,
		routing: Option<&BTreeMap<String, RouteConfig>>,
	) -> Self {
		let mut routes = HashMap::new();

		for (key, route) in routing.into_iter().flatten() {
			let category = match key.parse::<AuditCategory>() {
				Ok(category) => category,
				Err(e) => {
					error!(category = %key, error = %e, "skipping routing entry");
					continue;
				}
			};
			if routes.contains_key(&category) {
				warn!(category = %key, "duplicate routing entry for category, ignoring");
				continue;
			}

			let resolved = resolve_route(category, route, &default_sink, sinks);
			if resolved.is_empty() {
				warn!(
					category = %category,
					"no valid sinks for category, routing to default sink only"
				);
				continue;
			}

			debug!(
				category = %category,
				sinks = ?resolved.iter().map(|s| s.name()).collect::<Vec<_>>(),
				"resolved audit route"
			);
			routes.insert(category, resolved);
		}

		Self {
			default_sink,
			routes,
		}
	}

	/// Sinks an event of `category` is delivered to.
	pub fn sinks_for(&self, category: AuditCategory) -> &[Arc<AuditSink>] {
		match self.routes.get(&category) {
			Some(sinks) => sinks,
			None => std::slice::from_ref(&self.default_sink),
		}
	}

	/// The explicit entry for `category`, if configuration produced one.
	pub fn route(&self, category: AuditCategory) -> Option<&[Arc<AuditSink>]> {
		self.routes.get(&category).map(Vec::as_slice)
	}

	pub fn has_route(&self, category: AuditCategory) -> bool {
		self.routes.contains_key(&category)
	}

	/// Categories with an explicit entry, in declaration order of the enum.
	pub fn categories(&self) -> Vec<AuditCategory> {
		let mut categories: Vec<_> = self.routes.keys().copied().collect();
		categories.sort();
		categories
	}

	pub fn default_sink(&self) -> &Arc<AuditSink> {
		&self.default_sink
	}

	pub fn len(&self) -> usize {
		self.routes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}
}

impl std::fmt::Debug for RoutingTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let routes: BTreeMap<_, Vec<_>> = self
			.routes
			.iter()
			.map(|(category, sinks)| (category.as_str(), sinks.iter().map(|s| s.name()).collect()))
			.collect();
		f.debug_struct("RoutingTable")
			.field("default_sink", &self.default_sink.name())
			.field("routes", &routes)
			.finish()
	}
}

fn resolve_route(
	category: AuditCategory,
	route: &RouteConfig,
	default_sink: &Arc<AuditSink>,
	sinks: &HashMap<String, Arc<AuditSink>>,
) -> Vec<Arc<AuditSink>> {
	let mut resolved: Vec<Arc<AuditSink>> = Vec::with_capacity(route.endpoints.len() + 1);

	for name in &route.endpoints {
		let key = name.trim().to_ascii_lowercase();
		let sink = if key == DEFAULT_SINK_NAME {
			Some(Arc::clone(default_sink))
		} else {
			sinks.get(&key).cloned()
		};

		match sink {
			Some(sink) if resolved.iter().any(|s| **s == *sink) => {
				debug!(category = %category, sink = %name, "sink listed twice, ignoring repeat");
			}
			Some(sink) => resolved.push(sink),
			None => {
				error!(category = %category, sink = %name, "routing references unknown audit sink");
			}
		}
	}

	if route.include_default && !resolved.iter().any(|s| **s == **default_sink) {
		resolved.push(Arc::clone(default_sink));
	}

	resolved
}
