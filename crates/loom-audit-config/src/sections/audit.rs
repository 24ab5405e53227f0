// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit routing configuration section (`[audit]`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::routing::{RouteConfig, RouteConfigLayer};
use super::sink::{EndpointConfigLayer, SinkConfig, SinkSettings};
use super::threadpool::{ThreadPoolConfig, ThreadPoolConfigLayer};

/// The `audit.config` block: default sink settings, fallback sink and named endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SinkBlocksLayer {
	pub default: Option<SinkSettings>,
	pub fallback: Option<EndpointConfigLayer>,
	pub endpoints: Option<BTreeMap<String, EndpointConfigLayer>>,
}

impl SinkBlocksLayer {
	pub fn merge(&mut self, other: Self) {
		if other.default.is_some() {
			self.default = other.default;
		}
		if let Some(overlay) = other.fallback {
			match self.fallback.as_mut() {
				Some(base) => base.merge(overlay),
				None => self.fallback = Some(overlay),
			}
		}
		if let Some(overlay) = other.endpoints {
			let endpoints = self.endpoints.get_or_insert_with(BTreeMap::new);
			for (name, layer) in overlay {
				match endpoints.get_mut(&name) {
					Some(existing) => existing.merge(layer),
					None => {
						endpoints.insert(name, layer);
					}
				}
			}
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	/// Type of the default sink (`audit.type`).
	#[serde(rename = "type")]
	pub sink_type: Option<String>,
	pub config: Option<SinkBlocksLayer>,
	pub routing: Option<BTreeMap<String, RouteConfigLayer>>,
	pub threadpool: Option<ThreadPoolConfigLayer>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.sink_type.is_some() {
			self.sink_type = other.sink_type;
		}
		if let Some(overlay) = other.config {
			match self.config.as_mut() {
				Some(base) => base.merge(overlay),
				None => self.config = Some(overlay),
			}
		}
		if let Some(overlay) = other.routing {
			let routing = self.routing.get_or_insert_with(BTreeMap::new);
			for (category, layer) in overlay {
				match routing.get_mut(&category) {
					Some(existing) => existing.merge(layer),
					None => {
						routing.insert(category, layer);
					}
				}
			}
		}
		if let Some(overlay) = other.threadpool {
			match self.threadpool.as_mut() {
				Some(base) => base.merge(overlay),
				None => self.threadpool = Some(overlay),
			}
		}
	}

	pub fn finalize(self) -> AuditConfig {
		let blocks = self.config.unwrap_or_default();

		let default_sink = SinkConfig::new(self.sink_type, blocks.default.unwrap_or_default());
		let fallback_sink = blocks.fallback.map(EndpointConfigLayer::finalize);
		let endpoints = blocks
			.endpoints
			.unwrap_or_default()
			.into_iter()
			.map(|(name, layer)| (name, layer.finalize()))
			.collect();
		let routing = self.routing.map(|routes| {
			routes
				.into_iter()
				.map(|(category, layer)| (category, layer.finalize()))
				.collect()
		});

		AuditConfig {
			default_sink,
			fallback_sink,
			endpoints,
			routing,
			threadpool: self.threadpool.unwrap_or_default().finalize(),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
	pub default_sink: SinkConfig,
	pub fallback_sink: Option<SinkConfig>,
	pub endpoints: BTreeMap<String, SinkConfig>,
	/// `None` when no routing section was supplied at all.
	pub routing: Option<BTreeMap<String, RouteConfig>>,
	pub threadpool: ThreadPoolConfig,
}
