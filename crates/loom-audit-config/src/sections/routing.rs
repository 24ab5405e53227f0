// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-category routing declarations (`audit.routing.<category>`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouteConfigLayer {
	pub endpoints: Option<Vec<String>>,
	pub include_default: Option<bool>,
}

impl RouteConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.endpoints.is_some() {
			self.endpoints = other.endpoints;
		}
		if other.include_default.is_some() {
			self.include_default = other.include_default;
		}
	}

	pub fn finalize(self) -> RouteConfig {
		RouteConfig {
			endpoints: self.endpoints.unwrap_or_default(),
			include_default: self.include_default.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
	/// Sink names in delivery order, as written in configuration.
	pub endpoints: Vec<String>,
	/// Whether the default sink is appended to `endpoints`.
	pub include_default: bool,
}

impl RouteConfig {
	pub fn new<I, S>(endpoints: I, include_default: bool) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			endpoints: endpoints.into_iter().map(Into::into).collect(),
			include_default,
		}
	}
}
