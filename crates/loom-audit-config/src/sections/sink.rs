// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sink declaration blocks (`audit.config.*`).

use serde::{Deserialize, Serialize};

/// Free-form, type-specific settings of a single sink.
pub type SinkSettings = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfigLayer {
	#[serde(rename = "type")]
	pub sink_type: Option<String>,
	pub config: Option<SinkSettings>,
}

impl EndpointConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.sink_type.is_some() {
			self.sink_type = other.sink_type;
		}
		if other.config.is_some() {
			self.config = other.config;
		}
	}

	pub fn finalize(self) -> SinkConfig {
		SinkConfig::new(self.sink_type, self.config.unwrap_or_default())
	}
}

/// A resolved sink declaration: its type identifier and its settings.
///
/// # Security Note
///
/// Settings may carry credentials (passwords, webhook secrets), so the `Debug`
/// impl lists setting keys only.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SinkConfig {
	/// Type identifier; `None` when the declaration is missing one.
	pub sink_type: Option<String>,
	pub settings: SinkSettings,
}

impl SinkConfig {
	pub fn new(sink_type: Option<String>, settings: SinkSettings) -> Self {
		let sink_type = sink_type
			.map(|t| t.trim().to_string())
			.filter(|t| !t.is_empty());
		Self {
			sink_type,
			settings,
		}
	}

	pub fn of_type(sink_type: impl Into<String>) -> Self {
		Self::new(Some(sink_type.into()), SinkSettings::new())
	}

	pub fn with_setting(
		mut self,
		key: impl Into<String>,
		value: impl Into<serde_json::Value>,
	) -> Self {
		self.settings.insert(key.into(), value.into());
		self
	}
}

impl std::fmt::Debug for SinkConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SinkConfig")
			.field("sink_type", &self.sink_type)
			.field(
				"settings",
				&format!(
					"[{}] (values REDACTED)",
					self.settings.keys().cloned().collect::<Vec<_>>().join(", ")
				),
			)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn blank_type_is_treated_as_missing() {
		let config = SinkConfig::new(Some("   ".to_string()), SinkSettings::new());
		assert!(config.sink_type.is_none());
	}

	#[test]
	fn type_is_trimmed() {
		let config = SinkConfig::new(Some(" webhook ".to_string()), SinkSettings::new());
		assert_eq!(config.sink_type.as_deref(), Some("webhook"));
	}

	#[test]
	fn debug_redacts_setting_values() {
		let config = SinkConfig::of_type("external_elasticsearch")
			.with_setting("username", "admin")
			.with_setting("password", "hunter2");
		let debug = format!("{config:?}");
		assert!(debug.contains("password"));
		assert!(!debug.contains("hunter2"));
		assert!(!debug.contains("admin"));
	}

	#[test]
	fn endpoint_layer_merge_keeps_unset_fields() {
		let mut base = EndpointConfigLayer {
			sink_type: Some("webhook".to_string()),
			config: Some(json!({"url": "https://a"}).as_object().cloned().unwrap()),
		};
		base.merge(EndpointConfigLayer {
			sink_type: None,
			config: Some(json!({"url": "https://b"}).as_object().cloned().unwrap()),
		});
		let config = base.finalize();
		assert_eq!(config.sink_type.as_deref(), Some("webhook"));
		assert_eq!(config.settings["url"], "https://b");
	}
}
