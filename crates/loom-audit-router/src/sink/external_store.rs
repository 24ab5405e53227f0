// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use loom_audit_config::SinkSettings;
use serde::Deserialize;
use tracing::debug;

use super::http::{build_client, default_timeout_ms, parse_url, request_error, status_error};
use super::index::{IndexPattern, DEFAULT_INDEX_PATTERN};
use super::{DeliveryMode, SinkTransport};
use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::event::AuditEvent;
use crate::registry::{parse_settings, SinkContext, SinkFactory};

pub const EXTERNAL_STORE_SINK_TYPE: &str = "external_elasticsearch";

fn default_index() -> String {
	DEFAULT_INDEX_PATTERN.to_string()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalStoreSettings {
	http_endpoints: Vec<String>,
	#[serde(default = "default_index")]
	index: String,
	username: Option<String>,
	password: Option<String>,
	#[serde(default = "default_timeout_ms")]
	timeout_ms: u64,
}

#[derive(Clone)]
struct BasicAuth {
	username: String,
	password: Option<String>,
}

/// Indexes events into a remote cluster over its HTTP document API.
pub struct ExternalStoreTransport {
	client: reqwest::Client,
	endpoints: Vec<reqwest::Url>,
	index: IndexPattern,
	auth: Option<BasicAuth>,
}

impl ExternalStoreTransport {
	pub fn endpoints(&self) -> &[reqwest::Url] {
		&self.endpoints
	}

	fn document_url(endpoint: &reqwest::Url, index: &str, id: &str) -> String {
		format!(
			"{}/{}/_doc/{}",
			endpoint.as_str().trim_end_matches('/'),
			index,
			id
		)
	}

	async fn post(
		&self,
		url: &str,
		document: &serde_json::Value,
	) -> Result<(), AuditSinkError> {
		let mut request = self.client.post(url).json(document);
		if let Some(auth) = &self.auth {
			request = request.basic_auth(&auth.username, auth.password.as_deref());
		}

		let response = request.send().await.map_err(request_error)?;
		let status = response.status();
		if status.is_success() {
			return Ok(());
		}
		let body = response.text().await.unwrap_or_default();
		Err(status_error(status, &body))
	}
}

#[async_trait]
impl SinkTransport for ExternalStoreTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let document = event
			.to_json()
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize event: {e}")))?;
		let index = self.index.render(event.timestamp);
		let id = event.id.to_string();

		let mut last_error = AuditSinkError::Transient("no endpoints configured".to_string());
		for endpoint in &self.endpoints {
			let url = Self::document_url(endpoint, &index, &id);
			match self.post(&url, &document).await {
				Ok(()) => return Ok(()),
				Err(e @ AuditSinkError::Permanent(_)) => return Err(e),
				Err(e) => {
					debug!(endpoint = %endpoint, error = %e, "external store endpoint failed, trying next");
					last_error = e;
				}
			}
		}
		Err(last_error)
	}
}

pub struct ExternalStoreSinkFactory;

impl SinkFactory for ExternalStoreSinkFactory {
	fn delivery_mode(&self) -> DeliveryMode {
		DeliveryMode::Pooled
	}

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		_ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>> {
		let settings: ExternalStoreSettings = parse_settings(name, settings)?;

		if settings.http_endpoints.is_empty() {
			return Err(AuditError::InvalidSettings {
				sink: name.to_string(),
				message: "http_endpoints must list at least one endpoint".to_string(),
			});
		}
		let endpoints = settings
			.http_endpoints
			.iter()
			.map(|raw| parse_url(name, "http_endpoints", raw))
			.collect::<AuditResult<Vec<_>>>()?;

		let auth = match (settings.username, settings.password) {
			(Some(username), password) => Some(BasicAuth { username, password }),
			(None, Some(_)) => {
				return Err(AuditError::InvalidSettings {
					sink: name.to_string(),
					message: "password is set without a username".to_string(),
				})
			}
			(None, None) => None,
		};

		Ok(Box::new(ExternalStoreTransport {
			client: build_client(name, settings.timeout_ms)?,
			endpoints,
			index: IndexPattern::parse(name, &settings.index)?,
			auth,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn settings(value: serde_json::Value) -> SinkSettings {
		value.as_object().cloned().unwrap()
	}

	fn build(value: serde_json::Value) -> AuditResult<Box<dyn SinkTransport>> {
		ExternalStoreSinkFactory.build("remote", &settings(value), &SinkContext::default())
	}

	#[test]
	fn test_document_url_joins_segments() {
		let endpoint = reqwest::Url::parse("https://es.example.com:9200/").unwrap();
		assert_eq!(
			ExternalStoreTransport::document_url(&endpoint, "auditlog-2025.01.01", "abc"),
			"https://es.example.com:9200/auditlog-2025.01.01/_doc/abc"
		);
	}

	#[test]
	fn test_requires_endpoints() {
		assert!(matches!(
			build(json!({})).err(),
			Some(AuditError::InvalidSettings { .. })
		));
		assert!(matches!(
			build(json!({ "http_endpoints": [] })).err(),
			Some(AuditError::InvalidSettings { .. })
		));
	}

	#[test]
	fn test_rejects_invalid_endpoint() {
		let result = build(json!({ "http_endpoints": ["https://ok.example.com", "::nope::"] }));
		assert!(matches!(result.err(), Some(AuditError::InvalidSettings { .. })));
	}

	#[test]
	fn test_rejects_password_without_username() {
		let result = build(json!({
			"http_endpoints": ["https://es.example.com"],
			"password": "hunter2"
		}));
		assert!(matches!(result.err(), Some(AuditError::InvalidSettings { .. })));
	}

	#[test]
	fn test_builds_with_full_settings() {
		let result = build(json!({
			"http_endpoints": ["https://es1.example.com", "https://es2.example.com"],
			"index": "security-%Y",
			"username": "audit",
			"password": "hunter2",
			"timeout_ms": 250
		}));
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn test_unreachable_endpoints_are_transient() {
		let transport = build(json!({
			"http_endpoints": ["http://127.0.0.1:1", "http://127.0.0.1:2"],
			"timeout_ms": 500
		}))
		.ok()
		.unwrap();
		let event = AuditEvent::builder(crate::event::AuditCategory::Authenticated).build();
		let err = transport.deliver(&event).await.unwrap_err();
		assert!(matches!(err, AuditSinkError::Transient(_)));
	}
}
