// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use loom_audit_config::SinkSettings;
use serde::Deserialize;

use super::http::{
	build_client, default_timeout_ms, parse_url, request_error, sign_payload, status_error,
};
use super::{DeliveryMode, SinkTransport};
use crate::error::{AuditResult, AuditSinkError};
use crate::event::AuditEvent;
use crate::registry::{parse_settings, SinkContext, SinkFactory};

pub const WEBHOOK_SINK_TYPE: &str = "webhook";
pub const SIGNATURE_HEADER: &str = "X-Loom-Signature-256";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFormat {
	#[default]
	Json,
	Text,
	Slack,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WebhookSettings {
	url: String,
	#[serde(default)]
	format: WebhookFormat,
	secret: Option<String>,
	#[serde(default = "default_timeout_ms")]
	timeout_ms: u64,
}

/// Body and content type for one event in the given format.
pub fn format_body(
	format: WebhookFormat,
	event: &AuditEvent,
) -> Result<(Vec<u8>, &'static str), AuditSinkError> {
	let serialize_error =
		|e: serde_json::Error| AuditSinkError::Permanent(format!("failed to serialize event: {e}"));
	match format {
		WebhookFormat::Json => Ok((
			serde_json::to_vec(event).map_err(serialize_error)?,
			"application/json",
		)),
		WebhookFormat::Text => Ok((
			format!("{} {}", event.category, event.render()).into_bytes(),
			"text/plain; charset=utf-8",
		)),
		WebhookFormat::Slack => {
			let text = format!("*Audit event* `{}`\n```{}```", event.category, event.render());
			let body =
				serde_json::to_vec(&serde_json::json!({ "text": text })).map_err(serialize_error)?;
			Ok((body, "application/json"))
		}
	}
}

pub struct WebhookTransport {
	client: reqwest::Client,
	url: reqwest::Url,
	format: WebhookFormat,
	secret: Option<String>,
}

#[async_trait]
impl SinkTransport for WebhookTransport {
	async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let (body, content_type) = format_body(self.format, event)?;

		let mut request = self
			.client
			.post(self.url.clone())
			.header("Content-Type", content_type)
			.header("X-Loom-Audit-Category", event.category.as_str())
			.header("X-Loom-Delivery", event.id.to_string());
		if let Some(secret) = &self.secret {
			request = request.header(SIGNATURE_HEADER, sign_payload(secret.as_bytes(), &body));
		}

		let response = request.body(body).send().await.map_err(request_error)?;
		let status = response.status();
		if status.is_success() {
			return Ok(());
		}
		let text = response.text().await.unwrap_or_default();
		Err(status_error(status, &text))
	}
}

pub struct WebhookSinkFactory;

impl SinkFactory for WebhookSinkFactory {
	fn delivery_mode(&self) -> DeliveryMode {
		DeliveryMode::Pooled
	}

	fn build(
		&self,
		name: &str,
		settings: &SinkSettings,
		_ctx: &SinkContext,
	) -> AuditResult<Box<dyn SinkTransport>> {
		let settings: WebhookSettings = parse_settings(name, settings)?;
		Ok(Box::new(WebhookTransport {
			client: build_client(name, settings.timeout_ms)?,
			url: parse_url(name, "url", &settings.url)?,
			format: settings.format,
			secret: settings.secret.filter(|s| !s.is_empty()),
		}))
	}
}
