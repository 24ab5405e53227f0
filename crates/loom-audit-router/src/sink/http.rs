// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared plumbing for HTTP-based sinks.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha2::Sha256;

use crate::error::{AuditError, AuditResult, AuditSinkError};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const USER_AGENT: &str = "Loom-Audit/1.0";

pub(crate) fn default_timeout_ms() -> u64 {
	DEFAULT_TIMEOUT_MS
}

pub(crate) fn build_client(sink: &str, timeout_ms: u64) -> AuditResult<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(Duration::from_millis(timeout_ms))
		.user_agent(USER_AGENT)
		.build()
		.map_err(|e| AuditError::InvalidSettings {
			sink: sink.to_string(),
			message: format!("failed to build HTTP client: {e}"),
		})
}

pub(crate) fn parse_url(sink: &str, key: &str, raw: &str) -> AuditResult<reqwest::Url> {
	let url = reqwest::Url::parse(raw).map_err(|e| AuditError::InvalidSettings {
		sink: sink.to_string(),
		message: format!("{key} '{raw}' is not a valid URL: {e}"),
	})?;
	match url.scheme() {
		"http" | "https" => Ok(url),
		other => Err(AuditError::InvalidSettings {
			sink: sink.to_string(),
			message: format!("{key} uses unsupported scheme '{other}'"),
		}),
	}
}

/// Map a non-success response status onto the sink error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> AuditSinkError {
	let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 256));
	if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
		AuditSinkError::Transient(message)
	} else {
		AuditSinkError::Permanent(message)
	}
}

pub(crate) fn request_error(e: reqwest::Error) -> AuditSinkError {
	if e.is_builder() {
		AuditSinkError::Permanent(format!("invalid request: {e}"))
	} else {
		AuditSinkError::Transient(format!("request failed: {e}"))
	}
}

/// `sha256=<hex>` HMAC signature of `body`.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> String {
	let mut mac = match HmacSha256::new_from_slice(secret) {
		Ok(mac) => mac,
		Err(_) => return String::new(),
	};
	mac.update(body);
	format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn truncate(s: &str, max: usize) -> &str {
	match s.char_indices().nth(max) {
		Some((end, _)) => &s[..end],
		None => s,
	}
}
