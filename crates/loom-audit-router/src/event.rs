// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit routing.
//!
//! This module provides the foundational types for the audit system:
//!
//! - [`AuditCategory`]: Closed set of audited occurrences, the sole routing key
//! - [`AuditEvent`]: Immutable record handed to every sink that receives it
//! - [`AuditEventBuilder`]: Fluent API for constructing events

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kinds of events that can be recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
	// Request-level events
	BadHeaders,
	FailedLogin,
	MissingPrivileges,
	GrantedPrivileges,
	SecurityIndexAttempt,
	SslException,
	Authenticated,
	IndexEvent,

	// Compliance events
	ComplianceDocRead,
	ComplianceDocWrite,
	ComplianceExternalConfig,
	ComplianceInternalConfigRead,
	ComplianceInternalConfigWrite,
}

impl AuditCategory {
	pub const ALL: [AuditCategory; 13] = [
		AuditCategory::BadHeaders,
		AuditCategory::FailedLogin,
		AuditCategory::MissingPrivileges,
		AuditCategory::GrantedPrivileges,
		AuditCategory::SecurityIndexAttempt,
		AuditCategory::SslException,
		AuditCategory::Authenticated,
		AuditCategory::IndexEvent,
		AuditCategory::ComplianceDocRead,
		AuditCategory::ComplianceDocWrite,
		AuditCategory::ComplianceExternalConfig,
		AuditCategory::ComplianceInternalConfigRead,
		AuditCategory::ComplianceInternalConfigWrite,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			AuditCategory::BadHeaders => "BAD_HEADERS",
			AuditCategory::FailedLogin => "FAILED_LOGIN",
			AuditCategory::MissingPrivileges => "MISSING_PRIVILEGES",
			AuditCategory::GrantedPrivileges => "GRANTED_PRIVILEGES",
			AuditCategory::SecurityIndexAttempt => "SECURITY_INDEX_ATTEMPT",
			AuditCategory::SslException => "SSL_EXCEPTION",
			AuditCategory::Authenticated => "AUTHENTICATED",
			AuditCategory::IndexEvent => "INDEX_EVENT",
			AuditCategory::ComplianceDocRead => "COMPLIANCE_DOC_READ",
			AuditCategory::ComplianceDocWrite => "COMPLIANCE_DOC_WRITE",
			AuditCategory::ComplianceExternalConfig => "COMPLIANCE_EXTERNAL_CONFIG",
			AuditCategory::ComplianceInternalConfigRead => "COMPLIANCE_INTERNAL_CONFIG_READ",
			AuditCategory::ComplianceInternalConfigWrite => "COMPLIANCE_INTERNAL_CONFIG_WRITE",
		}
	}

	/// Whether this category belongs to the compliance family.
	pub fn is_compliance(&self) -> bool {
		matches!(
			self,
			AuditCategory::ComplianceDocRead
				| AuditCategory::ComplianceDocWrite
				| AuditCategory::ComplianceExternalConfig
				| AuditCategory::ComplianceInternalConfigRead
				| AuditCategory::ComplianceInternalConfigWrite
		)
	}
}

impl fmt::Display for AuditCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown audit category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for AuditCategory {
	type Err = UnknownCategory;

	/// Parses a category name case-insensitively; `-` is accepted for `_`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().replace('-', "_");
		AuditCategory::ALL
			.iter()
			.copied()
			.find(|c| c.as_str().eq_ignore_ascii_case(&normalized))
			.ok_or_else(|| UnknownCategory(s.to_string()))
	}
}

/// The request layer an event was raised on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLayer {
	Rest,
	Transport,
}

/// Where the audited request entered the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOrigin {
	/// Received from a remote client or node.
	Remote,
	/// Issued by the node itself.
	Local,
}

/// Identity of the node that produced an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
	pub id: String,
	pub name: String,
	pub host: String,
	pub address: String,
}

/// An audited occurrence.
///
/// Events are shared between sinks and workers as `Arc<AuditEvent>` and are
/// never mutated after [`AuditEventBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
	/// Unique identifier for this event.
	pub id: Uuid,
	/// The routing key.
	pub category: AuditCategory,
	/// When the event occurred.
	pub timestamp: DateTime<Utc>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cluster_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node: Option<NodeIdentity>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub layer: Option<AuditLayer>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub origin: Option<AuditOrigin>,

	/// Indices targeted by the audited request.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub indices: Vec<String>,

	/// Authenticated user.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<String>,
	/// User the request was executed as, when impersonating.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub effective_user: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub remote_address: Option<String>,

	/// Category-specific details.
	#[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
	pub payload: serde_json::Map<String, serde_json::Value>,
}

impl AuditEvent {
	/// Create a new event builder for the given category.
	pub fn builder(category: AuditCategory) -> AuditEventBuilder {
		AuditEventBuilder::new(category)
	}

	pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
		serde_json::to_value(self)
	}

	/// Human-readable rendering used by console and diagnostic output.
	pub fn render(&self) -> String {
		serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
	}
}

/// Builder for constructing audit events with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
	category: AuditCategory,
	timestamp: Option<DateTime<Utc>>,
	cluster_name: Option<String>,
	node: Option<NodeIdentity>,
	layer: Option<AuditLayer>,
	origin: Option<AuditOrigin>,
	indices: Vec<String>,
	user: Option<String>,
	effective_user: Option<String>,
	remote_address: Option<String>,
	payload: serde_json::Map<String, serde_json::Value>,
}

impl AuditEventBuilder {
	pub fn new(category: AuditCategory) -> Self {
		Self {
			category,
			timestamp: None,
			cluster_name: None,
			node: None,
			layer: None,
			origin: None,
			indices: Vec::new(),
			user: None,
			effective_user: None,
			remote_address: None,
			payload: serde_json::Map::new(),
		}
	}

	/// Override the event time. Defaults to the moment of `build()`.
	pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}

	pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
		self.cluster_name = Some(name.into());
		self
	}

	pub fn node(mut self, node: NodeIdentity) -> Self {
		self.node = Some(node);
		self
	}

	pub fn layer(mut self, layer: AuditLayer) -> Self {
		self.layer = Some(layer);
		self
	}

	pub fn origin(mut self, origin: AuditOrigin) -> Self {
		self.origin = Some(origin);
		self
	}

	pub fn index(mut self, index: impl Into<String>) -> Self {
		self.indices.push(index.into());
		self
	}

	pub fn user(mut self, user: impl Into<String>) -> Self {
		self.user = Some(user.into());
		self
	}

	pub fn effective_user(mut self, user: impl Into<String>) -> Self {
		self.effective_user = Some(user.into());
		self
	}

	pub fn remote_address(mut self, address: impl Into<String>) -> Self {
		self.remote_address = Some(address.into());
		self
	}

	/// Add one payload entry.
	pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.payload.insert(key.into(), value.into());
		self
	}

	pub fn build(self) -> AuditEvent {
		AuditEvent {
			id: Uuid::new_v4(),
			category: self.category,
			timestamp: self.timestamp.unwrap_or_else(Utc::now),
			cluster_name: self.cluster_name,
			node: self.node,
			layer: self.layer,
			origin: self.origin,
			indices: self.indices,
			user: self.user,
			effective_user: self.effective_user,
			remote_address: self.remote_address,
			payload: self.payload,
		}
	}
}
