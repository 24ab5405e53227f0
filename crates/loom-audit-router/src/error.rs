// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

/// Failures while turning a sink declaration into a live sink.
#[derive(Error, Debug)]
pub enum AuditError {
	#[error("sink '{sink}' does not declare a type")]
	MissingSinkType { sink: String },

	#[error("sink '{sink}' has unknown type '{sink_type}'")]
	UnknownSinkType { sink: String, sink_type: String },

	#[error("sink '{sink}' has invalid settings: {message}")]
	InvalidSettings { sink: String, message: String },

	#[error("sink '{sink}' requires a {collaborator}, but none was provided")]
	MissingCollaborator {
		sink: String,
		collaborator: &'static str,
	},

	#[error("sink name '{sink}' is reserved")]
	ReservedSinkName { sink: String },

	#[error("sink name '{sink}' is already in use")]
	DuplicateSinkName { sink: String },

	#[error("sink '{sink}' error: {source}")]
	Transport {
		sink: String,
		#[source]
		source: AuditSinkError,
	},
}

/// Failures reported by a sink transport while delivering or closing.
#[derive(Error, Debug)]
pub enum AuditSinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}
