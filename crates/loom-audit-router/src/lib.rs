// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit event routing and delivery for Loom.
//!
//! This crate provides:
//! - The audit event model ([`AuditEvent`], [`AuditCategory`])
//! - Named sinks with a one-hop fallback and a last-resort diagnostic stream
//! - A typed sink registry for built-in and host-provided sink types
//! - Per-category routing tables built from `loom-audit-config`
//! - A bounded storage pool for sinks that do not buffer on their own
//!
//! # Usage
//!
//! ```ignore
//! use loom_audit_router::{AuditMessageRouter, AuditEvent, AuditCategory, SinkContext, SinkRegistry};
//!
//! let config = loom_audit_config::load_config()?;
//! let router = AuditMessageRouter::new(&config, &SinkRegistry::with_builtins(), SinkContext::default());
//!
//! router
//!     .route(AuditEvent::builder(AuditCategory::FailedLogin).user("alice").build())
//!     .await;
//! router.close().await;
//! ```

pub mod error;
pub mod event;
pub mod metrics;
pub mod pool;
pub mod provider;
pub mod registry;
pub mod router;
pub mod routing;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{
	AuditCategory, AuditEvent, AuditEventBuilder, AuditLayer, AuditOrigin, NodeIdentity,
	UnknownCategory,
};
pub use metrics::{AuditMetrics, DropReason};
pub use pool::{RejectReason, StoragePool, SubmitOutcome};
pub use provider::{SinkProvider, DEFAULT_SINK_NAME, FALLBACK_SINK_NAME};
pub use registry::{parse_settings, SinkContext, SinkFactory, SinkRegistry};
pub use router::{AuditMessageRouter, AuditRouterHandle};
pub use routing::RoutingTable;
pub use sink::internal_store::DocumentStore;
pub use sink::kafka::MessageProducer;
pub use sink::{AuditSink, DeliveryMode, DiagnosticWriter, SinkTransport, StderrDiagnostics};
