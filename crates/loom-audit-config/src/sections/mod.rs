// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for audit routing and delivery.

mod audit;
mod routing;
mod sink;
mod threadpool;

pub use audit::{AuditConfig, AuditConfigLayer, SinkBlocksLayer};
pub use routing::{RouteConfig, RouteConfigLayer};
pub use sink::{EndpointConfigLayer, SinkConfig, SinkSettings};
pub use threadpool::{ThreadPoolConfig, ThreadPoolConfigLayer};
