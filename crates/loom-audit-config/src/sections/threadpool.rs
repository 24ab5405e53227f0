// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage pool sizing (`audit.threadpool.*`).

use serde::{Deserialize, Serialize};

const DEFAULT_POOL_SIZE: usize = 10;
const DEFAULT_MAX_QUEUE_LEN: usize = 100_000;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThreadPoolConfigLayer {
	pub size: Option<usize>,
	pub max_queue_len: Option<usize>,
	pub shutdown_grace_ms: Option<u64>,
}

impl ThreadPoolConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.size.is_some() {
			self.size = other.size;
		}
		if other.max_queue_len.is_some() {
			self.max_queue_len = other.max_queue_len;
		}
		if other.shutdown_grace_ms.is_some() {
			self.shutdown_grace_ms = other.shutdown_grace_ms;
		}
	}

	pub fn finalize(self) -> ThreadPoolConfig {
		ThreadPoolConfig {
			size: self.size.unwrap_or(DEFAULT_POOL_SIZE),
			max_queue_len: self.max_queue_len.unwrap_or(DEFAULT_MAX_QUEUE_LEN),
			shutdown_grace_ms: self.shutdown_grace_ms.unwrap_or(DEFAULT_SHUTDOWN_GRACE_MS),
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadPoolConfig {
	/// Number of delivery workers. Zero means deliveries run inline.
	pub size: usize,
	/// Maximum number of queued deliveries; must be non-zero.
	pub max_queue_len: usize,
	/// How long shutdown waits for the queue to drain before discarding it.
	pub shutdown_grace_ms: u64,
}

impl Default for ThreadPoolConfig {
	fn default() -> Self {
		ThreadPoolConfigLayer::default().finalize()
	}
}

impl ThreadPoolConfig {
	pub fn shutdown_grace(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.shutdown_grace_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = ThreadPoolConfig::default();
		assert_eq!(config.size, 10);
		assert_eq!(config.max_queue_len, 100_000);
		assert_eq!(config.shutdown_grace_ms, 5000);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = ThreadPoolConfigLayer {
			size: Some(4),
			max_queue_len: Some(10),
			..Default::default()
		};
		base.merge(ThreadPoolConfigLayer {
			size: Some(0),
			..Default::default()
		});
		let config = base.finalize();
		assert_eq!(config.size, 0);
		assert_eq!(config.max_queue_len, 10);
	}
}
