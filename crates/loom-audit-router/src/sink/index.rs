// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::error::{AuditError, AuditResult};

pub const DEFAULT_INDEX_PATTERN: &str = "auditlog-%Y.%m.%d";

/// A target index name, possibly containing strftime date fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPattern {
	pattern: String,
}

impl IndexPattern {
	/// Validate `pattern` for sink `sink`.
	pub fn parse(sink: &str, pattern: &str) -> AuditResult<Self> {
		let pattern = pattern.trim();
		if pattern.is_empty() {
			return Err(AuditError::InvalidSettings {
				sink: sink.to_string(),
				message: "index must not be empty".to_string(),
			});
		}
		if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
			return Err(AuditError::InvalidSettings {
				sink: sink.to_string(),
				message: format!("invalid date pattern in index '{pattern}'"),
			});
		}
		Ok(Self {
			pattern: pattern.to_string(),
		})
	}

	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Index name for an event that occurred at `at`.
	pub fn render(&self, at: DateTime<Utc>) -> String {
		if !self.pattern.contains('%') {
			return self.pattern.clone();
		}
		at.format(&self.pattern).to_string()
	}
}

impl Default for IndexPattern {
	fn default() -> Self {
		Self {
			pattern: DEFAULT_INDEX_PATTERN.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_default_pattern_renders_daily_index() {
		let at = Utc.with_ymd_and_hms(2025, 3, 7, 23, 59, 0).unwrap();
		assert_eq!(IndexPattern::default().render(at), "auditlog-2025.03.07");
	}

	#[test]
	fn test_plain_name_is_used_verbatim() {
		let pattern = IndexPattern::parse("es", "security-audit").unwrap();
		assert_eq!(pattern.render(Utc::now()), "security-audit");
	}

	#[test]
	fn test_rejects_bad_specifier() {
		assert!(IndexPattern::parse("es", "audit-%Q").is_err());
	}

	#[test]
	fn test_rejects_blank() {
		assert!(IndexPattern::parse("es", "  ").is_err());
	}
}
