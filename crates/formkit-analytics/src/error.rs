// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics fan-out.
//!
//! None of these reach callers of the tracking API; the fan-out context logs
//! them with the provider name and moves on.

use std::time::Duration;

use thiserror::Error;

/// Analytics provider and platform errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// An external script did not finish loading in time.
	#[error("script load timed out after {timeout:?}: {src}")]
	ScriptTimeout { src: String, timeout: Duration },

	/// An external script could not be fetched.
	#[error("script load failed ({status}): {src}")]
	ScriptLoadFailed { src: String, status: u16 },

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned an error response.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// A tracking call reached a provider that has not been initialized.
	#[error("provider {provider} is not initialized")]
	NotInitialized { provider: String },

	/// Provider configuration is unusable.
	#[error("invalid provider configuration: {0}")]
	InvalidConfig(String),

	/// A custom handler reported a failure.
	#[error("custom handler failed: {0}")]
	Handler(String),

	/// Serialization error.
	#[error("serialization error: {0}")]
	SerializationError(#[from] serde_json::Error),
}

impl AnalyticsError {
	/// Shorthand for a custom handler failure.
	pub fn handler(message: impl Into<String>) -> Self {
		Self::Handler(message.into())
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_script_timeout_message_names_source() {
		let err = AnalyticsError::ScriptTimeout {
			src: "https://example.com/gtag.js".to_string(),
			timeout: Duration::from_secs(10),
		};
		let msg = err.to_string();
		assert!(msg.contains("timed out"));
		assert!(msg.contains("gtag.js"));
	}

	#[test]
	fn test_not_initialized_names_provider() {
		let err = AnalyticsError::NotInitialized {
			provider: "MetaPixel".to_string(),
		};
		assert_eq!(err.to_string(), "provider MetaPixel is not initialized");
	}

	#[test]
	fn test_handler_shorthand() {
		let err = AnalyticsError::handler("boom");
		assert!(matches!(err, AnalyticsError::Handler(ref m) if m == "boom"));
	}
}
