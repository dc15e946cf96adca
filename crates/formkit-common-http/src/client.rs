// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use tracing::warn;

/// Creates a new HTTP client with the standard formkit User-Agent header.
///
/// Falls back to a default `reqwest` client if the configured builder fails
/// (e.g. the TLS backend cannot be initialised).
pub fn new_client() -> Client {
	try_new_client().unwrap_or_else(|e| {
		warn!(error = %e, "failed to build HTTP client, using defaults");
		Client::new()
	})
}

/// Creates a new HTTP client, returning the builder error instead of falling back.
pub fn try_new_client() -> reqwest::Result<Client> {
	builder().build()
}

/// Creates a new HTTP client builder with the standard formkit User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = formkit_common_http::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Returns the standard formkit User-Agent string.
///
/// Format: `formkit/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"formkit/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("formkit/"));
		assert!(ua.contains(std::env::consts::OS));
		assert!(ua.ends_with(')'));
	}

	#[test]
	fn builder_accepts_customisation() {
		let client = builder()
			.timeout(std::time::Duration::from_secs(5))
			.build();
		assert!(client.is_ok());
	}

	#[tokio::test]
	async fn new_client_builds() {
		let _client = new_client();
	}
}
