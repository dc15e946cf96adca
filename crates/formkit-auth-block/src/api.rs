// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client for the auth block's endpoints.

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::AuthBlockConfig;
use crate::error::{AuthError, Result, GENERIC_ERROR};
use crate::request::{build_headers, validate_token_body};

/// Posts JSON bodies with the block's headers and interprets the response.
#[derive(Debug, Clone)]
pub struct AuthApi {
	client: Client,
	headers: HeaderMap,
}

impl AuthApi {
	pub fn new(config: &AuthBlockConfig) -> Result<Self> {
		Self::with_client(formkit_common_http::new_client(), config)
	}

	pub fn with_client(client: Client, config: &AuthBlockConfig) -> Result<Self> {
		Ok(Self {
			client,
			headers: build_headers(config)?,
		})
	}

	/// Sends `body` to `url`. A 2xx response yields its JSON body (an empty
	/// object when there is none); anything else is [`AuthError::Server`].
	#[instrument(name = "auth.post", skip_all, fields(url = %url))]
	pub async fn post(&self, url: &str, body: &Map<String, Value>) -> Result<Value> {
		let response = self
			.client
			.post(url)
			.headers(self.headers.clone())
			.json(body)
			.send()
			.await?;

		let status = response.status();
		let text = response.text().await?;
		let parsed = if text.trim().is_empty() {
			None
		} else {
			serde_json::from_str::<Value>(&text).ok()
		};

		if !status.is_success() {
			let message = parsed
				.as_ref()
				.and_then(|v| v.get("error"))
				.and_then(Value::as_str)
				.map(str::trim)
				.filter(|m| !m.is_empty())
				.unwrap_or(GENERIC_ERROR)
				.to_string();
			debug!(status = status.as_u16(), message = %message, "auth endpoint rejected request");
			return Err(AuthError::Server {
				status: status.as_u16(),
				message,
			});
		}

		match parsed {
			Some(value) => Ok(value),
			None if text.trim().is_empty() => Ok(Value::Object(Map::new())),
			None => Err(AuthError::InvalidResponse(format!(
				"expected JSON from {url}, got {} bytes of something else",
				text.len()
			))),
		}
	}

	/// Posts `{<token_field>: token}` to the validation endpoint.
	pub async fn validate_token(&self, url: &str, config: &AuthBlockConfig, token: &str) -> Result<Value> {
		self.post(url, &validate_token_body(config, token)).await
	}
}
