// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request headers and JSON bodies for the auth endpoints.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::{Map, Value};

use crate::config::{AuthBlockConfig, NameFieldType};
use crate::error::{AuthError, Result};
use crate::step::FieldInputs;

/// Channel an OTP is delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpChannel {
	Email,
	Mobile,
}

impl OtpChannel {
	/// Body key of the channel's address.
	pub fn field(&self) -> &'static str {
		match self {
			OtpChannel::Email => "email",
			OtpChannel::Mobile => "mobile",
		}
	}
}

/// `Content-Type: application/json` plus every non-blank custom header.
pub fn build_headers(config: &AuthBlockConfig) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

	for header in config.custom_headers.iter().filter(|h| !h.is_blank()) {
		let name = HeaderName::from_bytes(header.key.trim().as_bytes())
			.map_err(|e| AuthError::InvalidConfig(format!("header name {:?}: {e}", header.key)))?;
		let value = HeaderValue::from_str(header.value.trim())
			.map_err(|e| AuthError::InvalidConfig(format!("header {:?} value: {e}", header.key)))?;
		headers.insert(name, value);
	}

	Ok(headers)
}

fn put(map: &mut Map<String, Value>, key: &str, value: &str) {
	let value = value.trim();
	if !value.is_empty() {
		map.insert(key.to_string(), Value::String(value.to_string()));
	}
}

/// The identity values the configuration requires, skipping blanks.
pub fn identity_fields(config: &AuthBlockConfig, inputs: &FieldInputs) -> Map<String, Value> {
	let mut fields = Map::new();
	if config.require_name {
		match config.name_field_type {
			NameFieldType::Single => put(&mut fields, "name", &inputs.name),
			NameFieldType::Separate => {
				put(&mut fields, "firstName", &inputs.first_name);
				put(&mut fields, "lastName", &inputs.last_name);
			}
		}
	}
	if config.require_email {
		put(&mut fields, "email", &inputs.email);
	}
	if config.require_mobile {
		put(&mut fields, "mobile", &inputs.mobile);
	}
	fields
}

/// Adds the configured additional parameters without overriding existing keys.
fn with_additional_params(mut body: Map<String, Value>, config: &AuthBlockConfig) -> Map<String, Value> {
	for param in config.additional_params.iter().filter(|p| !p.is_blank()) {
		body.entry(param.key.trim().to_string())
			.or_insert_with(|| Value::String(param.value.clone()));
	}
	body
}

/// Body for login/signup: identity fields plus additional parameters.
pub fn build_body(config: &AuthBlockConfig, inputs: &FieldInputs) -> Map<String, Value> {
	with_additional_params(identity_fields(config, inputs), config)
}

/// Body for sending an OTP over `channel`.
pub fn send_otp_body(config: &AuthBlockConfig, inputs: &FieldInputs, channel: OtpChannel) -> Map<String, Value> {
	let mut body = Map::new();
	match channel {
		OtpChannel::Email => put(&mut body, channel.field(), &inputs.email),
		OtpChannel::Mobile => put(&mut body, channel.field(), &inputs.mobile),
	}
	with_additional_params(body, config)
}

/// Body for verifying the OTP typed for `channel`: the login body plus `otp`.
pub fn verify_otp_body(config: &AuthBlockConfig, inputs: &FieldInputs, channel: OtpChannel) -> Map<String, Value> {
	let mut body = build_body(config, inputs);
	let code = match channel {
		OtpChannel::Email => &inputs.email_otp,
		OtpChannel::Mobile => &inputs.mobile_otp,
	};
	put(&mut body, "otp", code);
	body
}

/// Body for the token validation call.
pub fn validate_token_body(config: &AuthBlockConfig, token: &str) -> Map<String, Value> {
	let mut body = Map::new();
	body.insert(config.token_field.clone(), Value::String(token.to_string()));
	body
}
