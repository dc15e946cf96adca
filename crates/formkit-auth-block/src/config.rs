// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Auth block configuration as authored in the survey builder.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Whether the name is captured as one field or as first and last name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameFieldType {
	#[default]
	Single,
	Separate,
}

/// One configured header or body parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
	pub key: String,
	pub value: String,
}

impl KeyValue {
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: value.into(),
		}
	}

	/// Entries with an empty key or value are ignored when building requests.
	pub fn is_blank(&self) -> bool {
		self.key.trim().is_empty() || self.value.trim().is_empty()
	}
}

/// Copies the value at `api_path` in an auth response into `form_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
	pub api_path: String,
	pub form_field: String,
}

impl FieldMapping {
	pub fn new(api_path: impl Into<String>, form_field: impl Into<String>) -> Self {
		Self {
			api_path: api_path.into(),
			form_field: form_field.into(),
		}
	}
}

/// Remote endpoints the block can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
	Login,
	Signup,
	SendEmailOtp,
	VerifyEmailOtp,
	SendMobileOtp,
	VerifyMobileOtp,
	ValidateToken,
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Endpoint::Login => "login",
			Endpoint::Signup => "signup",
			Endpoint::SendEmailOtp => "send email OTP",
			Endpoint::VerifyEmailOtp => "verify email OTP",
			Endpoint::SendMobileOtp => "send mobile OTP",
			Endpoint::VerifyMobileOtp => "verify mobile OTP",
			Endpoint::ValidateToken => "validate token",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthBlockConfig {
	/// Key under which the block's result is stored in the survey values.
	pub field_name: String,
	pub require_name: bool,
	pub name_field_type: NameFieldType,
	pub require_email: bool,
	pub require_mobile: bool,
	pub use_otp: bool,
	pub login_url: Option<String>,
	pub signup_url: Option<String>,
	pub send_email_otp_url: Option<String>,
	pub verify_email_otp_url: Option<String>,
	pub send_mobile_otp_url: Option<String>,
	pub verify_mobile_otp_url: Option<String>,
	pub validate_token_url: Option<String>,
	/// Response field holding the token.
	pub token_field: String,
	pub token_storage_key: String,
	pub field_mappings: Vec<FieldMapping>,
	pub custom_headers: Vec<KeyValue>,
	pub additional_params: Vec<KeyValue>,
	pub skip_if_logged_in: bool,
}

impl Default for AuthBlockConfig {
	fn default() -> Self {
		Self {
			field_name: "auth".to_string(),
			require_name: false,
			name_field_type: NameFieldType::Single,
			require_email: true,
			require_mobile: false,
			use_otp: false,
			login_url: None,
			signup_url: None,
			send_email_otp_url: None,
			verify_email_otp_url: None,
			send_mobile_otp_url: None,
			verify_mobile_otp_url: None,
			validate_token_url: None,
			token_field: "token".to_string(),
			token_storage_key: "authToken".to_string(),
			field_mappings: Vec::new(),
			custom_headers: Vec::new(),
			additional_params: Vec::new(),
			skip_if_logged_in: false,
		}
	}
}

impl AuthBlockConfig {
	/// The configured URL for `endpoint`, if it is set and non-blank.
	pub fn endpoint(&self, endpoint: Endpoint) -> Option<&str> {
		let url = match endpoint {
			Endpoint::Login => &self.login_url,
			Endpoint::Signup => &self.signup_url,
			Endpoint::SendEmailOtp => &self.send_email_otp_url,
			Endpoint::VerifyEmailOtp => &self.verify_email_otp_url,
			Endpoint::SendMobileOtp => &self.send_mobile_otp_url,
			Endpoint::VerifyMobileOtp => &self.verify_mobile_otp_url,
			Endpoint::ValidateToken => &self.validate_token_url,
		};
		url.as_deref().map(str::trim).filter(|u| !u.is_empty())
	}

	/// Same as [`Self::endpoint`] but missing URLs are an error.
	pub fn require_endpoint(&self, endpoint: Endpoint) -> Result<&str> {
		self.endpoint(endpoint)
			.ok_or(AuthError::MissingEndpoint(endpoint))
	}

	/// Endpoint for the direct (non-OTP) auth call.
	///
	/// Signup is used when the block collects a name and a signup URL is set;
	/// otherwise login, falling back to signup.
	pub fn auth_endpoint(&self) -> Result<(Endpoint, &str)> {
		if self.require_name {
			if let Some(url) = self.endpoint(Endpoint::Signup) {
				return Ok((Endpoint::Signup, url));
			}
		}
		if let Some(url) = self.endpoint(Endpoint::Login) {
			return Ok((Endpoint::Login, url));
		}
		self.endpoint(Endpoint::Signup)
			.map(|url| (Endpoint::Signup, url))
			.ok_or(AuthError::MissingEndpoint(Endpoint::Login))
	}

	/// Builder-side check. Returns a human-readable problem, or `None` when
	/// the configuration is usable.
	pub fn validate(&self) -> Option<String> {
		if !self.require_email && !self.require_mobile {
			return Some("At least one of email or mobile number must be required".to_string());
		}

		if self.use_otp {
			if self.require_email
				&& (self.endpoint(Endpoint::SendEmailOtp).is_none()
					|| self.endpoint(Endpoint::VerifyEmailOtp).is_none())
			{
				return Some("Email OTP requires both a send and a verify URL".to_string());
			}
			if self.require_mobile
				&& (self.endpoint(Endpoint::SendMobileOtp).is_none()
					|| self.endpoint(Endpoint::VerifyMobileOtp).is_none())
			{
				return Some("Mobile OTP requires both a send and a verify URL".to_string());
			}
		} else if self.endpoint(Endpoint::Login).is_none() && self.endpoint(Endpoint::Signup).is_none() {
			return Some("A login or signup URL is required".to_string());
		}

		if self.token_field.trim().is_empty() {
			return Some("Token field name is required".to_string());
		}
		if self.token_storage_key.trim().is_empty() {
			return Some("Token storage key is required".to_string());
		}
		if self.field_name.trim().is_empty() {
			return Some("Field name is required".to_string());
		}
		if self
			.field_mappings
			.iter()
			.any(|m| m.api_path.trim().is_empty() || m.form_field.trim().is_empty())
		{
			return Some("Each field mapping needs an API path and a form field".to_string());
		}

		None
	}

	/// Returns the config if [`Self::validate`] finds no problem.
	pub fn validated(self) -> Result<Self> {
		match self.validate() {
			Some(problem) => Err(AuthError::InvalidConfig(problem)),
			None => Ok(self),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn login_config() -> AuthBlockConfig {
		AuthBlockConfig {
			login_url: Some("https://api.example.com/login".to_string()),
			..Default::default()
		}
	}

	#[test]
	fn defaults() {
		let config = AuthBlockConfig::default();
		assert_eq!(config.token_field, "token");
		assert_eq!(config.token_storage_key, "authToken");
		assert_eq!(config.field_name, "auth");
		assert!(config.require_email);
	}

	#[test]
	fn parses_camel_case_json() {
		let config: AuthBlockConfig = serde_json::from_str(
			r#"{
				"requireName": true,
				"nameFieldType": "separate",
				"requireMobile": true,
				"useOtp": true,
				"sendMobileOtpUrl": "https://api/otp/send",
				"fieldMappings": [{"apiPath": "user.department", "formField": "dept"}],
				"customHeaders": [{"key": "X-Tenant", "value": "acme"}],
				"skipIfLoggedIn": true
			}"#,
		)
		.unwrap();

		assert_eq!(config.name_field_type, NameFieldType::Separate);
		assert!(config.require_email);
		assert_eq!(config.endpoint(Endpoint::SendMobileOtp), Some("https://api/otp/send"));
		assert_eq!(config.field_mappings[0], FieldMapping::new("user.department", "dept"));
		assert_eq!(config.token_storage_key, "authToken");
	}

	#[test]
	fn blank_urls_count_as_missing() {
		let config = AuthBlockConfig {
			login_url: Some("   ".to_string()),
			..Default::default()
		};
		assert_eq!(config.endpoint(Endpoint::Login), None);
		assert!(matches!(
			config.require_endpoint(Endpoint::Login),
			Err(AuthError::MissingEndpoint(Endpoint::Login))
		));
	}

	#[test]
	fn valid_login_config() {
		assert_eq!(login_config().validate(), None);
		assert!(login_config().validated().is_ok());
	}

	#[test]
	fn requires_email_or_mobile() {
		let config = AuthBlockConfig {
			require_email: false,
			require_mobile: false,
			..login_config()
		};
		assert!(config.validate().unwrap().contains("email or mobile"));
	}

	#[test]
	fn otp_needs_urls_for_each_channel() {
		let config = AuthBlockConfig {
			use_otp: true,
			require_mobile: true,
			send_email_otp_url: Some("https://a/send".to_string()),
			verify_email_otp_url: Some("https://a/verify".to_string()),
			..Default::default()
		};
		assert!(config.validate().unwrap().starts_with("Mobile OTP"));
	}

	#[test]
	fn direct_auth_needs_login_or_signup() {
		let problem = AuthBlockConfig::default().validate().unwrap();
		assert_eq!(problem, "A login or signup URL is required");
		assert!(matches!(
			AuthBlockConfig::default().validated(),
			Err(AuthError::InvalidConfig(_))
		));
	}

	#[test]
	fn incomplete_field_mapping_is_rejected() {
		let config = AuthBlockConfig {
			field_mappings: vec![FieldMapping::new("user.id", "")],
			..login_config()
		};
		assert!(config.validate().is_some());
	}

	#[test]
	fn signup_is_used_when_collecting_names() {
		let config = AuthBlockConfig {
			require_name: true,
			signup_url: Some("https://api/signup".to_string()),
			..login_config()
		};
		assert_eq!(config.auth_endpoint().unwrap(), (Endpoint::Signup, "https://api/signup"));

		let config = AuthBlockConfig {
			require_name: false,
			..config
		};
		assert_eq!(
			config.auth_endpoint().unwrap(),
			(Endpoint::Login, "https://api.example.com/login")
		);
	}
}
