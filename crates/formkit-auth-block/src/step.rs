// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The auth block's step machine.
//!
//! Everything here is a pure function of the configuration and the current
//! inputs; the side effects live in [`crate::flow`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{AuthBlockConfig, NameFieldType};
use crate::error::{AuthError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthStep {
	#[serde(rename = "name")]
	Name,
	#[serde(rename = "firstName")]
	FirstName,
	#[serde(rename = "email")]
	Email,
	#[serde(rename = "phone")]
	Phone,
	#[serde(rename = "email-otp")]
	EmailOtp,
	#[serde(rename = "phone-otp")]
	PhoneOtp,
	#[serde(rename = "welcome")]
	Welcome,
	#[serde(rename = "skipped")]
	Skipped,
}

impl AuthStep {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuthStep::Name => "name",
			AuthStep::FirstName => "firstName",
			AuthStep::Email => "email",
			AuthStep::Phone => "phone",
			AuthStep::EmailOtp => "email-otp",
			AuthStep::PhoneOtp => "phone-otp",
			AuthStep::Welcome => "welcome",
			AuthStep::Skipped => "skipped",
		}
	}

	pub fn is_otp(&self) -> bool {
		matches!(self, AuthStep::EmailOtp | AuthStep::PhoneOtp)
	}

	/// Steps that collect identity fields from the user.
	pub fn is_input(&self) -> bool {
		matches!(
			self,
			AuthStep::Name | AuthStep::FirstName | AuthStep::Email | AuthStep::Phone
		)
	}
}

impl fmt::Display for AuthStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Where a forward move from a step leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget {
	/// Show another step.
	Step(AuthStep),
	/// All identity fields are in: send OTPs or call login/signup.
	BeginAuth,
	/// Verification is done: finish and advance the survey.
	Submit,
}

/// Buffers for every input the block can collect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInputs {
	pub name: String,
	pub first_name: String,
	pub last_name: String,
	pub email: String,
	pub mobile: String,
	pub email_otp: String,
	pub mobile_otp: String,
}

/// Addresses one of the [`FieldInputs`] buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
	Name,
	FirstName,
	LastName,
	Email,
	Mobile,
	EmailOtp,
	MobileOtp,
}

impl FieldInputs {
	pub fn set(&mut self, field: InputField, value: impl Into<String>) {
		*self.slot(field) = value.into();
	}

	pub fn get(&self, field: InputField) -> &str {
		match field {
			InputField::Name => &self.name,
			InputField::FirstName => &self.first_name,
			InputField::LastName => &self.last_name,
			InputField::Email => &self.email,
			InputField::Mobile => &self.mobile,
			InputField::EmailOtp => &self.email_otp,
			InputField::MobileOtp => &self.mobile_otp,
		}
	}

	pub fn clear_otp(&mut self) {
		self.email_otp.clear();
		self.mobile_otp.clear();
	}

	fn slot(&mut self, field: InputField) -> &mut String {
		match field {
			InputField::Name => &mut self.name,
			InputField::FirstName => &mut self.first_name,
			InputField::LastName => &mut self.last_name,
			InputField::Email => &mut self.email,
			InputField::Mobile => &mut self.mobile,
			InputField::EmailOtp => &mut self.email_otp,
			InputField::MobileOtp => &mut self.mobile_otp,
		}
	}
}

fn name_step(config: &AuthBlockConfig) -> AuthStep {
	match config.name_field_type {
		NameFieldType::Single => AuthStep::Name,
		NameFieldType::Separate => AuthStep::FirstName,
	}
}

/// First step shown for a fresh session. Falls back to email when the
/// configuration requires nothing.
pub fn initial_step(config: &AuthBlockConfig) -> AuthStep {
	if config.require_name {
		name_step(config)
	} else if config.require_email {
		AuthStep::Email
	} else if config.require_mobile {
		AuthStep::Phone
	} else {
		AuthStep::Email
	}
}

/// The input step after which auth begins.
pub fn last_input_step(config: &AuthBlockConfig) -> AuthStep {
	if config.require_mobile {
		AuthStep::Phone
	} else if config.require_email {
		AuthStep::Email
	} else {
		initial_step(config)
	}
}

/// OTP step shown when auth begins with OTP enabled.
pub fn first_otp_step(config: &AuthBlockConfig) -> AuthStep {
	if config.require_email || !config.require_mobile {
		AuthStep::EmailOtp
	} else {
		AuthStep::PhoneOtp
	}
}

pub fn next_step(step: AuthStep, config: &AuthBlockConfig) -> StepTarget {
	match step {
		AuthStep::Name | AuthStep::FirstName => {
			if config.require_email {
				StepTarget::Step(AuthStep::Email)
			} else if config.require_mobile {
				StepTarget::Step(AuthStep::Phone)
			} else {
				StepTarget::BeginAuth
			}
		}
		AuthStep::Email => {
			if config.require_mobile {
				StepTarget::Step(AuthStep::Phone)
			} else {
				StepTarget::BeginAuth
			}
		}
		AuthStep::Phone => StepTarget::BeginAuth,
		AuthStep::EmailOtp => {
			if config.require_mobile {
				StepTarget::Step(AuthStep::PhoneOtp)
			} else {
				StepTarget::Submit
			}
		}
		AuthStep::PhoneOtp | AuthStep::Welcome | AuthStep::Skipped => StepTarget::Submit,
	}
}

/// Inverse of [`next_step`] over the input steps. OTP steps lead back to the
/// last input step; `None` means there is nothing before `step`.
pub fn previous_step(step: AuthStep, config: &AuthBlockConfig) -> Option<AuthStep> {
	match step {
		AuthStep::Name | AuthStep::FirstName => None,
		AuthStep::Email => config.require_name.then(|| name_step(config)),
		AuthStep::Phone => {
			if config.require_email {
				Some(AuthStep::Email)
			} else if config.require_name {
				Some(name_step(config))
			} else {
				None
			}
		}
		AuthStep::EmailOtp | AuthStep::PhoneOtp => Some(last_input_step(config)),
		AuthStep::Welcome | AuthStep::Skipped => None,
	}
}

pub fn is_valid_email(email: &str) -> bool {
	let email = email.trim();
	!email.is_empty() && email.contains('@')
}

/// At least seven digits, ignoring spacing and punctuation.
pub fn is_valid_mobile(mobile: &str) -> bool {
	mobile.chars().filter(char::is_ascii_digit).count() >= 7
}

fn blank(value: &str) -> bool {
	value.trim().is_empty()
}

/// Guard for leaving `step` forward.
pub fn check_step(step: AuthStep, inputs: &FieldInputs, _config: &AuthBlockConfig) -> Result<()> {
	let problem = match step {
		AuthStep::Name if blank(&inputs.name) => Some("Please enter your name"),
		AuthStep::FirstName if blank(&inputs.first_name) || blank(&inputs.last_name) => {
			Some("Please enter your first and last name")
		}
		AuthStep::Email if !is_valid_email(&inputs.email) => Some("Please enter a valid email address"),
		AuthStep::Phone if !is_valid_mobile(&inputs.mobile) => Some("Please enter a valid mobile number"),
		AuthStep::EmailOtp if blank(&inputs.email_otp) => Some("Please enter the code sent to your email"),
		AuthStep::PhoneOtp if blank(&inputs.mobile_otp) => Some("Please enter the code sent to your phone"),
		_ => None,
	};

	match problem {
		Some(message) => Err(AuthError::Validation(message.to_string())),
		None => Ok(()),
	}
}

/// Checks every identity field the configuration requires. Nothing is sent
/// to a remote endpoint unless this passes.
pub fn check_required(inputs: &FieldInputs, config: &AuthBlockConfig) -> Result<()> {
	if config.require_name {
		check_step(name_step(config), inputs, config)?;
	}
	if config.require_email {
		check_step(AuthStep::Email, inputs, config)?;
	}
	if config.require_mobile {
		check_step(AuthStep::Phone, inputs, config)?;
	}
	Ok(())
}
