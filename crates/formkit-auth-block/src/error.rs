// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the auth block.
//!
//! The `Display` text of the user-facing variants ([`AuthError::Validation`],
//! [`AuthError::Server`], [`AuthError::RequestFailed`]) is what the flow puts
//! into its `error` state.

use thiserror::Error;

use crate::config::Endpoint;
use crate::step::AuthStep;

/// Shown when a failed response carries no `error` message.
pub const GENERIC_ERROR: &str = "Authentication failed. Please try again.";

#[derive(Debug, Error)]
pub enum AuthError {
	/// The block configuration is unusable.
	#[error("invalid auth block configuration: {0}")]
	InvalidConfig(String),

	/// Input for the current step failed its check.
	#[error("{0}")]
	Validation(String),

	/// The endpoint answered with a non-2xx status.
	#[error("{message}")]
	Server { status: u16, message: String },

	/// The request never produced a response.
	#[error("{0}")]
	RequestFailed(#[from] reqwest::Error),

	/// A successful response could not be parsed.
	#[error("invalid response: {0}")]
	InvalidResponse(String),

	#[error("no {0} URL is configured")]
	MissingEndpoint(Endpoint),

	/// Another request from this flow is still outstanding.
	#[error("a request is already in progress")]
	Busy,

	/// The flow was unmounted.
	#[error("auth flow is no longer mounted")]
	Cancelled,

	#[error("operation is not available at step {0}")]
	WrongStep(AuthStep),

	#[error("token store error: {0}")]
	Store(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl AuthError {
	/// Whether the error is meant for the person filling in the block.
	pub fn is_user_facing(&self) -> bool {
		matches!(
			self,
			AuthError::Validation(_)
				| AuthError::Server { .. }
				| AuthError::RequestFailed(_)
				| AuthError::InvalidResponse(_)
				| AuthError::MissingEndpoint(_)
		)
	}
}

pub type Result<T> = std::result::Result<T, AuthError>;
