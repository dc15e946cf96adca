// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Survey analytics events.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::properties::Properties;

/// Event category. Survey tracking only ever emits one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
	#[default]
	Survey,
}

impl EventCategory {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventCategory::Survey => "survey",
		}
	}
}

/// The action tag of a survey event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyAction {
	SurveyStart,
	SurveyComplete,
	SurveyAbandon,
	PageView,
	PageComplete,
	FieldFocus,
	FieldBlur,
	FieldChange,
	FieldComplete,
	NavigationNext,
	NavigationPrevious,
	NavigationJump,
	ValidationError,
	SubmitAttempt,
	SubmitSuccess,
	SubmitError,
	AuthStart,
	AuthComplete,
}

impl SurveyAction {
	/// Every action, in declaration order.
	pub const ALL: [SurveyAction; 18] = [
		SurveyAction::SurveyStart,
		SurveyAction::SurveyComplete,
		SurveyAction::SurveyAbandon,
		SurveyAction::PageView,
		SurveyAction::PageComplete,
		SurveyAction::FieldFocus,
		SurveyAction::FieldBlur,
		SurveyAction::FieldChange,
		SurveyAction::FieldComplete,
		SurveyAction::NavigationNext,
		SurveyAction::NavigationPrevious,
		SurveyAction::NavigationJump,
		SurveyAction::ValidationError,
		SurveyAction::SubmitAttempt,
		SurveyAction::SubmitSuccess,
		SurveyAction::SubmitError,
		SurveyAction::AuthStart,
		SurveyAction::AuthComplete,
	];

	/// Wire name of the action (`survey_start`, `navigation_next`, ...).
	pub fn as_str(&self) -> &'static str {
		match self {
			SurveyAction::SurveyStart => "survey_start",
			SurveyAction::SurveyComplete => "survey_complete",
			SurveyAction::SurveyAbandon => "survey_abandon",
			SurveyAction::PageView => "page_view",
			SurveyAction::PageComplete => "page_complete",
			SurveyAction::FieldFocus => "field_focus",
			SurveyAction::FieldBlur => "field_blur",
			SurveyAction::FieldChange => "field_change",
			SurveyAction::FieldComplete => "field_complete",
			SurveyAction::NavigationNext => "navigation_next",
			SurveyAction::NavigationPrevious => "navigation_previous",
			SurveyAction::NavigationJump => "navigation_jump",
			SurveyAction::ValidationError => "validation_error",
			SurveyAction::SubmitAttempt => "submit_attempt",
			SurveyAction::SubmitSuccess => "submit_success",
			SurveyAction::SubmitError => "submit_error",
			SurveyAction::AuthStart => "auth_start",
			SurveyAction::AuthComplete => "auth_complete",
		}
	}
}

impl fmt::Display for SurveyAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Returned when a string does not name a [`SurveyAction`].
#[derive(Debug, Clone, Error)]
#[error("unknown survey action: {0}")]
pub struct ParseActionError(pub String);

impl FromStr for SurveyAction {
	type Err = ParseActionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		SurveyAction::ALL
			.iter()
			.copied()
			.find(|a| a.as_str() == s)
			.ok_or_else(|| ParseActionError(s.to_string()))
	}
}

/// A single survey analytics event.
///
/// Events are built once and then handed by value (cloned) to every provider;
/// the builder methods consume `self` so a constructed event is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
	pub category: EventCategory,
	pub action: SurveyAction,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub survey_id: Option<String>,
	/// Epoch milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<i64>,
	#[serde(default, skip_serializing_if = "Properties::is_empty")]
	pub metadata: Properties,
}

impl AnalyticsEvent {
	/// Creates an event for `action` with no optional fields set.
	pub fn new(action: SurveyAction) -> Self {
		Self {
			category: EventCategory::Survey,
			action,
			label: None,
			value: None,
			session_id: None,
			user_id: None,
			survey_id: None,
			timestamp: None,
			metadata: Properties::new(),
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn with_value(mut self, value: f64) -> Self {
		self.value = Some(value);
		self
	}

	pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn with_survey_id(mut self, survey_id: impl Into<String>) -> Self {
		self.survey_id = Some(survey_id.into());
		self
	}

	pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
		self.timestamp = Some(timestamp_ms);
		self
	}

	/// Stamps the event with the current wall-clock time.
	pub fn with_timestamp_now(self) -> Self {
		self.with_timestamp(now_millis())
	}

	/// Replaces the metadata map.
	pub fn with_metadata(mut self, metadata: Properties) -> Self {
		self.metadata = metadata;
		self
	}

	/// Fills session and user ids only where the event does not carry its own.
	pub fn with_identity_defaults(mut self, session_id: Option<&str>, user_id: Option<&str>) -> Self {
		if self.session_id.is_none() {
			self.session_id = session_id.map(str::to_string);
		}
		if self.user_id.is_none() {
			self.user_id = user_id.map(str::to_string);
		}
		self
	}

	/// Event category, always `"survey"`.
	pub fn category(&self) -> &'static str {
		self.category.as_str()
	}
}

/// A page (survey block) view.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
	pub path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub survey_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	#[serde(default, skip_serializing_if = "Properties::is_empty")]
	pub metadata: Properties,
}

impl PageView {
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			..Default::default()
		}
	}

	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(title.into());
		self
	}

	pub fn with_survey_id(mut self, survey_id: impl Into<String>) -> Self {
		self.survey_id = Some(survey_id.into());
		self
	}

	pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn with_metadata(mut self, metadata: Properties) -> Self {
		self.metadata = metadata;
		self
	}
}

/// A duration measurement (`timing_complete` in GA terms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingEvent {
	pub category: String,
	pub variable: String,
	pub value_ms: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
}

impl TimingEvent {
	pub fn new(category: impl Into<String>, variable: impl Into<String>, value_ms: u64) -> Self {
		Self {
			category: category.into(),
			variable: variable.into(),
			value_ms,
			label: None,
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}
}

/// Properties attached to the current user.
pub type UserProperties = Properties;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
	Utc::now().timestamp_millis()
}

/// Generates a fresh random session id.
pub fn new_session_id() -> String {
	Uuid::new_v4().to_string()
}
