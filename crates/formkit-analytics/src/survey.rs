// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Survey-level tracking on top of [`AnalyticsContext`].
//!
//! Every event carries the survey id and a timestamp, and its `value` is the
//! number of milliseconds since the previous event sent through this hook.

use std::sync::{Mutex, PoisonError};

use formkit_analytics_core::{AnalyticsEvent, PageView, Properties, SurveyAction, TimingEvent};
use tokio::time::Instant;

use crate::context::AnalyticsContext;

/// Kind of low-level field interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldInteraction {
	Focus,
	Blur,
	Change,
}

impl FieldInteraction {
	fn action(self) -> SurveyAction {
		match self {
			FieldInteraction::Focus => SurveyAction::FieldFocus,
			FieldInteraction::Blur => SurveyAction::FieldBlur,
			FieldInteraction::Change => SurveyAction::FieldChange,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDirection {
	Next,
	Previous,
	Jump,
}

impl NavigationDirection {
	fn action(self) -> SurveyAction {
		match self {
			NavigationDirection::Next => SurveyAction::NavigationNext,
			NavigationDirection::Previous => SurveyAction::NavigationPrevious,
			NavigationDirection::Jump => SurveyAction::NavigationJump,
		}
	}
}

#[derive(Debug, Default)]
struct Clock {
	started: Option<Instant>,
	last: Option<Instant>,
}

/// Tracking hook bound to one survey.
#[derive(Debug)]
pub struct SurveyAnalytics {
	context: AnalyticsContext,
	survey_id: String,
	clock: Mutex<Clock>,
}

impl SurveyAnalytics {
	pub fn new(context: AnalyticsContext, survey_id: impl Into<String>) -> Self {
		Self {
			context,
			survey_id: survey_id.into(),
			clock: Mutex::new(Clock::default()),
		}
	}

	pub fn survey_id(&self) -> &str {
		&self.survey_id
	}

	/// Milliseconds since the previous hook event, restarting the interval.
	fn lap(&self) -> u64 {
		let now = Instant::now();
		let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
		let since = clock.last.or(clock.started).unwrap_or(now);
		clock.started.get_or_insert(now);
		clock.last = Some(now);
		millis(now - since)
	}

	/// Milliseconds since survey start, or zero if it never started.
	fn total(&self) -> u64 {
		let clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
		clock
			.started
			.map(|started| millis(Instant::now() - started))
			.unwrap_or(0)
	}

	fn event(&self, action: SurveyAction, value_ms: u64) -> AnalyticsEvent {
		AnalyticsEvent::new(action)
			.with_survey_id(self.survey_id.clone())
			.with_value(value_ms as f64)
			.with_timestamp_now()
	}

	fn send(&self, action: SurveyAction, label: Option<&str>, metadata: Properties) {
		let mut event = self.event(action, self.lap()).with_metadata(metadata);
		if let Some(label) = label {
			event = event.with_label(label);
		}
		self.context.track_event(event);
	}

	/// Starts the survey clock.
	pub fn track_survey_start(&self) {
		let now = Instant::now();
		{
			let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
			clock.started = Some(now);
			clock.last = Some(now);
		}
		self.context.track_event(
			AnalyticsEvent::new(SurveyAction::SurveyStart)
				.with_survey_id(self.survey_id.clone())
				.with_timestamp_now(),
		);
	}

	/// Reports completion with the total duration, plus a `completion_time` timing.
	pub fn track_survey_complete(&self) {
		let total = self.total();
		self.lap();
		self.context
			.track_event(self.event(SurveyAction::SurveyComplete, total));
		self.context.track_timing(
			TimingEvent::new("survey", "completion_time", total).with_label(self.survey_id.clone()),
		);
	}

	/// Reports the survey being left at `block_id`, with the time spent so far.
	pub fn track_survey_abandon(&self, block_id: &str) {
		let total = self.total();
		self.lap();
		self.context.track_event(
			self.event(SurveyAction::SurveyAbandon, total)
				.with_label(block_id),
		);
	}

	/// Emits a page view for `/survey/{survey_id}/{block_id}` and a `page_view` event.
	pub fn track_page_view(&self, block_id: &str, title: Option<&str>) {
		let mut view = PageView::new(format!("/survey/{}/{}", self.survey_id, block_id))
			.with_survey_id(self.survey_id.clone());
		if let Some(title) = title {
			view = view.with_title(title);
		}
		self.context.track_page_view(view);
		self.send(SurveyAction::PageView, Some(block_id), Properties::new());
	}

	pub fn track_page_complete(&self, block_id: &str) {
		self.send(SurveyAction::PageComplete, Some(block_id), Properties::new());
	}

	pub fn track_field_interaction(&self, field_id: &str, interaction: FieldInteraction) {
		self.send(interaction.action(), Some(field_id), Properties::new());
	}

	pub fn track_field_complete(&self, field_id: &str, field_type: &str) {
		self.send(
			SurveyAction::FieldComplete,
			Some(field_id),
			Properties::new().insert("field_type", field_type),
		);
	}

	pub fn track_navigation(&self, direction: NavigationDirection, from: &str, to: &str) {
		self.send(
			direction.action(),
			Some(to),
			Properties::new().insert("from", from).insert("to", to),
		);
	}

	pub fn track_validation_error(&self, field_id: &str, message: &str) {
		self.send(
			SurveyAction::ValidationError,
			Some(field_id),
			Properties::new().insert("error", message),
		);
	}

	pub fn track_submit_attempt(&self) {
		self.send(SurveyAction::SubmitAttempt, None, Properties::new());
	}

	pub fn track_submit_success(&self) {
		self.send(SurveyAction::SubmitSuccess, None, Properties::new());
	}

	pub fn track_submit_error(&self, message: &str) {
		self.send(
			SurveyAction::SubmitError,
			None,
			Properties::new().insert("error", message),
		);
	}

	/// `method` names the auth path, e.g. `otp` or `password`.
	pub fn track_auth_start(&self, method: &str) {
		self.send(SurveyAction::AuthStart, Some(method), Properties::new());
	}

	pub fn track_auth_complete(&self, method: &str) {
		self.send(SurveyAction::AuthComplete, Some(method), Properties::new());
	}
}

fn millis(duration: std::time::Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
