// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::{Mutex, PoisonError};

use formkit_auth_block::{NavigationEntry, SurveyHost};
use serde_json::{Map, Value};
use tracing::debug;

/// Host for a survey that consists of the auth block alone: it keeps the
/// values the block sets and the payload it advances with.
#[derive(Debug, Default)]
pub struct TerminalHost {
	history: Vec<NavigationEntry>,
	values: Mutex<Map<String, Value>>,
	result: Mutex<Option<Value>>,
}

impl TerminalHost {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_history(history: Vec<NavigationEntry>) -> Self {
		Self {
			history,
			..Default::default()
		}
	}

	/// Payload of the last `go_to_next_block`, falling back to the stored
	/// values when the block advanced without one.
	pub fn result(&self) -> Option<Value> {
		let result = self.result.lock().unwrap_or_else(PoisonError::into_inner).clone();
		result.or_else(|| {
			let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
			(!values.is_empty()).then(|| Value::Object(values.clone()))
		})
	}
}

impl SurveyHost for TerminalHost {
	fn go_to_next_block(&self, payload: Option<Value>) {
		debug!(has_payload = payload.is_some(), "auth block advanced");
		*self.result.lock().unwrap_or_else(PoisonError::into_inner) = payload;
	}

	fn set_value(&self, field: &str, value: Value) {
		self.values
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(field.to_string(), value);
	}

	fn navigation_history(&self) -> Vec<NavigationEntry> {
		self.history.clone()
	}
}
