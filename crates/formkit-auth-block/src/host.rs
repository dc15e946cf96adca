// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The survey runtime the auth block is embedded in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What caused a navigation between survey blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationTrigger {
	Next,
	Back,
	Jump,
	Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEntry {
	pub block_id: String,
	pub trigger: NavigationTrigger,
}

impl NavigationEntry {
	pub fn new(block_id: impl Into<String>, trigger: NavigationTrigger) -> Self {
		Self {
			block_id: block_id.into(),
			trigger,
		}
	}
}

/// Calls the auth block makes into the survey runtime.
pub trait SurveyHost: Send + Sync {
	/// Moves the survey past the auth block.
	fn go_to_next_block(&self, payload: Option<Value>);

	/// Stores `value` under `field` in the survey's answers.
	fn set_value(&self, field: &str, value: Value);

	/// Past navigations, oldest first.
	fn navigation_history(&self) -> Vec<NavigationEntry>;
}

/// True when the user arrived at the current block by going back.
pub fn is_back_navigation(history: &[NavigationEntry]) -> bool {
	history
		.last()
		.is_some_and(|entry| entry.trigger == NavigationTrigger::Back)
}
