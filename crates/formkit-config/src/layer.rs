// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration every source produces.

use serde::{Deserialize, Serialize};

use crate::sections::{AnalyticsConfigLayer, AuthConfigLayer, LoggingConfigLayer};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormkitConfigLayer {
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub analytics: Option<AnalyticsConfigLayer>,
	#[serde(default)]
	pub auth: Option<AuthConfigLayer>,
}

impl FormkitConfigLayer {
	/// Overlays `other` on top of `self`; fields `other` sets win.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.analytics, other.analytics, AnalyticsConfigLayer::merge);
		merge_section(&mut self.auth, other.auth, AuthConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, overlay: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), overlay) {
		(Some(base), Some(overlay)) => merge(base, overlay),
		(None, Some(overlay)) => *base = Some(overlay),
		(_, None) => {}
	}
}
