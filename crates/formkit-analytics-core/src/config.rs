// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-provider configuration.
//!
//! Keys follow the camelCase shape survey definitions are authored in
//! (`measurementId`, `containerId`, `pixelId`).

use serde::{Deserialize, Serialize};

/// Google Analytics 4 (gtag.js) configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAnalyticsConfig {
	pub measurement_id: String,
	#[serde(default)]
	pub debug: bool,
	/// Use the alternate loader, which resolves after a soft timeout even if
	/// the script never reports back.
	#[serde(default)]
	pub soft_load: bool,
}

impl GoogleAnalyticsConfig {
	pub fn new(measurement_id: impl Into<String>) -> Self {
		Self {
			measurement_id: measurement_id.into(),
			..Default::default()
		}
	}
}

/// Google Tag Manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTagManagerConfig {
	pub container_id: String,
	/// Environment auth token (`gtm_auth`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth: Option<String>,
	/// Environment preview id (`gtm_preview`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub preview: Option<String>,
	#[serde(default)]
	pub debug: bool,
}

impl GoogleTagManagerConfig {
	pub fn new(container_id: impl Into<String>) -> Self {
		Self {
			container_id: container_id.into(),
			..Default::default()
		}
	}
}

/// Meta (Facebook) Pixel configuration.
///
/// When `access_token` is set every event is also forwarded server-side
/// through the Conversion API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPixelConfig {
	pub pixel_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub test_event_code: Option<String>,
	#[serde(default)]
	pub debug: bool,
}

impl MetaPixelConfig {
	pub fn new(pixel_id: impl Into<String>) -> Self {
		Self {
			pixel_id: pixel_id.into(),
			..Default::default()
		}
	}
}
