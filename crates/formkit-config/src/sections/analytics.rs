// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics configuration section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub debug: Option<bool>,
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub ga_measurement_id: Option<String>,
	#[serde(default)]
	pub gtm_container_id: Option<String>,
	#[serde(default)]
	pub meta_pixel_id: Option<String>,
	#[serde(default)]
	pub meta_access_token: Option<String>,
	#[serde(default)]
	pub meta_test_event_code: Option<String>,
}

impl AnalyticsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		fn take<T>(base: &mut Option<T>, overlay: Option<T>) {
			if overlay.is_some() {
				*base = overlay;
			}
		}

		take(&mut self.enabled, other.enabled);
		take(&mut self.debug, other.debug);
		take(&mut self.session_id, other.session_id);
		take(&mut self.user_id, other.user_id);
		take(&mut self.ga_measurement_id, other.ga_measurement_id);
		take(&mut self.gtm_container_id, other.gtm_container_id);
		take(&mut self.meta_pixel_id, other.meta_pixel_id);
		take(&mut self.meta_access_token, other.meta_access_token);
		take(&mut self.meta_test_event_code, other.meta_test_event_code);
	}

	/// Name of a Meta setting given without a pixel id, if any.
	pub fn orphaned_meta_setting(&self) -> Option<&'static str> {
		if non_blank(self.meta_pixel_id.clone()).is_some() {
			return None;
		}
		if non_blank(self.meta_access_token.clone()).is_some() {
			return Some("meta_access_token");
		}
		if non_blank(self.meta_test_event_code.clone()).is_some() {
			return Some("meta_test_event_code");
		}
		None
	}

	pub fn finalize(self) -> AnalyticsSettings {
		let meta = non_blank(self.meta_pixel_id).map(|pixel_id| MetaSettings {
			pixel_id,
			access_token: non_blank(self.meta_access_token),
			test_event_code: non_blank(self.meta_test_event_code),
		});

		AnalyticsSettings {
			enabled: self.enabled.unwrap_or(true),
			debug: self.debug.unwrap_or(false),
			session_id: non_blank(self.session_id),
			user_id: non_blank(self.user_id),
			ga_measurement_id: non_blank(self.ga_measurement_id),
			gtm_container_id: non_blank(self.gtm_container_id),
			meta,
		}
	}
}

/// Resolved analytics settings. Providers whose id is absent stay off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsSettings {
	pub enabled: bool,
	pub debug: bool,
	pub session_id: Option<String>,
	pub user_id: Option<String>,
	pub ga_measurement_id: Option<String>,
	pub gtm_container_id: Option<String>,
	pub meta: Option<MetaSettings>,
}

impl Default for AnalyticsSettings {
	fn default() -> Self {
		AnalyticsConfigLayer::default().finalize()
	}
}

impl AnalyticsSettings {
	/// Number of providers that would be started.
	pub fn provider_count(&self) -> usize {
		[
			self.ga_measurement_id.is_some(),
			self.gtm_container_id.is_some(),
			self.meta.is_some(),
		]
		.into_iter()
		.filter(|configured| *configured)
		.count()
	}
}

#[derive(Clone, PartialEq, Eq)]
pub struct MetaSettings {
	pub pixel_id: String,
	/// Enables server-side forwarding to the Conversion API.
	pub access_token: Option<String>,
	pub test_event_code: Option<String>,
}

impl std::fmt::Debug for MetaSettings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MetaSettings")
			.field("pixel_id", &self.pixel_id)
			.field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
			.field("test_event_code", &self.test_event_code)
			.finish()
	}
}

fn non_blank(value: Option<String>) -> Option<String> {
	value
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn enabled_by_default_with_no_providers() {
		let settings = AnalyticsSettings::default();
		assert!(settings.enabled);
		assert!(!settings.debug);
		assert_eq!(settings.provider_count(), 0);
	}

	#[test]
	fn meta_requires_pixel_id() {
		let layer = AnalyticsConfigLayer {
			meta_access_token: Some("secret".to_string()),
			..Default::default()
		};
		assert_eq!(layer.orphaned_meta_setting(), Some("meta_access_token"));
		assert!(layer.finalize().meta.is_none());

		let layer = AnalyticsConfigLayer {
			meta_pixel_id: Some("123".to_string()),
			meta_access_token: Some("secret".to_string()),
			meta_test_event_code: Some(" ".to_string()),
			..Default::default()
		};
		assert_eq!(layer.orphaned_meta_setting(), None);
		let meta = layer.finalize().meta.unwrap();
		assert_eq!(meta.access_token.as_deref(), Some("secret"));
		assert_eq!(meta.test_event_code, None);
	}

	#[test]
	fn debug_output_hides_access_token() {
		let meta = MetaSettings {
			pixel_id: "123".to_string(),
			access_token: Some("very-secret".to_string()),
			test_event_code: None,
		};
		let rendered = format!("{meta:?}");
		assert!(!rendered.contains("very-secret"));
		assert!(rendered.contains("[REDACTED]"));
	}

	#[test]
	fn merge_overrides_only_present_fields() {
		let mut base: AnalyticsConfigLayer = toml::from_str(
			r#"
			debug = true
			ga_measurement_id = "G-FILE"
			gtm_container_id = "GTM-FILE"
			"#,
		)
		.unwrap();
		base.merge(AnalyticsConfigLayer {
			ga_measurement_id: Some("G-ENV".to_string()),
			enabled: Some(false),
			..Default::default()
		});

		let settings = base.finalize();
		assert!(!settings.enabled);
		assert!(settings.debug);
		assert_eq!(settings.ga_measurement_id.as_deref(), Some("G-ENV"));
		assert_eq!(settings.gtm_container_id.as_deref(), Some("GTM-FILE"));
		assert_eq!(settings.provider_count(), 2);
	}
}
