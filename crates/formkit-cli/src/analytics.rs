// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::Result;
use formkit_analytics::{AnalyticsConfig, AnalyticsContext};
use formkit_analytics_core::{
	AnalyticsEvent, GoogleAnalyticsConfig, GoogleTagManagerConfig, MetaPixelConfig, SurveyAction,
};
use formkit_config::AnalyticsSettings;
use tracing::{info, instrument};

/// Provider configuration for the resolved settings.
pub fn analytics_config(settings: &AnalyticsSettings) -> AnalyticsConfig {
	let mut config = AnalyticsConfig::new();
	if let Some(session_id) = &settings.session_id {
		config = config.session_id(session_id);
	}
	if let Some(user_id) = &settings.user_id {
		config = config.user_id(user_id);
	}
	if let Some(id) = &settings.ga_measurement_id {
		config = config.google_analytics(GoogleAnalyticsConfig {
			debug: settings.debug,
			..GoogleAnalyticsConfig::new(id)
		});
	}
	if let Some(id) = &settings.gtm_container_id {
		config = config.google_tag_manager(GoogleTagManagerConfig {
			debug: settings.debug,
			..GoogleTagManagerConfig::new(id)
		});
	}
	if let Some(meta) = &settings.meta {
		config = config.meta(MetaPixelConfig {
			access_token: meta.access_token.clone(),
			test_event_code: meta.test_event_code.clone(),
			debug: settings.debug,
			..MetaPixelConfig::new(&meta.pixel_id)
		});
	}
	config
}

pub fn context(settings: &AnalyticsSettings) -> AnalyticsContext {
	AnalyticsContext::new(analytics_config(settings), settings.enabled, settings.debug)
}

/// Broadcasts one event and tears the providers down again.
#[instrument(skip_all, fields(action = %action))]
pub async fn track(
	settings: &AnalyticsSettings,
	action: SurveyAction,
	label: Option<String>,
	value: Option<f64>,
	survey_id: Option<String>,
) -> Result<()> {
	let context = context(settings);
	context.initialize().await;
	if !context.is_enabled() {
		println!("analytics is disabled; nothing sent");
		return Ok(());
	}

	let mut event = AnalyticsEvent::new(action).with_timestamp_now();
	if let Some(label) = label {
		event = event.with_label(label);
	}
	if let Some(value) = value {
		event = event.with_value(value);
	}
	if let Some(survey_id) = survey_id {
		event = event.with_survey_id(survey_id);
	}

	let providers = context.active_providers();
	context.track_event(event);
	context.shutdown().await;

	info!(providers = ?providers, "event broadcast");
	println!("sent {action} to {} provider(s): {}", providers.len(), providers.join(", "));
	Ok(())
}
