// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Google Analytics 4 adapter (gtag.js).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use formkit_analytics_core::{
	strip_nulls, AnalyticsEvent, GoogleAnalyticsConfig, PageView, Properties, TimingEvent,
	UserProperties,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{object, with_metadata};
use crate::error::{AnalyticsError, Result};
use crate::platform::{LoadPolicy, ScriptHost, DATA_LAYER, GTAG};
use crate::provider::{AnalyticsProvider, ProviderInit, ProviderState};

const NAME: &str = "GoogleAnalytics";

/// gtag.js loader endpoint; the measurement id is appended as `?id=`.
pub const GA_SCRIPT_URL: &str = "https://www.googletagmanager.com/gtag/js";

/// Sends survey events as gtag `event` commands through the page's `dataLayer`.
pub struct GoogleAnalyticsProvider {
	config: GoogleAnalyticsConfig,
	host: Arc<ScriptHost>,
	state: ProviderState,
	session_id: Option<String>,
	user_id: Option<String>,
	debug: bool,
}

impl GoogleAnalyticsProvider {
	pub fn new(config: GoogleAnalyticsConfig, host: Arc<ScriptHost>) -> Self {
		let debug = config.debug;
		Self {
			config,
			host,
			state: ProviderState::Uninitialized,
			session_id: None,
			user_id: None,
			debug,
		}
	}

	pub fn state(&self) -> ProviderState {
		self.state
	}

	pub fn script_src(&self) -> String {
		format!("{GA_SCRIPT_URL}?id={}", self.config.measurement_id)
	}

	/// gtag pushes its arguments onto the data layer.
	fn gtag(&self, args: Value) {
		if self.debug {
			debug!(provider = NAME, command = %args, "gtag");
		}
		self.host.push(DATA_LAYER, args);
	}

	fn ensure_ready(&self) -> Result<()> {
		if self.state != ProviderState::Initialized {
			return Err(AnalyticsError::NotInitialized {
				provider: NAME.to_string(),
			});
		}
		Ok(())
	}
}

#[async_trait]
impl AnalyticsProvider for GoogleAnalyticsProvider {
	fn name(&self) -> &str {
		NAME
	}

	async fn initialize(&mut self, init: &ProviderInit) -> Result<()> {
		if self.config.measurement_id.trim().is_empty() {
			self.state = ProviderState::Failed;
			return Err(AnalyticsError::InvalidConfig(
				"googleAnalytics.measurementId is empty".to_string(),
			));
		}

		self.state = ProviderState::Initializing;
		self.session_id = init.session_id.clone();
		self.user_id = init.user_id.clone();
		self.debug = self.config.debug || init.debug;

		self.host.ensure_global(DATA_LAYER);
		self.host.ensure_global(GTAG);

		let policy = if self.config.soft_load {
			LoadPolicy::SOFT
		} else {
			LoadPolicy::STRICT
		};
		if let Err(e) = self.host.ensure_script(&self.script_src(), policy).await {
			self.state = ProviderState::Failed;
			return Err(e);
		}

		self.gtag(json!(["js", Utc::now().to_rfc3339()]));
		let settings = strip_nulls(object(json!({
			"send_page_view": false,
			"debug_mode": self.debug.then_some(true),
			"session_id": self.session_id,
			"user_id": self.user_id,
		})));
		self.gtag(json!(["config", self.config.measurement_id, settings]));

		self.state = ProviderState::Initialized;
		info!(provider = NAME, measurement_id = %self.config.measurement_id, "analytics provider ready");
		Ok(())
	}

	fn track_event(&self, event: &AnalyticsEvent) -> Result<()> {
		self.ensure_ready()?;
		let params = with_metadata(
			object(json!({
				"event_category": event.category(),
				"event_label": event.label,
				"value": event.value,
				"session_id": event.session_id.as_ref().or(self.session_id.as_ref()),
				"user_id": event.user_id.as_ref().or(self.user_id.as_ref()),
				"survey_id": event.survey_id,
				"timestamp": event.timestamp,
			})),
			&event.metadata,
		);
		self.gtag(json!(["event", event.action.as_str(), params]));
		Ok(())
	}

	fn track_page_view(&self, view: &PageView) -> Result<()> {
		self.ensure_ready()?;
		let params = with_metadata(
			object(json!({
				"page_path": view.path,
				"page_title": view.title,
				"survey_id": view.survey_id,
				"session_id": view.session_id.as_ref().or(self.session_id.as_ref()),
			})),
			&view.metadata,
		);
		self.gtag(json!(["event", "page_view", params]));
		Ok(())
	}

	fn track_timing(&self, timing: &TimingEvent) -> Result<()> {
		self.ensure_ready()?;
		let params = strip_nulls(object(json!({
			"name": timing.variable,
			"value": timing.value_ms,
			"event_category": timing.category,
			"event_label": timing.label,
		})));
		self.gtag(json!(["event", "timing_complete", params]));
		Ok(())
	}

	fn set_user_properties(&self, properties: &UserProperties) -> Result<()> {
		self.ensure_ready()?;
		let props = properties.clone().stripped();
		self.gtag(json!(["set", "user_properties", props]));
		Ok(())
	}

	fn is_initialized(&self) -> bool {
		self.state == ProviderState::Initialized
	}

	fn set_custom_dimensions(&self, dimensions: &Properties) -> Result<()> {
		self.ensure_ready()?;
		self.gtag(json!(["set", dimensions.clone().stripped()]));
		Ok(())
	}

	async fn destroy(&mut self) {
		self.state = ProviderState::Uninitialized;
	}
}
