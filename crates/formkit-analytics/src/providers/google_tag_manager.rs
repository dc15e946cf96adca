// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Google Tag Manager adapter.
//!
//! GTM has no event API of its own: everything is a `dataLayer.push` of a flat
//! object whose `event` key triggers tags configured in the container.

use std::sync::Arc;

use async_trait::async_trait;
use formkit_analytics_core::{
	now_millis, strip_nulls, AnalyticsEvent, GoogleTagManagerConfig, PageView, Properties,
	TimingEvent, UserProperties,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{object, with_metadata};
use crate::error::{AnalyticsError, Result};
use crate::platform::{LoadPolicy, ScriptHost, DATA_LAYER};
use crate::provider::{AnalyticsProvider, ProviderInit, ProviderState};

const NAME: &str = "GoogleTagManager";

/// Set once the `gtm.js` start event has been pushed onto the page.
const GTM_GLOBAL: &str = "google_tag_manager";

pub const GTM_SCRIPT_URL: &str = "https://www.googletagmanager.com/gtm.js";

pub struct GoogleTagManagerProvider {
	config: GoogleTagManagerConfig,
	host: Arc<ScriptHost>,
	state: ProviderState,
	session_id: Option<String>,
	user_id: Option<String>,
	debug: bool,
}

impl GoogleTagManagerProvider {
	pub fn new(config: GoogleTagManagerConfig, host: Arc<ScriptHost>) -> Self {
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

	/// Container script URL, including environment parameters when both
	/// `auth` and `preview` are configured.
	pub fn script_src(&self) -> String {
		let mut src = format!("{GTM_SCRIPT_URL}?id={}", self.config.container_id);
		if let (Some(auth), Some(preview)) = (&self.config.auth, &self.config.preview) {
			src.push_str(&format!("&gtm_auth={auth}&gtm_preview={preview}&gtm_cookies_win=x"));
		}
		src
	}

	fn push(&self, payload: Value) {
		if self.debug {
			debug!(provider = NAME, payload = %payload, "dataLayer.push");
		}
		self.host.push(DATA_LAYER, payload);
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
impl AnalyticsProvider for GoogleTagManagerProvider {
	fn name(&self) -> &str {
		NAME
	}

	async fn initialize(&mut self, init: &ProviderInit) -> Result<()> {
		if self.config.container_id.trim().is_empty() {
			self.state = ProviderState::Failed;
			return Err(AnalyticsError::InvalidConfig(
				"googleTagManager.containerId is empty".to_string(),
			));
		}

		self.state = ProviderState::Initializing;
		self.session_id = init.session_id.clone();
		self.user_id = init.user_id.clone();
		self.debug = self.config.debug || init.debug;

		self.host.ensure_global(DATA_LAYER);
		if self.host.ensure_global(GTM_GLOBAL) {
			self.push(json!({"gtm.start": now_millis(), "event": "gtm.js"}));
		}

		if let Err(e) = self.host.ensure_script(&self.script_src(), LoadPolicy::STRICT).await {
			self.state = ProviderState::Failed;
			return Err(e);
		}

		self.state = ProviderState::Initialized;
		info!(provider = NAME, container_id = %self.config.container_id, "analytics provider ready");
		Ok(())
	}

	fn track_event(&self, event: &AnalyticsEvent) -> Result<()> {
		self.ensure_ready()?;
		let payload = with_metadata(
			object(json!({
				"event": "survey_event",
				"eventCategory": event.category(),
				"eventAction": event.action.as_str(),
				"eventLabel": event.label,
				"eventValue": event.value,
				"sessionId": event.session_id.as_ref().or(self.session_id.as_ref()),
				"userId": event.user_id.as_ref().or(self.user_id.as_ref()),
				"surveyId": event.survey_id,
				"timestamp": event.timestamp,
			})),
			&event.metadata,
		);
		self.push(Value::Object(payload));
		Ok(())
	}

	fn track_page_view(&self, view: &PageView) -> Result<()> {
		self.ensure_ready()?;
		let payload = with_metadata(
			object(json!({
				"event": "survey_page_view",
				"pagePath": view.path,
				"pageTitle": view.title,
				"surveyId": view.survey_id,
				"sessionId": view.session_id.as_ref().or(self.session_id.as_ref()),
			})),
			&view.metadata,
		);
		self.push(Value::Object(payload));
		Ok(())
	}

	fn track_timing(&self, timing: &TimingEvent) -> Result<()> {
		self.ensure_ready()?;
		let payload = strip_nulls(object(json!({
			"event": "survey_timing",
			"timingCategory": timing.category,
			"timingVar": timing.variable,
			"timingValue": timing.value_ms,
			"timingLabel": timing.label,
		})));
		self.push(Value::Object(payload));
		Ok(())
	}

	fn set_user_properties(&self, properties: &UserProperties) -> Result<()> {
		self.ensure_ready()?;
		self.push(json!({
			"event": "set_user_properties",
			"userProperties": properties.clone().stripped(),
		}));
		Ok(())
	}

	fn is_initialized(&self) -> bool {
		self.state == ProviderState::Initialized
	}

	fn set_custom_dimensions(&self, dimensions: &Properties) -> Result<()> {
		self.ensure_ready()?;
		self.push(dimensions.clone().stripped().into_value());
		Ok(())
	}

	async fn destroy(&mut self) {
		self.state = ProviderState::Uninitialized;
	}
}
