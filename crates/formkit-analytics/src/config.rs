// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fan-out configuration: which providers to start and which callbacks to run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use formkit_analytics_core::{
	AnalyticsEvent, GoogleAnalyticsConfig, GoogleTagManagerConfig, MetaPixelConfig, PageView,
	TimingEvent, UserProperties,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::provider::ProviderInit;

/// A plain tracking callback invoked before any provider.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Optional callbacks run on every broadcast, ahead of the providers.
#[derive(Clone, Default)]
pub struct TrackingCallbacks {
	pub track_event: Option<Callback<AnalyticsEvent>>,
	pub track_page_view: Option<Callback<PageView>>,
	pub track_timing: Option<Callback<TimingEvent>>,
	pub set_user_properties: Option<Callback<UserProperties>>,
}

impl TrackingCallbacks {
	pub fn on_event(mut self, f: impl Fn(&AnalyticsEvent) + Send + Sync + 'static) -> Self {
		self.track_event = Some(Arc::new(f));
		self
	}

	pub fn on_page_view(mut self, f: impl Fn(&PageView) + Send + Sync + 'static) -> Self {
		self.track_page_view = Some(Arc::new(f));
		self
	}

	pub fn on_timing(mut self, f: impl Fn(&TimingEvent) + Send + Sync + 'static) -> Self {
		self.track_timing = Some(Arc::new(f));
		self
	}

	pub fn on_user_properties(mut self, f: impl Fn(&UserProperties) + Send + Sync + 'static) -> Self {
		self.set_user_properties = Some(Arc::new(f));
		self
	}
}

impl fmt::Debug for TrackingCallbacks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TrackingCallbacks")
			.field("track_event", &self.track_event.is_some())
			.field("track_page_view", &self.track_page_view.is_some())
			.field("track_timing", &self.track_timing.is_some())
			.field("set_user_properties", &self.set_user_properties.is_some())
			.finish()
	}
}

/// User-supplied analytics backend wrapped by the custom provider.
#[async_trait]
pub trait CustomHandler: Send + Sync {
	/// Called once when the custom provider initializes.
	async fn init(&self, _config: &Value, _init: &ProviderInit) -> Result<()> {
		Ok(())
	}

	fn track_event(&self, event: &AnalyticsEvent) -> Result<()>;

	fn track_page_view(&self, _view: &PageView) -> Result<()> {
		Ok(())
	}

	fn track_timing(&self, _timing: &TimingEvent) -> Result<()> {
		Ok(())
	}

	fn set_user_properties(&self, _properties: &UserProperties) -> Result<()> {
		Ok(())
	}

	async fn destroy(&self) {}
}

/// Configuration for the custom provider.
#[derive(Clone)]
pub struct CustomProviderConfig {
	pub name: String,
	pub config: Value,
	pub handler: Arc<dyn CustomHandler>,
}

impl CustomProviderConfig {
	pub fn new(name: impl Into<String>, handler: Arc<dyn CustomHandler>) -> Self {
		Self {
			name: name.into(),
			config: Value::Null,
			handler,
		}
	}

	pub fn with_config(mut self, config: Value) -> Self {
		self.config = config;
		self
	}
}

impl fmt::Debug for CustomProviderConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CustomProviderConfig")
			.field("name", &self.name)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

/// Everything the fan-out context needs to build its providers.
///
/// The serializable part mirrors the survey definition's analytics block;
/// the custom handler and callbacks are attached in code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfig {
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub google_analytics: Option<GoogleAnalyticsConfig>,
	#[serde(default)]
	pub google_tag_manager: Option<GoogleTagManagerConfig>,
	#[serde(default)]
	pub meta: Option<MetaPixelConfig>,
	#[serde(skip)]
	pub custom: Option<CustomProviderConfig>,
	#[serde(skip)]
	pub callbacks: TrackingCallbacks,
}

impl AnalyticsConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn google_analytics(mut self, config: GoogleAnalyticsConfig) -> Self {
		self.google_analytics = Some(config);
		self
	}

	pub fn google_tag_manager(mut self, config: GoogleTagManagerConfig) -> Self {
		self.google_tag_manager = Some(config);
		self
	}

	pub fn meta(mut self, config: MetaPixelConfig) -> Self {
		self.meta = Some(config);
		self
	}

	pub fn custom(mut self, config: CustomProviderConfig) -> Self {
		self.custom = Some(config);
		self
	}

	pub fn callbacks(mut self, callbacks: TrackingCallbacks) -> Self {
		self.callbacks = callbacks;
		self
	}

	/// Identity handed to every provider.
	pub fn provider_init(&self, debug: bool) -> ProviderInit {
		ProviderInit {
			session_id: self.session_id.clone(),
			user_id: self.user_id.clone(),
			debug,
		}
	}
}
