// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider adapters and the factory that builds them from configuration.

mod custom;
mod google_analytics;
mod google_tag_manager;
mod meta_pixel;

use std::sync::Arc;

use formkit_analytics_core::{strip_nulls, Properties};
use serde_json::{Map, Value};

use crate::config::AnalyticsConfig;
use crate::platform::ScriptHost;
use crate::provider::AnalyticsProvider;

pub use custom::CustomProvider;
pub use google_analytics::{GoogleAnalyticsProvider, GA_SCRIPT_URL};
pub use google_tag_manager::{GoogleTagManagerProvider, GTM_SCRIPT_URL};
pub use meta_pixel::{ConversionApi, ConversionEvent, MetaPixelProvider, GRAPH_API_BASE, META_SCRIPT_URL};

/// Builds the provider list for one initialization pass.
///
/// Construction is infallible; anything that can fail happens in
/// [`AnalyticsProvider::initialize`].
pub trait ProviderFactory: Send + Sync {
	fn build(&self, config: &AnalyticsConfig) -> Vec<Box<dyn AnalyticsProvider>>;
}

/// The built-in adapters, in fixed order: Google Analytics, Google Tag
/// Manager, Meta Pixel, custom.
#[derive(Debug, Clone)]
pub struct StandardProviders {
	host: Arc<ScriptHost>,
	http: reqwest::Client,
	graph_base_url: String,
}

impl StandardProviders {
	pub fn new(host: Arc<ScriptHost>) -> Self {
		Self {
			host,
			http: formkit_common_http::new_client(),
			graph_base_url: GRAPH_API_BASE.to_string(),
		}
	}

	/// Providers on the process-wide [`ScriptHost`].
	pub fn shared() -> Self {
		Self::new(ScriptHost::shared())
	}

	/// Overrides the Graph API base used for Conversion API forwarding.
	pub fn with_graph_base_url(mut self, url: impl Into<String>) -> Self {
		self.graph_base_url = url.into();
		self
	}

	pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
		self.http = client;
		self
	}
}

impl Default for StandardProviders {
	fn default() -> Self {
		Self::shared()
	}
}

impl ProviderFactory for StandardProviders {
	fn build(&self, config: &AnalyticsConfig) -> Vec<Box<dyn AnalyticsProvider>> {
		let mut providers: Vec<Box<dyn AnalyticsProvider>> = Vec::new();

		if let Some(ga) = config
			.google_analytics
			.as_ref()
			.filter(|c| !c.measurement_id.trim().is_empty())
		{
			providers.push(Box::new(GoogleAnalyticsProvider::new(
				ga.clone(),
				self.host.clone(),
			)));
		}

		if let Some(gtm) = config
			.google_tag_manager
			.as_ref()
			.filter(|c| !c.container_id.trim().is_empty())
		{
			providers.push(Box::new(GoogleTagManagerProvider::new(
				gtm.clone(),
				self.host.clone(),
			)));
		}

		if let Some(meta) = config.meta.as_ref().filter(|c| !c.pixel_id.trim().is_empty()) {
			providers.push(Box::new(
				MetaPixelProvider::new(meta.clone(), self.host.clone())
					.with_conversion_client(self.http.clone(), &self.graph_base_url),
			));
		}

		if let Some(custom) = &config.custom {
			providers.push(Box::new(CustomProvider::new(custom.clone())));
		}

		providers
	}
}

/// Flattens metadata into `params` without overriding the provider's own
/// keys, then drops every null so no key goes out without a value.
pub(crate) fn with_metadata(mut params: Map<String, Value>, metadata: &Properties) -> Map<String, Value> {
	for (key, value) in metadata.iter() {
		params.entry(key.clone()).or_insert_with(|| value.clone());
	}
	strip_nulls(params)
}

/// Converts a `json!({...})` literal into its map.
pub(crate) fn object(value: Value) -> Map<String, Value> {
	match value {
		Value::Object(map) => map,
		_ => Map::new(),
	}
}
