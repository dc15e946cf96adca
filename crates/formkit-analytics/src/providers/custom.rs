// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Adapter around a user-supplied [`CustomHandler`].

use async_trait::async_trait;
use formkit_analytics_core::{AnalyticsEvent, PageView, TimingEvent, UserProperties};
use tracing::info;

use crate::config::CustomProviderConfig;
use crate::error::{AnalyticsError, Result};
use crate::provider::{AnalyticsProvider, ProviderInit, ProviderState};

pub struct CustomProvider {
	config: CustomProviderConfig,
	state: ProviderState,
}

impl CustomProvider {
	pub fn new(config: CustomProviderConfig) -> Self {
		Self {
			config,
			state: ProviderState::Uninitialized,
		}
	}

	fn ensure_ready(&self) -> Result<()> {
		if self.state != ProviderState::Initialized {
			return Err(AnalyticsError::NotInitialized {
				provider: self.config.name.clone(),
			});
		}
		Ok(())
	}
}

#[async_trait]
impl AnalyticsProvider for CustomProvider {
	fn name(&self) -> &str {
		&self.config.name
	}

	async fn initialize(&mut self, init: &ProviderInit) -> Result<()> {
		self.state = ProviderState::Initializing;
		if let Err(e) = self.config.handler.init(&self.config.config, init).await {
			self.state = ProviderState::Failed;
			return Err(e);
		}
		self.state = ProviderState::Initialized;
		info!(provider = %self.config.name, "analytics provider ready");
		Ok(())
	}

	fn track_event(&self, event: &AnalyticsEvent) -> Result<()> {
		self.ensure_ready()?;
		self.config.handler.track_event(event)
	}

	fn track_page_view(&self, view: &PageView) -> Result<()> {
		self.ensure_ready()?;
		self.config.handler.track_page_view(view)
	}

	fn track_timing(&self, timing: &TimingEvent) -> Result<()> {
		self.ensure_ready()?;
		self.config.handler.track_timing(timing)
	}

	fn set_user_properties(&self, properties: &UserProperties) -> Result<()> {
		self.ensure_ready()?;
		self.config.handler.set_user_properties(properties)
	}

	fn is_initialized(&self) -> bool {
		self.state == ProviderState::Initialized
	}

	async fn destroy(&mut self) {
		if self.state == ProviderState::Initialized {
			self.config.handler.destroy().await;
		}
		self.state = ProviderState::Uninitialized;
	}
}
