// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The capability set every analytics provider implements.

use async_trait::async_trait;
use formkit_analytics_core::{AnalyticsEvent, PageView, Properties, TimingEvent, UserProperties};

use crate::error::Result;

/// Shared identity and flags handed to each provider at initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderInit {
	pub session_id: Option<String>,
	pub user_id: Option<String>,
	pub debug: bool,
}

/// Lifecycle of a provider adapter.
///
/// `Initialized` and `Failed` are terminal for one initialization attempt;
/// the fan-out context only keeps providers that reached `Initialized`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderState {
	#[default]
	Uninitialized,
	Initializing,
	Initialized,
	Failed,
}

/// An adapter to one external analytics platform.
///
/// Tracking methods are synchronous and fire-and-forget; anything that needs
/// the network schedules its own task. Errors returned here are logged by the
/// fan-out context and never reach the caller of the tracking API.
#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
	/// Name used to tag log lines and errors.
	fn name(&self) -> &str;

	/// Attaches the provider's script and globals. May fail; a failed provider
	/// is left out of the active set.
	async fn initialize(&mut self, init: &ProviderInit) -> Result<()>;

	fn track_event(&self, event: &AnalyticsEvent) -> Result<()>;

	fn track_page_view(&self, view: &PageView) -> Result<()>;

	fn track_timing(&self, timing: &TimingEvent) -> Result<()>;

	fn set_user_properties(&self, properties: &UserProperties) -> Result<()>;

	fn is_initialized(&self) -> bool;

	/// Sets platform-specific custom dimensions. Providers without the concept ignore it.
	fn set_custom_dimensions(&self, _dimensions: &Properties) -> Result<()> {
		Ok(())
	}

	/// Releases whatever the provider holds. Providers with nothing to release
	/// keep the default.
	async fn destroy(&mut self) {}
}
