// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Survey analytics fan-out.
//!
//! An [`AnalyticsContext`] owns a set of [`AnalyticsProvider`]s (Google
//! Analytics, Google Tag Manager, Meta Pixel and an optional custom handler)
//! and broadcasts every tracking call to all of them. A provider that fails,
//! at initialization or on any call, is logged and skipped; callers never see
//! an error.
//!
//! # Example
//!
//! ```ignore
//! use formkit_analytics::{AnalyticsConfig, AnalyticsContext, SurveyAnalytics};
//! use formkit_analytics_core::GoogleAnalyticsConfig;
//!
//! let config = AnalyticsConfig::new()
//!     .session_id("sess-1")
//!     .google_analytics(GoogleAnalyticsConfig::new("G-XXXX"));
//! let context = AnalyticsContext::new(config, true, false);
//! context.initialize().await;
//!
//! let survey = SurveyAnalytics::new(context.clone(), "onboarding");
//! survey.track_survey_start();
//! survey.track_page_view("contact", None);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod platform;
pub mod provider;
pub mod providers;
pub mod survey;

pub use config::{AnalyticsConfig, Callback, CustomHandler, CustomProviderConfig, TrackingCallbacks};
pub use context::{AnalyticsContext, AnalyticsContextBuilder};
pub use error::{AnalyticsError, Result};
pub use platform::{HttpScriptLoader, LoadPolicy, ScriptHost, ScriptLoader};
pub use provider::{AnalyticsProvider, ProviderInit, ProviderState};
pub use providers::{
	ConversionApi, ConversionEvent, CustomProvider, GoogleAnalyticsProvider,
	GoogleTagManagerProvider, MetaPixelProvider, ProviderFactory, StandardProviders,
};
pub use survey::{FieldInteraction, NavigationDirection, SurveyAnalytics};
