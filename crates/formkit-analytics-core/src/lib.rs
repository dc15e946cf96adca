// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for formkit survey analytics.
//!
//! This crate holds the provider-independent data model shared by the
//! fan-out context and every provider adapter:
//!
//! - [`AnalyticsEvent`] and the [`SurveyAction`] tags
//! - [`PageView`], [`TimingEvent`] and [`UserProperties`]
//! - [`Properties`], an open key-value map with null stripping
//! - Per-provider configuration ([`GoogleAnalyticsConfig`], [`GoogleTagManagerConfig`],
//!   [`MetaPixelConfig`])

pub mod config;
pub mod event;
pub mod properties;

pub use config::{GoogleAnalyticsConfig, GoogleTagManagerConfig, MetaPixelConfig};
pub use event::{
	new_session_id, now_millis, AnalyticsEvent, EventCategory, PageView, ParseActionError,
	SurveyAction, TimingEvent, UserProperties,
};
pub use properties::{strip_nulls, Properties};
