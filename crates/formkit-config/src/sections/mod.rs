// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a partial `*ConfigLayer` that sources
//! produce and merge, and a resolved `*Config` produced by `finalize`.

mod analytics;
mod auth;
mod logging;

pub use analytics::{AnalyticsConfigLayer, AnalyticsSettings, MetaSettings};
pub use auth::{AuthConfig, AuthConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
