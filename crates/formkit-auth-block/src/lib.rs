// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The survey auth block.
//!
//! Collects the identity fields an [`AuthBlockConfig`] asks for, optionally
//! verifies them with one-time codes, calls the configured login or signup
//! endpoint and hands the result to the survey through a [`SurveyHost`].
//! The auth response is kept in a [`TokenStore`] so a returning user can be
//! welcomed back or skipped past the block entirely.
//!
//! ```ignore
//! let flow = AuthFlow::builder(config, host)
//!     .store(Arc::new(FileTokenStore::new(FileTokenStore::default_path())))
//!     .build()?;
//! flow.mount().await?;
//! flow.set_input(InputField::Email, "ada@example.com");
//! flow.submit().await?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod field_mapping;
pub mod flow;
pub mod host;
pub mod request;
pub mod step;
pub mod store;

pub use api::AuthApi;
pub use config::{AuthBlockConfig, Endpoint, FieldMapping, KeyValue, NameFieldType};
pub use error::{AuthError, Result, GENERIC_ERROR};
pub use field_mapping::{apply_field_mappings, resolve_path};
pub use flow::{AuthFlow, AuthFlowBuilder, AuthState, FlowTimings, OtpSent};
pub use host::{is_back_navigation, NavigationEntry, NavigationTrigger, SurveyHost};
pub use step::{AuthStep, FieldInputs, InputField, StepTarget};
pub use store::{stored_token, FileTokenStore, MemoryTokenStore, TokenStore};
