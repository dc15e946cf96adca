// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the formkit command-line host.
//!
//! Layers are read from built-in defaults, a TOML file and `FORMKIT_*`
//! environment variables, merged in that order and resolved into a
//! [`FormkitConfig`].
//!
//! ```ignore
//! let config = formkit_config::load_config()?;
//! if config.analytics.enabled {
//!     println!("{} analytics providers", config.analytics.provider_count());
//! }
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::{ConfigError, Result};
pub use layer::FormkitConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormkitConfig {
	pub logging: LoggingConfig,
	pub analytics: AnalyticsSettings,
	pub auth: AuthConfig,
}

/// Loads configuration with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`FORMKIT_*`)
/// 2. Config file (`<config dir>/formkit/config.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<FormkitConfig> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::user()),
		Box::new(EnvSource::new()),
	])
}

/// Like [`load_config`] but reads the given file instead of the user one.
pub fn load_config_with_file(config_path: impl Into<std::path::PathBuf>) -> Result<FormkitConfig> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merges `sources` by precedence and resolves the result.
pub fn load_config_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<FormkitConfig> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = FormkitConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: FormkitConfigLayer) -> Result<FormkitConfig> {
	validate_layer(&layer)?;

	let logging = layer.logging.unwrap_or_default().finalize();
	let analytics = layer.analytics.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize();

	info!(
		log_level = %logging.level,
		analytics_enabled = analytics.enabled,
		analytics_providers = analytics.provider_count(),
		block_file = ?auth.block_file,
		"formkit configuration loaded"
	);

	Ok(FormkitConfig {
		logging,
		analytics,
		auth,
	})
}

fn validate_layer(layer: &FormkitConfigLayer) -> Result<()> {
	if let Some(setting) = layer
		.analytics
		.as_ref()
		.and_then(AnalyticsConfigLayer::orphaned_meta_setting)
	{
		return Err(ConfigError::Validation(format!(
			"analytics.{setting} is set but analytics.meta_pixel_id is not"
		)));
	}
	Ok(())
}
