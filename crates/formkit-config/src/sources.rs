// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::{ConfigError, Result};
use crate::layer::FormkitConfigLayer;
use crate::sections::{AnalyticsConfigLayer, AuthConfigLayer, LoggingConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<FormkitConfigLayer>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<FormkitConfigLayer> {
		debug!("loading defaults");
		Ok(FormkitConfigLayer::default())
	}
}

/// TOML file source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `<config dir>/formkit/config.toml`.
	pub fn user() -> Self {
		Self::new(
			dirs::config_dir()
				.map(|dir| dir.join("formkit").join("config.toml"))
				.unwrap_or_else(|| PathBuf::from("formkit.toml")),
		)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<FormkitConfigLayer> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(FormkitConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
///
/// Convention: FORMKIT_<SECTION>_<FIELD>
pub struct EnvSource {
	lookup: Lookup,
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl EnvSource {
	/// Reads the process environment.
	pub fn new() -> Self {
		Self {
			lookup: Box::new(|name| std::env::var(name).ok()),
		}
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_vars(vars: HashMap<String, String>) -> Self {
		Self {
			lookup: Box::new(move |name| vars.get(name).cloned()),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Result<Option<bool>> {
		match self.var(name) {
			Some(v) => match v.to_ascii_lowercase().as_str() {
				"true" | "1" | "yes" | "on" => Ok(Some(true)),
				"false" | "0" | "no" | "off" => Ok(Some(false)),
				_ => Err(ConfigError::InvalidValue {
					key: name.to_string(),
					message: format!("invalid boolean value '{v}'"),
				}),
			},
			None => Ok(None),
		}
	}

	fn path(&self, name: &str) -> Option<PathBuf> {
		self.var(name).map(PathBuf::from)
	}

	fn logging(&self) -> LoggingConfigLayer {
		LoggingConfigLayer {
			level: self.var("FORMKIT_LOGGING_LEVEL"),
		}
	}

	fn analytics(&self) -> Result<AnalyticsConfigLayer> {
		Ok(AnalyticsConfigLayer {
			enabled: self.bool("FORMKIT_ANALYTICS_ENABLED")?,
			debug: self.bool("FORMKIT_ANALYTICS_DEBUG")?,
			session_id: self.var("FORMKIT_ANALYTICS_SESSION_ID"),
			user_id: self.var("FORMKIT_ANALYTICS_USER_ID"),
			ga_measurement_id: self.var("FORMKIT_ANALYTICS_GA_MEASUREMENT_ID"),
			gtm_container_id: self.var("FORMKIT_ANALYTICS_GTM_CONTAINER_ID"),
			meta_pixel_id: self.var("FORMKIT_ANALYTICS_META_PIXEL_ID"),
			meta_access_token: self.var("FORMKIT_ANALYTICS_META_ACCESS_TOKEN"),
			meta_test_event_code: self.var("FORMKIT_ANALYTICS_META_TEST_EVENT_CODE"),
		})
	}

	fn auth(&self) -> AuthConfigLayer {
		AuthConfigLayer {
			block_file: self.path("FORMKIT_AUTH_BLOCK_FILE"),
			token_store_path: self.path("FORMKIT_AUTH_TOKEN_STORE_PATH"),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<FormkitConfigLayer> {
		debug!("loading environment variables");
		Ok(FormkitConfigLayer {
			logging: Some(self.logging()),
			analytics: Some(self.analytics()?),
			auth: Some(self.auth()),
		})
	}
}
