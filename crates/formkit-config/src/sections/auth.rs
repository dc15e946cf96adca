// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Auth block host configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfigLayer {
	/// JSON file holding the auth block definition.
	#[serde(default)]
	pub block_file: Option<PathBuf>,
	#[serde(default)]
	pub token_store_path: Option<PathBuf>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.block_file.is_some() {
			self.block_file = other.block_file;
		}
		if other.token_store_path.is_some() {
			self.token_store_path = other.token_store_path;
		}
	}

	pub fn finalize(self) -> AuthConfig {
		AuthConfig {
			block_file: self.block_file,
			token_store_path: self.token_store_path.unwrap_or_else(default_token_store_path),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
	pub block_file: Option<PathBuf>,
	pub token_store_path: PathBuf,
}

impl Default for AuthConfig {
	fn default() -> Self {
		AuthConfigLayer::default().finalize()
	}
}

fn default_token_store_path() -> PathBuf {
	dirs::config_dir()
		.map(|dir| dir.join("formkit").join("tokens.json"))
		.unwrap_or_else(|| PathBuf::from("formkit-tokens.json"))
}
