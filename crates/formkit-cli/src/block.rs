// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use formkit_auth_block::AuthBlockConfig;
use formkit_config::AuthConfig;

/// The block file from the command line, else the configured one.
pub fn resolve(arg: Option<PathBuf>, config: &AuthConfig) -> Result<PathBuf> {
	arg.or_else(|| config.block_file.clone())
		.ok_or_else(|| anyhow!("no auth block given; pass --block or set auth.block_file"))
}

/// Reads an auth block definition (JSON, camelCase keys).
pub fn load(path: &Path) -> Result<AuthBlockConfig> {
	let content = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read auth block {}", path.display()))?;
	serde_json::from_str(&content)
		.with_context(|| format!("invalid auth block definition in {}", path.display()))
}
