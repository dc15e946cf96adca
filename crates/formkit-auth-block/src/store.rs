// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence for the auth response.
//!
//! The stored value is the full JSON response of the successful auth call,
//! not just the token; [`stored_token`] extracts the token from it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AuthError, Result};

#[async_trait]
pub trait TokenStore: Send + Sync {
	async fn load(&self, key: &str) -> Result<Option<Value>>;

	async fn save(&self, key: &str, value: &Value) -> Result<()>;

	async fn delete(&self, key: &str) -> Result<()>;
}

/// Pulls the token out of a stored value: either a bare string or an object
/// carrying it under `token_field`.
pub fn stored_token(value: &Value, token_field: &str) -> Option<String> {
	let token = match value {
		Value::String(s) => s.as_str(),
		Value::Object(map) => map.get(token_field)?.as_str()?,
		_ => return None,
	};
	let token = token.trim();
	(!token.is_empty()).then(|| token.to_string())
}

/// In-process store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
	values: Mutex<HashMap<String, Value>>,
}

impl MemoryTokenStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store pre-populated with one entry.
	pub fn with_entry(key: impl Into<String>, value: Value) -> Self {
		let store = Self::new();
		store
			.values
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key.into(), value);
		store
	}
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
	async fn load(&self, key: &str) -> Result<Option<Value>> {
		Ok(self
			.values
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(key)
			.cloned())
	}

	async fn save(&self, key: &str, value: &Value) -> Result<()> {
		self.values
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key.to_string(), value.clone());
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<()> {
		self.values
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(key);
		Ok(())
	}
}

/// Keeps every key in one JSON object file.
#[derive(Debug)]
pub struct FileTokenStore {
	path: PathBuf,
	write_lock: tokio::sync::Mutex<()>,
}

impl FileTokenStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			write_lock: tokio::sync::Mutex::new(()),
		}
	}

	/// `<config dir>/formkit/tokens.json`, or the current directory when the
	/// platform has no config directory.
	pub fn default_path() -> PathBuf {
		dirs::config_dir()
			.map(|dir| dir.join("formkit").join("tokens.json"))
			.unwrap_or_else(|| PathBuf::from("formkit-tokens.json"))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_all(&self) -> Result<Map<String, Value>> {
		let contents = match tokio::fs::read_to_string(&self.path).await {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
			Err(e) => return Err(e.into()),
		};
		if contents.trim().is_empty() {
			return Ok(Map::new());
		}
		match serde_json::from_str(&contents)? {
			Value::Object(map) => Ok(map),
			_ => Err(AuthError::Store(format!(
				"{} does not contain a JSON object",
				self.path.display()
			))),
		}
	}

	async fn write_all(&self, values: &Map<String, Value>) -> Result<()> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}
		let contents = serde_json::to_string_pretty(values)?;
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, contents).await?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
		}

		tokio::fs::rename(&tmp, &self.path).await?;
		Ok(())
	}
}

#[async_trait]
impl TokenStore for FileTokenStore {
	async fn load(&self, key: &str) -> Result<Option<Value>> {
		let values = self.read_all().await?;
		debug!(key = %key, found = values.contains_key(key), "token store load");
		Ok(values.get(key).cloned())
	}

	async fn save(&self, key: &str, value: &Value) -> Result<()> {
		let _guard = self.write_lock.lock().await;
		let mut values = self.read_all().await?;
		values.insert(key.to_string(), value.clone());
		self.write_all(&values).await
	}

	async fn delete(&self, key: &str) -> Result<()> {
		let _guard = self.write_lock.lock().await;
		let mut values = self.read_all().await?;
		if values.remove(key).is_some() {
			self.write_all(&values).await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn extracts_token_from_object_or_string() {
		assert_eq!(
			stored_token(&json!({"token": "t-1", "user": {}}), "token").as_deref(),
			Some("t-1")
		);
		assert_eq!(stored_token(&json!("bare"), "token").as_deref(), Some("bare"));
		assert_eq!(stored_token(&json!({"jwt": "x"}), "token"), None);
		assert_eq!(stored_token(&json!({"token": ""}), "token"), None);
		assert_eq!(stored_token(&json!(42), "token"), None);
	}

	#[tokio::test]
	async fn memory_store_roundtrip() {
		let store = MemoryTokenStore::new();
		assert!(store.load("authToken").await.unwrap().is_none());

		store.save("authToken", &json!({"token": "t"})).await.unwrap();
		assert_eq!(store.load("authToken").await.unwrap(), Some(json!({"token": "t"})));

		store.delete("authToken").await.unwrap();
		assert!(store.load("authToken").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn file_store_keeps_other_keys() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("tokens.json");
		let store = FileTokenStore::new(&path);

		assert!(store.load("a").await.unwrap().is_none());
		assert!(!path.exists());

		store.save("a", &json!({"token": "1"})).await.unwrap();
		store.save("b", &json!({"token": "2"})).await.unwrap();
		store.delete("a").await.unwrap();

		let reopened = FileTokenStore::new(&path);
		assert!(reopened.load("a").await.unwrap().is_none());
		assert_eq!(reopened.load("b").await.unwrap(), Some(json!({"token": "2"})));

		let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(on_disk, json!({"b": {"token": "2"}}));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn file_store_is_private() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tokens.json");
		FileTokenStore::new(&path)
			.save("k", &json!("v"))
			.await
			.unwrap();
		let mode = std::fs::metadata(&path).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}

	#[tokio::test]
	async fn corrupt_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tokens.json");
		std::fs::write(&path, "[1, 2]").unwrap();
		let err = FileTokenStore::new(&path).load("k").await.unwrap_err();
		assert!(matches!(err, AuthError::Store(_)));
	}
}
