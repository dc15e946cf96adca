// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page-level script and global slots shared by provider adapters.
//!
//! Tag platforms assume a single page with process-wide state: one copy of
//! each vendor script and one `dataLayer` / `gtag` / `fbq` global. The
//! [`ScriptHost`] models that page. Each script source is loaded at most once
//! (concurrent callers wait on the same load) and each global is created on
//! first use, so adapters never inject a duplicate script or reset a queue
//! another adapter already uses.
//!
//! [`ScriptHost::shared`] returns the process-wide instance. Tests and
//! embedders that need isolation construct their own with [`ScriptHost::new`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::error::{AnalyticsError, Result};

/// Global holding the gtag/GTM command queue.
pub const DATA_LAYER: &str = "dataLayer";
/// Marker global for the gtag function.
pub const GTAG: &str = "gtag";
/// Meta Pixel command queue.
pub const FBQ: &str = "fbq";

/// Strict timeout for vendor script loads.
pub const SCRIPT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);
/// Soft timeout for the alternate Google Analytics loader.
pub const SOFT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a script and what to do when the wait runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
	/// Fail with [`AnalyticsError::ScriptTimeout`] after the duration.
	Strict(Duration),
	/// Stop waiting after the duration and report success anyway.
	Soft(Duration),
}

impl LoadPolicy {
	pub const STRICT: LoadPolicy = LoadPolicy::Strict(SCRIPT_LOAD_TIMEOUT);
	pub const SOFT: LoadPolicy = LoadPolicy::Soft(SOFT_LOAD_TIMEOUT);
}

/// Fetches an external script.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
	async fn load(&self, src: &str) -> Result<()>;
}

/// Loads scripts over HTTP; a 2xx response counts as loaded.
#[derive(Debug, Clone)]
pub struct HttpScriptLoader {
	client: reqwest::Client,
}

impl HttpScriptLoader {
	pub fn new() -> Self {
		Self::with_client(formkit_common_http::new_client())
	}

	pub fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}
}

impl Default for HttpScriptLoader {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ScriptLoader for HttpScriptLoader {
	async fn load(&self, src: &str) -> Result<()> {
		let response = self.client.get(src).send().await?;
		if !response.status().is_success() {
			return Err(AnalyticsError::ScriptLoadFailed {
				src: src.to_string(),
				status: response.status().as_u16(),
			});
		}
		Ok(())
	}
}

static SHARED: OnceLock<Arc<ScriptHost>> = OnceLock::new();

/// The page that analytics scripts and globals live on.
pub struct ScriptHost {
	loader: Arc<dyn ScriptLoader>,
	scripts: Mutex<HashMap<String, Arc<OnceCell<()>>>>,
	globals: Mutex<HashMap<String, Vec<Value>>>,
}

impl ScriptHost {
	/// Creates an isolated host that loads scripts with `loader`.
	pub fn new(loader: Arc<dyn ScriptLoader>) -> Self {
		Self {
			loader,
			scripts: Mutex::new(HashMap::new()),
			globals: Mutex::new(HashMap::new()),
		}
	}

	/// Returns the process-wide host, creating it with an HTTP loader on first use.
	pub fn shared() -> Arc<ScriptHost> {
		SHARED
			.get_or_init(|| Arc::new(ScriptHost::new(Arc::new(HttpScriptLoader::new()))))
			.clone()
	}

	/// Returns true once `src` has loaded successfully.
	pub fn is_script_loaded(&self, src: &str) -> bool {
		lock(&self.scripts)
			.get(src)
			.is_some_and(|cell| cell.initialized())
	}

	/// Loads `src` unless it is already present on the page.
	///
	/// Concurrent callers for the same source share one load. A failed load
	/// leaves the slot empty so a later call can try again.
	#[instrument(name = "script_host.ensure_script", skip(self, src), fields(src = %src))]
	pub async fn ensure_script(&self, src: &str, policy: LoadPolicy) -> Result<()> {
		let cell = {
			let mut scripts = lock(&self.scripts);
			scripts.entry(src.to_string()).or_default().clone()
		};

		if cell.initialized() {
			debug!("script already present");
			return Ok(());
		}

		let load = cell.get_or_try_init(|| self.loader.load(src));
		match policy {
			LoadPolicy::Strict(timeout) => match tokio::time::timeout(timeout, load).await {
				Ok(result) => result.map(|_| ()),
				Err(_) => Err(AnalyticsError::ScriptTimeout {
					src: src.to_string(),
					timeout,
				}),
			},
			LoadPolicy::Soft(timeout) => match tokio::time::timeout(timeout, load).await {
				Ok(result) => result.map(|_| ()),
				Err(_) => {
					warn!(timeout_ms = timeout.as_millis() as u64, "script load still pending, continuing");
					Ok(())
				}
			},
		}
	}

	/// Creates the global `name` if it does not exist yet.
	///
	/// Returns true when this call created it.
	pub fn ensure_global(&self, name: &str) -> bool {
		let mut globals = lock(&self.globals);
		if globals.contains_key(name) {
			return false;
		}
		globals.insert(name.to_string(), Vec::new());
		true
	}

	pub fn has_global(&self, name: &str) -> bool {
		lock(&self.globals).contains_key(name)
	}

	/// Appends a command to the queue behind global `name`, creating it if needed.
	pub fn push(&self, name: &str, value: Value) {
		lock(&self.globals)
			.entry(name.to_string())
			.or_default()
			.push(value);
	}

	/// Returns a copy of the queue behind `name`.
	pub fn snapshot(&self, name: &str) -> Vec<Value> {
		lock(&self.globals).get(name).cloned().unwrap_or_default()
	}

	/// Takes every queued command out of `name`, leaving the global in place.
	pub fn drain(&self, name: &str) -> Vec<Value> {
		lock(&self.globals)
			.get_mut(name)
			.map(std::mem::take)
			.unwrap_or_default()
	}
}

impl std::fmt::Debug for ScriptHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScriptHost")
			.field("scripts", &lock(&self.scripts).len())
			.field("globals", &lock(&self.globals).keys().collect::<Vec<_>>())
			.finish()
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod testing {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	/// Loader that succeeds instantly, fails, or never finishes, and counts calls.
	pub struct FakeLoader {
		pub mode: FakeMode,
		pub calls: AtomicUsize,
	}

	#[derive(Clone, Copy)]
	pub enum FakeMode {
		Ok,
		Fail,
		Hang,
	}

	impl FakeLoader {
		pub fn new(mode: FakeMode) -> Arc<Self> {
			Arc::new(Self {
				mode,
				calls: AtomicUsize::new(0),
			})
		}

		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl ScriptLoader for FakeLoader {
		async fn load(&self, src: &str) -> Result<()> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			match self.mode {
				FakeMode::Ok => Ok(()),
				FakeMode::Fail => Err(AnalyticsError::ScriptLoadFailed {
					src: src.to_string(),
					status: 404,
				}),
				FakeMode::Hang => {
					futures::future::pending::<()>().await;
					Ok(())
				}
			}
		}
	}

	pub fn host(mode: FakeMode) -> (Arc<ScriptHost>, Arc<FakeLoader>) {
		let loader = FakeLoader::new(mode);
		(Arc::new(ScriptHost::new(loader.clone())), loader)
	}
}

#[cfg(test)]
mod tests {
	use super::testing::*;
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[tokio::test]
	async fn ensure_script_loads_once() {
		let (host, loader) = host(FakeMode::Ok);

		host.ensure_script("https://cdn/a.js", LoadPolicy::STRICT).await.unwrap();
		host.ensure_script("https://cdn/a.js", LoadPolicy::STRICT).await.unwrap();

		assert_eq!(loader.calls(), 1);
		assert!(host.is_script_loaded("https://cdn/a.js"));
	}

	#[tokio::test]
	async fn concurrent_loads_share_one_fetch() {
		let (host, loader) = host(FakeMode::Ok);

		let (a, b) = tokio::join!(
			host.ensure_script("https://cdn/a.js", LoadPolicy::STRICT),
			host.ensure_script("https://cdn/a.js", LoadPolicy::STRICT),
		);
		a.unwrap();
		b.unwrap();
		assert_eq!(loader.calls(), 1);
	}

	#[tokio::test]
	async fn failed_load_can_be_retried() {
		let (host, loader) = host(FakeMode::Fail);

		assert!(host.ensure_script("https://cdn/a.js", LoadPolicy::STRICT).await.is_err());
		assert!(host.ensure_script("https://cdn/a.js", LoadPolicy::STRICT).await.is_err());
		assert_eq!(loader.calls(), 2);
		assert!(!host.is_script_loaded("https://cdn/a.js"));
	}

	#[tokio::test(start_paused = true)]
	async fn strict_policy_times_out() {
		let (host, _loader) = host(FakeMode::Hang);

		let err = host
			.ensure_script("https://cdn/slow.js", LoadPolicy::STRICT)
			.await
			.unwrap_err();
		match err {
			AnalyticsError::ScriptTimeout { timeout, .. } => assert_eq!(timeout, SCRIPT_LOAD_TIMEOUT),
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn soft_policy_resolves_after_timeout() {
		let (host, _loader) = host(FakeMode::Hang);

		host.ensure_script("https://cdn/slow.js", LoadPolicy::SOFT).await.unwrap();
		assert!(!host.is_script_loaded("https://cdn/slow.js"));
	}

	#[test]
	fn ensure_global_is_idempotent() {
		let (host, _) = host(FakeMode::Ok);

		assert!(host.ensure_global(DATA_LAYER));
		host.push(DATA_LAYER, json!({"event": "x"}));
		assert!(!host.ensure_global(DATA_LAYER));
		assert_eq!(host.snapshot(DATA_LAYER).len(), 1);
	}

	#[test]
	fn drain_empties_queue_but_keeps_global() {
		let (host, _) = host(FakeMode::Ok);

		host.push(FBQ, json!(["init", "1"]));
		host.push(FBQ, json!(["track", "PageView"]));
		assert_eq!(host.drain(FBQ).len(), 2);
		assert!(host.has_global(FBQ));
		assert!(host.drain(FBQ).is_empty());
	}

	#[test]
	fn shared_host_is_a_singleton() {
		assert!(Arc::ptr_eq(&ScriptHost::shared(), &ScriptHost::shared()));
	}

	#[tokio::test]
	async fn http_loader_accepts_success() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/gtag/js"))
			.respond_with(ResponseTemplate::new(200).set_body_string("// gtag"))
			.mount(&server)
			.await;

		let loader = HttpScriptLoader::new();
		loader.load(&format!("{}/gtag/js", server.uri())).await.unwrap();
	}

	#[tokio::test]
	async fn http_loader_rejects_error_status() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let loader = HttpScriptLoader::new();
		let err = loader
			.load(&format!("{}/missing.js", server.uri()))
			.await
			.unwrap_err();
		assert!(matches!(err, AnalyticsError::ScriptLoadFailed { status: 404, .. }));
	}
}
