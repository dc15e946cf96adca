// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fan-out context that owns the active providers and broadcasts to them.
//!
//! Tracking calls never fail from the caller's point of view. Each callback
//! and provider call runs in isolation: an error or a panic in one is logged
//! with the provider name and the broadcast moves on to the next.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use formkit_analytics_core::{AnalyticsEvent, PageView, Properties, TimingEvent, UserProperties};
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{AnalyticsConfig, Callback};
use crate::error::Result;
use crate::platform::ScriptHost;
use crate::provider::AnalyticsProvider;
use crate::providers::{ProviderFactory, StandardProviders};

/// Tag used in logs for failures of the configured tracking callbacks.
const CALLBACK: &str = "callback";

#[derive(Debug, Clone, Default)]
struct Settings {
	config: AnalyticsConfig,
	enabled: bool,
	debug: bool,
}

struct ContextInner {
	settings: RwLock<Settings>,
	providers: RwLock<Vec<Box<dyn AnalyticsProvider>>>,
	factory: Arc<dyn ProviderFactory>,
	initializing: AtomicBool,
	initialized: AtomicBool,
	generation: AtomicU64,
	/// Bumped by every shutdown; a pass that sees it move discards its providers.
	shutdowns: AtomicU64,
}

/// Handle to the analytics fan-out. Cheap to clone; clones share providers.
#[derive(Clone)]
pub struct AnalyticsContext {
	inner: Arc<ContextInner>,
}

/// Builder for [`AnalyticsContext`].
pub struct AnalyticsContextBuilder {
	config: AnalyticsConfig,
	enabled: bool,
	debug: bool,
	factory: Option<Arc<dyn ProviderFactory>>,
	host: Option<Arc<ScriptHost>>,
}

impl AnalyticsContextBuilder {
	pub fn new() -> Self {
		Self {
			config: AnalyticsConfig::default(),
			enabled: true,
			debug: false,
			factory: None,
			host: None,
		}
	}

	pub fn config(mut self, config: AnalyticsConfig) -> Self {
		self.config = config;
		self
	}

	/// Defaults to enabled.
	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	/// Replaces the built-in adapters. Takes precedence over [`Self::script_host`].
	pub fn factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
		self.factory = Some(factory);
		self
	}

	/// Runs the built-in adapters against `host` instead of the shared page.
	pub fn script_host(mut self, host: Arc<ScriptHost>) -> Self {
		self.host = Some(host);
		self
	}

	pub fn build(self) -> AnalyticsContext {
		let factory = match (self.factory, self.host) {
			(Some(factory), _) => factory,
			(None, Some(host)) => Arc::new(StandardProviders::new(host)) as Arc<dyn ProviderFactory>,
			(None, None) => Arc::new(StandardProviders::shared()),
		};

		AnalyticsContext {
			inner: Arc::new(ContextInner {
				settings: RwLock::new(Settings {
					config: self.config,
					enabled: self.enabled,
					debug: self.debug,
				}),
				providers: RwLock::new(Vec::new()),
				factory,
				initializing: AtomicBool::new(false),
				initialized: AtomicBool::new(false),
				generation: AtomicU64::new(0),
				shutdowns: AtomicU64::new(0),
			}),
		}
	}
}

impl Default for AnalyticsContextBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl AnalyticsContext {
	/// Context over the built-in adapters on the shared script host.
	pub fn new(config: AnalyticsConfig, enabled: bool, debug: bool) -> Self {
		Self::builder()
			.config(config)
			.enabled(enabled)
			.debug(debug)
			.build()
	}

	pub fn builder() -> AnalyticsContextBuilder {
		AnalyticsContextBuilder::new()
	}

	/// Tears down any existing providers, then builds and initializes a fresh
	/// set from the current configuration.
	///
	/// Does nothing when analytics is disabled or a pass is already running.
	/// A provider that fails to initialize is logged and left out; the ones
	/// after it still initialize. If the configuration changes while a pass
	/// runs, another pass follows with the new configuration. A shutdown
	/// while a pass runs wins: the pass destroys what it built.
	#[instrument(name = "analytics.initialize", skip_all)]
	pub async fn initialize(&self) {
		loop {
			if !self.read_settings().enabled {
				return;
			}
			if self
				.inner
				.initializing
				.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
				.is_err()
			{
				debug!("analytics initialization already in flight");
				return;
			}

			let generation = self.inner.generation.load(Ordering::Acquire);
			let installed = self.run_initialization().await;
			self.inner.initializing.store(false, Ordering::Release);

			if !installed || self.inner.generation.load(Ordering::Acquire) == generation {
				return;
			}
		}
	}

	async fn run_initialization(&self) -> bool {
		let settings = self.read_settings().clone();
		let epoch = self.inner.shutdowns.load(Ordering::Acquire);

		self.teardown().await;
		if !settings.enabled {
			return false;
		}

		let init = settings.config.provider_init(settings.debug);
		let mut active = Vec::new();
		for mut provider in self.inner.factory.build(&settings.config) {
			let name = provider.name().to_string();
			let outcome = AssertUnwindSafe(provider.initialize(&init))
				.catch_unwind()
				.await;
			match outcome {
				Ok(Ok(())) => active.push(provider),
				Ok(Err(e)) => {
					error!(provider = %name, error = %e, "failed to initialize analytics provider")
				}
				Err(panic) => error!(
					provider = %name,
					panic = %panic_message(panic.as_ref()),
					"analytics provider panicked during initialization"
				),
			}
		}

		let names: Vec<String> = active.iter().map(|p| p.name().to_string()).collect();
		let discarded = {
			let mut slot = write(&self.inner.providers);
			if self.inner.shutdowns.load(Ordering::Acquire) == epoch {
				*slot = active;
				self.inner.initialized.store(true, Ordering::Release);
				None
			} else {
				Some(active)
			}
		};

		match discarded {
			None => {
				info!(providers = ?names, "analytics initialized");
				true
			}
			Some(providers) => {
				debug!(providers = ?names, "analytics shut down during initialization");
				destroy_all(providers).await;
				false
			}
		}
	}

	/// Applies new settings and re-runs initialization.
	pub async fn reconfigure(&self, config: AnalyticsConfig, enabled: bool, debug: bool) {
		{
			let mut settings = write(&self.inner.settings);
			*settings = Settings {
				config,
				enabled,
				debug,
			};
		}
		self.inner.generation.fetch_add(1, Ordering::AcqRel);

		if !enabled {
			self.shutdown().await;
			return;
		}
		self.initialize().await;
	}

	/// Destroys every active provider.
	pub async fn shutdown(&self) {
		self.inner.shutdowns.fetch_add(1, Ordering::AcqRel);
		self.teardown().await;
	}

	async fn teardown(&self) {
		let providers = {
			let mut slot = write(&self.inner.providers);
			self.inner.initialized.store(false, Ordering::Release);
			std::mem::take(&mut *slot)
		};
		destroy_all(providers).await;
	}

	/// True when analytics is enabled and an initialization pass has completed.
	pub fn is_enabled(&self) -> bool {
		self.read_settings().enabled && self.inner.initialized.load(Ordering::Acquire)
	}

	/// Names of the providers that initialized, in broadcast order.
	pub fn active_providers(&self) -> Vec<String> {
		read(&self.inner.providers)
			.iter()
			.map(|p| p.name().to_string())
			.collect()
	}

	pub fn session_id(&self) -> Option<String> {
		self.read_settings().config.session_id.clone()
	}

	pub fn user_id(&self) -> Option<String> {
		self.read_settings().config.user_id.clone()
	}

	pub fn track_event(&self, event: AnalyticsEvent) {
		let Some(settings) = self.active_settings() else {
			return;
		};
		let event = event.with_identity_defaults(
			settings.config.session_id.as_deref(),
			settings.config.user_id.as_deref(),
		);
		if settings.debug {
			debug!(action = %event.action, label = ?event.label, value = ?event.value, "track_event");
		}

		self.broadcast(
			"track_event",
			settings.config.callbacks.track_event.as_ref(),
			&event,
			|provider, event| provider.track_event(event),
		);
	}

	pub fn track_page_view(&self, view: PageView) {
		let Some(settings) = self.active_settings() else {
			return;
		};
		let mut view = view;
		if view.session_id.is_none() {
			view.session_id = settings.config.session_id.clone();
		}
		if settings.debug {
			debug!(path = %view.path, "track_page_view");
		}

		self.broadcast(
			"track_page_view",
			settings.config.callbacks.track_page_view.as_ref(),
			&view,
			|provider, view| provider.track_page_view(view),
		);
	}

	pub fn track_timing(&self, timing: TimingEvent) {
		let Some(settings) = self.active_settings() else {
			return;
		};
		if settings.debug {
			debug!(category = %timing.category, variable = %timing.variable, value_ms = timing.value_ms, "track_timing");
		}

		self.broadcast(
			"track_timing",
			settings.config.callbacks.track_timing.as_ref(),
			&timing,
			|provider, timing| provider.track_timing(timing),
		);
	}

	pub fn set_user_properties(&self, properties: UserProperties) {
		let Some(settings) = self.active_settings() else {
			return;
		};
		if settings.debug {
			debug!(count = properties.len(), "set_user_properties");
		}

		self.broadcast(
			"set_user_properties",
			settings.config.callbacks.set_user_properties.as_ref(),
			&properties,
			|provider, properties| provider.set_user_properties(properties),
		);
	}

	/// Forwards custom dimensions to the providers that support them.
	pub fn set_custom_dimensions(&self, dimensions: Properties) {
		if self.active_settings().is_none() {
			return;
		}
		self.broadcast("set_custom_dimensions", None, &dimensions, |provider, dimensions| {
			provider.set_custom_dimensions(dimensions)
		});
	}

	/// Runs the callback, then every provider in order, each in isolation.
	fn broadcast<T>(
		&self,
		operation: &'static str,
		callback: Option<&Callback<T>>,
		payload: &T,
		call: impl Fn(&dyn AnalyticsProvider, &T) -> Result<()>,
	) {
		if let Some(callback) = callback {
			isolate(CALLBACK, operation, || {
				callback(payload);
				Ok(())
			});
		}

		let providers = read(&self.inner.providers);
		for provider in providers.iter() {
			isolate(provider.name(), operation, || call(provider.as_ref(), payload));
		}
	}

	fn active_settings(&self) -> Option<Settings> {
		let settings = self.read_settings();
		if !settings.enabled || !self.inner.initialized.load(Ordering::Acquire) {
			return None;
		}
		Some(settings.clone())
	}

	fn read_settings(&self) -> RwLockReadGuard<'_, Settings> {
		read(&self.inner.settings)
	}
}

impl std::fmt::Debug for AnalyticsContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AnalyticsContext")
			.field("enabled", &self.read_settings().enabled)
			.field("initialized", &self.inner.initialized.load(Ordering::Relaxed))
			.field("providers", &self.active_providers())
			.finish()
	}
}

async fn destroy_all(providers: Vec<Box<dyn AnalyticsProvider>>) {
	for mut provider in providers {
		let name = provider.name().to_string();
		if AssertUnwindSafe(provider.destroy())
			.catch_unwind()
			.await
			.is_err()
		{
			warn!(provider = %name, "analytics provider panicked during destroy");
		}
	}
}

fn isolate(provider: &str, operation: &'static str, f: impl FnOnce() -> Result<()>) {
	match panic::catch_unwind(AssertUnwindSafe(f)) {
		Ok(Ok(())) => {}
		Ok(Err(e)) => error!(provider, operation, error = %e, "analytics provider call failed"),
		Err(panic) => error!(
			provider,
			operation,
			panic = %panic_message(panic.as_ref()),
			"analytics provider panicked"
		),
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
	lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
	lock.write().unwrap_or_else(PoisonError::into_inner)
}
