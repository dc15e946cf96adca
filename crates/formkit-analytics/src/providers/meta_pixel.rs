// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Meta (Facebook) Pixel adapter with optional Conversion API forwarding.

use std::sync::Arc;

use async_trait::async_trait;
use formkit_analytics_core::{
	now_millis, strip_nulls, AnalyticsEvent, MetaPixelConfig, PageView, SurveyAction, TimingEvent,
	UserProperties,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use super::{object, with_metadata};
use crate::error::{AnalyticsError, Result};
use crate::platform::{LoadPolicy, ScriptHost, FBQ};
use crate::provider::{AnalyticsProvider, ProviderInit, ProviderState};

const NAME: &str = "MetaPixel";

pub const META_SCRIPT_URL: &str = "https://connect.facebook.net/en_US/fbevents.js";

/// Graph API version the Conversion API calls are pinned to.
pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// One server-side event as the Conversion API expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionEvent {
	pub event_name: String,
	/// Unix seconds.
	pub event_time: i64,
	/// Shared with the browser pixel call so Meta can deduplicate the pair.
	pub event_id: String,
	pub user_data: ConversionUserData,
	pub custom_data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionUserData {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub external_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConversionRequest<'a> {
	data: [&'a ConversionEvent; 1],
	#[serde(skip_serializing_if = "Option::is_none")]
	test_event_code: Option<&'a str>,
}

/// Client for `POST {graph}/{pixel_id}/events`.
#[derive(Debug, Clone)]
pub struct ConversionApi {
	client: reqwest::Client,
	endpoint: String,
	access_token: String,
	test_event_code: Option<String>,
}

impl ConversionApi {
	pub fn new(
		client: reqwest::Client,
		graph_base_url: &str,
		pixel_id: &str,
		access_token: impl Into<String>,
	) -> Self {
		Self {
			client,
			endpoint: format!("{}/{}/events", graph_base_url.trim_end_matches('/'), pixel_id),
			access_token: access_token.into(),
			test_event_code: None,
		}
	}

	pub fn with_test_event_code(mut self, code: Option<String>) -> Self {
		self.test_event_code = code;
		self
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	#[instrument(name = "meta.conversion_api.send", skip_all, fields(event_name = %event.event_name, event_id = %event.event_id))]
	pub async fn send(&self, event: &ConversionEvent) -> Result<()> {
		let request = ConversionRequest {
			data: [event],
			test_event_code: self.test_event_code.as_deref(),
		};

		let response = self
			.client
			.post(&self.endpoint)
			.query(&[("access_token", self.access_token.as_str())])
			.json(&request)
			.send()
			.await?;

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			return Err(AnalyticsError::ServerError { status, message });
		}

		debug!("conversion event accepted");
		Ok(())
	}
}

/// Meta standard events for the survey actions that have one.
fn standard_event(action: SurveyAction) -> Option<&'static str> {
	match action {
		SurveyAction::SurveyComplete => Some("CompleteRegistration"),
		SurveyAction::SubmitSuccess => Some("Lead"),
		SurveyAction::PageView => Some("ViewContent"),
		_ => None,
	}
}

pub struct MetaPixelProvider {
	config: MetaPixelConfig,
	host: Arc<ScriptHost>,
	conversions: Option<Arc<ConversionApi>>,
	state: ProviderState,
	session_id: Option<String>,
	user_id: Option<String>,
	debug: bool,
}

impl MetaPixelProvider {
	pub fn new(config: MetaPixelConfig, host: Arc<ScriptHost>) -> Self {
		let debug = config.debug;
		Self {
			config,
			host,
			conversions: None,
			state: ProviderState::Uninitialized,
			session_id: None,
			user_id: None,
			debug,
		}
	}

	/// Enables Conversion API forwarding when the config carries an access token.
	pub fn with_conversion_client(mut self, client: reqwest::Client, graph_base_url: &str) -> Self {
		self.conversions = self
			.config
			.access_token
			.as_ref()
			.filter(|t| !t.is_empty())
			.map(|token| {
				Arc::new(
					ConversionApi::new(client, graph_base_url, &self.config.pixel_id, token.clone())
						.with_test_event_code(self.config.test_event_code.clone()),
				)
			});
		self
	}

	pub fn state(&self) -> ProviderState {
		self.state
	}

	pub fn forwards_server_side(&self) -> bool {
		self.conversions.is_some()
	}

	fn fbq(&self, args: Value) {
		if self.debug {
			debug!(provider = NAME, command = %args, "fbq");
		}
		self.host.push(FBQ, args);
	}

	fn ensure_ready(&self) -> Result<()> {
		if self.state != ProviderState::Initialized {
			return Err(AnalyticsError::NotInitialized {
				provider: NAME.to_string(),
			});
		}
		Ok(())
	}

	/// Deduplication id shared by the pixel call and the server-side event.
	fn event_id(&self, session_id: Option<&str>, timestamp_ms: i64) -> String {
		let session = session_id
			.or(self.session_id.as_deref())
			.unwrap_or("anonymous");
		format!("{session}_{timestamp_ms}")
	}

	fn forward(&self, event: ConversionEvent) {
		let Some(api) = self.conversions.clone() else {
			return;
		};

		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move {
					if let Err(e) = api.send(&event).await {
						error!(provider = NAME, error = %e, "conversion API request failed");
					}
				});
			}
			Err(_) => warn!(provider = NAME, "no async runtime, conversion event dropped"),
		}
	}

	fn conversion_event(
		&self,
		event_name: &str,
		event_id: String,
		timestamp_ms: i64,
		user_id: Option<&str>,
		custom_data: Map<String, Value>,
	) -> ConversionEvent {
		ConversionEvent {
			event_name: event_name.to_string(),
			event_time: timestamp_ms / 1000,
			event_id,
			user_data: ConversionUserData {
				external_id: user_id
					.or(self.user_id.as_deref())
					.map(str::to_string),
			},
			custom_data,
		}
	}
}

#[async_trait]
impl AnalyticsProvider for MetaPixelProvider {
	fn name(&self) -> &str {
		NAME
	}

	async fn initialize(&mut self, init: &ProviderInit) -> Result<()> {
		if self.config.pixel_id.trim().is_empty() {
			self.state = ProviderState::Failed;
			return Err(AnalyticsError::InvalidConfig("meta.pixelId is empty".to_string()));
		}

		self.state = ProviderState::Initializing;
		self.session_id = init.session_id.clone();
		self.user_id = init.user_id.clone();
		self.debug = self.config.debug || init.debug;

		self.host.ensure_global(FBQ);
		if let Err(e) = self.host.ensure_script(META_SCRIPT_URL, LoadPolicy::STRICT).await {
			self.state = ProviderState::Failed;
			return Err(e);
		}

		let advanced_matching = strip_nulls(object(json!({ "external_id": self.user_id })));
		self.fbq(json!(["init", self.config.pixel_id, advanced_matching]));
		self.fbq(json!(["track", "PageView"]));

		self.state = ProviderState::Initialized;
		info!(
			provider = NAME,
			pixel_id = %self.config.pixel_id,
			server_side = self.forwards_server_side(),
			"analytics provider ready"
		);
		Ok(())
	}

	fn track_event(&self, event: &AnalyticsEvent) -> Result<()> {
		self.ensure_ready()?;

		let timestamp = event.timestamp.unwrap_or_else(now_millis);
		let event_id = self.event_id(event.session_id.as_deref(), timestamp);
		let custom_data = with_metadata(
			object(json!({
				"category": event.category(),
				"action": event.action.as_str(),
				"label": event.label,
				"value": event.value,
				"survey_id": event.survey_id,
			})),
			&event.metadata,
		);

		let event_name = match standard_event(event.action) {
			Some(name) => {
				self.fbq(json!(["track", name, custom_data, {"eventID": event_id}]));
				name
			}
			None => {
				self.fbq(json!(["trackCustom", event.action.as_str(), custom_data, {"eventID": event_id}]));
				event.action.as_str()
			}
		};

		self.forward(self.conversion_event(
			event_name,
			event_id,
			timestamp,
			event.user_id.as_deref(),
			custom_data,
		));
		Ok(())
	}

	fn track_page_view(&self, view: &PageView) -> Result<()> {
		self.ensure_ready()?;

		let timestamp = now_millis();
		let event_id = self.event_id(view.session_id.as_deref(), timestamp);
		let custom_data = with_metadata(
			object(json!({
				"page_path": view.path,
				"page_title": view.title,
				"survey_id": view.survey_id,
			})),
			&view.metadata,
		);
		self.fbq(json!(["track", "PageView", custom_data, {"eventID": event_id}]));
		self.forward(self.conversion_event("PageView", event_id, timestamp, None, custom_data));
		Ok(())
	}

	fn track_timing(&self, timing: &TimingEvent) -> Result<()> {
		self.ensure_ready()?;
		let custom_data = strip_nulls(object(json!({
			"timing_category": timing.category,
			"timing_variable": timing.variable,
			"value": timing.value_ms,
			"label": timing.label,
		})));
		self.fbq(json!(["trackCustom", "SurveyTiming", custom_data]));
		Ok(())
	}

	fn set_user_properties(&self, properties: &UserProperties) -> Result<()> {
		self.ensure_ready()?;
		self.fbq(json!([
			"setUserProperties",
			self.config.pixel_id,
			properties.clone().stripped()
		]));
		Ok(())
	}

	fn is_initialized(&self) -> bool {
		self.state == ProviderState::Initialized
	}

	async fn destroy(&mut self) {
		self.state = ProviderState::Uninitialized;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::testing::{host, FakeMode};
	use std::time::Duration;
	use wiremock::matchers::{body_partial_json, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	async fn ready(host: Arc<ScriptHost>, config: MetaPixelConfig, graph: &str) -> MetaPixelProvider {
		let mut provider = MetaPixelProvider::new(config, host)
			.with_conversion_client(reqwest::Client::new(), graph);
		provider
			.initialize(&ProviderInit {
				session_id: Some("sess".to_string()),
				user_id: Some("u1".to_string()),
				debug: false,
			})
			.await
			.unwrap();
		provider
	}

	#[tokio::test]
	async fn initialize_queues_init_and_page_view() {
		let (host, _) = host(FakeMode::Ok);
		let provider = ready(host.clone(), MetaPixelConfig::new("123"), GRAPH_API_BASE).await;

		assert!(!provider.forwards_server_side());
		let queue = host.snapshot(FBQ);
		assert_eq!(queue[0], json!(["init", "123", {"external_id": "u1"}]));
		assert_eq!(queue[1], json!(["track", "PageView"]));
	}

	#[tokio::test]
	async fn standard_and_custom_events() {
		let (host, _) = host(FakeMode::Ok);
		let provider = ready(host.clone(), MetaPixelConfig::new("123"), GRAPH_API_BASE).await;
		host.drain(FBQ);

		provider
			.track_event(&AnalyticsEvent::new(SurveyAction::SurveyComplete).with_timestamp(1_700_000_000_000))
			.unwrap();
		provider
			.track_event(&AnalyticsEvent::new(SurveyAction::FieldFocus).with_label("email"))
			.unwrap();

		let queue = host.snapshot(FBQ);
		assert_eq!(queue[0][0], "track");
		assert_eq!(queue[0][1], "CompleteRegistration");
		assert_eq!(queue[0][3]["eventID"], "sess_1700000000000");
		assert_eq!(queue[1][0], "trackCustom");
		assert_eq!(queue[1][1], "field_focus");
		assert_eq!(queue[1][2]["label"], "email");
		assert!(queue[1][2].get("value").is_none());
	}

	#[tokio::test]
	async fn conversion_api_posts_expected_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/123/events"))
			.and(query_param("access_token", "secret"))
			.and(body_partial_json(json!({
				"data": [{
					"event_name": "Lead",
					"event_time": 1_700_000_000,
					"event_id": "sess_1700000000000",
					"user_data": {"external_id": "u1"}
				}],
				"test_event_code": "TEST42"
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"events_received": 1})))
			.expect(1)
			.mount(&server)
			.await;

		let api = ConversionApi::new(reqwest::Client::new(), &server.uri(), "123", "secret")
			.with_test_event_code(Some("TEST42".to_string()));
		let event = ConversionEvent {
			event_name: "Lead".to_string(),
			event_time: 1_700_000_000,
			event_id: "sess_1700000000000".to_string(),
			user_data: ConversionUserData {
				external_id: Some("u1".to_string()),
			},
			custom_data: Map::new(),
		};
		api.send(&event).await.unwrap();
	}

	#[tokio::test]
	async fn conversion_api_surfaces_server_errors() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(400).set_body_string("bad pixel"))
			.mount(&server)
			.await;

		let api = ConversionApi::new(reqwest::Client::new(), &server.uri(), "123", "secret");
		let event = ConversionEvent {
			event_name: "PageView".to_string(),
			event_time: 1,
			event_id: "a_1".to_string(),
			user_data: ConversionUserData { external_id: None },
			custom_data: Map::new(),
		};
		let err = api.send(&event).await.unwrap_err();
		assert!(matches!(err, AnalyticsError::ServerError { status: 400, ref message } if message == "bad pixel"));
	}

	#[tokio::test]
	async fn track_event_forwards_server_side_when_token_set() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/123/events"))
			.respond_with(ResponseTemplate::new(200))
			.mount(&server)
			.await;

		let (host, _) = host(FakeMode::Ok);
		let mut config = MetaPixelConfig::new("123");
		config.access_token = Some("secret".to_string());
		let provider = ready(host, config, &server.uri()).await;
		assert!(provider.forwards_server_side());

		provider
			.track_event(&AnalyticsEvent::new(SurveyAction::SubmitSuccess).with_timestamp(5_000))
			.unwrap();

		let mut received = Vec::new();
		for _ in 0..100 {
			received = server.received_requests().await.unwrap_or_default();
			if !received.is_empty() {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		assert_eq!(received.len(), 1);
		let body: Value = serde_json::from_slice(&received[0].body).unwrap();
		assert_eq!(body["data"][0]["event_name"], "Lead");
		assert_eq!(body["data"][0]["event_id"], "sess_5000");
		assert_eq!(body["data"][0]["event_time"], 5);
		assert!(body.get("test_event_code").is_none());
	}

	#[test]
	fn event_id_falls_back_to_anonymous() {
		let (host, _) = host(FakeMode::Ok);
		let provider = MetaPixelProvider::new(MetaPixelConfig::new("1"), host);
		assert_eq!(provider.event_id(None, 42), "anonymous_42");
		assert_eq!(provider.event_id(Some("s"), 42), "s_42");
	}
}
