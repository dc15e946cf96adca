// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The auth block engine: drives the step machine, talks to the endpoints
//! and hands the result to the survey.
//!
//! At most one request is outstanding per flow; a second `submit` while one
//! is running returns [`AuthError::Busy`] without touching state. After
//! [`AuthFlow::unmount`] every pending request and delay is abandoned and
//! nothing further reaches the state, the store or the host.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::api::AuthApi;
use crate::config::{AuthBlockConfig, Endpoint};
use crate::error::{AuthError, Result};
use crate::field_mapping::apply_field_mappings;
use crate::host::{is_back_navigation, SurveyHost};
use crate::request::{build_body, identity_fields, send_otp_body, verify_otp_body, OtpChannel};
use crate::step::{
	check_required, check_step, first_otp_step, initial_step, next_step, previous_step, AuthStep,
	FieldInputs, InputField, StepTarget,
};
use crate::store::{stored_token, MemoryTokenStore, TokenStore};

/// Delays before the survey is advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimings {
	/// After a successful sign-in, so the confirmation is visible.
	pub advance_delay: Duration,
	/// Before skipping a block for an already signed-in user.
	pub skip_delay: Duration,
}

impl Default for FlowTimings {
	fn default() -> Self {
		Self {
			advance_delay: Duration::from_millis(1000),
			skip_delay: Duration::from_millis(200),
		}
	}
}

impl FlowTimings {
	pub fn immediate() -> Self {
		Self {
			advance_delay: Duration::ZERO,
			skip_delay: Duration::ZERO,
		}
	}
}

/// Which OTP channels have had a code sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OtpSent {
	pub email: bool,
	pub mobile: bool,
}

/// Snapshot of what the block shows.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
	pub step: AuthStep,
	pub inputs: FieldInputs,
	pub loading: bool,
	pub error: Option<String>,
	pub success: Option<String>,
	pub otp_sent: OtpSent,
	pub is_back_navigation: bool,
	/// The result has been handed to the survey.
	pub completed: bool,
}

impl AuthState {
	fn new(step: AuthStep) -> Self {
		Self {
			step,
			inputs: FieldInputs::default(),
			loading: false,
			error: None,
			success: None,
			otp_sent: OtpSent::default(),
			is_back_navigation: false,
			completed: false,
		}
	}
}

/// A token found in the store at mount.
#[derive(Debug, Clone)]
struct Session {
	token: String,
	stored: Value,
	validated: Option<Value>,
}

pub struct AuthFlowBuilder {
	config: AuthBlockConfig,
	host: Arc<dyn SurveyHost>,
	store: Option<Arc<dyn TokenStore>>,
	timings: FlowTimings,
	client: Option<Client>,
}

impl AuthFlowBuilder {
	/// Defaults to an in-memory store.
	pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
		self.store = Some(store);
		self
	}

	pub fn timings(mut self, timings: FlowTimings) -> Self {
		self.timings = timings;
		self
	}

	pub fn http_client(mut self, client: Client) -> Self {
		self.client = Some(client);
		self
	}

	/// Fails if the configuration does not pass [`AuthBlockConfig::validate`].
	pub fn build(self) -> Result<AuthFlow> {
		let config = self.config.validated()?;
		let api = match self.client {
			Some(client) => AuthApi::with_client(client, &config)?,
			None => AuthApi::new(&config)?,
		};
		let step = initial_step(&config);

		Ok(AuthFlow {
			api,
			store: self
				.store
				.unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
			host: self.host,
			timings: self.timings,
			state: Mutex::new(AuthState::new(step)),
			session: Mutex::new(None),
			in_flight: AtomicBool::new(false),
			mounted: AtomicBool::new(false),
			cancel: CancellationToken::new(),
			config,
		})
	}
}

pub struct AuthFlow {
	config: AuthBlockConfig,
	api: AuthApi,
	store: Arc<dyn TokenStore>,
	host: Arc<dyn SurveyHost>,
	timings: FlowTimings,
	state: Mutex<AuthState>,
	session: Mutex<Option<Session>>,
	in_flight: AtomicBool,
	mounted: AtomicBool,
	cancel: CancellationToken,
}

/// Marks a request as outstanding until dropped.
struct InFlight<'a> {
	flow: &'a AuthFlow,
}

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		if !self.flow.cancel.is_cancelled() {
			self.flow.lock().loading = false;
		}
		self.flow.in_flight.store(false, Ordering::Release);
	}
}

impl AuthFlow {
	pub fn builder(config: AuthBlockConfig, host: Arc<dyn SurveyHost>) -> AuthFlowBuilder {
		AuthFlowBuilder {
			config,
			host,
			store: None,
			timings: FlowTimings::default(),
			client: None,
		}
	}

	pub fn config(&self) -> &AuthBlockConfig {
		&self.config
	}

	pub fn state(&self) -> AuthState {
		self.lock().clone()
	}

	/// Resolves where the block starts. Runs once; later calls return the
	/// current step.
	#[instrument(name = "auth.mount", skip_all)]
	pub async fn mount(&self) -> Result<AuthStep> {
		self.ensure_live()?;
		if self.mounted.swap(true, Ordering::AcqRel) {
			return Ok(self.lock().step);
		}

		let back = is_back_navigation(&self.host.navigation_history());
		self.lock().is_back_navigation = back;

		let stored = match self.store.load(&self.config.token_storage_key).await {
			Ok(stored) => stored,
			Err(e) => {
				warn!(error = %e, "could not read stored auth token");
				None
			}
		};
		self.ensure_live()?;

		let Some(mut session) = stored.and_then(|stored| {
			stored_token(&stored, &self.config.token_field).map(|token| Session {
				token,
				stored,
				validated: None,
			})
		}) else {
			return Ok(self.restart());
		};

		let auto_advance = self.config.skip_if_logged_in && !back;

		if let Some(url) = self.config.endpoint(Endpoint::ValidateToken) {
			let validated = {
				let _guard = self.begin()?;
				self.call(self.api.validate_token(url, &self.config, &session.token))
					.await
			};
			match validated {
				Ok(response) => session.validated = Some(response),
				Err(AuthError::Cancelled) => return Err(AuthError::Cancelled),
				Err(e) => {
					debug!(error = %e, "stored auth token rejected");
					self.forget_token().await;
					return Ok(self.restart());
				}
			}
		}

		*lock(&self.session) = Some(session.clone());
		if auto_advance {
			self.skip(&session).await
		} else {
			self.lock().step = AuthStep::Welcome;
			Ok(AuthStep::Welcome)
		}
	}

	pub fn set_input(&self, field: InputField, value: impl Into<String>) {
		let mut state = self.lock();
		state.inputs.set(field, value);
		state.error = None;
	}

	/// Moves forward from the current step, calling endpoints when the step
	/// requires it. Problems are also written to the state's `error`.
	#[instrument(name = "auth.submit", skip_all)]
	pub async fn submit(&self) -> Result<AuthStep> {
		let _guard = self.begin()?;
		let result = self.advance().await;
		self.settle(result)
	}

	/// Goes back one step. Leaving an OTP step discards typed codes and the
	/// record of sent codes.
	pub fn back(&self) -> Result<AuthStep> {
		self.ensure_live()?;
		// Checked under the state lock so a request that starts now sees the new step.
		let mut state = self.lock();
		if self.in_flight.load(Ordering::Acquire) {
			return Err(AuthError::Busy);
		}
		let Some(previous) = previous_step(state.step, &self.config) else {
			return Ok(state.step);
		};
		if state.step.is_otp() {
			state.inputs.clear_otp();
			state.otp_sent = OtpSent::default();
		}
		state.step = previous;
		state.error = None;
		state.success = None;
		Ok(previous)
	}

	/// From the welcome step, continues the survey with the stored session.
	pub async fn continue_session(&self) -> Result<AuthStep> {
		let _guard = self.begin()?;
		let result = self.proceed_with_session().await;
		self.settle(result)
	}

	/// Forgets the stored token and starts again from the first step.
	pub async fn sign_in_as_different_user(&self) -> Result<AuthStep> {
		let _guard = self.begin()?;
		*lock(&self.session) = None;
		self.forget_token().await;
		self.ensure_live()?;
		Ok(self.restart())
	}

	/// Sends the code for the current OTP step again.
	pub async fn resend_otp(&self) -> Result<AuthStep> {
		let _guard = self.begin()?;
		let (step, inputs) = self.snapshot();
		let result = match step {
			AuthStep::EmailOtp => self.send_otp(OtpChannel::Email, &inputs).await,
			AuthStep::PhoneOtp => self.send_otp(OtpChannel::Mobile, &inputs).await,
			other => Err(AuthError::WrongStep(other)),
		};
		self.settle(result)
	}

	/// Abandons pending requests and delays. The flow is unusable afterwards.
	pub fn unmount(&self) {
		self.cancel.cancel();
		debug!("auth flow unmounted");
	}

	pub fn is_mounted(&self) -> bool {
		!self.cancel.is_cancelled()
	}

	async fn advance(&self) -> Result<AuthStep> {
		let (step, inputs) = self.snapshot();
		if self.lock().completed {
			return Ok(step);
		}
		check_step(step, &inputs, &self.config)?;

		match step {
			AuthStep::Welcome => self.proceed_with_session().await,
			AuthStep::Skipped => Ok(step),
			AuthStep::EmailOtp => self.verify_otp(OtpChannel::Email, &inputs).await,
			AuthStep::PhoneOtp => self.verify_otp(OtpChannel::Mobile, &inputs).await,
			_ => match next_step(step, &self.config) {
				StepTarget::Step(next) => {
					self.lock().step = next;
					Ok(next)
				}
				StepTarget::BeginAuth => self.begin_auth(&inputs).await,
				StepTarget::Submit => self.authenticate(&inputs).await,
			},
		}
	}

	async fn begin_auth(&self, inputs: &FieldInputs) -> Result<AuthStep> {
		check_required(inputs, &self.config)?;
		if !self.config.use_otp {
			return self.authenticate(inputs).await;
		}
		match first_otp_step(&self.config) {
			AuthStep::PhoneOtp => self.send_otp(OtpChannel::Mobile, inputs).await,
			_ => self.send_otp(OtpChannel::Email, inputs).await,
		}
	}

	async fn authenticate(&self, inputs: &FieldInputs) -> Result<AuthStep> {
		check_required(inputs, &self.config)?;
		let (endpoint, url) = self.config.auth_endpoint()?;
		debug!(endpoint = %endpoint, "authenticating");
		let response = self
			.call(self.api.post(url, &build_body(&self.config, inputs)))
			.await?;
		self.complete(inputs, response).await
	}

	async fn send_otp(&self, channel: OtpChannel, inputs: &FieldInputs) -> Result<AuthStep> {
		check_required(inputs, &self.config)?;
		let (endpoint, step, destination) = match channel {
			OtpChannel::Email => (Endpoint::SendEmailOtp, AuthStep::EmailOtp, inputs.email.trim()),
			OtpChannel::Mobile => (Endpoint::SendMobileOtp, AuthStep::PhoneOtp, inputs.mobile.trim()),
		};
		let url = self.config.require_endpoint(endpoint)?;
		self.call(self.api.post(url, &send_otp_body(&self.config, inputs, channel)))
			.await?;

		info!(channel = channel.field(), "verification code sent");
		let mut state = self.lock();
		state.step = step;
		match channel {
			OtpChannel::Email => state.otp_sent.email = true,
			OtpChannel::Mobile => state.otp_sent.mobile = true,
		}
		state.success = Some(format!("Verification code sent to {destination}"));
		Ok(step)
	}

	async fn verify_otp(&self, channel: OtpChannel, inputs: &FieldInputs) -> Result<AuthStep> {
		check_required(inputs, &self.config)?;
		let (endpoint, step) = match channel {
			OtpChannel::Email => (Endpoint::VerifyEmailOtp, AuthStep::EmailOtp),
			OtpChannel::Mobile => (Endpoint::VerifyMobileOtp, AuthStep::PhoneOtp),
		};
		let url = self.config.require_endpoint(endpoint)?;
		let response = self
			.call(self.api.post(url, &verify_otp_body(&self.config, inputs, channel)))
			.await?;

		match next_step(step, &self.config) {
			StepTarget::Step(_) => self.send_otp(OtpChannel::Mobile, inputs).await,
			_ => self.complete(inputs, response).await,
		}
	}

	/// Persists the response, hands the result to the survey and advances.
	async fn complete(&self, inputs: &FieldInputs, response: Value) -> Result<AuthStep> {
		let token = stored_token(&response, &self.config.token_field);
		match &token {
			Some(_) => {
				if let Err(e) = self
					.store
					.save(&self.config.token_storage_key, &response)
					.await
				{
					warn!(error = %e, "failed to persist auth token");
				}
			}
			None => warn!(token_field = %self.config.token_field, "auth response carried no token"),
		}
		self.ensure_live()?;

		let mut result = identity_fields(&self.config, inputs);
		self.attach_session(&mut result, token.as_deref(), &[&response]);
		let result = Value::Object(result);

		self.host.set_value(&self.config.field_name, result.clone());
		let step = {
			let mut state = self.lock();
			state.success = Some("Signed in successfully".to_string());
			state.completed = true;
			state.step
		};
		info!(step = %step, "auth block completed");

		self.pause(self.timings.advance_delay).await?;
		self.host.go_to_next_block(Some(result));
		Ok(step)
	}

	async fn skip(&self, session: &Session) -> Result<AuthStep> {
		{
			let mut state = self.lock();
			state.step = AuthStep::Skipped;
			state.completed = true;
		}

		let mut result = Map::new();
		result.insert("skipped".to_string(), Value::Bool(true));
		self.attach_session(&mut result, Some(&session.token), &session.sources());
		let result = Value::Object(result);
		self.host.set_value(&self.config.field_name, result.clone());

		self.pause(self.timings.skip_delay).await?;
		debug!("already signed in, skipping auth block");
		self.host.go_to_next_block(Some(result));
		Ok(AuthStep::Skipped)
	}

	async fn proceed_with_session(&self) -> Result<AuthStep> {
		let step = self.lock().step;
		if step != AuthStep::Welcome {
			return Err(AuthError::WrongStep(step));
		}
		let session = lock(&self.session)
			.clone()
			.ok_or(AuthError::WrongStep(step))?;

		let mut result = Map::new();
		self.attach_session(&mut result, Some(&session.token), &session.sources());
		let result = Value::Object(result);

		self.host.set_value(&self.config.field_name, result.clone());
		self.lock().completed = true;
		self.host.go_to_next_block(Some(result));
		Ok(step)
	}

	/// Adds the token and every mapped field; later sources win.
	fn attach_session(&self, result: &mut Map<String, Value>, token: Option<&str>, sources: &[&Value]) {
		if let Some(token) = token {
			result.insert(self.config.token_field.clone(), Value::String(token.to_string()));
		}
		for source in sources {
			result.extend(apply_field_mappings(source, &self.config.field_mappings));
		}
	}

	async fn forget_token(&self) {
		if let Err(e) = self.store.delete(&self.config.token_storage_key).await {
			warn!(error = %e, "failed to clear stored auth token");
		}
	}

	/// Back to the first configured step with empty inputs.
	fn restart(&self) -> AuthStep {
		let step = initial_step(&self.config);
		let mut state = self.lock();
		let back = state.is_back_navigation;
		*state = AuthState::new(step);
		state.is_back_navigation = back;
		step
	}

	fn begin(&self) -> Result<InFlight<'_>> {
		self.ensure_live()?;
		self.in_flight
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.map_err(|_| AuthError::Busy)?;

		let mut state = self.lock();
		state.loading = true;
		state.error = None;
		state.success = None;
		Ok(InFlight { flow: self })
	}

	/// Mirrors a user-facing failure into the state.
	fn settle<T>(&self, result: Result<T>) -> Result<T> {
		if let Err(e) = &result {
			if e.is_user_facing() && !self.cancel.is_cancelled() {
				self.lock().error = Some(e.to_string());
			}
		}
		result
	}

	/// Runs `fut` unless the flow is unmounted first.
	async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(AuthError::Cancelled),
			result = fut => result,
		}
	}

	async fn pause(&self, delay: Duration) -> Result<()> {
		self.call(async {
			tokio::time::sleep(delay).await;
			Ok(())
		})
		.await
	}

	fn ensure_live(&self) -> Result<()> {
		if self.cancel.is_cancelled() {
			return Err(AuthError::Cancelled);
		}
		Ok(())
	}

	fn snapshot(&self) -> (AuthStep, FieldInputs) {
		let state = self.lock();
		(state.step, state.inputs.clone())
	}

	fn lock(&self) -> MutexGuard<'_, AuthState> {
		lock(&self.state)
	}
}

impl Session {
	fn sources(&self) -> Vec<&Value> {
		std::iter::once(&self.stored)
			.chain(self.validated.as_ref())
			.collect()
	}
}

impl Drop for AuthFlow {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

impl std::fmt::Debug for AuthFlow {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuthFlow")
			.field("field_name", &self.config.field_name)
			.field("state", &self.state())
			.field("mounted", &self.is_mounted())
			.finish_non_exhaustive()
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{FieldMapping, NameFieldType};
	use crate::host::testing::RecordingHost;
	use crate::host::{NavigationEntry, NavigationTrigger};
	use serde_json::json;
	use wiremock::matchers::{body_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn login_config(server: &MockServer) -> AuthBlockConfig {
		AuthBlockConfig {
			require_email: true,
			login_url: Some(format!("{}/login", server.uri())),
			..Default::default()
		}
	}

	fn otp_config(server: &MockServer) -> AuthBlockConfig {
		AuthBlockConfig {
			require_email: true,
			require_mobile: true,
			use_otp: true,
			send_email_otp_url: Some(format!("{}/otp/email/send", server.uri())),
			verify_email_otp_url: Some(format!("{}/otp/email/verify", server.uri())),
			send_mobile_otp_url: Some(format!("{}/otp/mobile/send", server.uri())),
			verify_mobile_otp_url: Some(format!("{}/otp/mobile/verify", server.uri())),
			..Default::default()
		}
	}

	fn flow(config: AuthBlockConfig, host: Arc<RecordingHost>, store: Arc<MemoryTokenStore>) -> AuthFlow {
		AuthFlow::builder(config, host)
			.store(store)
			.timings(FlowTimings::immediate())
			.http_client(Client::new())
			.build()
			.unwrap()
	}

	#[tokio::test]
	async fn invalid_config_is_rejected_at_build() {
		let result = AuthFlow::builder(AuthBlockConfig::default(), Arc::new(RecordingHost::default())).build();
		assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
	}

	#[tokio::test]
	async fn mount_without_token_starts_at_initial_step() {
		let server = MockServer::start().await;
		let config = AuthBlockConfig {
			require_name: true,
			name_field_type: NameFieldType::Separate,
			..login_config(&server)
		};
		let flow = flow(config, Arc::default(), Arc::default());
		assert_eq!(flow.mount().await.unwrap(), AuthStep::FirstName);
		assert_eq!(flow.mount().await.unwrap(), AuthStep::FirstName);
	}

	#[tokio::test]
	async fn direct_login_stores_response_and_advances() {
		let server = MockServer::start().await;
		let response = json!({"token": "t-1", "user": {"id": "u1", "department": "eng"}});
		Mock::given(method("POST"))
			.and(path("/login"))
			.and(body_json(json!({"email": "ada@example.com", "source": "survey"})))
			.respond_with(ResponseTemplate::new(200).set_body_json(response.clone()))
			.expect(1)
			.mount(&server)
			.await;

		let config = AuthBlockConfig {
			field_mappings: vec![FieldMapping::new("user.department", "dept")],
			additional_params: vec![crate::config::KeyValue::new("source", "survey")],
			..login_config(&server)
		};
		let host = Arc::new(RecordingHost::default());
		let store = Arc::new(MemoryTokenStore::new());
		let flow = flow(config, host.clone(), store.clone());
		flow.mount().await.unwrap();

		flow.set_input(InputField::Email, "ada@example.com");
		flow.submit().await.unwrap();

		let state = flow.state();
		assert!(state.completed);
		assert!(!state.loading);
		assert_eq!(state.error, None);
		assert_eq!(store.load("authToken").await.unwrap(), Some(response));

		let expected = json!({"email": "ada@example.com", "token": "t-1", "dept": "eng"});
		assert_eq!(host.values(), vec![("auth".to_string(), expected.clone())]);
		assert_eq!(host.advanced(), vec![Some(expected)]);
	}

	#[tokio::test]
	async fn invalid_input_never_reaches_the_network() {
		let server = MockServer::start().await;
		let flow = flow(login_config(&server), Arc::default(), Arc::default());
		flow.mount().await.unwrap();

		flow.set_input(InputField::Email, "not-an-email");
		let err = flow.submit().await.unwrap_err();
		assert!(matches!(err, AuthError::Validation(_)));
		assert_eq!(flow.state().error.as_deref(), Some("Please enter a valid email address"));
		assert_eq!(flow.state().step, AuthStep::Email);
		assert!(server.received_requests().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn server_error_is_shown_and_can_be_retried() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Unknown account"})))
			.up_to_n_times(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
			.mount(&server)
			.await;

		let host = Arc::new(RecordingHost::default());
		let flow = flow(login_config(&server), host.clone(), Arc::default());
		flow.mount().await.unwrap();
		flow.set_input(InputField::Email, "a@b.c");

		assert!(flow.submit().await.is_err());
		let state = flow.state();
		assert_eq!(state.error.as_deref(), Some("Unknown account"));
		assert!(!state.loading);
		assert!(host.advanced().is_empty());

		flow.submit().await.unwrap();
		assert_eq!(flow.state().error, None);
		assert_eq!(host.advanced().len(), 1);
	}

	#[tokio::test]
	async fn otp_flow_verifies_email_then_mobile() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/otp/email/send"))
			.and(body_json(json!({"email": "a@b.c"})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/otp/email/verify"))
			.and(body_json(json!({"email": "a@b.c", "mobile": "5550102030", "otp": "1111"})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"verified": true})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/otp/mobile/send"))
			.and(body_json(json!({"mobile": "5550102030"})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/otp/mobile/verify"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "otp-token"})))
			.expect(1)
			.mount(&server)
			.await;

		let host = Arc::new(RecordingHost::default());
		let store = Arc::new(MemoryTokenStore::new());
		let flow = flow(otp_config(&server), host.clone(), store.clone());
		assert_eq!(flow.mount().await.unwrap(), AuthStep::Email);

		flow.set_input(InputField::Email, "a@b.c");
		assert_eq!(flow.submit().await.unwrap(), AuthStep::Phone);
		flow.set_input(InputField::Mobile, "5550102030");
		assert_eq!(flow.submit().await.unwrap(), AuthStep::EmailOtp);
		assert!(flow.state().otp_sent.email);
		assert_eq!(flow.state().success.as_deref(), Some("Verification code sent to a@b.c"));

		flow.set_input(InputField::EmailOtp, "1111");
		assert_eq!(flow.submit().await.unwrap(), AuthStep::PhoneOtp);
		assert!(flow.state().otp_sent.mobile);

		flow.set_input(InputField::MobileOtp, "2222");
		flow.submit().await.unwrap();
		assert!(flow.state().completed);
		assert_eq!(
			store.load("authToken").await.unwrap(),
			Some(json!({"token": "otp-token"}))
		);
		assert_eq!(host.advanced().len(), 1);
	}

	#[tokio::test]
	async fn back_from_otp_clears_codes_and_sent_flags() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200))
			.mount(&server)
			.await;

		let config = AuthBlockConfig {
			require_mobile: false,
			..otp_config(&server)
		};
		let flow = flow(config, Arc::default(), Arc::default());
		flow.mount().await.unwrap();
		flow.set_input(InputField::Email, "a@b.c");
		assert_eq!(flow.submit().await.unwrap(), AuthStep::EmailOtp);
		flow.set_input(InputField::EmailOtp, "12");

		assert_eq!(flow.back().unwrap(), AuthStep::Email);
		let state = flow.state();
		assert_eq!(state.otp_sent, OtpSent::default());
		assert!(state.inputs.email_otp.is_empty());
		assert_eq!(state.inputs.email, "a@b.c");

		assert_eq!(flow.back().unwrap(), AuthStep::Email);
	}

	#[tokio::test]
	async fn resend_requires_an_otp_step() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/otp/email/send"))
			.respond_with(ResponseTemplate::new(200))
			.expect(2)
			.mount(&server)
			.await;

		let config = AuthBlockConfig {
			require_mobile: false,
			..otp_config(&server)
		};
		let flow = flow(config, Arc::default(), Arc::default());
		flow.mount().await.unwrap();
		assert!(matches!(
			flow.resend_otp().await,
			Err(AuthError::WrongStep(AuthStep::Email))
		));

		flow.set_input(InputField::Email, "a@b.c");
		flow.submit().await.unwrap();
		assert_eq!(flow.resend_otp().await.unwrap(), AuthStep::EmailOtp);
	}

	#[tokio::test]
	async fn resend_rechecks_required_fields() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/otp/email/send"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let config = AuthBlockConfig {
			require_mobile: false,
			..otp_config(&server)
		};
		let flow = flow(config, Arc::default(), Arc::default());
		flow.mount().await.unwrap();
		flow.set_input(InputField::Email, "a@b.c");
		assert_eq!(flow.submit().await.unwrap(), AuthStep::EmailOtp);

		flow.set_input(InputField::Email, "");
		let err = flow.resend_otp().await.unwrap_err();
		assert!(matches!(err, AuthError::Validation(_)));
		assert!(flow.state().error.is_some());
		assert_eq!(flow.state().step, AuthStep::EmailOtp);
		assert_eq!(server.received_requests().await.unwrap().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn login_advances_after_full_delay() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/login"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
			.mount(&server)
			.await;

		let host = Arc::new(RecordingHost::default());
		let flow = Arc::new(
			AuthFlow::builder(login_config(&server), host.clone())
				.store(Arc::new(MemoryTokenStore::new()))
				.http_client(Client::new())
				.build()
				.unwrap(),
		);
		flow.mount().await.unwrap();
		flow.set_input(InputField::Email, "a@b.c");

		let pending = tokio::spawn({
			let flow = flow.clone();
			async move { flow.submit().await }
		});
		// Spin without sleeping so the paused clock stays put until the response lands.
		while !flow.state().completed {
			assert!(!pending.is_finished(), "submit ended before completing");
			tokio::task::yield_now().await;
		}
		assert_eq!(flow.state().success.as_deref(), Some("Signed in successfully"));
		assert!(host.advanced().is_empty());

		let started = tokio::time::Instant::now();
		pending.await.unwrap().unwrap();
		assert_eq!(started.elapsed(), Duration::from_millis(1000));
		assert_eq!(host.advanced().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn stored_token_skips_block_after_short_delay() {
		let config = AuthBlockConfig {
			login_url: Some("http://127.0.0.1:1/login".to_string()),
			skip_if_logged_in: true,
			field_mappings: vec![FieldMapping::new("user.id", "userId")],
			..Default::default()
		};
		let host = Arc::new(RecordingHost::default());
		let store = Arc::new(MemoryTokenStore::with_entry(
			"authToken",
			json!({"token": "t-9", "user": {"id": "u9"}}),
		));
		let flow = AuthFlow::builder(config, host.clone())
			.store(store)
			.http_client(Client::new())
			.build()
			.unwrap();

		let started = tokio::time::Instant::now();
		assert_eq!(flow.mount().await.unwrap(), AuthStep::Skipped);
		assert_eq!(started.elapsed(), Duration::from_millis(200));

		let advanced = host.advanced();
		assert_eq!(advanced.len(), 1);
		let payload = advanced[0].clone().unwrap();
		assert_eq!(payload["skipped"], true);
		assert_eq!(payload["token"], "t-9");
		assert_eq!(payload["userId"], "u9");
	}

	#[tokio::test]
	async fn back_navigation_shows_welcome_instead_of_skipping() {
		let server = MockServer::start().await;
		let config = AuthBlockConfig {
			skip_if_logged_in: true,
			..login_config(&server)
		};
		let host = Arc::new(RecordingHost::with_history(vec![
			NavigationEntry::new("intro", NavigationTrigger::Next),
			NavigationEntry::new("auth", NavigationTrigger::Back),
		]));
		let store = Arc::new(MemoryTokenStore::with_entry("authToken", json!({"token": "t"})));
		let flow = flow(config, host.clone(), store);

		assert_eq!(flow.mount().await.unwrap(), AuthStep::Welcome);
		assert!(flow.state().is_back_navigation);
		assert!(host.advanced().is_empty());

		flow.continue_session().await.unwrap();
		assert_eq!(host.advanced(), vec![Some(json!({"token": "t"}))]);
	}

	#[tokio::test]
	async fn rejected_token_is_cleared_and_flow_restarts() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/validate"))
			.and(body_json(json!({"token": "stale"})))
			.respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "expired"})))
			.expect(1)
			.mount(&server)
			.await;

		let config = AuthBlockConfig {
			require_name: true,
			skip_if_logged_in: true,
			validate_token_url: Some(format!("{}/validate", server.uri())),
			..login_config(&server)
		};
		let store = Arc::new(MemoryTokenStore::with_entry("authToken", json!({"token": "stale"})));
		let host = Arc::new(RecordingHost::default());
		let flow = flow(config, host.clone(), store.clone());

		assert_eq!(flow.mount().await.unwrap(), AuthStep::Name);
		let state = flow.state();
		assert_ne!(state.step, AuthStep::Welcome);
		assert_eq!(state.error, None);
		assert!(!state.loading);
		assert!(store.load("authToken").await.unwrap().is_none());
		assert!(host.advanced().is_empty());
	}

	#[tokio::test]
	async fn validated_token_without_skip_shows_welcome() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/validate"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(json!({"user": {"department": "ops"}})),
			)
			.mount(&server)
			.await;

		let config = AuthBlockConfig {
			validate_token_url: Some(format!("{}/validate", server.uri())),
			field_mappings: vec![FieldMapping::new("user.department", "dept")],
			..login_config(&server)
		};
		let store = Arc::new(MemoryTokenStore::with_entry("authToken", json!({"token": "t"})));
		let host = Arc::new(RecordingHost::default());
		let flow = flow(config, host.clone(), store);

		assert_eq!(flow.mount().await.unwrap(), AuthStep::Welcome);
		assert_eq!(flow.submit().await.unwrap(), AuthStep::Welcome);
		assert_eq!(
			host.advanced(),
			vec![Some(json!({"token": "t", "dept": "ops"}))]
		);
	}

	#[tokio::test]
	async fn different_user_clears_token_and_restarts() {
		let server = MockServer::start().await;
		let store = Arc::new(MemoryTokenStore::with_entry("authToken", json!({"token": "t"})));
		let flow = flow(login_config(&server), Arc::default(), store.clone());

		assert_eq!(flow.mount().await.unwrap(), AuthStep::Welcome);
		assert_eq!(flow.sign_in_as_different_user().await.unwrap(), AuthStep::Email);
		assert!(store.load("authToken").await.unwrap().is_none());
		assert!(matches!(
			flow.continue_session().await,
			Err(AuthError::WrongStep(AuthStep::Email))
		));
	}

	async fn wait_until_loading(flow: &AuthFlow) {
		for _ in 0..200 {
			if flow.state().loading {
				return;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		panic!("request never started");
	}

	#[tokio::test]
	async fn concurrent_submit_is_rejected() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({"token": "t"}))
					.set_delay(Duration::from_millis(300)),
			)
			.expect(1)
			.mount(&server)
			.await;

		let flow = Arc::new(flow(login_config(&server), Arc::default(), Arc::default()));
		flow.mount().await.unwrap();
		flow.set_input(InputField::Email, "a@b.c");

		let first = tokio::spawn({
			let flow = flow.clone();
			async move { flow.submit().await }
		});
		wait_until_loading(&flow).await;

		assert!(matches!(flow.submit().await, Err(AuthError::Busy)));
		assert!(matches!(flow.back(), Err(AuthError::Busy)));
		first.await.unwrap().unwrap();
		assert!(flow.state().completed);
	}

	#[tokio::test]
	async fn unmount_drops_late_responses() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({"token": "late"}))
					.set_delay(Duration::from_secs(5)),
			)
			.mount(&server)
			.await;

		let host = Arc::new(RecordingHost::default());
		let store = Arc::new(MemoryTokenStore::new());
		let flow = Arc::new(flow(login_config(&server), host.clone(), store.clone()));
		flow.mount().await.unwrap();
		flow.set_input(InputField::Email, "a@b.c");

		let pending = tokio::spawn({
			let flow = flow.clone();
			async move { flow.submit().await }
		});
		wait_until_loading(&flow).await;
		flow.unmount();

		assert!(matches!(pending.await.unwrap(), Err(AuthError::Cancelled)));
		assert!(!flow.state().completed);
		assert!(store.load("authToken").await.unwrap().is_none());
		assert!(host.advanced().is_empty());
		assert!(matches!(flow.submit().await, Err(AuthError::Cancelled)));
	}
}
