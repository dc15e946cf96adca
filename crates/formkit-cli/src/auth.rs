// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runs the auth block on a terminal.
//!
//! Each step prompts for one line. `:back` returns to the previous step and
//! `:resend` asks for a fresh code on an OTP step.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use formkit_analytics::SurveyAnalytics;
use formkit_auth_block::{
	AuthError, AuthFlow, AuthStep, FileTokenStore, InputField, NameFieldType,
};
use formkit_config::FormkitConfig;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, instrument};

use crate::host::TerminalHost;
use crate::{analytics, block};

const BACK: &str = ":back";
const RESEND: &str = ":resend";

/// `formkit auth`: drives the block on stdin/stdout and prints the result.
#[instrument(skip_all, fields(block = %block_path.display()))]
pub async fn execute(config: &FormkitConfig, block_path: &Path, survey_id: &str) -> Result<()> {
	let block = block::load(block_path)?;
	let method = if block.use_otp { "otp" } else { "password" };

	let host = Arc::new(TerminalHost::new());
	let flow = AuthFlow::builder(block, host.clone())
		.store(Arc::new(FileTokenStore::new(&config.auth.token_store_path)))
		.build()
		.context("auth block cannot be started")?;

	let context = analytics::context(&config.analytics);
	context.initialize().await;
	let survey = SurveyAnalytics::new(context.clone(), survey_id);

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut out = std::io::stdout();

	survey.track_auth_start(method);
	let outcome = drive(&flow, &mut lines, &mut out).await;
	flow.unmount();

	if outcome.is_ok() && flow.state().step != AuthStep::Skipped {
		survey.track_auth_complete(method);
	}
	context.shutdown().await;
	outcome?;

	let result = host.result().unwrap_or(Value::Null);
	info!(step = %flow.state().step, "auth block finished");
	println!("{}", serde_json::to_string_pretty(&result)?);
	Ok(())
}

/// Steps the flow until it hands its result to the host.
pub async fn drive<R>(flow: &AuthFlow, input: &mut Lines<R>, out: &mut impl Write) -> Result<()>
where
	R: AsyncBufRead + Unpin,
{
	flow.mount().await?;

	loop {
		let state = flow.state();
		if state.completed {
			if let Some(message) = &state.success {
				writeln!(out, "{message}")?;
			}
			return Ok(());
		}

		let outcome = match state.step {
			AuthStep::Skipped => return Ok(()),
			AuthStep::Welcome => {
				let answer = ask(input, out, "Welcome back. [c]ontinue or [s]witch user").await?;
				if answer.eq_ignore_ascii_case("s") {
					flow.sign_in_as_different_user().await
				} else {
					flow.continue_session().await
				}
			}
			AuthStep::FirstName if flow.config().name_field_type == NameFieldType::Separate => {
				let first = ask(input, out, prompt(AuthStep::FirstName)).await?;
				if first == BACK {
					flow.back()
				} else {
					flow.set_input(InputField::FirstName, first);
					let last = ask(input, out, "Last name").await?;
					flow.set_input(InputField::LastName, last);
					flow.submit().await
				}
			}
			step => {
				let answer = ask(input, out, prompt(step)).await?;
				if answer == BACK {
					flow.back()
				} else if answer == RESEND && step.is_otp() {
					flow.resend_otp().await
				} else {
					if let Some(field) = field_for(step) {
						flow.set_input(field, answer);
					}
					flow.submit().await
				}
			}
		};

		match outcome {
			Ok(_) => {
				let state = flow.state();
				if let Some(message) = state.success.filter(|_| !state.completed) {
					writeln!(out, "{message}")?;
				}
			}
			Err(AuthError::Cancelled) => bail!("auth flow was cancelled"),
			Err(e) => writeln!(out, "error: {e}")?,
		}
	}
}

fn prompt(step: AuthStep) -> &'static str {
	match step {
		AuthStep::Name => "Name",
		AuthStep::FirstName => "First name",
		AuthStep::Email => "Email address",
		AuthStep::Phone => "Mobile number",
		AuthStep::EmailOtp => "Code sent to your email (:resend for a new one)",
		AuthStep::PhoneOtp => "Code sent to your phone (:resend for a new one)",
		AuthStep::Welcome | AuthStep::Skipped => "",
	}
}

fn field_for(step: AuthStep) -> Option<InputField> {
	match step {
		AuthStep::Name => Some(InputField::Name),
		AuthStep::FirstName => Some(InputField::FirstName),
		AuthStep::Email => Some(InputField::Email),
		AuthStep::Phone => Some(InputField::Mobile),
		AuthStep::EmailOtp => Some(InputField::EmailOtp),
		AuthStep::PhoneOtp => Some(InputField::MobileOtp),
		AuthStep::Welcome | AuthStep::Skipped => None,
	}
}

async fn ask<R>(input: &mut Lines<R>, out: &mut impl Write, prompt: &str) -> Result<String>
where
	R: AsyncBufRead + Unpin,
{
	write!(out, "{prompt}: ")?;
	out.flush()?;
	let line = input
		.next_line()
		.await?
		.ok_or_else(|| anyhow!("input closed before authentication finished"))?;
	Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use formkit_auth_block::{AuthBlockConfig, FlowTimings, MemoryTokenStore, TokenStore};
	use serde_json::json;

	fn config() -> AuthBlockConfig {
		AuthBlockConfig {
			require_email: true,
			login_url: Some("http://127.0.0.1:1/login".to_string()),
			..Default::default()
		}
	}

	fn flow(store: Arc<MemoryTokenStore>, host: Arc<TerminalHost>) -> AuthFlow {
		AuthFlow::builder(config(), host)
			.store(store)
			.timings(FlowTimings::immediate())
			.build()
			.unwrap()
	}

	#[tokio::test]
	async fn welcome_continue_hands_over_stored_session() {
		let store = Arc::new(MemoryTokenStore::with_entry("authToken", json!({"token": "t"})));
		let host = Arc::new(TerminalHost::new());
		let flow = flow(store, host.clone());

		let mut lines = BufReader::new(&b"c\n"[..]).lines();
		let mut out = Vec::new();
		drive(&flow, &mut lines, &mut out).await.unwrap();

		assert_eq!(host.result(), Some(json!({"token": "t"})));
		assert!(String::from_utf8(out).unwrap().starts_with("Welcome back"));
	}

	#[tokio::test]
	async fn invalid_input_is_reported_and_reprompted() {
		let store = Arc::new(MemoryTokenStore::with_entry("authToken", json!({"token": "t"})));
		let host = Arc::new(TerminalHost::new());
		let flow = flow(store.clone(), host.clone());

		let mut lines = BufReader::new(&b"s\nnot-an-email\n"[..]).lines();
		let mut out = Vec::new();
		let err = drive(&flow, &mut lines, &mut out).await.unwrap_err();

		assert!(err.to_string().contains("input closed"));
		let transcript = String::from_utf8(out).unwrap();
		assert!(transcript.contains("error: Please enter a valid email address"));
		assert_eq!(transcript.matches("Email address: ").count(), 2);
		assert!(store.load("authToken").await.unwrap().is_none());
		assert_eq!(host.result(), None);
	}

	#[test]
	fn every_input_step_has_a_field() {
		for step in [
			AuthStep::Name,
			AuthStep::FirstName,
			AuthStep::Email,
			AuthStep::Phone,
			AuthStep::EmailOtp,
			AuthStep::PhoneOtp,
		] {
			assert!(field_for(step).is_some(), "{step}");
			assert!(!prompt(step).is_empty());
		}
		assert!(field_for(AuthStep::Welcome).is_none());
	}
}
