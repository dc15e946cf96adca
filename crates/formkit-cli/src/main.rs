// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `formkit`: runs the survey auth block and the analytics fan-out from a
//! terminal.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use formkit_analytics_core::SurveyAction;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analytics;
mod auth;
mod block;
mod host;

#[derive(Parser, Debug)]
#[command(name = "formkit", about = "Survey auth block and analytics host", version)]
struct Args {
	/// Config file to read instead of `<config dir>/formkit/config.toml`
	#[arg(long, global = true, env = "FORMKIT_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Check an auth block definition
	Validate {
		#[arg(long)]
		block: Option<PathBuf>,
	},
	/// Sign in through an auth block
	Auth {
		#[arg(long)]
		block: Option<PathBuf>,
		#[arg(long, default_value = "cli")]
		survey_id: String,
	},
	/// Send one survey event to every configured analytics provider
	Track {
		/// Action tag, e.g. `survey_start` or `submit_success`
		action: SurveyAction,
		#[arg(long)]
		label: Option<String>,
		#[arg(long)]
		value: Option<f64>,
		#[arg(long)]
		survey_id: Option<String>,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => formkit_config::load_config_with_file(path)?,
		None => formkit_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	match args.command {
		Command::Validate { block } => {
			let path = block::resolve(block, &config.auth)?;
			match block::load(&path)?.validate() {
				None => println!("{}: ok", path.display()),
				Some(problem) => bail!("{}: {problem}", path.display()),
			}
		}
		Command::Auth { block, survey_id } => {
			let path = block::resolve(block, &config.auth)?;
			auth::execute(&config, &path, &survey_id).await?;
		}
		Command::Track {
			action,
			label,
			value,
			survey_id,
		} => {
			analytics::track(&config.analytics, action, label, value, survey_id).await?;
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_consistent() {
		Args::command().debug_assert();
	}

	#[test]
	fn track_parses_action_names() {
		let args = Args::parse_from(["formkit", "track", "submit_success", "--value", "3"]);
		match args.command {
			Command::Track { action, value, .. } => {
				assert_eq!(action, SurveyAction::SubmitSuccess);
				assert_eq!(value, Some(3.0));
			}
			other => panic!("unexpected command {other:?}"),
		}
		assert!(Args::try_parse_from(["formkit", "track", "not_an_action"]).is_err());
	}
}
