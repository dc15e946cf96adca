// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for formkit.
//!
//! Every outbound call (auth endpoints, analytics script loads, the Meta
//! Conversion API) goes through a client built here so requests carry the
//! same User-Agent.

mod client;

pub use client::{builder, new_client, try_new_client, user_agent};
