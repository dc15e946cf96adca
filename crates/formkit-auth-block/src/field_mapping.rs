// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Copies values out of an auth response into survey fields.

use serde_json::{Map, Value};

use crate::config::FieldMapping;

/// Resolves a dot-separated path such as `user.profile.id`. Numeric segments
/// index into arrays. Missing segments and `null` values resolve to `None`.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
	let path = path.trim();
	if path.is_empty() {
		return None;
	}

	let mut current = value;
	for segment in path.split('.') {
		current = match current {
			Value::Object(map) => map.get(segment)?,
			Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
			_ => return None,
		};
	}

	(!current.is_null()).then_some(current)
}

/// Applies every mapping to `response`; unresolved paths are skipped.
pub fn apply_field_mappings(response: &Value, mappings: &[FieldMapping]) -> Map<String, Value> {
	let mut mapped = Map::new();
	for mapping in mappings {
		if let Some(value) = resolve_path(response, &mapping.api_path) {
			mapped.insert(mapping.form_field.clone(), value.clone());
		}
	}
	mapped
}
