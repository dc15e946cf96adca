// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Open key-value payloads attached to events and user profiles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A builder for event metadata or user properties.
///
/// # Example
///
/// ```
/// use formkit_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("page", "contact")
///     .insert("field_count", 4)
///     .insert("is_required", true);
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	/// Creates a new empty Properties builder.
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair into the properties.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts the value only when it is `Some`.
	pub fn insert_opt<K, V>(self, key: K, value: Option<V>) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		match value {
			Some(v) => self.insert(key, v),
			None => self,
		}
	}

	/// Merges another Properties into this one.
	///
	/// If both contain the same key, the value from `other` takes precedence.
	pub fn merge(mut self, other: Properties) -> Self {
		for (k, v) in other.inner {
			self.inner.insert(k, v);
		}
		self
	}

	/// Returns true if the properties are empty.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Returns the number of properties.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Gets a value by key.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	/// Iterates over the entries in insertion-independent key order.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.inner.iter()
	}

	/// Returns the properties with every null value removed.
	pub fn stripped(self) -> Self {
		Self {
			inner: strip_nulls(self.inner),
		}
	}

	/// Borrows the underlying JSON map.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.inner
	}

	/// Converts the properties into a JSON map.
	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}

	/// Converts the properties into a `serde_json::Value`.
	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

/// Removes every `null` entry from a JSON map, descending into nested objects.
///
/// Outbound payloads never carry keys without a value; this is applied by
/// every provider adapter and by the auth request builder.
pub fn strip_nulls(map: Map<String, Value>) -> Map<String, Value> {
	map.into_iter()
		.filter_map(|(k, v)| match v {
			Value::Null => None,
			Value::Object(inner) => Some((k, Value::Object(strip_nulls(inner)))),
			other => Some((k, other)),
		})
		.collect()
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}
