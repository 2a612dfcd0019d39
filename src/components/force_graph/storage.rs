//! Persisted layout storage.
//!
//! A layout is a flat `[x0, y0, x1, y1, ..]` array of rounded positions kept
//! under one named slot. Reads that are absent, malformed, or of the wrong
//! length are cache misses.

use std::collections::HashMap;

use log::warn;
use serde_json::Value;

use super::error::GraphError;

/// Default slot name for the layout of the site graph.
pub const DEFAULT_SLOT: &str = "positions";

/// Key/value storage for serialized layouts.
pub trait LayoutStore {
	fn load(&self, slot: &str) -> Option<String>;
	fn save(&mut self, slot: &str, value: &str) -> Result<(), GraphError>;
}

/// In-memory store, for tests and hosts without persistent storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	slots: HashMap<String, String>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl LayoutStore for MemoryStore {
	fn load(&self, slot: &str) -> Option<String> {
		self.slots.get(slot).cloned()
	}

	fn save(&mut self, slot: &str, value: &str) -> Result<(), GraphError> {
		self.slots.insert(slot.to_string(), value.to_string());
		Ok(())
	}
}

/// Browser `localStorage`.
pub struct LocalStorageStore {
	storage: web_sys::Storage,
}

impl LocalStorageStore {
	/// `None` when storage is disabled or the page has no window.
	pub fn new() -> Option<Self> {
		let storage = web_sys::window()?.local_storage().ok()??;
		Some(Self { storage })
	}
}

impl LayoutStore for LocalStorageStore {
	fn load(&self, slot: &str) -> Option<String> {
		self.storage.get_item(slot).ok().flatten()
	}

	fn save(&mut self, slot: &str, value: &str) -> Result<(), GraphError> {
		self.storage
			.set_item(slot, value)
			.map_err(|e| GraphError::Storage(format!("{:?}", e)))
	}
}

/// Serialize positions, rounded to whole units.
pub fn encode_layout(positions: &[f32]) -> Result<String, GraphError> {
	let rounded: Vec<f32> = positions.iter().map(|p| p.round()).collect();
	Ok(serde_json::to_string(&rounded)?)
}

/// Parse a stored layout, expecting exactly `expected_len` numbers.
///
/// Accepts a JSON array, or an object keyed by array index (the shape a
/// serialized typed array takes).
pub fn decode_layout(raw: &str, expected_len: usize) -> Option<Vec<f32>> {
	let value: Value = match serde_json::from_str(raw) {
		Ok(v) => v,
		Err(e) => {
			warn!("graph-view: stored layout is not JSON: {}", e);
			return None;
		}
	};

	let numbers: Vec<&Value> = match &value {
		Value::Array(items) => items.iter().collect(),
		Value::Object(map) => {
			let mut indexed = Vec::with_capacity(map.len());
			for (key, v) in map {
				let idx: usize = key.parse().ok()?;
				indexed.push((idx, v));
			}
			indexed.sort_by_key(|(idx, _)| *idx);
			indexed.into_iter().map(|(_, v)| v).collect()
		}
		_ => return None,
	};

	if numbers.len() != expected_len {
		warn!(
			"graph-view: stored layout has {} values, expected {}",
			numbers.len(),
			expected_len
		);
		return None;
	}

	numbers
		.into_iter()
		.map(|v| v.as_f64().filter(|f| f.is_finite()).map(|f| f as f32))
		.collect()
}
