// Copyright 2025 Irreducible Inc.

use std::{collections::HashMap, hash::Hash};

/// An insertion-ordered interning pool.
///
/// Every distinct value gets a dense index in the order it was first added. Adding a value
/// that is already present returns the existing index.
#[derive(Debug, Clone)]
pub struct Pool<V> {
	values: Vec<V>,
	index: HashMap<V, usize>,
}

impl<V> Default for Pool<V> {
	fn default() -> Self {
		Self {
			values: Vec::new(),
			index: HashMap::new(),
		}
	}
}

impl<V: Hash + Eq + Clone> Pool<V> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Interns `value` and returns its index.
	pub fn add(&mut self, value: &V) -> usize {
		if let Some(&idx) = self.index.get(value) {
			return idx;
		}
		let idx = self.values.len();
		self.values.push(value.clone());
		self.index.insert(value.clone(), idx);
		idx
	}

	pub fn try_get_idx(&self, value: &V) -> Option<usize> {
		self.index.get(value).copied()
	}

	pub fn contains(&self, value: &V) -> bool {
		self.index.contains_key(value)
	}

	pub fn get(&self, idx: usize) -> &V {
		&self.values[idx]
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Values in insertion order.
	pub fn vec(&self) -> &[V] {
		&self.values
	}

	/// The value to index map.
	pub fn map(&self) -> &HashMap<V, usize> {
		&self.index
	}
}
