//! Byte column to codepoint column mapping.
//!
//! Engines report columns as UTF-8 byte offsets; consumers index lines by
//! character. Tables are memoized per line text since identical lines recur
//! constantly while a file is highlighted block by block.

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;

/// Number of distinct line texts whose tables are remembered.
pub const TABLE_CACHE_CAPACITY: usize = 128;

thread_local! {
	static TABLES: RefCell<LruCache<String, Rc<CodepointMap>>> =
		RefCell::new(LruCache::new(NonZeroUsize::new(TABLE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)));
}

/// Maps byte offsets within one line to codepoint offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodepointMap {
	/// Every byte is one codepoint.
	Identity,
	/// `table[b]` is the index of the codepoint containing byte `b`.
	Table(Vec<u32>),
}

impl CodepointMap {
	/// Builds the map for `text` without consulting the cache.
	pub fn build(text: &str) -> Self {
		if text.is_ascii() {
			return Self::Identity;
		}
		let mut table = Vec::with_capacity(text.len());
		for (index, ch) in text.chars().enumerate() {
			let index = index as u32;
			table.extend(std::iter::repeat_n(index, ch.len_utf8()));
		}
		Self::Table(table)
	}

	/// Codepoint offset for `byte`.
	///
	/// Offsets past the end of the line extrapolate one codepoint per byte, so
	/// the offset just past the last byte maps to the character count.
	pub fn map(&self, byte: usize) -> usize {
		match self {
			Self::Identity => byte,
			Self::Table(table) => match table.get(byte) {
				Some(&index) => index as usize,
				None => {
					let last = table.last().map_or(0, |&index| index as usize);
					(last + byte + 1).saturating_sub(table.len())
				}
			},
		}
	}
}

/// Memoized [`CodepointMap::build`].
pub fn codepoint_map(text: &str) -> Rc<CodepointMap> {
	if text.is_ascii() {
		return Rc::new(CodepointMap::Identity);
	}
	TABLES.with(|tables| {
		let mut tables = tables.borrow_mut();
		if let Some(map) = tables.get(text) {
			return map.clone();
		}
		let map = Rc::new(CodepointMap::build(text));
		tables.put(text.to_owned(), map.clone());
		map
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ascii_is_identity() {
		let map = CodepointMap::build("def f():");
		assert_eq!(map, CodepointMap::Identity);
		assert_eq!(map.map(5), 5);
	}

	#[test]
	fn test_two_byte_char_collapses() {
		let map = CodepointMap::build("abéc");
		assert_eq!((map.map(2), map.map(4)), (2, 3));
		assert_eq!(map.map(3), 2);
		assert_eq!(map.map(5), 4);
	}

	#[test]
	fn test_four_byte_char() {
		let map = CodepointMap::build("x🦀y");
		assert_eq!(map.map(1), 1);
		assert_eq!(map.map(4), 1);
		assert_eq!(map.map(5), 2);
		assert_eq!(map.map(6), 3);
	}

	#[test]
	fn test_memoized_tables_are_shared() {
		let a = codepoint_map("naïve");
		let b = codepoint_map("naïve");
		assert!(Rc::ptr_eq(&a, &b));
	}
}
