//! # patricia-trie
//!
//! An ordered map stored in a PATRICIA (crit-bit) trie.
//!
//! Keys are treated as bit strings through a [`KeyAnalyzer`]. Lookups,
//! insertions and removals cost time proportional to the key's bit length,
//! independent of how many entries are stored. On top of the usual map
//! operations the trie answers prefix queries, ordered range queries and
//! "nearest key" queries where distance is the XOR of the keys' bits.
//!
//! ## Example
//!
//! ```rust
//! use patricia_trie::PatriciaTrie;
//!
//! let mut trie: PatriciaTrie<String, u32> = PatriciaTrie::new();
//! trie.insert("a".to_string(), 1);
//! trie.insert("ab".to_string(), 2);
//! trie.insert("b".to_string(), 3);
//!
//! assert_eq!(trie.get("ab"), Some(&2));
//!
//! let under_a: Vec<&str> = trie.prefix_view("a").keys().map(String::as_str).collect();
//! assert_eq!(under_a, ["a", "ab"]);
//!
//! assert_eq!(trie.select_key("abc").map(String::as_str), Some("ab"));
//! ```
//!
//! Byte-string keys use [`ByteAnalyzer`]:
//!
//! ```rust
//! use patricia_trie::{ByteAnalyzer, PatriciaTrie};
//!
//! let mut trie: PatriciaTrie<Vec<u8>, u32, ByteAnalyzer> = PatriciaTrie::new();
//! trie.insert(b"a".to_vec(), 1);
//! trie.insert(b"a\0".to_vec(), 2);
//! assert_eq!(trie.len(), 2);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod analyzer;
mod config;
mod cursor;
mod error;
mod node;
mod trie;
mod view;

pub use analyzer::{BitIndex, ByteAnalyzer, CharAnalyzer, KeyAnalyzer, Units};
pub use config::TrieConfig;
pub use cursor::{Cursor, Iter, Keys, Values};
pub use error::TrieError;
pub use trie::PatriciaTrie;
pub use view::{View, ViewMut};

#[cfg(test)]
mod proptests;
