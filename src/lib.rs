//! # sdatrie
//!
//! A static double-array trie: compile a sorted set of byte-string records
//! once, then query it forever.
//!
//! The double array represents a trie in two parallel arrays (BASE and
//! CHECK) with children located arithmetically, never through pointers, so
//! the whole structure serializes to a flat, position-independent image that
//! can be memory-mapped and traversed without any decoding pass. Leaf
//! postfixes and record values live in a separate append-only tail region,
//! keeping non-branching suffixes out of the array.
//!
//! ## Design
//!
//! - **Build once**: [`Builder`] arranges records sorted by key into the
//!   double array, searching BASE candidates through a vacant-slot linked
//!   list and relabelling characters by frequency to densify rows.
//! - **Query forever**: [`Trie`] answers `contains`/`find`/`get` in
//!   O(|key|) and enumerates stored prefixes of a query lazily through
//!   [`PrefixCursor`].
//! - **Two packings**: 4-byte elements ([`Element4`]) for small tries,
//!   5-byte elements ([`Element5`], the default) for up to 2^31 - 1
//!   elements.
//! - **Pluggable values**: anything implementing [`TailValue`] rides along
//!   in the tail; primitives, `String`, `Vec<u8>` and `()` (set mode) are
//!   built in.
//!
//! ## Example
//!
//! ```rust
//! use sdatrie::{Builder, Record, Trie};
//!
//! let records = vec![
//!     Record { key: "eight", value: 8_i32 },
//!     Record { key: "five", value: 5 },
//!     Record { key: "four", value: 4 },
//!     Record { key: "nine", value: 9 },
//! ];
//!
//! let mut builder: Builder<i32> = Builder::new();
//! builder.build(&records).unwrap();
//! let bytes = builder.to_bytes();
//!
//! let trie: Trie<'_, i32> = Trie::load(&bytes).unwrap();
//! assert_eq!(trie.get("five", -1), 5);
//!
//! let query = b"fourteen";
//! let mut prefixes = trie.prefix(query);
//! while let Some(m) = prefixes.next().unwrap() {
//!     assert_eq!(&query[..m.length], b"four");
//!     assert_eq!(m.value, 4);
//! }
//! ```

pub mod builder;
pub mod container;
pub mod element;
pub mod slots;
pub mod table;
pub mod tail;
pub mod trie;
pub mod value;

mod tracing_helpers;

pub use builder::{BuildError, BuildStats, Builder, Record};
pub use container::ImageError;
pub use element::{Element4, Element5, ElementCodec};
pub use trie::{Corruption, PrefixCursor, PrefixMatch, Trie};
pub use value::TailValue;
