//! Filepath: src/trie.rs
//!
//! Read-only double-array trie.
//!
//! A [`Trie`] wraps a serialized image, either owned (loaded from a stream)
//! or borrowed (a zero-copy view over an external buffer such as a memory
//! map), and answers membership, lookup and prefix queries without ever
//! touching interior state. Cursors created by [`Trie::prefix`] carry their
//! own walk state, so one trie value can serve any number of threads and
//! cursors concurrently.
//!
//! # Example
//!
//! ```rust
//! use sdatrie::{Builder, Record, Trie};
//!
//! let mut builder: Builder<i32> = Builder::new();
//! builder
//!     .build(&[
//!         Record { key: "eight", value: 8 },
//!         Record { key: "five", value: 5 },
//!     ])
//!     .unwrap();
//! let bytes = builder.to_bytes();
//!
//! let trie: Trie<'_, i32> = Trie::load(&bytes).unwrap();
//! assert!(trie.contains("five"));
//! assert_eq!(trie.get("eight", -1), 8);
//! assert_eq!(trie.find("nine"), None);
//! ```

use std::borrow::Cow;
use std::fmt as StdFmt;
use std::io::{Read, Seek};
use std::marker::PhantomData;
use std::ops::Range;

use crate::container::{self, ImageError};
use crate::element::{Element5, ElementCodec, ElementView, INITIAL_INDEX};
use crate::table::CharTable;
use crate::tail::TailReader;
use crate::value::TailValue;

mod cursor;

pub use cursor::{Corruption, PrefixCursor, PrefixMatch};

/// A static double-array trie, ready for queries.
///
/// # Type Parameters
///
/// * `V` - The record value type; must match the type the image was built
///   with.
/// * `C` - The element codec; must match the packing chunk present in the
///   image ([`Element5`] by default).
pub struct Trie<'a, V, C: ElementCodec = Element5> {
    block: Cow<'a, [u8]>,
    table: CharTable,
    elements: Range<usize>,
    tail: Range<usize>,
    records: usize,
    image_size: usize,
    _marker: PhantomData<(fn() -> V, C)>,
}

impl<'a, V, C: ElementCodec> Trie<'a, V, C> {
    /// Parses an image in place, borrowing `block`.
    ///
    /// `block` may extend past the image; [`Trie::image_size`] reports the
    /// bytes actually consumed.
    ///
    /// # Errors
    ///
    /// [`ImageError`] when the image is malformed.
    pub fn load(block: &'a [u8]) -> Result<Self, ImageError> {
        Self::from_cow(Cow::Borrowed(block))
    }

    /// Parses an image from an owned byte vector.
    ///
    /// # Errors
    ///
    /// [`ImageError`] when the image is malformed.
    pub fn from_vec(block: Vec<u8>) -> Result<Trie<'static, V, C>, ImageError> {
        Trie::from_cow(Cow::Owned(block))
    }

    /// Reads an image from a stream into an owning trie.
    ///
    /// On any failure the stream is rewound to its original position so the
    /// caller may retry with a different parser.
    ///
    /// # Errors
    ///
    /// [`ImageError`] on I/O failure or a malformed image.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Trie<'static, V, C>, ImageError> {
        let start = r.stream_position()?;
        let block = container::read_block(r)?;
        match Trie::from_cow(Cow::Owned(block)) {
            Ok(trie) => Ok(trie),
            Err(err) => {
                let _ = r.seek(std::io::SeekFrom::Start(start));
                Err(err)
            }
        }
    }

    fn from_cow(block: Cow<'a, [u8]>) -> Result<Self, ImageError> {
        let raw = container::parse_image::<C>(&block)?;
        Ok(Self {
            table: raw
                .table
                .map_or_else(CharTable::identity, CharTable::from_raw),
            elements: raw.elements,
            tail: raw.tail,
            records: raw.records,
            image_size: raw.total,
            block,
            _marker: PhantomData,
        })
    }

    /// Number of records stored in the trie.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records
    }

    /// Checks whether the trie stores no records.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Bytes of the source block consumed by the image.
    #[inline]
    #[must_use]
    pub const fn image_size(&self) -> usize {
        self.image_size
    }

    /// View over the element region.
    #[inline]
    pub(crate) fn view(&self) -> ElementView<'_, C> {
        ElementView::new(&self.block[self.elements.start..self.elements.end])
    }

    /// A fresh positional reader over the tail region.
    #[inline]
    pub(crate) fn tail_reader(&self) -> TailReader<'_> {
        TailReader::new(&self.block[self.tail.start..self.tail.end])
    }

    /// One transition: from node `i` by raw byte `c`.
    ///
    /// Fails when `i` is not an interior node, the target lies outside the
    /// array, or the target's CHECK byte does not name `c` (the backward
    /// link that keeps overlapping rows from aliasing).
    pub(crate) fn descend(&self, view: &ElementView<'_, C>, i: usize, c: u8) -> Option<usize> {
        let base = view.base(i);
        if base <= 0 {
            return None;
        }
        let slot = self.table.map(c);
        let next = base as usize + slot as usize + 1;
        if next >= view.len() || view.check(next) != slot {
            return None;
        }
        Some(next)
    }

    /// Finds `key` and returns the tail offset of its value, or `None`.
    fn locate(&self, key: &[u8]) -> Option<usize> {
        let view = self.view();
        if view.len() <= INITIAL_INDEX {
            return None;
        }

        let mut p = 0usize;
        let offset;
        let root_base = view.base(INITIAL_INDEX);
        if root_base < 0 {
            // Single-record trie: the root itself is the leaf.
            offset = (-root_base) as usize;
        } else {
            let mut cur = INITIAL_INDEX;
            loop {
                let c = key.get(p).copied().unwrap_or(0);
                cur = self.descend(&view, cur, c)?;

                let base = view.base(cur);
                if base < 0 {
                    if c != 0 {
                        p += 1;
                    }
                    offset = (-base) as usize;
                    break;
                }
                if c == 0 {
                    // Key exhausted before reaching a leaf.
                    return None;
                }
                p += 1;
            }
        }

        let mut tail = self.tail_reader();
        tail.seekg(offset);
        if tail.match_string(&key[p..]) {
            Some(offset + (key.len() - p) + 1)
        } else {
            None
        }
    }

    /// Decodes a value at a tail offset.
    pub(crate) fn decode_value(&self, offset: usize) -> V
    where
        V: TailValue,
    {
        let mut tail = self.tail_reader();
        tail.seekg(offset);
        V::decode(&mut tail)
    }

    /// Tests whether the trie contains `key`.
    #[must_use]
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.locate(key.as_ref()).is_some()
    }

    /// Finds the value stored under `key`.
    #[must_use]
    pub fn find(&self, key: impl AsRef<[u8]>) -> Option<V>
    where
        V: TailValue,
    {
        let offset = self.locate(key.as_ref())?;
        Some(self.decode_value(offset))
    }

    /// Finds the value stored under `key`, or returns `default`.
    #[must_use]
    pub fn get(&self, key: impl AsRef<[u8]>, default: V) -> V
    where
        V: TailValue,
    {
        self.find(key).unwrap_or(default)
    }

    /// Creates a cursor lazily enumerating every stored key that is a byte
    /// prefix of `query`, in ascending length order.
    #[must_use]
    pub fn prefix<'t>(&'t self, query: &'t [u8]) -> PrefixCursor<'t, V, C> {
        PrefixCursor::new(self, query)
    }
}

impl<V, C: ElementCodec> StdFmt::Debug for Trie<'_, V, C> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Trie")
            .field("records", &self.records)
            .field("elements", &(self.elements.len() / C::BYTES))
            .field("tail_bytes", &self.tail.len())
            .field("owned", &matches!(self.block, Cow::Owned(_)))
            .finish_non_exhaustive()
    }
}
