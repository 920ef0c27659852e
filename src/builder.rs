//! Filepath: src/builder.rs
//!
//! Offline builder: compiles sorted records into a double array and tail.
//!
//! The builder consumes records sorted strictly ascending by key bytes and
//! arranges them depth-first. Each interior node's BASE is found by walking
//! the vacant-slot list ([`crate::slots::VacantList`]) instead of probing
//! indices one by one; candidate rows are rejected when the BASE value is
//! already claimed ([`crate::slots::UsedBases`]) or any child slot is
//! occupied. Child slots are reserved with a tentative BASE of 1 before the
//! recursion descends, so deeper nodes cannot steal them.
//!
//! # Example
//!
//! ```rust
//! use sdatrie::{Builder, Record};
//!
//! let records = vec![
//!     Record { key: "one", value: 1_i32 },
//!     Record { key: "two", value: 2 },
//! ];
//! let mut builder: Builder<i32> = Builder::new();
//! builder.build(&records).unwrap();
//! let trie = builder.freeze();
//! assert_eq!(trie.get("one", -1), 1);
//! ```

use std::fmt as StdFmt;
use std::io::Write;
use std::marker::PhantomData;

use crate::container;
use crate::element::{Element5, ElementBuf, ElementCodec, INITIAL_INDEX};
use crate::slots::{UsedBases, VacantList};
use crate::table::CharTable;
use crate::tail::TailWriter;
use crate::tracing_helpers::debug_log;
use crate::trie::Trie;
use crate::value::TailValue;

// ============================================================================
//  Records
// ============================================================================

/// A (key, value) pair handed to the builder.
///
/// Keys are opaque NUL-free byte strings; any `AsRef<[u8]>` type works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<K, V> {
    /// The key of the record.
    pub key: K,
    /// The value of the record.
    pub value: V,
}

// ============================================================================
//  BuildError
// ============================================================================

/// Errors produced while compiling records into a trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The records are not sorted in strictly ascending key order.
    KeysOutOfOrder,

    /// Two records share the same key.
    DuplicateKey,

    /// A key contains an interior NUL byte, which collides with the
    /// implicit terminator.
    KeyContainsNul,

    /// A leaf's tail offset would exceed the element codec's BASE range.
    TailOverflow,

    /// A child row would exceed the element codec's BASE range.
    BaseOverflow,
}

impl StdFmt::Display for BuildError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::KeysOutOfOrder => {
                write!(f, "records are not sorted in ascending order of keys")
            }

            Self::DuplicateKey => write!(f, "duplicate keys detected"),

            Self::KeyContainsNul => write!(f, "key contains a NUL byte"),

            Self::TailOverflow => {
                write!(f, "the double array has no space to store leaves")
            }

            Self::BaseOverflow => {
                write!(f, "the double array has no space to store child nodes")
            }
        }
    }
}

impl std::error::Error for BuildError {}

// ============================================================================
//  BuildStats
// ============================================================================

/// Statistics of a finished build.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuildStats {
    /// Size, in bytes, of the double array.
    pub element_bytes: usize,
    /// Number of elements in the double array.
    pub element_count: usize,
    /// Number of elements actually in use.
    pub used_count: usize,
    /// Utilization ratio of the double array.
    pub usage: f64,
    /// Number of interior nodes.
    pub node_count: usize,
    /// Number of leaves (== number of records).
    pub leaf_count: usize,
    /// Total BASE-search trials across the whole build.
    pub base_trial_sum: usize,
    /// Average BASE-search trials per element.
    pub base_trial_avg: f64,
    /// Size, in bytes, of the tail array.
    pub tail_bytes: usize,
}

/// Progress callback: `(records_done, records_total)`, invoked once per leaf.
pub type ProgressFn = Box<dyn FnMut(usize, usize)>;

// ============================================================================
//  Builder
// ============================================================================

/// Compiles sorted records into a static double-array trie.
///
/// # Type Parameters
///
/// * `V` - The record value type (any [`TailValue`]).
/// * `C` - The element codec; [`Element5`] by default, `Element4` for the
///   compact 4-byte packing.
///
/// A builder that returned an error is in an unspecified partial state and
/// must be discarded.
pub struct Builder<V, C: ElementCodec = Element5> {
    da: ElementBuf<C>,
    tail: TailWriter,
    table: CharTable,
    used_bases: UsedBases,
    vlist: VacantList,
    stats: BuildStats,
    progress: Option<ProgressFn>,
    records_done: usize,
    records_total: usize,
    _value: PhantomData<fn() -> V>,
}

/// Per-child bookkeeping for one partition of [`Builder::arrange`].
#[derive(Debug, Clone, Copy)]
struct Child {
    /// The raw (unmapped) byte this child is reached by.
    c: u8,
    /// Slot offset within the parent's row: `table[c] + 1`.
    offset: usize,
    /// Start of the child's record run.
    first: usize,
    /// One past the end of the child's record run.
    last: usize,
}

impl<V: TailValue, C: ElementCodec> Builder<V, C> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            da: ElementBuf::new(),
            tail: TailWriter::new(),
            table: CharTable::identity(),
            used_bases: UsedBases::new(),
            vlist: VacantList::new(),
            stats: BuildStats::default(),
            progress: None,
            records_done: 0,
            records_total: 0,
            _value: PhantomData,
        }
    }

    /// Installs a progress callback, invoked once per stored leaf with
    /// `(records_done, records_total)`.
    pub fn set_progress(&mut self, callback: impl FnMut(usize, usize) + 'static) {
        self.progress = Some(Box::new(callback));
    }

    /// Builds the trie from records sorted strictly ascending by key bytes.
    ///
    /// # Errors
    ///
    /// - [`BuildError::KeysOutOfOrder`] / [`BuildError::DuplicateKey`] /
    ///   [`BuildError::KeyContainsNul`] for invalid input.
    /// - [`BuildError::TailOverflow`] / [`BuildError::BaseOverflow`] when the
    ///   structure outgrows the codec's BASE range.
    pub fn build<K: AsRef<[u8]>>(
        &mut self,
        records: &[Record<K, V>],
    ) -> Result<&BuildStats, BuildError> {
        self.clear();
        self.records_total = records.len();

        for rec in records {
            if rec.key.as_ref().contains(&0) {
                return Err(BuildError::KeyContainsNul);
            }
        }

        self.table = CharTable::from_keys(records.iter().map(|r| r.key.as_ref()));

        // Seed the root: element 1 carries a tentative BASE of 1 and leaves
        // the vacant list before any arrangement happens.
        self.da.expand(INITIAL_INDEX + 1);
        self.vlist.extend_to(INITIAL_INDEX + 1);
        self.da.set_base(INITIAL_INDEX, 1);
        self.vlist.reserve(INITIAL_INDEX);

        if !records.is_empty() {
            let root_base = self.arrange(0, records, 0, records.len())?;
            self.da.set_base(INITIAL_INDEX, root_base);
        }

        self.compute_stats();
        debug_log!(
            elements = self.stats.element_count,
            used = self.stats.used_count,
            tail_bytes = self.stats.tail_bytes,
            "double array built"
        );
        Ok(&self.stats)
    }

    /// Statistics of the last successful build.
    #[must_use]
    pub const fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Serializes the built trie as a chunked image to `w`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `w`.
    pub fn write(&self, w: &mut impl Write) -> std::io::Result<()> {
        container::write_image::<C>(
            w,
            self.table.as_raw(),
            self.da.as_bytes(),
            self.tail.as_bytes(),
            self.records_total,
        )
    }

    /// Serializes the built trie into an owned byte vector.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write(&mut out);
        out
    }

    /// Produces an owned [`Trie`] equivalent to serializing and reloading.
    #[must_use]
    #[expect(
        clippy::expect_used,
        reason = "an image this builder just wrote always parses"
    )]
    pub fn freeze(&self) -> Trie<'static, V, C> {
        Trie::from_vec(self.to_bytes()).expect("freshly serialized image must parse")
    }

    /// Resets the builder to its initial state.
    fn clear(&mut self) {
        self.table = CharTable::identity();
        self.da.clear();
        self.da.expand(1);
        self.tail.clear();
        self.vlist = VacantList::new();
        self.used_bases = UsedBases::new();
        self.stats = BuildStats::default();
        self.records_done = 0;
        self.records_total = 0;
    }

    /// Recursively arranges `records[first..last]`, whose keys agree on the
    /// first `depth` bytes, and returns the BASE value for the caller to
    /// store: negative (a tail offset) for a leaf, positive for an interior
    /// node.
    fn arrange<K: AsRef<[u8]>>(
        &mut self,
        depth: usize,
        records: &[Record<K, V>],
        first: usize,
        last: usize,
    ) -> Result<i32, BuildError> {
        // A single record becomes a leaf: the rest of its key and its value
        // go to the tail, and the negated offset becomes the BASE.
        if first + 1 == last {
            let rec = &records[first];
            let offset = self.tail.tellp();
            if offset > C::MAX_BASE as usize {
                return Err(BuildError::TailOverflow);
            }
            self.tail.write_cstring(&rec.key.as_ref()[depth..]);
            rec.value.encode(&mut self.tail);

            self.records_done += 1;
            if let Some(callback) = &mut self.progress {
                callback(self.records_done, self.records_total);
            }
            self.stats.leaf_count += 1;
            return Ok(-(offset as i32));
        }

        let children = Self::partition(depth, records, first, last, &self.table)?;
        let base = self.find_base(&children)?;

        // Reserve every child slot with a tentative BASE of 1 before
        // descending; the recursion must not hand these slots to deeper
        // nodes.
        self.used_bases.insert(base);
        for child in &children {
            self.da.set_base(base + child.offset, 1);
            self.vlist.reserve(base + child.offset);
        }

        for child in &children {
            let slot = base + child.offset;
            if child.c != 0 {
                let child_base = self.arrange(depth + 1, records, child.first, child.last)?;
                self.da.set_base(slot, child_base);
            } else {
                // Terminator child: this key ends here while siblings
                // continue. Recursing at the same depth forces an empty
                // postfix record into the tail.
                if child.first + 1 != child.last {
                    return Err(BuildError::DuplicateKey);
                }
                let child_base = self.arrange(depth, records, child.first, child.last)?;
                self.da.set_base(slot, child_base);
            }
            self.da.set_check(slot, (child.offset - 1) as u8);
        }

        self.stats.node_count += 1;
        Ok(base as i32)
    }

    /// Splits `records[first..last]` into maximal runs sharing the byte at
    /// `depth`. The run bytes must be strictly ascending.
    fn partition<K: AsRef<[u8]>>(
        depth: usize,
        records: &[Record<K, V>],
        first: usize,
        last: usize,
        table: &CharTable,
    ) -> Result<Vec<Child>, BuildError> {
        let mut children: Vec<Child> = Vec::new();
        let mut prev: i32 = -1;

        for i in first..last {
            let key = records[i].key.as_ref();
            let c = key.get(depth).copied().unwrap_or(0);
            match i32::from(c).cmp(&prev) {
                std::cmp::Ordering::Greater => {
                    if let Some(open) = children.last_mut() {
                        open.last = i;
                    }
                    children.push(Child {
                        c,
                        offset: table.slot_offset(c),
                        first: i,
                        last,
                    });
                    prev = i32::from(c);
                }
                std::cmp::Ordering::Equal => {}
                std::cmp::Ordering::Less => return Err(BuildError::KeysOutOfOrder),
            }
        }
        // The final run extends to `last` already.
        Ok(children)
    }

    /// Walks the vacant list for the smallest BASE whose child row is
    /// entirely free and whose value is unclaimed.
    fn find_base(&mut self, children: &[Child]) -> Result<usize, BuildError> {
        let off_first = children[0].offset;
        let off_max = children.iter().map(|ch| ch.offset).max().unwrap_or(0);

        let mut index = 0;
        let base = loop {
            self.stats.base_trial_sum += 1;
            index = self.vlist.next_vacant(index);

            // BASE values start at MIN_BASE; indices below that row are
            // unusable for the first child.
            if index < INITIAL_INDEX + off_first {
                continue;
            }
            let base = index - off_first;
            if self.used_bases.contains(base) {
                continue;
            }

            self.da.expand(base + off_max + 1);
            self.vlist.extend_to(base + off_max + 1);

            if children[1..]
                .iter()
                .all(|ch| !self.da.in_use(base + ch.offset))
            {
                break base;
            }
        };

        if base + off_max >= C::MAX_BASE as usize {
            return Err(BuildError::BaseOverflow);
        }
        Ok(base)
    }

    fn compute_stats(&mut self) {
        self.stats.element_bytes = self.da.as_bytes().len();
        self.stats.element_count = self.da.len();
        self.stats.used_count = (0..self.da.len()).filter(|&i| self.da.in_use(i)).count();
        self.stats.usage = self.stats.used_count as f64 / self.stats.element_count as f64;
        self.stats.tail_bytes = self.tail.as_bytes().len();
        self.stats.base_trial_avg =
            self.stats.base_trial_sum as f64 / self.stats.element_count as f64;
    }
}

impl<V: TailValue, C: ElementCodec> Default for Builder<V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C: ElementCodec> StdFmt::Debug for Builder<V, C> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Builder")
            .field("elements", &self.da.len())
            .field("tail_bytes", &self.tail.as_bytes().len())
            .field("records_done", &self.records_done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element4, ElementView, INVALID_INDEX};

    fn records(pairs: &[(&str, i32)]) -> Vec<Record<String, i32>> {
        pairs
            .iter()
            .map(|&(k, v)| Record {
                key: k.to_string(),
                value: v,
            })
            .collect()
    }

    fn build(pairs: &[(&str, i32)]) -> Builder<i32> {
        let mut builder: Builder<i32> = Builder::new();
        builder.build(&records(pairs)).unwrap();
        builder
    }

    #[test]
    fn test_rejects_unsorted() {
        let mut builder: Builder<i32> = Builder::new();
        let err = builder.build(&records(&[("b", 1), ("a", 2)])).unwrap_err();
        assert_eq!(err, BuildError::KeysOutOfOrder);
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut builder: Builder<i32> = Builder::new();
        let err = builder.build(&records(&[("a", 1), ("a", 2)])).unwrap_err();
        assert_eq!(err, BuildError::DuplicateKey);
    }

    #[test]
    fn test_rejects_nul_in_key() {
        let mut builder: Builder<i32> = Builder::new();
        let recs = vec![Record {
            key: b"a\0b".to_vec(),
            value: 1,
        }];
        assert_eq!(builder.build(&recs).unwrap_err(), BuildError::KeyContainsNul);
    }

    #[test]
    fn test_deep_unsorted_detected() {
        let mut builder: Builder<i32> = Builder::new();
        let err = builder
            .build(&records(&[("ab", 1), ("aa", 2)]))
            .unwrap_err();
        assert_eq!(err, BuildError::KeysOutOfOrder);
    }

    #[test]
    fn test_stats_counts() {
        let builder = build(&[("eight", 8), ("five", 5), ("four", 4), ("nine", 9)]);
        let stats = builder.stats();
        assert_eq!(stats.leaf_count, 4);
        assert!(stats.node_count >= 1);
        assert!(stats.usage > 0.0 && stats.usage <= 1.0);
        assert_eq!(stats.element_bytes, stats.element_count * 5);
        assert!(stats.tail_bytes > 1);
    }

    #[test]
    fn test_progress_callback_fires_per_leaf() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen: Rc<RefCell<Vec<(usize, usize)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut builder: Builder<i32> = Builder::new();
        builder.set_progress(move |done, total| sink.borrow_mut().push((done, total)));
        builder
            .build(&records(&[("a", 1), ("b", 2), ("c", 3)]))
            .unwrap();

        assert_eq!(&*seen.borrow(), &[(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_empty_input_builds() {
        let mut builder: Builder<i32> = Builder::new();
        let stats = builder.build(&records(&[])).unwrap();
        assert_eq!(stats.leaf_count, 0);
        let trie = builder.freeze();
        assert!(!trie.contains(""));
        assert!(!trie.contains("a"));
    }

    #[test]
    fn test_single_record_root_is_leaf() {
        let builder = build(&[("solo", 7)]);
        let trie = builder.freeze();
        assert_eq!(trie.find("solo"), Some(7));
        assert_eq!(trie.find("sol"), None);
        assert_eq!(trie.find("soloX"), None);
    }

    #[test]
    fn test_idempotent_output() {
        let pairs = [("a", 1), ("ab", 2), ("abc", 3), ("b", 4)];
        let one = build(&pairs).to_bytes();
        let two = build(&pairs).to_bytes();
        assert_eq!(one, two);
    }

    #[test]
    fn test_compact_codec_builds() {
        let mut builder: Builder<i32, Element4> = Builder::new();
        builder.build(&records(&[("k", 1)])).unwrap();
        assert_eq!(builder.freeze().find("k"), Some(1));
    }

    /// Walks the finished double array and asserts the structural
    /// invariants: CHECK backward links, BASE uniqueness among interior
    /// nodes, and leaf offsets addressing NUL-terminated tail postfixes.
    #[test]
    fn test_structural_invariants_after_build() {
        let pairs = [
            ("", 0),
            ("a", 1),
            ("ab", 2),
            ("abc", 3),
            ("abd", 4),
            ("b", 5),
            ("bcde", 6),
            ("xyz", 7),
        ];
        let builder = build(&pairs);

        let view: ElementView<'_, Element5> = ElementView::new(builder.da.as_bytes());
        let tail = builder.tail.as_bytes();
        let table = &builder.table;

        let mut seen_bases = std::collections::HashSet::new();
        let mut stack = vec![INITIAL_INDEX];
        let mut leaves = 0usize;

        while let Some(node) = stack.pop() {
            let base = view.base(node);
            assert_ne!(base, 0, "reachable element must not be vacant");

            if base < 0 {
                let offset = (-base) as usize;
                assert!(offset > 0 && offset < tail.len(), "leaf offset in range");
                assert!(
                    tail[offset..].contains(&0),
                    "leaf postfix must be NUL-terminated"
                );
                leaves += 1;
                continue;
            }

            assert!(
                seen_bases.insert(base),
                "two interior nodes share BASE {base}"
            );
            for c in 0..=255u8 {
                let slot = table.map(c);
                let child = base as usize + slot as usize + 1;
                if child != INVALID_INDEX
                    && child < view.len()
                    && view.check(child) == slot
                    && view.base(child) != 0
                {
                    stack.push(child);
                }
            }
        }

        assert_eq!(leaves, pairs.len());
    }
}
