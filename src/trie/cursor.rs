//! Filepath: src/trie/cursor.rs
//!
//! Prefix cursor: lazy enumeration of stored keys that are prefixes of a
//! query.
//!
//! The cursor walks the query byte by byte. On arrival at each interior node
//! it probes the terminator transition: when a stored key ends exactly
//! where the walk stands, the terminator child is a leaf whose tail postfix
//! is empty and whose value follows the lone NUL. A leaf child instead ends
//! the walk with a partial tail match. Yields come out in ascending length
//! order because the walk itself does.
//!
//! All walk state lives in the cursor; the trie is only read.

use std::fmt as StdFmt;

use crate::element::{ElementCodec, ElementView, INITIAL_INDEX};
use crate::trie::Trie;
use crate::value::TailValue;

// ============================================================================
//  Corruption
// ============================================================================

/// Structural violations discovered while probing terminator transitions.
///
/// These cannot arise from images produced by the builder; hitting one means
/// the serialized image is malformed, and the query cannot be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// A terminator transition led to an interior node; it must always lead
    /// to a leaf.
    TerminatorNotLeaf {
        /// Element index of the offending node.
        index: usize,
    },

    /// A terminator leaf's tail postfix is not empty.
    TerminatorPostfixNotEmpty {
        /// Element index of the offending leaf.
        index: usize,
    },
}

impl StdFmt::Display for Corruption {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::TerminatorNotLeaf { index } => {
                write!(f, "terminator transition at element {index} is not a leaf")
            }

            Self::TerminatorPostfixNotEmpty { index } => {
                write!(
                    f,
                    "terminator leaf at element {index} stores a non-empty postfix"
                )
            }
        }
    }
}

impl std::error::Error for Corruption {}

// ============================================================================
//  PrefixCursor
// ============================================================================

/// One yielded prefix: the first `length` bytes of the query form a stored
/// key carrying `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefixMatch<V> {
    /// Length of the matched prefix within the query.
    pub length: usize,
    /// The stored value.
    pub value: V,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Advancing,
    Done,
}

/// A stateful enumerator over the stored prefixes of one query.
///
/// Obtained from [`Trie::prefix`]; call [`PrefixCursor::next`] until it
/// returns `Ok(None)`. Successive calls resume exactly where the previous
/// yield stopped.
pub struct PrefixCursor<'t, V, C: ElementCodec> {
    trie: &'t Trie<'t, V, C>,
    query: &'t [u8],
    /// Bytes of the query consumed so far; on a yield, the matched prefix
    /// length.
    length: usize,
    /// Current node index.
    cur: usize,
    state: State,
}

impl<'t, V, C: ElementCodec> PrefixCursor<'t, V, C> {
    pub(crate) const fn new(trie: &'t Trie<'t, V, C>, query: &'t [u8]) -> Self {
        Self {
            trie,
            query,
            length: 0,
            cur: INITIAL_INDEX,
            state: State::Fresh,
        }
    }

    /// The query this cursor enumerates prefixes of.
    #[must_use]
    pub const fn query(&self) -> &'t [u8] {
        self.query
    }
}

impl<'t, V: TailValue, C: ElementCodec> PrefixCursor<'t, V, C> {
    /// Advances to the next stored prefix.
    ///
    /// # Errors
    ///
    /// [`Corruption`] when the image violates the terminator-leaf structure;
    /// the cursor is finished afterwards.
    pub fn next(&mut self) -> Result<Option<PrefixMatch<V>>, Corruption> {
        if self.state == State::Done {
            return Ok(None);
        }

        let view = self.trie.view();
        if view.len() <= INITIAL_INDEX {
            self.state = State::Done;
            return Ok(None);
        }

        if self.state == State::Fresh {
            self.state = State::Advancing;

            let root_base = view.base(INITIAL_INDEX);
            if root_base < 0 {
                // Single-record trie: the root is the only leaf.
                self.state = State::Done;
                return Ok(self.match_leaf((-root_base) as usize));
            }
            // The root's terminator child holds the empty key, the prefix of
            // everything.
            if let Some(value_at) = self.probe_terminator(&view, INITIAL_INDEX)? {
                return Ok(Some(PrefixMatch {
                    length: 0,
                    value: self.trie.decode_value(value_at),
                }));
            }
        }

        loop {
            if self.length >= self.query.len() {
                self.state = State::Done;
                return Ok(None);
            }

            let c = self.query[self.length];
            let Some(next) = self.trie.descend(&view, self.cur, c) else {
                self.state = State::Done;
                return Ok(None);
            };
            self.cur = next;

            let base = view.base(next);
            if base < 0 {
                // A leaf holds at most one more stored prefix; either way
                // the walk ends here.
                self.length += 1;
                self.state = State::Done;
                return Ok(self.match_leaf((-base) as usize));
            }

            match self.probe_terminator(&view, next)? {
                Some(value_at) => {
                    self.length += 1;
                    return Ok(Some(PrefixMatch {
                        length: self.length,
                        value: self.trie.decode_value(value_at),
                    }));
                }
                None => self.length += 1,
            }
        }
    }

    /// Exhausts the cursor, collecting every remaining match.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Corruption`] hit.
    pub fn collect_matches(mut self) -> Result<Vec<PrefixMatch<V>>, Corruption> {
        let mut matches = Vec::new();
        while let Some(m) = self.next()? {
            matches.push(m);
        }
        Ok(matches)
    }

    /// Probes `node`'s terminator transition. Returns the tail offset of the
    /// stored value when a key ends exactly at `node`.
    fn probe_terminator(
        &self,
        view: &ElementView<'_, C>,
        node: usize,
    ) -> Result<Option<usize>, Corruption> {
        let Some(target) = self.trie.descend(view, node, 0) else {
            return Ok(None);
        };

        let base = view.base(target);
        if base == 0 {
            // A vacant element aliases the zero CHECK byte; no key ends
            // here.
            return Ok(None);
        }
        if base > 0 {
            return Err(Corruption::TerminatorNotLeaf { index: target });
        }

        let offset = (-base) as usize;
        let mut tail = self.trie.tail_reader();
        tail.seekg(offset);
        if tail.strlen() != 0 {
            return Err(Corruption::TerminatorPostfixNotEmpty { index: target });
        }
        Ok(Some(offset + 1))
    }

    /// Final step on a leaf: the stored postfix must be a byte prefix of the
    /// unconsumed query remainder.
    fn match_leaf(&mut self, offset: usize) -> Option<PrefixMatch<V>> {
        let mut tail = self.trie.tail_reader();
        tail.seekg(offset);
        if !tail.match_string_partial(&self.query[self.length..]) {
            return None;
        }
        let postfix_len = tail.strlen();
        self.length += postfix_len;
        Some(PrefixMatch {
            length: self.length,
            value: self.trie.decode_value(offset + postfix_len + 1),
        })
    }
}

// All cursor state is copied explicitly; a clone resumes independently from
// the same position.
impl<V, C: ElementCodec> Clone for PrefixCursor<'_, V, C> {
    fn clone(&self) -> Self {
        Self {
            trie: self.trie,
            query: self.query,
            length: self.length,
            cur: self.cur,
            state: self.state,
        }
    }
}

impl<V, C: ElementCodec> StdFmt::Debug for PrefixCursor<'_, V, C> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("PrefixCursor")
            .field("length", &self.length)
            .field("cur", &self.cur)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{Builder, Record};
    use crate::trie::Trie;

    fn trie_of(pairs: &[(&str, i32)]) -> Trie<'static, i32> {
        let records: Vec<Record<&str, i32>> = pairs
            .iter()
            .map(|&(key, value)| Record { key, value })
            .collect();
        let mut builder: Builder<i32> = Builder::new();
        builder.build(&records).unwrap();
        builder.freeze()
    }

    fn prefixes(trie: &Trie<'static, i32>, query: &str) -> Vec<(String, i32)> {
        let query_bytes = query.as_bytes();
        trie.prefix(query_bytes)
            .collect_matches()
            .unwrap()
            .into_iter()
            .map(|m| {
                (
                    String::from_utf8(query_bytes[..m.length].to_vec()).unwrap(),
                    m.value,
                )
            })
            .collect()
    }

    #[test]
    fn test_nested_prefixes_in_order() {
        let trie = trie_of(&[("a", 1), ("ab", 2), ("abc", 3)]);
        assert_eq!(
            prefixes(&trie, "abcdef"),
            vec![
                ("a".to_string(), 1),
                ("ab".to_string(), 2),
                ("abc".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_query_equal_to_stored_key() {
        let trie = trie_of(&[("a", 1), ("ab", 2), ("abc", 3)]);
        assert_eq!(
            prefixes(&trie, "ab"),
            vec![("a".to_string(), 1), ("ab".to_string(), 2)]
        );
    }

    #[test]
    fn test_no_matches() {
        let trie = trie_of(&[("north", 1), ("south", 2)]);
        assert!(prefixes(&trie, "east").is_empty());
        assert!(prefixes(&trie, "").is_empty());
        assert!(prefixes(&trie, "nort").is_empty());
    }

    #[test]
    fn test_empty_key_yields_first() {
        let trie = trie_of(&[("", 0), ("x", 1)]);
        assert_eq!(
            prefixes(&trie, "xyz"),
            vec![(String::new(), 0), ("x".to_string(), 1)]
        );
        assert_eq!(prefixes(&trie, ""), vec![(String::new(), 0)]);
    }

    #[test]
    fn test_single_record_trie() {
        let trie = trie_of(&[("solo", 9)]);
        assert_eq!(prefixes(&trie, "solo"), vec![("solo".to_string(), 9)]);
        assert_eq!(prefixes(&trie, "soloist"), vec![("solo".to_string(), 9)]);
        assert!(prefixes(&trie, "sol").is_empty());
    }

    #[test]
    fn test_cursor_resumes_between_yields() {
        let trie = trie_of(&[("a", 1), ("ab", 2)]);
        let query = b"abc";
        let mut cursor = trie.prefix(query);

        let first = cursor.next().unwrap().unwrap();
        assert_eq!((first.length, first.value), (1, 1));

        // A clone picks up from the same spot without disturbing the
        // original.
        let mut forked = cursor.clone();
        let second = cursor.next().unwrap().unwrap();
        assert_eq!((second.length, second.value), (2, 2));
        assert!(cursor.next().unwrap().is_none());

        let second_again = forked.next().unwrap().unwrap();
        assert_eq!((second_again.length, second_again.value), (2, 2));
    }
}
