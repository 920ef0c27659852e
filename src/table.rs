//! Filepath: src/table.rs
//!
//! Character table: a permutation of byte values chosen by corpus frequency.
//!
//! Children of a node with BASE `b` live at `b + table[c] + 1`. Remapping
//! frequent bytes to small slot values keeps child rows short, which
//! densifies the double array. Byte 0 is the key terminator and always maps
//! to slot 0, so `b + 1` is the natural "key ends here" position.

/// Number of distinct byte values.
pub const NUM_CHARS: usize = 256;

/// A bijection `0..=255 -> 0..=255` with `table[0] == 0`.
#[derive(Clone)]
pub struct CharTable {
    map: [u8; NUM_CHARS],
}

impl CharTable {
    /// The identity permutation; used by a reader until a `TBLU` chunk
    /// replaces it.
    #[must_use]
    pub fn identity() -> Self {
        let mut map = [0u8; NUM_CHARS];
        for (i, slot) in map.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self { map }
    }

    /// Builds the frequency permutation from a key corpus.
    ///
    /// Bytes `1..=255` are ranked by descending occurrence count across all
    /// keys (ties broken by ascending byte value) and assigned slots
    /// `1..=255` in rank order. Byte 0 keeps slot 0.
    #[must_use]
    pub fn from_keys<K: AsRef<[u8]>>(keys: impl Iterator<Item = K>) -> Self {
        let mut freq = [0u64; NUM_CHARS];
        for key in keys {
            for &b in key.as_ref() {
                freq[b as usize] += 1;
            }
        }

        let mut ranked: Vec<u8> = (1..=255).collect();
        ranked.sort_by_key(|&c| (std::cmp::Reverse(freq[c as usize]), c));

        let mut map = [0u8; NUM_CHARS];
        for (rank, &c) in ranked.iter().enumerate() {
            map[c as usize] = (rank + 1) as u8;
        }
        Self { map }
    }

    /// Restores a table from its serialized 256-byte form.
    #[must_use]
    pub const fn from_raw(map: [u8; NUM_CHARS]) -> Self {
        Self { map }
    }

    /// The remapped value of byte `c`.
    #[inline]
    #[must_use]
    pub const fn map(&self, c: u8) -> u8 {
        self.map[c as usize]
    }

    /// The slot offset of byte `c` within a child row: `table[c] + 1`.
    #[inline]
    #[must_use]
    pub const fn slot_offset(&self, c: u8) -> usize {
        self.map[c as usize] as usize + 1
    }

    /// The serialized 256-byte form.
    #[inline]
    #[must_use]
    pub const fn as_raw(&self) -> &[u8; NUM_CHARS] {
        &self.map
    }
}

impl std::fmt::Debug for CharTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharTable").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bijection(t: &CharTable) {
        let mut seen = [false; NUM_CHARS];
        for c in 0..=255u8 {
            let m = t.map(c) as usize;
            assert!(!seen[m], "slot {m} assigned twice");
            seen[m] = true;
        }
    }

    #[test]
    fn test_identity() {
        let t = CharTable::identity();
        assert_bijection(&t);
        assert_eq!(t.map(0), 0);
        assert_eq!(t.map(b'a'), b'a');
        assert_eq!(t.slot_offset(b'a'), b'a' as usize + 1);
    }

    #[test]
    fn test_frequency_ranking() {
        // 'b' occurs three times, 'a' twice, 'c' once.
        let t = CharTable::from_keys([b"ba".as_slice(), b"bcb", b"a"].into_iter());
        assert_bijection(&t);
        assert_eq!(t.map(0), 0);
        assert_eq!(t.map(b'b'), 1);
        assert_eq!(t.map(b'a'), 2);
        assert_eq!(t.map(b'c'), 3);
    }

    #[test]
    fn test_terminator_pinned_even_when_rare() {
        // A single key where 'x' dominates; slot 0 still belongs to byte 0.
        let t = CharTable::from_keys([b"xxxxxxxx".as_slice()].into_iter());
        assert_eq!(t.map(0), 0);
        assert_eq!(t.map(b'x'), 1);
        assert_bijection(&t);
    }

    #[test]
    fn test_ties_break_by_byte_value() {
        let t = CharTable::from_keys(std::iter::empty::<&[u8]>());
        assert_bijection(&t);
        // With no corpus every byte has frequency 0: ranks follow byte order.
        for c in 0..=255u8 {
            assert_eq!(t.map(c), c);
        }
    }
}
