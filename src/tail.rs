//! Filepath: src/tail.rs
//!
//! Tail array: the append-only byte region holding leaf postfixes and
//! serialized values.
//!
//! The builder writes through [`TailWriter`]; each leaf stores its key
//! postfix as a NUL-terminated string immediately followed by the encoded
//! value. The reader side, [`TailReader`], is a cheap positional cursor over
//! a borrowed byte slice; lookups create one on the stack per query, so the
//! trie itself stays immutable and freely shareable.

/// Little-endian fixed-width scalars storable in the tail.
///
/// Widths are deterministic: encoding then decoding always consumes exactly
/// [`Scalar::WIDTH`] bytes, which is what keeps tail offsets computable.
pub trait Scalar: Sized + Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Appends the little-endian representation to `out`.
    fn put_le(self, out: &mut Vec<u8>);

    /// Reads the value from `src` (exactly `WIDTH` bytes).
    fn get_le(src: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Scalar for $ty {
            const WIDTH: usize = size_of::<$ty>();

            #[inline]
            fn put_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn get_le(src: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$ty>()];
                buf.copy_from_slice(&src[..size_of::<$ty>()]);
                Self::from_le_bytes(buf)
            }
        }
    )*};
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Append-only writer for the tail array.
///
/// A fresh writer holds a single zero byte so that offset 0 never addresses
/// a real leaf; every leaf offset handed out by the builder is therefore
/// strictly positive.
#[derive(Debug, Clone)]
pub struct TailWriter {
    buf: Vec<u8>,
}

impl TailWriter {
    /// Creates a writer seeded with the reserved zero byte.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: vec![0] }
    }

    /// Current write position, i.e. the offset the next write lands at.
    #[inline]
    #[must_use]
    pub fn tellp(&self) -> usize {
        self.buf.len()
    }

    /// The accumulated tail bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Resets the writer to its initial single-zero-byte state.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.buf.push(0);
    }

    /// Appends raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Appends a little-endian scalar.
    pub fn write_scalar<T: Scalar>(&mut self, value: T) {
        value.put_le(&mut self.buf);
    }

    /// Appends `s` followed by a terminating NUL.
    ///
    /// `s` must not itself contain a NUL; the builder validates keys before
    /// any tail write.
    pub fn write_cstring(&mut self, s: &[u8]) {
        self.buf.extend_from_slice(s);
        self.buf.push(0);
    }
}

impl Default for TailWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Positional reader over a tail region.
///
/// Reads past the end of the region yield zeroes / empty slices rather than
/// failing; a well-formed image never reaches them, and lookup paths must
/// stay pure.
#[derive(Debug, Clone, Copy)]
pub struct TailReader<'a> {
    block: &'a [u8],
    offset: usize,
}

impl<'a> TailReader<'a> {
    /// Wraps a tail region.
    #[must_use]
    pub const fn new(block: &'a [u8]) -> Self {
        Self { block, offset: 0 }
    }

    /// Moves the read position. Offsets past the end of the region are
    /// ignored, matching the saturating read semantics; the position one
    /// past the last byte is allowed so a zero-width value stored last can
    /// still be addressed.
    pub fn seekg(&mut self, offset: usize) {
        if offset <= self.block.len() {
            self.offset = offset;
        }
    }

    /// Current read position.
    #[inline]
    #[must_use]
    pub const fn tellg(&self) -> usize {
        self.offset
    }

    /// Number of bytes from the current position up to (excluding) the next
    /// NUL, or to the end of the region if no NUL follows.
    #[must_use]
    pub fn strlen(&self) -> usize {
        let rest = &self.block[self.offset.min(self.block.len())..];
        rest.iter().position(|&b| b == 0).unwrap_or(rest.len())
    }

    /// Reads `n` raw bytes, advancing the cursor. Returns an empty slice if
    /// fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> &'a [u8] {
        match self.block.get(self.offset..self.offset + n) {
            Some(bytes) => {
                self.offset += n;
                bytes
            }
            None => &[],
        }
    }

    /// Reads a little-endian scalar, advancing the cursor. Yields the zero
    /// value if the region is exhausted.
    pub fn read_scalar<T: Scalar>(&mut self) -> T {
        match self.block.get(self.offset..self.offset + T::WIDTH) {
            Some(bytes) => {
                self.offset += T::WIDTH;
                T::get_le(bytes)
            }
            None => T::get_le(&[0u8; 16][..T::WIDTH]),
        }
    }

    /// Reads a NUL-terminated string (without the NUL), advancing the cursor
    /// past the terminator.
    pub fn read_cstring(&mut self) -> &'a [u8] {
        let len = self.strlen();
        let start = self.offset;
        let bytes = &self.block[start..start + len];
        // Skip the terminator too, unless we ran off the end.
        self.offset = (start + len + 1).min(self.block.len());
        bytes
    }

    /// Exact match: the NUL-terminated string stored at the current position
    /// equals `s` (terminator included in the comparison).
    #[must_use]
    pub fn match_string(&self, s: &[u8]) -> bool {
        let end = self.offset + s.len();
        match self.block.get(self.offset..=end) {
            Some(stored) => &stored[..s.len()] == s && stored[s.len()] == 0,
            None => false,
        }
    }

    /// Prefix match: the NUL-terminated string stored at the current
    /// position is a byte prefix of `s`.
    ///
    /// This is the primitive behind prefix enumeration; the stored postfix
    /// may be empty, in which case any `s` matches.
    #[must_use]
    pub fn match_string_partial(&self, s: &[u8]) -> bool {
        let len = self.strlen();
        if self.offset + len >= self.block.len() {
            // No terminator inside the region: malformed tail.
            return false;
        }
        len <= s.len() && self.block[self.offset..self.offset + len] == s[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reserves_offset_zero() {
        let w = TailWriter::new();
        assert_eq!(w.tellp(), 1);
        assert_eq!(w.as_bytes(), &[0]);
    }

    #[test]
    fn test_write_cstring_and_scalar() {
        let mut w = TailWriter::new();
        w.write_cstring(b"abc");
        w.write_scalar(0x0807_0605_i32);
        assert_eq!(w.as_bytes(), &[0, b'a', b'b', b'c', 0, 5, 6, 7, 8]);
        assert_eq!(w.tellp(), 9);
    }

    #[test]
    fn test_clear_restores_initial_state() {
        let mut w = TailWriter::new();
        w.write_cstring(b"xyz");
        w.clear();
        assert_eq!(w.as_bytes(), &[0]);
    }

    #[test]
    fn test_reader_strlen_and_seek() {
        let block = [0u8, b'h', b'i', 0, 42];
        let mut r = TailReader::new(&block);
        r.seekg(1);
        assert_eq!(r.strlen(), 2);
        assert_eq!(r.tellg(), 1);

        // Out-of-range seeks are ignored.
        r.seekg(100);
        assert_eq!(r.tellg(), 1);
    }

    #[test]
    fn test_match_string_exact() {
        let block = [0u8, b'o', b'n', b'e', 0, 1, 0, 0, 0];
        let mut r = TailReader::new(&block);
        r.seekg(1);
        assert!(r.match_string(b"one"));
        assert!(!r.match_string(b"on"));
        assert!(!r.match_string(b"ones"));
        assert!(!r.match_string(b"two"));
    }

    #[test]
    fn test_match_string_at_region_end() {
        // Postfix + terminator end exactly at the region boundary; a
        // zero-width value stored last must still match.
        let block = [0u8, b'a', 0];
        let mut r = TailReader::new(&block);
        r.seekg(1);
        assert!(r.match_string(b"a"));
    }

    #[test]
    fn test_match_string_partial() {
        let block = [0u8, b'a', b'b', 0, 9];
        let mut r = TailReader::new(&block);
        r.seekg(1);
        assert!(r.match_string_partial(b"abc"));
        assert!(r.match_string_partial(b"ab"));
        assert!(!r.match_string_partial(b"a"));
        assert!(!r.match_string_partial(b"xy"));
    }

    #[test]
    fn test_match_string_partial_empty_postfix() {
        let block = [0u8, 0, 7];
        let mut r = TailReader::new(&block);
        r.seekg(1);
        assert!(r.match_string_partial(b"anything"));
        assert!(r.match_string_partial(b""));
    }

    #[test]
    fn test_read_scalar_roundtrip() {
        let mut w = TailWriter::new();
        w.write_scalar(3.5_f64);
        w.write_scalar(u16::MAX);

        let mut r = TailReader::new(w.as_bytes());
        r.seekg(1);
        assert_eq!(r.read_scalar::<f64>(), 3.5);
        assert_eq!(r.read_scalar::<u16>(), u16::MAX);
    }

    #[test]
    fn test_read_past_end_yields_zero() {
        let block = [0u8, 1];
        let mut r = TailReader::new(&block);
        r.seekg(1);
        assert_eq!(r.read_scalar::<u64>(), 0);
        assert_eq!(r.read_bytes(10), &[] as &[u8]);
    }

    #[test]
    fn test_read_cstring() {
        let block = [0u8, b'h', b'i', 0, b'!', 0];
        let mut r = TailReader::new(&block);
        r.seekg(1);
        assert_eq!(r.read_cstring(), b"hi");
        assert_eq!(r.read_cstring(), b"!");
    }
}
