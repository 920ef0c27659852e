//! Filepath: src/container.rs
//!
//! Chunked container format for serialized tries.
//!
//! An image is an outer `SDAT` chunk enclosing three inner chunks:
//!
//! ```text
//! "SDAT" u32:total_size u32:header_size(16) u32:record_count
//! "TBLU" u32:size   256 bytes of character table
//! "SDA4"/"SDA5" u32:size   raw element bytes
//! "TAIL" u32:size   raw tail bytes
//! ```
//!
//! Every integer is little-endian; every inner chunk size includes its own
//! 8-byte header. The reader dispatches on tags, accepts the inner chunks in
//! any order and skips unknown ones, so images stay forward-compatible with
//! additional sections.

use std::fmt as StdFmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;

use crate::element::ElementCodec;
use crate::table::NUM_CHARS;
use crate::tracing_helpers::{debug_log, trace_log};

/// Size of an inner chunk header: 4-byte tag + u32 size.
pub const CHUNK_HEADER: usize = 8;

/// Size of the outer `SDAT` header.
pub const SDAT_HEADER: usize = 16;

const SDAT_TAG: [u8; 4] = *b"SDAT";
const TBLU_TAG: [u8; 4] = *b"TBLU";
const TAIL_TAG: [u8; 4] = *b"TAIL";

// ============================================================================
//  ImageError
// ============================================================================

/// Errors produced while reading a serialized image.
#[derive(Debug)]
pub enum ImageError {
    /// The block is smaller than its headers claim.
    TooSmall,

    /// The outer chunk tag is not `SDAT`.
    BadOuterTag,

    /// The `SDAT` self-size field is wrong.
    BadHeaderSize,

    /// An inner chunk has an impossible size or is cut short.
    BadChunk,

    /// The element or tail chunk is missing.
    MissingChunks,

    /// The underlying stream failed.
    Io(std::io::Error),
}

impl StdFmt::Display for ImageError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::TooSmall => write!(f, "image block is truncated"),

            Self::BadOuterTag => write!(f, "missing SDAT tag"),

            Self::BadHeaderSize => write!(f, "unexpected SDAT header size"),

            Self::BadChunk => write!(f, "malformed inner chunk"),

            Self::MissingChunks => write!(f, "image lacks an element or tail chunk"),

            Self::Io(err) => write!(f, "image read failed: {err}"),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

// ============================================================================
//  Parsing
// ============================================================================

/// Regions of one parsed image. Ranges index the original block, so holding
/// a `RawImage` next to its block is all a zero-copy reader needs.
#[derive(Debug, Clone)]
pub(crate) struct RawImage {
    /// Character table bytes, if a well-sized `TBLU` chunk was present.
    pub table: Option<[u8; NUM_CHARS]>,
    /// Element region.
    pub elements: Range<usize>,
    /// Tail region.
    pub tail: Range<usize>,
    /// Number of records, from the `SDAT` header.
    pub records: usize,
    /// Bytes of the block consumed by this image.
    pub total: usize,
}

fn read_u32(block: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([block[at], block[at + 1], block[at + 2], block[at + 3]])
}

fn tag_at(block: &[u8], at: usize) -> [u8; 4] {
    [block[at], block[at + 1], block[at + 2], block[at + 3]]
}

/// Parses an image in place. `block` may extend past the image; the image's
/// own total-size field decides how much is consumed.
pub(crate) fn parse_image<C: ElementCodec>(block: &[u8]) -> Result<RawImage, ImageError> {
    if block.len() < SDAT_HEADER {
        return Err(ImageError::TooSmall);
    }
    if tag_at(block, 0) != SDAT_TAG {
        return Err(ImageError::BadOuterTag);
    }

    let total = read_u32(block, 4) as usize;
    if total < SDAT_HEADER || total > block.len() {
        return Err(ImageError::TooSmall);
    }
    if read_u32(block, 8) as usize != SDAT_HEADER {
        return Err(ImageError::BadHeaderSize);
    }
    let records = read_u32(block, 12) as usize;

    let mut table = None;
    let mut elements = None;
    let mut tail = None;

    let mut p = SDAT_HEADER;
    while p < total {
        if total - p < CHUNK_HEADER {
            return Err(ImageError::BadChunk);
        }
        let tag = tag_at(block, p);
        let size = read_u32(block, p + 4) as usize;
        if size < CHUNK_HEADER || size > total - p {
            return Err(ImageError::BadChunk);
        }
        let data = p + CHUNK_HEADER..p + size;

        if tag == TBLU_TAG {
            if data.len() == NUM_CHARS {
                let mut raw = [0u8; NUM_CHARS];
                raw.copy_from_slice(&block[data]);
                table = Some(raw);
            }
        } else if tag == C::CHUNK_ID {
            if !data.len().is_multiple_of(C::BYTES) {
                return Err(ImageError::BadChunk);
            }
            elements = Some(data);
        } else if tag == TAIL_TAG {
            tail = Some(data);
        } else {
            trace_log!(tag = ?tag, size, "skipping unknown chunk");
        }

        p += size;
    }

    match (elements, tail) {
        (Some(elements), Some(tail)) => Ok(RawImage {
            table,
            elements,
            tail,
            records,
            total,
        }),
        _ => Err(ImageError::MissingChunks),
    }
}

/// Reads one whole image block from a stream.
///
/// On any failure the stream is rewound to its starting position so the
/// caller can hand it to a different parser.
pub(crate) fn read_block<R: Read + Seek>(r: &mut R) -> Result<Vec<u8>, ImageError> {
    let start = r.stream_position()?;

    match read_block_inner(r) {
        Ok(block) => Ok(block),
        Err(err) => {
            let _ = r.seek(SeekFrom::Start(start));
            Err(err)
        }
    }
}

fn read_block_inner<R: Read>(r: &mut R) -> Result<Vec<u8>, ImageError> {
    let mut header = [0u8; CHUNK_HEADER];
    r.read_exact(&mut header)?;
    if tag_at(&header, 0) != SDAT_TAG {
        return Err(ImageError::BadOuterTag);
    }

    let total = read_u32(&header, 4) as usize;
    if total < SDAT_HEADER {
        return Err(ImageError::TooSmall);
    }

    let mut block = vec![0u8; total];
    block[..CHUNK_HEADER].copy_from_slice(&header);
    r.read_exact(&mut block[CHUNK_HEADER..])?;
    debug_log!(bytes = total, "image block read");
    Ok(block)
}

// ============================================================================
//  Writing
// ============================================================================

fn write_chunk_header(w: &mut impl Write, tag: [u8; 4], size: usize) -> std::io::Result<()> {
    w.write_all(&tag)?;
    w.write_all(&(size as u32).to_le_bytes())
}

/// Serializes one image: `SDAT` header, then `TBLU`, element and `TAIL`
/// chunks.
pub(crate) fn write_image<C: ElementCodec>(
    w: &mut impl Write,
    table: &[u8; NUM_CHARS],
    elements: &[u8],
    tail: &[u8],
    records: usize,
) -> std::io::Result<()> {
    let tblu_size = CHUNK_HEADER + NUM_CHARS;
    let sda_size = CHUNK_HEADER + elements.len();
    let tail_size = CHUNK_HEADER + tail.len();
    let total = SDAT_HEADER + tblu_size + sda_size + tail_size;

    write_chunk_header(w, SDAT_TAG, total)?;
    w.write_all(&(SDAT_HEADER as u32).to_le_bytes())?;
    w.write_all(&(records as u32).to_le_bytes())?;

    write_chunk_header(w, TBLU_TAG, tblu_size)?;
    w.write_all(table)?;

    write_chunk_header(w, C::CHUNK_ID, sda_size)?;
    w.write_all(elements)?;

    write_chunk_header(w, TAIL_TAG, tail_size)?;
    w.write_all(tail)?;

    debug_log!(bytes = total, records, "image written");
    Ok(())
}
