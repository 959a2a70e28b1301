//! Chunk types and functions
#![allow(non_upper_case_globals)]
use core::fmt;
use std::io::{self, Read, Write};

use crate::decoder::{DecodingError, FormatErrorInner};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

// -- Critical chunks --

/// Image header
pub const IHDR: ChunkType = ChunkType(*b"IHDR");
/// Palette
pub const PLTE: ChunkType = ChunkType(*b"PLTE");
/// Image data
pub const IDAT: ChunkType = ChunkType(*b"IDAT");
/// Image trailer
pub const IEND: ChunkType = ChunkType(*b"IEND");

// -- Private chunks --

/// Pixel format before a reversible transform was applied
pub const deCf: ChunkType = ChunkType(*b"deCf");

// -- Chunk type determination --

/// Returns true if the chunk is critical.
pub fn is_critical(ChunkType(type_): ChunkType) -> bool {
    type_[0] & 32 == 0
}

/// Returns true if the chunk is private.
pub fn is_private(ChunkType(type_): ChunkType) -> bool {
    type_[1] & 32 != 0
}

/// Checks whether the reserved bit of the chunk name is set.
/// If it is set the chunk name is invalid.
pub fn reserved_set(ChunkType(type_): ChunkType) -> bool {
    type_[2] & 32 != 0
}

/// Returns true if the chunk is safe to copy if unknown.
pub fn safe_to_copy(ChunkType(type_): ChunkType) -> bool {
    type_[3] & 32 != 0
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct DebugType([u8; 4]);

        impl fmt::Debug for DebugType {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                for &c in &self.0[..] {
                    write!(f, "{}", char::from(c).escape_debug())?;
                }
                Ok(())
            }
        }

        f.debug_struct("ChunkType")
            .field("type", &DebugType(self.0))
            .field("critical", &is_critical(*self))
            .field("private", &is_private(*self))
            .field("reserved", &reserved_set(*self))
            .field("safecopy", &safe_to_copy(*self))
            .finish()
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &c in &self.0[..] {
            write!(f, "{}", char::from(c).escape_default())?;
        }
        Ok(())
    }
}

/// One framed chunk as read from the stream.
///
/// Lives only while its handler runs.
pub struct RawChunk {
    pub type_: ChunkType,
    pub data: Vec<u8>,
    /// The checksum stored after the payload.
    pub crc: u32,
}

impl RawChunk {
    /// CRC-32 over type and payload.
    pub fn computed_crc(&self) -> u32 {
        crc(self.type_, &self.data)
    }

    pub fn crc_matches(&self) -> bool {
        self.computed_crc() == self.crc
    }
}

fn crc(type_: ChunkType, data: &[u8]) -> u32 {
    let mut crc = crc32fast::Hasher::new();
    crc.update(&type_.0);
    crc.update(data);
    crc.finalize()
}

/// Fills `buf` completely. Returns `Ok(false)` if the stream was already at its end, before any
/// byte was read.
fn read_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

fn short_read(err: io::Error, what: &'static str) -> DecodingError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        FormatErrorInner::UnexpectedEof { what }.into()
    } else {
        DecodingError::IoError(err)
    }
}

/// Reads the next chunk: length, type, `length` payload bytes and the CRC.
///
/// Returns `Ok(None)` when the stream ends cleanly at a chunk boundary. The checksum is not
/// verified here, see [`RawChunk::crc_matches`].
pub fn read_chunk<R: Read>(r: &mut R) -> Result<Option<RawChunk>, DecodingError> {
    let mut head = [0; 8];
    if !read_or_eof(r, &mut head).map_err(|err| short_read(err, "chunk header"))? {
        return Ok(None);
    }
    let length = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
    let type_ = ChunkType([head[4], head[5], head[6], head[7]]);

    // Read through `take` so a bogus length cannot make us allocate more than the stream holds.
    let mut data = Vec::new();
    r.by_ref()
        .take(u64::from(length))
        .read_to_end(&mut data)
        .map_err(DecodingError::IoError)?;
    if data.len() != length as usize {
        return Err(FormatErrorInner::UnexpectedEof {
            what: "chunk payload",
        }
        .into());
    }

    let mut crc = [0; 4];
    r.read_exact(&mut crc)
        .map_err(|err| short_read(err, "chunk checksum"))?;

    log::trace!("read chunk {} ({} bytes)", type_, length);
    Ok(Some(RawChunk {
        type_,
        data,
        crc: u32::from_be_bytes(crc),
    }))
}

/// Writes one complete chunk, computing its CRC.
pub fn encode_chunk<W: Write>(w: &mut W, chunk: ChunkType, data: &[u8]) -> io::Result<()> {
    let length = u32::try_from(data.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk payload too long"))?;
    w.write_all(&length.to_be_bytes())?;
    w.write_all(&chunk.0)?;
    w.write_all(data)?;
    w.write_all(&crc(chunk, data).to_be_bytes())?;
    log::trace!("wrote chunk {} ({} bytes)", chunk, length);
    Ok(())
}
