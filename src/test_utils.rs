//! Helpers for building and taking apart PNG streams by hand, shared by the integration tests
//! and the benchmarks.
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// One chunk with an explicit, possibly wrong, checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub type_: [u8; 4],
    pub data: Vec<u8>,
    pub crc: u32,
}

impl Chunk {
    /// A chunk with a correct checksum.
    pub fn new(type_: &[u8; 4], data: Vec<u8>) -> Self {
        let mut chunk = Chunk {
            type_: *type_,
            data,
            crc: 0,
        };
        chunk.refresh_crc();
        chunk
    }

    pub fn refresh_crc(&mut self) {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.type_);
        hasher.update(&self.data);
        self.crc = hasher.finalize();
    }

    pub fn is(&self, type_: &[u8; 4]) -> bool {
        &self.type_ == type_
    }
}

/// Splits a complete stream into its chunks. Panics on malformed input.
pub fn split_chunks(png: &[u8]) -> Vec<Chunk> {
    assert_eq!(png[..8], SIGNATURE, "missing signature");
    let mut r = Cursor::new(&png[8..]);
    let mut chunks = Vec::new();
    while (r.position() as usize) < png.len() - 8 {
        let length = r.read_u32::<BigEndian>().unwrap();
        let mut type_ = [0; 4];
        r.read_exact(&mut type_).unwrap();
        let mut data = vec![0; length as usize];
        r.read_exact(&mut data).unwrap();
        let crc = r.read_u32::<BigEndian>().unwrap();
        chunks.push(Chunk { type_, data, crc });
    }
    chunks
}

/// Writes the signature followed by `chunks`, keeping their checksums as they are.
pub fn assemble(chunks: &[Chunk]) -> Vec<u8> {
    let mut out = SIGNATURE.to_vec();
    for chunk in chunks {
        out.write_u32::<BigEndian>(chunk.data.len() as u32).unwrap();
        out.write_all(&chunk.type_).unwrap();
        out.write_all(&chunk.data).unwrap();
        out.write_u32::<BigEndian>(chunk.crc).unwrap();
    }
    out
}

/// Payload of an `IHDR` chunk, compression and filter method 0.
pub fn ihdr(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.write_u32::<BigEndian>(width).unwrap();
    data.write_u32::<BigEndian>(height).unwrap();
    data.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace]);
    data
}

/// zlib-compresses `data` in one go.
pub fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Filtered scanlines: each row prefixed with its filter tag.
pub fn scanlines<'a>(rows: impl IntoIterator<Item = (u8, &'a [u8])>) -> Vec<u8> {
    let mut out = Vec::new();
    for (filter, row) in rows {
        out.push(filter);
        out.extend_from_slice(row);
    }
    out
}

/// A stream of `IHDR`, `IDAT` with `idat` (already compressed) and `IEND`.
pub fn minimal_png(header: Vec<u8>, idat: Vec<u8>) -> Vec<u8> {
    assemble(&[
        Chunk::new(b"IHDR", header),
        Chunk::new(b"IDAT", idat),
        Chunk::new(b"IEND", Vec::new()),
    ])
}

/// Writes a `size`x`size` 8-bit RGBA image stored without compression, its zlib stream split into
/// `IDAT` chunks of at most `idat_bytes`.
pub fn write_noncompressed_png(w: &mut impl Write, size: u32, idat_bytes: usize) {
    let stride = size as usize * 4;
    let mut raw = Vec::with_capacity((stride + 1) * size as usize);
    for y in 0..size as usize {
        raw.push(0);
        raw.extend((0..stride).map(|x| (x ^ y) as u8));
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::none());
    encoder.write_all(&raw).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut chunks = vec![Chunk::new(b"IHDR", ihdr(size, size, 8, 6, 0))];
    chunks.extend(
        compressed
            .chunks(idat_bytes)
            .map(|piece| Chunk::new(b"IDAT", piece.to_vec())),
    );
    chunks.push(Chunk::new(b"IEND", Vec::new()));
    w.write_all(&assemble(&chunks)).unwrap();
}
