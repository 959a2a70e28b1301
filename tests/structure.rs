//! Malformed and unusual streams: each one must fail with the right kind of error, or be decoded
//! despite the oddity where that is allowed.

use pngcore::{DecodeOptions, Decoder, DecodingError, ErrorKind, Image, Limits, PixelFormat};

#[path = "../src/test_utils.rs"]
mod test_utils;

use test_utils::{assemble, ihdr, minimal_png, scanlines, split_chunks, zlib_compress, Chunk};

/// A valid 3x2 RGB stream as chunks.
fn rgb_chunks() -> Vec<Chunk> {
    let raw = scanlines([
        (0, &[1, 2, 3, 4, 5, 6, 7, 8, 9][..]),
        (2, &[1, 1, 1, 1, 1, 1, 1, 1, 1][..]),
    ]);
    vec![
        Chunk::new(b"IHDR", ihdr(3, 2, 8, 2, 0)),
        Chunk::new(b"IDAT", zlib_compress(&raw)),
        Chunk::new(b"IEND", Vec::new()),
    ]
}

/// A valid 2x1 indexed stream as chunks.
fn indexed_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new(b"IHDR", ihdr(2, 1, 8, 3, 0)),
        Chunk::new(b"PLTE", vec![0, 0, 0, 255, 255, 255]),
        Chunk::new(b"IDAT", zlib_compress(&[0, 1, 0])),
        Chunk::new(b"IEND", Vec::new()),
    ]
}

fn decode(png: &[u8]) -> Result<Image, DecodingError> {
    pngcore::decode(png)
}

fn kind(result: Result<Image, DecodingError>) -> ErrorKind {
    match result {
        Err(DecodingError::Format(err)) => err.kind(),
        Err(other) => panic!("expected a format error, got {:?}", other),
        Ok(image) => panic!("expected an error, decoded {:?}", image),
    }
}

fn with_header(header: Vec<u8>) -> Vec<u8> {
    minimal_png(header, zlib_compress(&[0, 0]))
}

#[test]
fn valid_streams_decode() {
    let image = decode(&assemble(&rgb_chunks())).unwrap();
    assert_eq!(image.format(), PixelFormat::Rgb24);
    assert_eq!(image.row(1), &[2, 3, 4, 5, 6, 7, 8, 9, 10]);

    let image = decode(&assemble(&indexed_chunks())).unwrap();
    assert_eq!(image.data(), &[0, 1]);
    assert_eq!(image.color(1, 0).unwrap(), &[255, 255, 255]);
}

#[test]
fn bad_signature_is_framing() {
    let mut png = assemble(&rgb_chunks());
    png[0] = 0x88;
    assert_eq!(kind(decode(&png)), ErrorKind::Framing);
}

#[test]
fn truncation_is_framing() {
    let png = assemble(&rgb_chunks());
    // inside the IHDR length, type, payload and checksum
    for cut in [10, 14, 20, 30] {
        assert_eq!(kind(decode(&png[..cut])), ErrorKind::Framing, "cut at {}", cut);
    }
}

#[test]
fn truncation_at_chunk_boundary_is_structural() {
    let chunks = rgb_chunks();
    let png = assemble(&chunks[..2]);
    assert_eq!(kind(decode(&png)), ErrorKind::Structural);
}

#[test]
fn critical_crc_mismatch_is_fatal() {
    for index in 0..3 {
        let mut chunks = rgb_chunks();
        chunks[index].crc ^= 1;
        assert_eq!(
            kind(decode(&assemble(&chunks))),
            ErrorKind::Checksum,
            "corrupted {:?}",
            chunks[index].type_
        );
    }
}

#[test]
fn ignore_crc_accepts_bad_checksums() {
    let mut chunks = rgb_chunks();
    for chunk in &mut chunks {
        chunk.crc = 0;
    }
    let png = assemble(&chunks);

    let mut options = DecodeOptions::default();
    options.set_ignore_crc(true);
    let image = Decoder::new_with_options(&png[..], options, Limits::default())
        .decode()
        .unwrap();
    assert_eq!(image.width(), 3);

    let mut decoder = Decoder::new(&png[..]);
    decoder.ignore_crc(true);
    assert!(decoder.decode().is_ok());
}

#[test]
fn ancillary_crc_mismatch_skips_the_chunk() {
    let expected = decode(&assemble(&rgb_chunks())).unwrap();

    let mut decf = Chunk::new(b"deCf", vec![0, 0x43, 0x02, 0x03, 0, 0, 0, 9]);
    decf.crc ^= 0xFFFF;
    let mut chunks = rgb_chunks();
    chunks.insert(1, decf);

    let image = decode(&assemble(&chunks)).unwrap();
    assert!(image.original_format().is_none());
    assert_eq!(image, expected);
}

#[test]
fn decoded_format_may_follow_image_data() {
    let mut chunks = rgb_chunks();
    chunks.insert(2, Chunk::new(b"deCf", vec![0, 0x43, 0x02, 0x03, 0, 0, 0, 9]));
    let image = decode(&assemble(&chunks)).unwrap();
    assert_eq!(image.original_format().pixel_format(), Some(PixelFormat::Rgb24));
    assert_eq!(image.last_chunk_size(), 9);
}

#[test]
fn decoded_format_length_is_validated() {
    let mut chunks = rgb_chunks();
    chunks.insert(1, Chunk::new(b"deCf", vec![0; 7]));
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Validation);
}

#[test]
fn chunk_order_is_enforced() {
    // IDAT before IHDR
    let mut chunks = rgb_chunks();
    chunks.swap(0, 1);
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);

    // second IHDR
    let mut chunks = rgb_chunks();
    chunks.insert(1, chunks[0].clone());
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);

    // IEND before IDAT
    let chunks = rgb_chunks();
    let reordered = [chunks[0].clone(), chunks[2].clone(), chunks[1].clone()];
    assert_eq!(kind(decode(&assemble(&reordered))), ErrorKind::Structural);

    // IEND first
    let png = assemble(&[Chunk::new(b"IEND", Vec::new())]);
    assert_eq!(kind(decode(&png)), ErrorKind::Structural);

    // no IEND at all
    let chunks = rgb_chunks();
    assert_eq!(kind(decode(&assemble(&chunks[..2]))), ErrorKind::Structural);
}

#[test]
fn palette_order_is_enforced() {
    // indexed image without PLTE
    let mut chunks = indexed_chunks();
    chunks.remove(1);
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);

    // PLTE after IDAT
    let mut chunks = indexed_chunks();
    chunks.swap(1, 2);
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);

    // second PLTE
    let mut chunks = indexed_chunks();
    chunks.insert(2, chunks[1].clone());
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);

    // PLTE before IHDR
    let mut chunks = indexed_chunks();
    chunks.swap(0, 1);
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);

    // suggested palette after IDAT
    let mut chunks = rgb_chunks();
    chunks.insert(2, Chunk::new(b"PLTE", vec![1, 2, 3]));
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);
}

#[test]
fn palette_contents_are_validated() {
    let mut chunks = indexed_chunks();
    chunks[1] = Chunk::new(b"PLTE", vec![0; 7]);
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Validation);

    let mut chunks = indexed_chunks();
    chunks[1] = Chunk::new(b"PLTE", vec![0; 3 * 257]);
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Validation);

    // the full 256 entries are fine
    let mut chunks = indexed_chunks();
    chunks[1] = Chunk::new(b"PLTE", vec![0; 3 * 256]);
    assert_eq!(decode(&assemble(&chunks)).unwrap().palette().len(), 256);
}

#[test]
fn palette_on_grayscale_is_structural() {
    let png = assemble(&[
        Chunk::new(b"IHDR", ihdr(1, 1, 8, 0, 0)),
        Chunk::new(b"PLTE", vec![1, 2, 3]),
        Chunk::new(b"IDAT", zlib_compress(&[0, 0])),
        Chunk::new(b"IEND", Vec::new()),
    ]);
    assert_eq!(kind(decode(&png)), ErrorKind::Structural);
}

#[test]
fn suggested_palette_on_truecolor_is_ignored() {
    let expected = decode(&assemble(&rgb_chunks())).unwrap();
    let mut chunks = rgb_chunks();
    chunks.insert(1, Chunk::new(b"PLTE", vec![1, 2, 3, 4, 5, 6]));
    let image = decode(&assemble(&chunks)).unwrap();
    assert!(image.palette().is_empty());
    assert_eq!(image, expected);
}

#[test]
fn unknown_critical_chunk_is_unsupported() {
    let mut chunks = rgb_chunks();
    chunks.insert(1, Chunk::new(b"ABCD", vec![1, 2, 3]));
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::UnsupportedChunk);
}

#[test]
fn unknown_ancillary_chunk_is_ignored() {
    let expected = decode(&assemble(&rgb_chunks())).unwrap();
    let mut chunks = rgb_chunks();
    chunks.insert(1, Chunk::new(b"abCD", vec![1, 2, 3]));
    chunks.insert(3, Chunk::new(b"tIME", vec![0; 7]));
    assert_eq!(decode(&assemble(&chunks)).unwrap(), expected);
}

#[test]
fn header_fields_are_validated() {
    let cases: [(Vec<u8>, ErrorKind); 12] = [
        (ihdr(0, 1, 8, 2, 0), ErrorKind::Validation),
        (ihdr(1, 0, 8, 2, 0), ErrorKind::Validation),
        (ihdr(1, 1, 4, 0, 0), ErrorKind::Validation),
        (ihdr(1, 1, 3, 2, 0), ErrorKind::Validation),
        (ihdr(1, 1, 16, 3, 0), ErrorKind::Validation),
        (ihdr(1, 1, 8, 1, 0), ErrorKind::UnsupportedChunk),
        (ihdr(1, 1, 8, 7, 0), ErrorKind::UnsupportedChunk),
        (ihdr(1, 1, 4, 3, 0), ErrorKind::UnsupportedChunk),
        (ihdr(1, 1, 8, 2, 1), ErrorKind::UnsupportedChunk),
        (ihdr(1, 1, 8, 2, 2), ErrorKind::Validation),
        (
            {
                let mut header = ihdr(1, 1, 8, 2, 0);
                header[10] = 1;
                header
            },
            ErrorKind::Validation,
        ),
        (
            {
                let mut header = ihdr(1, 1, 8, 2, 0);
                header[11] = 1;
                header
            },
            ErrorKind::Validation,
        ),
    ];
    for (header, expected) in cases {
        assert_eq!(kind(decode(&with_header(header.clone()))), expected, "{:?}", header);
    }

    let mut short = ihdr(1, 1, 8, 2, 0);
    short.pop();
    assert_eq!(kind(decode(&with_header(short))), ErrorKind::Validation);
}

#[test]
fn interlaced_header_is_recorded() {
    let png = with_header(ihdr(4, 4, 8, 6, 1));
    let mut decoder = Decoder::new(&png[..]);
    assert_eq!(kind(decoder.decode()), ErrorKind::UnsupportedChunk);
    let info = decoder.info().unwrap();
    assert!(info.interlaced);
    assert_eq!(info.size(), (4, 4));
}

#[test]
fn image_data_amount_is_validated() {
    // one row short
    let png = minimal_png(ihdr(2, 2, 8, 0, 0), zlib_compress(&[0, 1, 2]));
    assert_eq!(kind(decode(&png)), ErrorKind::Validation);

    // one byte too many
    let png = minimal_png(ihdr(2, 1, 8, 0, 0), zlib_compress(&[0, 1, 2, 3]));
    assert_eq!(kind(decode(&png)), ErrorKind::Validation);
}

#[test]
fn unknown_filter_tag_is_validation() {
    let png = minimal_png(ihdr(2, 1, 8, 0, 0), zlib_compress(&[5, 1, 2]));
    assert_eq!(kind(decode(&png)), ErrorKind::Validation);
}

#[test]
fn extra_compressed_data_is_validation() {
    let mut idat = zlib_compress(&[0, 1, 2]);
    idat.extend_from_slice(&[0, 0, 0]);
    let png = minimal_png(ihdr(2, 1, 8, 0, 0), idat);
    assert_eq!(kind(decode(&png)), ErrorKind::Validation);
}

#[test]
fn idat_after_stream_end_is_structural() {
    let mut chunks = rgb_chunks();
    chunks.insert(2, Chunk::new(b"IDAT", vec![0]));
    assert_eq!(kind(decode(&assemble(&chunks))), ErrorKind::Structural);
}

#[test]
fn corrupt_deflate_stream_is_decompression() {
    let png = minimal_png(ihdr(2, 1, 8, 0, 0), vec![0x78, 0x9c, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(kind(decode(&png)), ErrorKind::Decompression);
}

#[test]
fn limits_are_enforced_before_allocation() {
    let png = with_header(ihdr(1 << 15, 1 << 15, 16, 6, 0));
    assert!(matches!(decode(&png), Err(DecodingError::LimitsExceeded)));

    let png = with_header(ihdr(4, 4, 8, 0, 0));
    let result = Decoder::new_with_limits(&png[..], Limits { bytes: 15 }).decode();
    assert!(matches!(result, Err(DecodingError::LimitsExceeded)));
}

#[test]
fn encoder_output_survives_chunk_reassembly() {
    let image = Image::from_raw(3, 1, PixelFormat::Gray16, vec![0, 1, 2, 3, 4, 5]).unwrap();
    let mut png = Vec::new();
    pngcore::encode(&mut png, &image).unwrap();
    assert_eq!(assemble(&split_chunks(&png)), png);
}
