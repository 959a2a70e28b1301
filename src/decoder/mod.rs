mod scanline;
mod state;
mod stream;
mod zlib;

pub use self::stream::{DecodingError, ErrorKind, FormatError};
pub(crate) use self::stream::FormatErrorInner;

use std::io::Read;

use self::stream::{Decoded, StreamingDecoder};
use crate::chunk;
use crate::common::{Info, SIGNATURE};
use crate::image::Image;

/// Resource limits the decoder enforces before allocating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of bytes the decoded pixel buffer may occupy. Default: 64 MiB.
    pub bytes: usize,
}

impl Limits {
    pub(crate) fn reserve_bytes(&mut self, bytes: usize) -> Result<(), DecodingError> {
        if self.bytes >= bytes {
            self.bytes -= bytes;
            Ok(())
        } else {
            Err(DecodingError::LimitsExceeded)
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            bytes: 1024 * 1024 * 64,
        }
    }
}

/// Options that affect how a stream is decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    ignore_crc: bool,
}

impl DecodeOptions {
    /// When set, chunk checksums are not verified at all.
    ///
    /// Defaults to `false`.
    pub fn set_ignore_crc(&mut self, ignore_crc: bool) {
        self.ignore_crc = ignore_crc;
    }

    pub(crate) fn ignore_crc(&self) -> bool {
        self.ignore_crc
    }
}

/// PNG Decoder
///
/// Reads one image from a byte stream. Reading stops right after the `IEND` chunk, whatever
/// follows it stays in the stream.
///
/// Chunks are read with many small reads, wrap unbuffered sources in a
/// [`BufReader`](std::io::BufReader).
pub struct Decoder<R: Read> {
    reader: R,
    decoder: StreamingDecoder,
}

impl<R: Read> Decoder<R> {
    /// Create a new decoder configuration with default limits.
    pub fn new(r: R) -> Decoder<R> {
        Decoder::new_with_options(r, DecodeOptions::default(), Limits::default())
    }

    /// Create a new decoder configuration with custom limits.
    pub fn new_with_limits(r: R, limits: Limits) -> Decoder<R> {
        Decoder::new_with_options(r, DecodeOptions::default(), limits)
    }

    pub fn new_with_options(r: R, options: DecodeOptions, limits: Limits) -> Decoder<R> {
        Decoder {
            reader: r,
            decoder: StreamingDecoder::new(options, limits),
        }
    }

    /// Set whether chunk checksums are ignored.
    pub fn ignore_crc(&mut self, ignore_crc: bool) {
        self.decoder.set_ignore_crc(ignore_crc);
    }

    /// The header of the image, available once `IHDR` was read.
    ///
    /// After a failed [`decode`](Self::decode) this still tells what kind of image the stream
    /// announced, for example an interlaced one.
    pub fn info(&self) -> Option<&Info> {
        self.decoder.info.as_ref()
    }

    /// Reads the whole stream and returns the image.
    ///
    /// The first error aborts the decode; no partially decoded image is returned.
    pub fn decode(&mut self) -> Result<Image, DecodingError> {
        self.read_signature()?;
        loop {
            let chunk = match chunk::read_chunk(&mut self.reader)? {
                Some(chunk) => chunk,
                None => return Err(FormatErrorInner::MissingImageEnd.into()),
            };
            match self.decoder.process(chunk)? {
                Decoded::ImageEnd => break,
                Decoded::ChunkComplete(type_) => log::trace!("processed chunk {}", type_),
                Decoded::Skipped(type_) => log::trace!("skipped chunk {}", type_),
            }
        }
        self.decoder.finish()
    }

    fn read_signature(&mut self) -> Result<(), DecodingError> {
        let mut signature = [0; 8];
        self.reader.read_exact(&mut signature).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                FormatErrorInner::UnexpectedEof { what: "signature" }.into()
            } else {
                DecodingError::IoError(err)
            }
        })?;
        if signature != SIGNATURE {
            return Err(FormatErrorInner::InvalidSignature.into());
        }
        Ok(())
    }

    /// Returns the underlying reader, positioned after `IEND` once decoding succeeded.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_bytes_stay_unread() {
        let image = Image::from_raw(1, 1, crate::PixelFormat::Gray8, vec![7]).unwrap();
        let mut stream = Vec::new();
        crate::encode(&mut stream, &image).unwrap();
        stream.extend_from_slice(b"trailer");

        let mut decoder = Decoder::new(&stream[..]);
        assert_eq!(decoder.decode().unwrap(), image);
        assert_eq!(decoder.into_inner(), b"trailer");
    }

    #[test]
    fn limits_reserve() {
        let mut limits = Limits { bytes: 10 };
        assert!(limits.reserve_bytes(4).is_ok());
        assert!(limits.reserve_bytes(6).is_ok());
        assert!(matches!(
            limits.reserve_bytes(1),
            Err(DecodingError::LimitsExceeded)
        ));
    }

    #[test]
    fn rejects_bad_signature() {
        let err = Decoder::new(&b"\x89PNG\r\n\x1a\x0b"[..]).decode().unwrap_err();
        match err {
            DecodingError::Format(err) => assert_eq!(err.kind(), ErrorKind::Framing),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn truncated_signature_is_framing() {
        let err = Decoder::new(&SIGNATURE[..5]).decode().unwrap_err();
        match err {
            DecodingError::Format(err) => assert_eq!(err.kind(), ErrorKind::Framing),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn signature_only_is_missing_end() {
        let err = Decoder::new(&SIGNATURE[..]).decode().unwrap_err();
        match err {
            DecodingError::Format(err) => assert_eq!(err.kind(), ErrorKind::Structural),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
