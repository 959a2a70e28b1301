//! # PNG codec core
//!
//! Reads and writes the chunked PNG container for byte-aligned, non-interlaced images: 8 and 16
//! bit grayscale and truecolor, with or without alpha, and 8 bit indexed color.
//!
//! ## The decoder
//! The most important type for decoding is [`Decoder`]. It wraps a `std::io::Read`, validates
//! every chunk on the way and returns the reconstructed [`Image`]:
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = BufReader::new(File::open("image.png").unwrap());
//! let mut decoder = pngcore::Decoder::new(file);
//! let image = decoder.decode().unwrap();
//! println!("{}x{} {}", image.width(), image.height(), image.format());
//! ```
//!
//! ## The encoder
//! [`Encoder`] writes an [`Image`] back out, choosing a filter for every row:
//!
//! ```
//! use pngcore::{Encoder, Image, PixelFormat};
//!
//! // Width is 2 pixels and height is 1.
//! let data = vec![255, 0, 0, 255, 0, 0, 0, 255];
//! let image = Image::from_raw(2, 1, PixelFormat::Rgba32, data).unwrap();
//!
//! let mut encoder = Encoder::new(Vec::new());
//! encoder.encode(&image).unwrap();
//! let png = encoder.into_inner();
//! assert_eq!(pngcore::decode(&png[..]).unwrap(), image);
//! ```

#![forbid(unsafe_code)]

pub mod chunk;
mod common;
mod decoder;
mod encoder;
mod filter;
mod image;

use std::io::{self, Read, Seek, SeekFrom, Write};

pub use crate::common::*;
pub use crate::decoder::{DecodeOptions, Decoder, DecodingError, ErrorKind, FormatError, Limits};
pub use crate::encoder::{EncodeOptions, Encoder, EncodingError};
pub use crate::filter::{filter_byte, paeth_predictor, unfilter_byte, Filter, RowFilter};
pub use crate::image::{Image, ImageError, MAX_PALETTE_ENTRIES};

/// Decodes one image with default options and limits.
pub fn decode<R: Read>(r: R) -> Result<Image, DecodingError> {
    Decoder::new(r).decode()
}

/// Encodes `image` with default options.
pub fn encode<W: Write>(w: W, image: &Image) -> Result<(), EncodingError> {
    Encoder::new(w).encode(image)
}

/// Checks whether the stream starts with the PNG signature.
///
/// The stream position is restored afterwards. A stream shorter than the signature is not a PNG.
pub fn is_png<R: Read + Seek>(r: &mut R) -> io::Result<bool> {
    let start = r.stream_position()?;
    let mut signature = [0; 8];
    let result = match r.read_exact(&mut signature) {
        Ok(()) => Ok(signature == SIGNATURE),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err),
    };
    r.seek(SeekFrom::Start(start))?;
    result
}
