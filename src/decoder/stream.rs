use std::{error, fmt, io};

use super::scanline::ScanlineCursor;
use super::state::DecodePosition;
use super::zlib::{ZlibStream, ZlibStatus};
use super::{DecodeOptions, Limits};
use crate::chunk::{self, ChunkType, RawChunk};
use crate::common::{BitDepth, ColorType, FormatFlags, FormatTag, Info, PixelFormat};
use crate::image::{Image, MAX_PALETTE_ENTRIES};

/// Any error that can occur while decoding.
#[derive(Debug)]
pub enum DecodingError {
    /// An error in IO of the underlying reader.
    ///
    /// Note that some IO errors may be recoverable. Short reads of chunk data are reported as
    /// [`ErrorKind::Framing`] format errors instead.
    IoError(io::Error),
    /// The input image was not a valid PNG.
    Format(FormatError),
    /// The image would need more memory than the configured [`Limits`] allow.
    LimitsExceeded,
}

/// A problem with the structure or content of the PNG stream.
#[derive(Debug)]
pub struct FormatError {
    inner: FormatErrorInner,
}

/// Broad category of a [`FormatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The stream ended inside the signature or a chunk, or the signature is wrong.
    Framing,
    /// A critical chunk failed its CRC check.
    Checksum,
    /// A chunk appeared out of order or a required chunk is missing.
    Structural,
    /// A field or the amount of image data is malformed.
    Validation,
    /// An unknown critical chunk or an unsupported image layout.
    UnsupportedChunk,
    /// The compressed image data is corrupt.
    Decompression,
}

#[derive(Debug)]
pub(crate) enum FormatErrorInner {
    // Framing
    InvalidSignature,
    UnexpectedEof {
        what: &'static str,
    },
    // Checksum
    CrcMismatch {
        chunk: ChunkType,
        crc_val: u32,
        crc_sum: u32,
    },
    // Structural
    ChunkBeforeIhdr {
        kind: ChunkType,
    },
    DuplicateChunk {
        kind: ChunkType,
    },
    AfterIdat {
        kind: ChunkType,
    },
    PaletteForGrayscale,
    MissingPalette,
    IdatAfterStreamEnd,
    MissingImageData,
    MissingImageEnd,
    // Validation
    InvalidHeaderLength(usize),
    InvalidDimensions,
    InvalidBitDepth {
        color_type: ColorType,
        bit_depth: u8,
    },
    BitDepthBelowEight {
        color_type: ColorType,
        bit_depth: BitDepth,
    },
    InvalidCompressionMethod(u8),
    InvalidFilterMethod(u8),
    InvalidInterlaceMethod(u8),
    PaletteLength(usize),
    PaletteTooLarge(usize),
    DecodedFormatLength(usize),
    UnknownFilterMethod(u8),
    ExtraCompressedData,
    IncorrectImageDataAmount,
    // Unsupported
    UnknownCriticalChunk(ChunkType),
    InvalidColorType(u8),
    SubByteIndexed(BitDepth),
    Interlaced,
    // Decompression
    CorruptFlateStream(String),
}

impl FormatError {
    pub fn kind(&self) -> ErrorKind {
        use self::FormatErrorInner::*;
        match self.inner {
            InvalidSignature | UnexpectedEof { .. } => ErrorKind::Framing,
            CrcMismatch { .. } => ErrorKind::Checksum,
            ChunkBeforeIhdr { .. }
            | DuplicateChunk { .. }
            | AfterIdat { .. }
            | PaletteForGrayscale
            | MissingPalette
            | IdatAfterStreamEnd
            | MissingImageData
            | MissingImageEnd => ErrorKind::Structural,
            InvalidHeaderLength(_)
            | InvalidDimensions
            | InvalidBitDepth { .. }
            | BitDepthBelowEight { .. }
            | InvalidCompressionMethod(_)
            | InvalidFilterMethod(_)
            | InvalidInterlaceMethod(_)
            | PaletteLength(_)
            | PaletteTooLarge(_)
            | DecodedFormatLength(_)
            | UnknownFilterMethod(_)
            | ExtraCompressedData
            | IncorrectImageDataAmount => ErrorKind::Validation,
            UnknownCriticalChunk(_) | InvalidColorType(_) | SubByteIndexed(_) | Interlaced => {
                ErrorKind::UnsupportedChunk
            }
            CorruptFlateStream(_) => ErrorKind::Decompression,
        }
    }
}

impl error::Error for DecodingError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DecodingError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use self::DecodingError::*;
        match self {
            IoError(err) => write!(fmt, "{}", err),
            Format(desc) => write!(fmt, "{}", desc),
            LimitsExceeded => write!(fmt, "limits are exceeded"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use FormatErrorInner::*;
        match &self.inner {
            InvalidSignature => write!(fmt, "Invalid PNG signature."),
            UnexpectedEof { what } => write!(fmt, "Stream ended inside the {}.", what),
            CrcMismatch {
                chunk,
                crc_val,
                crc_sum,
            } => write!(
                fmt,
                "CRC error: expected 0x{:x} have 0x{:x} while decoding {} chunk.",
                crc_val, crc_sum, chunk
            ),
            ChunkBeforeIhdr { kind } => write!(fmt, "{} chunk appeared before IHDR chunk", kind),
            DuplicateChunk { kind } => write!(fmt, "Chunk {} must appear at most once.", kind),
            AfterIdat { kind } => write!(fmt, "Chunk {} is invalid after IDAT chunk.", kind),
            PaletteForGrayscale => write!(fmt, "PLTE chunk is not allowed in grayscale images."),
            MissingPalette => write!(fmt, "IDAT appeared before PLTE in an indexed image."),
            IdatAfterStreamEnd => write!(fmt, "Image data in discontinuous IDAT chunks."),
            MissingImageData => write!(fmt, "IEND appeared before the image data was finished."),
            MissingImageEnd => write!(fmt, "File ended before IEND chunk."),
            InvalidHeaderLength(len) => {
                write!(fmt, "IHDR chunk must be 13 bytes long, found {}.", len)
            }
            InvalidDimensions => write!(fmt, "Invalid image dimensions"),
            InvalidBitDepth {
                color_type,
                bit_depth,
            } => write!(
                fmt,
                "Invalid bit depth {} for color type {:?}.",
                bit_depth, color_type
            ),
            BitDepthBelowEight {
                color_type,
                bit_depth,
            } => write!(
                fmt,
                "Bit depth {:?} is below 8 and not supported for color type {:?}.",
                bit_depth, color_type
            ),
            InvalidCompressionMethod(method) => {
                write!(fmt, "Unknown compression method {}.", method)
            }
            InvalidFilterMethod(method) => write!(fmt, "Unknown filter method {}.", method),
            InvalidInterlaceMethod(method) => write!(fmt, "Unknown interlace method {}.", method),
            PaletteLength(len) => write!(fmt, "PLTE length {} is not divisible by 3.", len),
            PaletteTooLarge(count) => write!(
                fmt,
                "PLTE has {} entries, at most {} are allowed.",
                count, MAX_PALETTE_ENTRIES
            ),
            DecodedFormatLength(len) => {
                write!(fmt, "deCf chunk must be 8 bytes long, found {}.", len)
            }
            UnknownFilterMethod(filter) => write!(fmt, "Unknown row filter {}.", filter),
            ExtraCompressedData => write!(fmt, "Extra compressed data after end of stream."),
            IncorrectImageDataAmount => write!(fmt, "Incorrect amount of image data."),
            UnknownCriticalChunk(kind) => write!(fmt, "Unrecognized critical chunk {}.", kind),
            InvalidColorType(color) => write!(fmt, "Unsupported color mode {}.", color),
            SubByteIndexed(depth) => write!(
                fmt,
                "Indexed images with bit depth {:?} are not supported.",
                depth
            ),
            Interlaced => write!(fmt, "Interlaced images are not supported."),
            CorruptFlateStream(err) => {
                write!(fmt, "Corrupt deflate stream. ")?;
                write!(fmt, "{}", err)
            }
        }
    }
}

impl From<io::Error> for DecodingError {
    fn from(err: io::Error) -> DecodingError {
        DecodingError::IoError(err)
    }
}

impl From<FormatError> for DecodingError {
    fn from(err: FormatError) -> DecodingError {
        DecodingError::Format(err)
    }
}

impl From<FormatErrorInner> for FormatError {
    fn from(inner: FormatErrorInner) -> Self {
        FormatError { inner }
    }
}

impl From<FormatErrorInner> for DecodingError {
    fn from(inner: FormatErrorInner) -> Self {
        DecodingError::Format(FormatError::from(inner))
    }
}

impl From<DecodingError> for io::Error {
    fn from(err: DecodingError) -> io::Error {
        match err {
            DecodingError::IoError(err) => err,
            err => io::Error::new(io::ErrorKind::Other, err.to_string()),
        }
    }
}

/// The chunk types the decoder understands.
///
/// Every other type falls back to the critical/ancillary policy: unknown critical chunks abort,
/// unknown ancillary chunks are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkHandler {
    Header,
    Palette,
    ImageData,
    End,
    DecodedFormat,
}

impl ChunkHandler {
    fn for_type(type_: ChunkType) -> Option<Self> {
        Some(match type_ {
            chunk::IHDR => ChunkHandler::Header,
            chunk::PLTE => ChunkHandler::Palette,
            chunk::IDAT => ChunkHandler::ImageData,
            chunk::IEND => ChunkHandler::End,
            chunk::deCf => ChunkHandler::DecodedFormat,
            _ => return None,
        })
    }
}

/// What a processed chunk meant for the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoded {
    /// The chunk was applied.
    ChunkComplete(ChunkType),
    /// The chunk was not applied: unknown ancillary type or bad ancillary checksum.
    Skipped(ChunkType),
    /// The `IEND` chunk was accepted, decoding is done.
    ImageEnd,
}

/// State of one decode, fed one chunk at a time.
///
/// Owns the image under construction together with the decompression session and the scanline
/// cursor. Dropping it releases all of them.
pub(crate) struct StreamingDecoder {
    options: DecodeOptions,
    limits: Limits,
    position: DecodePosition,
    pub(crate) info: Option<Info>,
    image: Option<Image>,
    cursor: Option<ScanlineCursor>,
    zlib: Option<ZlibStream>,
    decoded_format: Option<(FormatTag, u32)>,
    idat_chunks: usize,
}

impl StreamingDecoder {
    pub(crate) fn new(options: DecodeOptions, limits: Limits) -> Self {
        StreamingDecoder {
            options,
            limits,
            position: DecodePosition::default(),
            info: None,
            image: None,
            cursor: None,
            zlib: None,
            decoded_format: None,
            idat_chunks: 0,
        }
    }

    pub(crate) fn set_ignore_crc(&mut self, ignore_crc: bool) {
        self.options.set_ignore_crc(ignore_crc);
    }

    /// Validates the checksum of `chunk` and hands it to its handler.
    pub(crate) fn process(&mut self, chunk: RawChunk) -> Result<Decoded, DecodingError> {
        let type_ = chunk.type_;
        if !self.options.ignore_crc() && !chunk.crc_matches() {
            if chunk::is_critical(type_) {
                return Err(FormatErrorInner::CrcMismatch {
                    chunk: type_,
                    crc_val: chunk.crc,
                    crc_sum: chunk.computed_crc(),
                }
                .into());
            }
            log::warn!("skipping ancillary chunk {} with bad checksum", type_);
            return Ok(Decoded::Skipped(type_));
        }

        let handler = match ChunkHandler::for_type(type_) {
            Some(handler) => handler,
            None if chunk::is_critical(type_) => {
                return Err(FormatErrorInner::UnknownCriticalChunk(type_).into())
            }
            None => {
                log::debug!("skipping unknown ancillary chunk {}", type_);
                return Ok(Decoded::Skipped(type_));
            }
        };

        let data = &chunk.data[..];
        match handler {
            ChunkHandler::Header => self.parse_ihdr(data)?,
            ChunkHandler::Palette => self.parse_plte(data)?,
            ChunkHandler::ImageData => self.parse_idat(data)?,
            ChunkHandler::End => {
                self.parse_iend()?;
                return Ok(Decoded::ImageEnd);
            }
            ChunkHandler::DecodedFormat => self.parse_decf(data)?,
        }
        Ok(Decoded::ChunkComplete(type_))
    }

    /// Hands out the decoded image once `IEND` has been accepted.
    pub(crate) fn finish(&mut self) -> Result<Image, DecodingError> {
        if !self.position.is_complete() {
            return Err(FormatErrorInner::MissingImageEnd.into());
        }
        let mut image = self
            .image
            .take()
            .ok_or(FormatErrorInner::ChunkBeforeIhdr { kind: chunk::IEND })?;
        if let Some((tag, last_chunk_size)) = self.decoded_format {
            image.set_original_format(tag);
            image.set_last_chunk_size(last_chunk_size);
        }
        log::debug!(
            "decoded {}x{} {} image from {} IDAT chunks",
            image.width(),
            image.height(),
            image.format(),
            self.idat_chunks
        );
        Ok(image)
    }

    fn parse_ihdr(&mut self, data: &[u8]) -> Result<(), DecodingError> {
        if self.position.contains(DecodePosition::HEADER) {
            return Err(FormatErrorInner::DuplicateChunk { kind: chunk::IHDR }.into());
        }
        let fields: &[u8; 13] = data
            .try_into()
            .map_err(|_| FormatErrorInner::InvalidHeaderLength(data.len()))?;

        let width = u32::from_be_bytes([fields[0], fields[1], fields[2], fields[3]]);
        let height = u32::from_be_bytes([fields[4], fields[5], fields[6], fields[7]]);
        if width == 0 || height == 0 {
            return Err(FormatErrorInner::InvalidDimensions.into());
        }

        let color_type = ColorType::from_u8(fields[9])
            .ok_or(FormatErrorInner::InvalidColorType(fields[9]))?;
        let bit_depth = match (color_type, BitDepth::from_u8(fields[8])) {
            (ColorType::Indexed, Some(BitDepth::Sixteen)) | (_, None) => {
                return Err(FormatErrorInner::InvalidBitDepth {
                    color_type,
                    bit_depth: fields[8],
                }
                .into())
            }
            (ColorType::Indexed, Some(depth)) => depth,
            (_, Some(depth @ (BitDepth::One | BitDepth::Two | BitDepth::Four))) => {
                return Err(FormatErrorInner::BitDepthBelowEight {
                    color_type,
                    bit_depth: depth,
                }
                .into())
            }
            (_, Some(depth)) => depth,
        };
        if fields[10] != 0 {
            return Err(FormatErrorInner::InvalidCompressionMethod(fields[10]).into());
        }
        if fields[11] != 0 {
            return Err(FormatErrorInner::InvalidFilterMethod(fields[11]).into());
        }
        let interlaced = match fields[12] {
            0 => false,
            1 => true,
            n => return Err(FormatErrorInner::InvalidInterlaceMethod(n).into()),
        };

        self.info = Some(Info {
            width,
            height,
            bit_depth,
            color_type,
            interlaced,
        });

        let format = PixelFormat::from_color_type(color_type, bit_depth)
            .ok_or(FormatErrorInner::SubByteIndexed(bit_depth))?;
        if interlaced {
            return Err(FormatErrorInner::Interlaced.into());
        }

        let size = Image::buffer_size(width, height, format)
            .map_err(|_| DecodingError::LimitsExceeded)?;
        self.limits.reserve_bytes(size)?;
        let image =
            Image::new(width, height, format).map_err(|_| DecodingError::LimitsExceeded)?;

        self.image = Some(image);
        self.position |= DecodePosition::HEADER;
        Ok(())
    }

    fn parse_plte(&mut self, data: &[u8]) -> Result<(), DecodingError> {
        let image = match self.image.as_mut() {
            Some(image) => image,
            None => return Err(FormatErrorInner::ChunkBeforeIhdr { kind: chunk::PLTE }.into()),
        };
        if self.position.contains(DecodePosition::DATA_STARTED) {
            return Err(FormatErrorInner::AfterIdat { kind: chunk::PLTE }.into());
        }
        if self.position.contains(DecodePosition::PALETTE) {
            return Err(FormatErrorInner::DuplicateChunk { kind: chunk::PLTE }.into());
        }
        if image.format().flags().contains(FormatFlags::GRAYSCALE) {
            return Err(FormatErrorInner::PaletteForGrayscale.into());
        }
        if data.len() % 3 != 0 {
            return Err(FormatErrorInner::PaletteLength(data.len()).into());
        }
        let count = data.len() / 3;
        if count > MAX_PALETTE_ENTRIES {
            return Err(FormatErrorInner::PaletteTooLarge(count).into());
        }

        if image.format().is_indexed() {
            let palette = data
                .chunks_exact(3)
                .map(|rgb| [rgb[0], rgb[1], rgb[2]])
                .collect();
            image
                .set_palette(palette)
                .map_err(|_| FormatErrorInner::PaletteTooLarge(count))?;
        } else {
            log::debug!("ignoring suggested palette of {} entries", count);
        }

        self.position |= DecodePosition::PALETTE;
        Ok(())
    }

    fn parse_idat(&mut self, data: &[u8]) -> Result<(), DecodingError> {
        let image = match self.image.as_mut() {
            Some(image) => image,
            None => return Err(FormatErrorInner::ChunkBeforeIhdr { kind: chunk::IDAT }.into()),
        };
        if self.position.contains(DecodePosition::DATA_FINISHED) {
            return Err(FormatErrorInner::IdatAfterStreamEnd.into());
        }
        if image.format().is_indexed() && !self.position.contains(DecodePosition::PALETTE) {
            return Err(FormatErrorInner::MissingPalette.into());
        }

        if !self.position.contains(DecodePosition::DATA_STARTED) {
            self.position |= DecodePosition::DATA_STARTED;
            self.zlib = Some(ZlibStream::new());
            self.cursor = Some(ScanlineCursor::new(image));
        }
        self.idat_chunks += 1;

        let (zlib, cursor) = match (self.zlib.as_mut(), self.cursor.as_mut()) {
            (Some(zlib), Some(cursor)) => (zlib, cursor),
            _ => return Err(FormatErrorInner::IdatAfterStreamEnd.into()),
        };
        let status = zlib.decompress(data, |decompressed| cursor.reconstruct(image, decompressed))?;

        if status == ZlibStatus::StreamEnd {
            if !cursor.is_complete(image) {
                return Err(FormatErrorInner::IncorrectImageDataAmount.into());
            }
            // Ends the decompression session.
            self.zlib = None;
            self.cursor = None;
            self.position |= DecodePosition::DATA_FINISHED;
        }
        Ok(())
    }

    fn parse_iend(&mut self) -> Result<(), DecodingError> {
        if !self.position.contains(DecodePosition::HEADER) {
            return Err(FormatErrorInner::ChunkBeforeIhdr { kind: chunk::IEND }.into());
        }
        if !self.position.contains(DecodePosition::DATA_FINISHED) {
            return Err(FormatErrorInner::MissingImageData.into());
        }
        self.position |= DecodePosition::END;
        Ok(())
    }

    fn parse_decf(&mut self, data: &[u8]) -> Result<(), DecodingError> {
        let fields: &[u8; 8] = data
            .try_into()
            .map_err(|_| FormatErrorInner::DecodedFormatLength(data.len()))?;
        let tag = u32::from_be_bytes([fields[0], fields[1], fields[2], fields[3]]);
        let last_chunk_size = u32::from_be_bytes([fields[4], fields[5], fields[6], fields[7]]);
        self.decoded_format = Some((FormatTag(tag), last_chunk_size));
        Ok(())
    }
}
