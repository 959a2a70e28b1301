mod idat;

use std::io::{self, Write};
use std::{error, fmt, result};

use self::idat::IdatWriter;
use crate::chunk::{self, encode_chunk};
use crate::common::{Compression, SIGNATURE};
use crate::filter::{filter_row, Filter, RowFilter};
use crate::image::{Image, ImageError};

pub type Result<T = ()> = result::Result<T, EncodingError>;

/// Upper bound for the scanline bytes staged before they are handed to the compressor.
const STAGING_BUFFER_SIZE: usize = 1 << 16;

/// Any error that can occur while encoding.
#[derive(Debug)]
pub enum EncodingError {
    IoError(io::Error),
    /// The compression library reported a failure.
    Compression(String),
    /// An indexed image without palette entries.
    MissingPalette,
    Image(ImageError),
}

impl error::Error for EncodingError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            EncodingError::IoError(err) => Some(err),
            EncodingError::Image(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Self::IoError(err) => write!(fmt, "{}", err),
            Self::Compression(err) => write!(fmt, "Compression failed: {}", err),
            Self::MissingPalette => write!(fmt, "Missing palette for indexed image color data"),
            Self::Image(err) => write!(fmt, "{}", err),
        }
    }
}

impl From<io::Error> for EncodingError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<ImageError> for EncodingError {
    fn from(err: ImageError) -> Self {
        Self::Image(err)
    }
}

impl From<EncodingError> for io::Error {
    fn from(err: EncodingError) -> Self {
        match err {
            EncodingError::IoError(err) => err,
            err => Self::new(io::ErrorKind::Other, err.to_string()),
        }
    }
}

/// Settings for [`Encoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub compression: Compression,
    /// Row filter strategy. Indexed images always use [`Filter::NoFilter`].
    pub filter: Filter,
    /// Size of the compressed output buffer, which is the maximum `IDAT` payload. At least 1.
    pub idat_buffer_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            compression: Compression::default(),
            filter: Filter::default(),
            // 64 KiB including the chunk framing.
            idat_buffer_size: (1 << 16) - 12,
        }
    }
}

/// PNG Encoder
///
/// Writes an [`Image`] as signature, `IHDR`, optional `PLTE`, optional `deCf`, one or more
/// `IDAT` and `IEND`, in that order.
pub struct Encoder<W: Write> {
    w: W,
    options: EncodeOptions,
}

impl<W: Write> Encoder<W> {
    pub fn new(w: W) -> Encoder<W> {
        Encoder::with_options(w, EncodeOptions::default())
    }

    pub fn with_options(w: W, options: EncodeOptions) -> Encoder<W> {
        Encoder { w, options }
    }

    /// Set the compression level to use.
    pub fn set_compression(&mut self, compression: Compression) {
        self.options.compression = compression;
    }

    /// Set the row filter strategy.
    pub fn set_filter(&mut self, filter: Filter) {
        self.options.filter = filter;
    }

    /// Set the maximum `IDAT` payload size.
    pub fn set_idat_buffer_size(&mut self, size: usize) {
        self.options.idat_buffer_size = size.max(1);
    }

    /// Encodes `image` as one complete PNG stream.
    ///
    /// The image is only read. Nothing is written when the image fails the pre-checks.
    pub fn encode(&mut self, image: &Image) -> Result<()> {
        let format = image.format();
        if format.is_indexed() && image.palette().is_empty() {
            return Err(EncodingError::MissingPalette);
        }

        self.w.write_all(&SIGNATURE)?;
        self.write_header(image)?;
        if !image.palette().is_empty() {
            let palette: Vec<u8> = image.palette().iter().flatten().copied().collect();
            encode_chunk(&mut self.w, chunk::PLTE, &palette)?;
        }
        if !image.original_format().is_none() {
            let mut data = [0; 8];
            data[..4].copy_from_slice(&image.original_format().0.to_be_bytes());
            data[4..].copy_from_slice(&image.last_chunk_size().to_be_bytes());
            encode_chunk(&mut self.w, chunk::deCf, &data)?;
        }
        let idat_chunks = self.write_image_data(image)?;
        encode_chunk(&mut self.w, chunk::IEND, &[])?;

        log::debug!(
            "encoded {}x{} {} image into {} IDAT chunks",
            image.width(),
            image.height(),
            format,
            idat_chunks
        );
        Ok(())
    }

    fn write_header(&mut self, image: &Image) -> Result<()> {
        let format = image.format();
        let mut data = [0; 13];
        data[..4].copy_from_slice(&image.width().to_be_bytes());
        data[4..8].copy_from_slice(&image.height().to_be_bytes());
        data[8] = format.bit_depth().into_u8();
        data[9] = format.color_type() as u8;
        // compression, filter and interlace method are all 0
        encode_chunk(&mut self.w, chunk::IHDR, &data)?;
        Ok(())
    }

    /// Filters every row and streams the result through the compressor.
    fn write_image_data(&mut self, image: &Image) -> Result<usize> {
        let bpp = image.pixel_size();
        let stride = image.stride();
        let filter = if image.format().is_indexed() {
            Filter::NoFilter
        } else {
            self.options.filter
        };

        let rows_per_batch = (STAGING_BUFFER_SIZE / (stride + 1)).max(1);
        let batch_len = rows_per_batch * (stride + 1);
        let mut staging = Vec::with_capacity(batch_len);
        let zero_row = vec![0; stride];
        let mut writer = IdatWriter::new(
            &mut self.w,
            self.options.compression,
            self.options.idat_buffer_size,
        );

        for y in 0..image.height() {
            let previous = if y == 0 { &zero_row[..] } else { image.row(y - 1) };
            let start = staging.len();
            staging.resize(start + 1 + stride, 0);
            let chosen: RowFilter = filter_row(
                filter,
                bpp,
                previous,
                image.row(y),
                &mut staging[start + 1..],
            );
            staging[start] = chosen as u8;

            if staging.len() == batch_len {
                writer.write(&staging)?;
                staging.clear();
            }
        }
        writer.write(&staging)?;
        writer.finish()
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::read_chunk;
    use crate::common::{FormatTag, PixelFormat};

    fn chunk_types(stream: &[u8]) -> Vec<chunk::ChunkType> {
        assert_eq!(stream[..8], SIGNATURE);
        let mut r = &stream[8..];
        let mut types = Vec::new();
        while let Some(chunk) = read_chunk(&mut r).unwrap() {
            assert!(chunk.crc_matches());
            types.push(chunk.type_);
        }
        types
    }

    #[test]
    fn writes_chunks_in_order() {
        let mut image = Image::new(4, 4, PixelFormat::Indexed8).unwrap();
        image.set_palette(vec![[1, 2, 3], [4, 5, 6]]).unwrap();
        image.set_original_format(FormatTag::from(PixelFormat::Rgb24));

        let mut encoder = Encoder::new(Vec::new());
        encoder.encode(&image).unwrap();
        assert_eq!(
            chunk_types(&encoder.into_inner()),
            [chunk::IHDR, chunk::PLTE, chunk::deCf, chunk::IDAT, chunk::IEND]
        );
    }

    #[test]
    fn optional_chunks_are_omitted() {
        let image = Image::new(3, 2, PixelFormat::Rgba64).unwrap();
        let mut encoder = Encoder::new(Vec::new());
        encoder.encode(&image).unwrap();
        assert_eq!(
            chunk_types(&encoder.into_inner()),
            [chunk::IHDR, chunk::IDAT, chunk::IEND]
        );
    }

    #[test]
    fn empty_palette_writes_nothing() {
        let image = Image::new(1, 1, PixelFormat::Indexed8).unwrap();
        let mut encoder = Encoder::new(Vec::new());
        assert!(matches!(
            encoder.encode(&image),
            Err(EncodingError::MissingPalette)
        ));
        assert!(encoder.into_inner().is_empty());
    }
}
