//! The in-memory pixel buffer produced by the decoder and consumed by the encoder.

use std::{error, fmt};

use crate::common::{FormatTag, PixelFormat};

/// Palettes hold at most this many entries.
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// A decoded image: row-major pixel bytes plus format metadata.
///
/// Samples wider than eight bits are stored big-endian, exactly as they appear in the scanlines.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    palette: Vec<[u8; 3]>,
    original_format: FormatTag,
    last_chunk_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    ZeroWidth,
    ZeroHeight,
    /// `width * height * pixel size` does not fit into memory.
    TooLarge,
    WrongDataSize { expected: usize, actual: usize },
    PaletteTooLarge(usize),
    PaletteNotIndexed(PixelFormat),
}

impl error::Error for ImageError {}

impl fmt::Display for ImageError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ZeroWidth => write!(fmt, "Image width must be greater than zero"),
            Self::ZeroHeight => write!(fmt, "Image height must be greater than zero"),
            Self::TooLarge => write!(fmt, "Image dimensions overflow the address space"),
            Self::WrongDataSize { expected, actual } => {
                write!(fmt, "Expected {} bytes, found {} bytes", expected, actual)
            }
            Self::PaletteTooLarge(n) => write!(
                fmt,
                "A palette holds at most {} entries, got {}",
                MAX_PALETTE_ENTRIES, n
            ),
            Self::PaletteNotIndexed(format) => {
                write!(fmt, "Format {} does not use a palette", format)
            }
        }
    }
}

impl Image {
    /// Number of bytes needed by an image of the given shape.
    pub fn buffer_size(width: u32, height: u32, format: PixelFormat) -> Result<usize, ImageError> {
        if width == 0 {
            return Err(ImageError::ZeroWidth);
        }
        if height == 0 {
            return Err(ImageError::ZeroHeight);
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.pixel_size()))
            .ok_or(ImageError::TooLarge)
    }

    /// Creates a zero-filled image.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, ImageError> {
        let len = Self::buffer_size(width, height, format)?;
        Ok(Self::with_data(width, height, format, vec![0; len]))
    }

    /// Wraps existing pixel bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let expected = Self::buffer_size(width, height, format)?;
        if data.len() != expected {
            return Err(ImageError::WrongDataSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::with_data(width, height, format, data))
    }

    fn with_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Image {
            width,
            height,
            format,
            data,
            palette: Vec::new(),
            original_format: FormatTag::NONE,
            last_chunk_size: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixel_size(&self) -> usize {
        self.format.pixel_size()
    }

    pub fn channel_size(&self) -> usize {
        self.format.channel_size()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.pixel_size()
    }

    /// All pixel bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// The bytes of row `y`.
    ///
    /// # Panics
    ///
    /// If `y` is not below the height.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * self.pixel_size())
    }

    /// The bytes of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let start = self.pixel_offset(x, y)?;
        Some(&self.data[start..start + self.pixel_size()])
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let start = self.pixel_offset(x, y)?;
        let size = self.pixel_size();
        Some(&mut self.data[start..start + size])
    }

    /// The bytes of one channel of a pixel, `channel_size()` bytes long.
    pub fn channel(&self, x: u32, y: u32, channel: usize) -> Option<&[u8]> {
        if channel >= self.format.channels() {
            return None;
        }
        let size = self.channel_size();
        let start = self.pixel_offset(x, y)? + channel * size;
        Some(&self.data[start..start + size])
    }

    /// The color to display for a pixel.
    ///
    /// For indexed images this is the palette entry the pixel refers to, `None` when the index is
    /// outside the palette. For all other formats it is the pixel's own bytes.
    pub fn color(&self, x: u32, y: u32) -> Option<&[u8]> {
        let pixel = self.pixel(x, y)?;
        if self.format.is_indexed() {
            self.palette.get(usize::from(pixel[0])).map(|rgb| &rgb[..])
        } else {
            Some(pixel)
        }
    }

    /// The palette, empty if there is none.
    pub fn palette(&self) -> &[[u8; 3]] {
        &self.palette
    }

    /// Replaces the palette.
    ///
    /// Only indexed images carry a palette.
    pub fn set_palette(&mut self, palette: Vec<[u8; 3]>) -> Result<(), ImageError> {
        if !self.format.is_indexed() {
            return Err(ImageError::PaletteNotIndexed(self.format));
        }
        if palette.len() > MAX_PALETTE_ENTRIES {
            return Err(ImageError::PaletteTooLarge(palette.len()));
        }
        self.palette = palette;
        Ok(())
    }

    /// The format the pixel bytes had before an external reversible transform, stored in the
    /// private `deCf` chunk.
    pub fn original_format(&self) -> FormatTag {
        self.original_format
    }

    pub fn set_original_format(&mut self, tag: FormatTag) {
        self.original_format = tag;
    }

    /// Size of the last block written by an external reversible transform, stored in the private
    /// `deCf` chunk next to [`original_format`](Self::original_format).
    pub fn last_chunk_size(&self) -> u32 {
        self.last_chunk_size
    }

    pub fn set_last_chunk_size(&mut self, size: u32) {
        self.last_chunk_size = size;
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .field("palette", &self.palette.len())
            .field("original_format", &self.original_format)
            .field("last_chunk_size", &self.last_chunk_size)
            .finish()
    }
}
