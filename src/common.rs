//! Common types shared between the encoder and decoder

use std::fmt;

/// The eight bytes every PNG stream starts with.
pub const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Color mode as stored in the `IHDR` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorType {
    Grayscale = 0,
    Rgb = 2,
    Indexed = 3,
    GrayscaleAlpha = 4,
    Rgba = 6,
}

impl ColorType {
    /// Returns the number of samples used per pixel encoded in this way.
    pub fn samples(self) -> usize {
        use self::ColorType::*;
        match self {
            Grayscale | Indexed => 1,
            Rgb => 3,
            GrayscaleAlpha => 2,
            Rgba => 4,
        }
    }

    /// The color mode for an `IHDR` color type byte.
    pub fn from_u8(n: u8) -> Option<ColorType> {
        match n {
            0 => Some(ColorType::Grayscale),
            2 => Some(ColorType::Rgb),
            3 => Some(ColorType::Indexed),
            4 => Some(ColorType::GrayscaleAlpha),
            6 => Some(ColorType::Rgba),
            _ => None,
        }
    }
}

/// Bit depth of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BitDepth {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
    Sixteen = 16,
}

impl BitDepth {
    /// u8 -> Self.
    pub fn from_u8(n: u8) -> Option<BitDepth> {
        match n {
            1 => Some(BitDepth::One),
            2 => Some(BitDepth::Two),
            4 => Some(BitDepth::Four),
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            _ => None,
        }
    }

    pub(crate) fn into_u8(self) -> u8 {
        self as u8
    }
}

bitflags::bitflags! {
    /// Coarse properties of a [`PixelFormat`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatFlags: u32 {
        const ALPHA = 0x10_0000;
        const GRAYSCALE = 0x20_0000;
        const TRUECOLOR = 0x40_0000;
    }
}

/// In-memory layout of one pixel.
///
/// The discriminants are stable numeric codes. They pack the pixel size in bytes (lowest byte),
/// a format index (second byte), the channel count (third nibble) and the [`FormatFlags`]. The
/// codes are what the private `deCf` chunk stores, see [`FormatTag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PixelFormat {
    /// 8-bit luminance.
    Gray8 = 0x0021_0101,
    /// 24-bit RGB.
    Rgb24 = 0x0043_0203,
    /// 48-bit RGB, big-endian samples.
    Rgb48 = 0x0043_0306,
    /// 32-bit RGBA.
    Rgba32 = 0x0054_0404,
    /// 8-bit luminance with 8-bit alpha.
    GrayAlpha16 = 0x0032_0502,
    /// 16-bit luminance, big-endian.
    Gray16 = 0x0021_0602,
    /// 64-bit RGBA, big-endian samples.
    Rgba64 = 0x0054_0708,
    /// 16-bit luminance with 16-bit alpha.
    GrayAlpha32 = 0x0032_0804,
    /// 8-bit index into a palette.
    Indexed8 = 0x0001_0901,
}

impl PixelFormat {
    const ALL: [PixelFormat; 9] = [
        PixelFormat::Gray8,
        PixelFormat::Rgb24,
        PixelFormat::Rgb48,
        PixelFormat::Rgba32,
        PixelFormat::GrayAlpha16,
        PixelFormat::Gray16,
        PixelFormat::Rgba64,
        PixelFormat::GrayAlpha32,
        PixelFormat::Indexed8,
    ];

    /// The stable numeric code of this format.
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Looks up a format by its numeric code.
    pub fn from_tag(tag: u32) -> Option<PixelFormat> {
        Self::ALL.iter().copied().find(|format| format.tag() == tag)
    }

    /// Number of bytes per pixel.
    pub fn pixel_size(self) -> usize {
        (self.tag() & 0xFF) as usize
    }

    /// Number of channels per pixel.
    pub fn channels(self) -> usize {
        ((self.tag() >> 16) & 0xF) as usize
    }

    /// Number of bytes per channel.
    pub fn channel_size(self) -> usize {
        self.pixel_size() / self.channels()
    }

    pub fn flags(self) -> FormatFlags {
        FormatFlags::from_bits_truncate(self.tag())
    }

    pub fn is_indexed(self) -> bool {
        self == PixelFormat::Indexed8
    }

    pub fn has_alpha(self) -> bool {
        self.flags().contains(FormatFlags::ALPHA)
    }

    /// Maps an `IHDR` color mode and sample depth onto the in-memory format.
    ///
    /// Returns `None` for combinations without a byte-aligned representation.
    pub fn from_color_type(color_type: ColorType, bit_depth: BitDepth) -> Option<PixelFormat> {
        use self::BitDepth::*;
        use self::ColorType::*;
        Some(match (color_type, bit_depth) {
            (Grayscale, Eight) => PixelFormat::Gray8,
            (Grayscale, Sixteen) => PixelFormat::Gray16,
            (Rgb, Eight) => PixelFormat::Rgb24,
            (Rgb, Sixteen) => PixelFormat::Rgb48,
            (Rgba, Eight) => PixelFormat::Rgba32,
            (Rgba, Sixteen) => PixelFormat::Rgba64,
            (GrayscaleAlpha, Eight) => PixelFormat::GrayAlpha16,
            (GrayscaleAlpha, Sixteen) => PixelFormat::GrayAlpha32,
            (Indexed, Eight) => PixelFormat::Indexed8,
            _ => return None,
        })
    }

    /// The `IHDR` color mode used when writing this format.
    ///
    /// Derived from the format flags: the truecolor flag selects the RGB family and the alpha flag
    /// adds the alpha bit.
    pub fn color_type(self) -> ColorType {
        if self.is_indexed() {
            return ColorType::Indexed;
        }
        let flags = self.flags();
        let mut mode = 0;
        if flags.contains(FormatFlags::TRUECOLOR) {
            mode |= ColorType::Rgb as u8;
        }
        if flags.contains(FormatFlags::ALPHA) {
            mode |= 4;
        }
        // All flag combinations produced above are valid color modes.
        ColorType::from_u8(mode).unwrap_or(ColorType::Grayscale)
    }

    /// The `IHDR` sample depth used when writing this format.
    pub fn bit_depth(self) -> BitDepth {
        if self.is_indexed() {
            return BitDepth::Eight;
        }
        match self.channel_size() {
            2 => BitDepth::Sixteen,
            _ => BitDepth::Eight,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Content of the private `deCf` chunk: the pixel format an image had before a reversible
/// transform (such as encryption) rewrote its bytes.
///
/// The codec stores and restores this value but gives it no further meaning. Unknown codes are
/// kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FormatTag(pub u32);

impl FormatTag {
    /// No transform was applied.
    pub const NONE: FormatTag = FormatTag(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// The format this tag names, if it is a known code.
    pub fn pixel_format(self) -> Option<PixelFormat> {
        PixelFormat::from_tag(self.0)
    }
}

impl From<PixelFormat> for FormatTag {
    fn from(format: PixelFormat) -> Self {
        FormatTag(format.tag())
    }
}

/// Image header as read from the `IHDR` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
    pub width: u32,
    pub height: u32,
    pub bit_depth: BitDepth,
    pub color_type: ColorType,
    pub interlaced: bool,
}

impl Info {
    /// Size of the image, width then height.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// The type and strength of applied compression.
///
/// This is a simple, high-level interface that will automatically choose
/// the appropriate zlib level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Compression {
    /// No compression whatsoever. Fastest, but results in large files.
    NoCompression,
    /// Extremely fast but light compression.
    Fastest,
    /// Extremely fast compression with a decent compression ratio.
    Fast,
    /// Balances encoding speed and compression ratio.
    #[default]
    Balanced,
    /// Spend much more time to produce a slightly smaller file than with `Balanced`.
    High,
}

impl Compression {
    pub(crate) fn to_flate2(self) -> flate2::Compression {
        match self {
            Compression::NoCompression => flate2::Compression::none(),
            Compression::Fastest => flate2::Compression::fast(),
            Compression::Fast => flate2::Compression::new(3),
            Compression::Balanced => flate2::Compression::default(),
            Compression::High => flate2::Compression::best(),
        }
    }
}
