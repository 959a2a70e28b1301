use super::stream::{DecodingError, FormatErrorInner};
use crate::filter::{unfilter_byte, RowFilter};
use crate::Image;

/// Resumable position of the scanline reconstruction.
///
/// Decompressed image data arrives in arbitrary slices; a row, or even a single pixel, may be
/// split across several of them. The cursor records exactly where the previous slice stopped so
/// the next one continues byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanlineCursor {
    row: u32,
    column: u32,
    /// Bytes of the current pixel not yet written.
    remaining_in_pixel: usize,
    /// Filter of the current row, `None` until its tag byte was consumed.
    filter: Option<RowFilter>,
}

impl ScanlineCursor {
    pub(crate) fn new(image: &Image) -> Self {
        ScanlineCursor {
            row: 0,
            column: 0,
            remaining_in_pixel: image.pixel_size(),
            filter: None,
        }
    }

    /// Every row of the image has been reconstructed.
    pub(crate) fn is_complete(&self, image: &Image) -> bool {
        self.row == image.height() && self.column == 0
    }

    /// Unfilters `data` into `image`, continuing where the last call stopped.
    ///
    /// Running out of input anywhere in a row is fine. Bytes beyond the last row are an error.
    pub(crate) fn reconstruct(
        &mut self,
        image: &mut Image,
        mut data: &[u8],
    ) -> Result<(), DecodingError> {
        let pixel_size = image.pixel_size();
        let stride = image.stride();

        while let Some((&byte, rest)) = data.split_first() {
            if self.row == image.height() {
                return Err(FormatErrorInner::IncorrectImageDataAmount.into());
            }

            let filter = match self.filter {
                Some(filter) => filter,
                None => {
                    let filter = RowFilter::from_u8(byte)
                        .ok_or(FormatErrorInner::UnknownFilterMethod(byte))?;
                    self.filter = Some(filter);
                    data = rest;
                    continue;
                }
            };

            // Neighbours at the same byte offset of the pixel to the left, above and above-left.
            let offset = pixel_size - self.remaining_in_pixel;
            let pos = self.row as usize * stride + self.column as usize * pixel_size + offset;
            let pixels = image.data_mut();
            let left = if self.column > 0 {
                pixels[pos - pixel_size]
            } else {
                0
            };
            let (top, top_left) = if self.row > 0 {
                let above = pos - stride;
                let top_left = if self.column > 0 {
                    pixels[above - pixel_size]
                } else {
                    0
                };
                (pixels[above], top_left)
            } else {
                (0, 0)
            };
            pixels[pos] = unfilter_byte(filter, byte, left, top, top_left);
            data = rest;

            self.remaining_in_pixel -= 1;
            if self.remaining_in_pixel == 0 {
                self.remaining_in_pixel = pixel_size;
                self.column += 1;
                if self.column == image.width() {
                    self.column = 0;
                    self.row += 1;
                    self.filter = None;
                }
            }
        }

        Ok(())
    }
}
