use flate2::{Decompress, FlushDecompress, Status};

use super::stream::{DecodingError, FormatErrorInner};

/// Size of the intermediate buffer decompressed scanline bytes pass through.
const OUT_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ZlibStatus {
    /// All input was consumed, the stream continues in a later chunk.
    NeedsInput,
    /// The end of the zlib stream was reached.
    StreamEnd,
}

/// Ergonomics wrapper around [`flate2::Decompress`] for zlib data split over several `IDAT`
/// chunks.
///
/// One instance lives for exactly one decode; it is dropped once the stream ended or the decode
/// was aborted.
pub(crate) struct ZlibStream {
    state: Decompress,
    out_buffer: Vec<u8>,
    finished: bool,
}

impl ZlibStream {
    pub(crate) fn new() -> Self {
        ZlibStream {
            state: Decompress::new(true),
            out_buffer: vec![0; OUT_BUFFER_SIZE],
            finished: false,
        }
    }

    /// Decompresses all of `data`, handing each produced slice to `sink` in order.
    ///
    /// Input left over after the end of the zlib stream is an error, as is a second call once the
    /// stream ended.
    pub(crate) fn decompress<F>(
        &mut self,
        mut data: &[u8],
        mut sink: F,
    ) -> Result<ZlibStatus, DecodingError>
    where
        F: FnMut(&[u8]) -> Result<(), DecodingError>,
    {
        if self.finished {
            return if data.is_empty() {
                Ok(ZlibStatus::StreamEnd)
            } else {
                Err(FormatErrorInner::ExtraCompressedData.into())
            };
        }

        loop {
            let in_before = self.state.total_in();
            let out_before = self.state.total_out();
            let status = self
                .state
                .decompress(data, &mut self.out_buffer, FlushDecompress::None)
                .map_err(|err| FormatErrorInner::CorruptFlateStream(err.to_string()))?;
            let consumed = (self.state.total_in() - in_before) as usize;
            let produced = (self.state.total_out() - out_before) as usize;
            data = &data[consumed..];

            if produced > 0 {
                sink(&self.out_buffer[..produced])?;
            }

            match status {
                Status::StreamEnd => {
                    self.finished = true;
                    if !data.is_empty() {
                        return Err(FormatErrorInner::ExtraCompressedData.into());
                    }
                    return Ok(ZlibStatus::StreamEnd);
                }
                Status::Ok | Status::BufError => {
                    // A full output buffer may hide more pending output even without input.
                    let out_full = produced == self.out_buffer.len();
                    if data.is_empty() && !out_full {
                        return Ok(ZlibStatus::NeedsInput);
                    }
                    if consumed == 0 && produced == 0 {
                        return Err(FormatErrorInner::CorruptFlateStream(
                            "decompressor made no progress".into(),
                        )
                        .into());
                    }
                }
            }
        }
    }
}
