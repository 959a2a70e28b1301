use std::io::Write;

use flate2::{Compress, FlushCompress, Status};

use super::EncodingError;
use crate::chunk::{self, encode_chunk};
use crate::common::Compression;

/// Compresses filtered scanlines into a fixed-size buffer and emits an `IDAT` chunk every time
/// the buffer fills up.
///
/// The zlib stream only ends in [`finish`](Self::finish). Dropping the writer early abandons the
/// stream without writing anything further.
pub(crate) struct IdatWriter<'a, W: Write> {
    w: &'a mut W,
    state: Compress,
    out_buffer: Vec<u8>,
    filled: usize,
    chunks: usize,
}

impl<'a, W: Write> IdatWriter<'a, W> {
    pub(crate) fn new(w: &'a mut W, compression: Compression, buffer_size: usize) -> Self {
        IdatWriter {
            w,
            state: Compress::new(compression.to_flate2(), true),
            out_buffer: vec![0; buffer_size.max(1)],
            filled: 0,
            chunks: 0,
        }
    }

    /// Feeds filtered scanline bytes to the compressor.
    pub(crate) fn write(&mut self, mut data: &[u8]) -> Result<(), EncodingError> {
        while !data.is_empty() {
            let (consumed, produced, _) = self.compress(data, FlushCompress::None)?;
            data = &data[consumed..];
            if self.filled == self.out_buffer.len() {
                self.flush_chunk()?;
            } else if consumed == 0 && produced == 0 {
                return Err(EncodingError::Compression(
                    "compressor made no progress".into(),
                ));
            }
        }
        Ok(())
    }

    /// Terminates the zlib stream and writes the remaining bytes as the last `IDAT` chunk.
    ///
    /// Returns the number of `IDAT` chunks written in total.
    pub(crate) fn finish(mut self) -> Result<usize, EncodingError> {
        loop {
            let (_, produced, status) = self.compress(&[], FlushCompress::Finish)?;
            if status == Status::StreamEnd {
                if self.filled > 0 {
                    self.flush_chunk()?;
                }
                return Ok(self.chunks);
            }
            if self.filled == self.out_buffer.len() {
                self.flush_chunk()?;
            } else if produced == 0 {
                return Err(EncodingError::Compression(
                    "compressor stalled while finishing".into(),
                ));
            }
        }
    }

    fn compress(
        &mut self,
        input: &[u8],
        flush: FlushCompress,
    ) -> Result<(usize, usize, Status), EncodingError> {
        let in_before = self.state.total_in();
        let out_before = self.state.total_out();
        let status = self
            .state
            .compress(input, &mut self.out_buffer[self.filled..], flush)
            .map_err(|err| EncodingError::Compression(err.to_string()))?;
        let consumed = (self.state.total_in() - in_before) as usize;
        let produced = (self.state.total_out() - out_before) as usize;
        self.filled += produced;
        Ok((consumed, produced, status))
    }

    fn flush_chunk(&mut self) -> Result<(), EncodingError> {
        encode_chunk(&mut *self.w, chunk::IDAT, &self.out_buffer[..self.filled])?;
        self.filled = 0;
        self.chunks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::read_chunk;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn idat_payloads(stream: &[u8]) -> Vec<Vec<u8>> {
        let mut r = stream;
        let mut payloads = Vec::new();
        while let Some(chunk) = read_chunk(&mut r).unwrap() {
            assert_eq!(chunk.type_, chunk::IDAT);
            assert!(chunk.crc_matches());
            payloads.push(chunk.data);
        }
        payloads
    }

    #[test]
    fn small_buffer_splits_stream() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut out = Vec::new();
        let mut writer = IdatWriter::new(&mut out, Compression::NoCompression, 100);
        writer.write(&data).unwrap();
        let count = writer.finish().unwrap();

        let payloads = idat_payloads(&out);
        assert_eq!(payloads.len(), count);
        assert!(count > 1);
        assert!(payloads.iter().all(|p| !p.is_empty() && p.len() <= 100));

        let joined = payloads.concat();
        let mut decompressed = Vec::new();
        ZlibDecoder::new(&joined[..])
            .read_to_end(&mut decompressed)
            .unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn large_buffer_writes_single_chunk() {
        let mut out = Vec::new();
        let mut writer = IdatWriter::new(&mut out, Compression::default(), 1 << 16);
        writer.write(&[0; 4096]).unwrap();
        assert_eq!(writer.finish().unwrap(), 1);
    }
}
