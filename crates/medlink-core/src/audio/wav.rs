//! Mono 16-bit PCM WAV sink.

use std::io::{Seek, SeekFrom, Write};

use bytes::BufMut;

/// Sample rate of stethoscope audio.
pub const SAMPLE_RATE: u32 = 8000;

/// Size of the canonical RIFF/WAVE header.
pub const HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Build a 44-byte header for `data_len` bytes of sample data.
pub fn header(data_len: u32) -> [u8; HEADER_LEN] {
    let mut buf = Vec::with_capacity(HEADER_LEN);
    buf.put_slice(b"RIFF");
    buf.put_u32_le(data_len.saturating_add(HEADER_LEN as u32 - 8));
    buf.put_slice(b"WAVE");
    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1); // PCM
    buf.put_u16_le(CHANNELS);
    buf.put_u32_le(SAMPLE_RATE);
    buf.put_u32_le(SAMPLE_RATE * u32::from(BLOCK_ALIGN));
    buf.put_u16_le(BLOCK_ALIGN);
    buf.put_u16_le(BITS_PER_SAMPLE);
    buf.put_slice(b"data");
    buf.put_u32_le(data_len);

    let mut out = [0u8; HEADER_LEN];
    out.copy_from_slice(&buf);
    out
}

/// Writes a header, appends little-endian samples, and patches the size
/// fields on [`finish`](WavWriter::finish).
#[derive(Debug)]
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    data_len: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    /// Write a provisional header and position for sample data.
    pub fn new(mut inner: W) -> std::io::Result<Self> {
        inner.write_all(&header(0))?;
        Ok(Self { inner, data_len: 0 })
    }

    /// Bytes of sample data written so far.
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Append samples as little-endian 16-bit PCM.
    pub fn write_samples(&mut self, samples: &[i16]) -> std::io::Result<()> {
        let mut buf = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            buf.put_i16_le(sample);
        }
        self.inner.write_all(&buf)?;
        self.data_len = self
            .data_len
            .saturating_add(u32::try_from(buf.len()).unwrap_or(u32::MAX));
        Ok(())
    }

    /// Patch the header with the final sizes and return the sink.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.write_all(&header(self.data_len))?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
