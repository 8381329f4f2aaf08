// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `fmt ` chunk: `WAVEFORMAT`/`WAVEFORMATEX`/`WAVEFORMATEXTENSIBLE`.

use admbwf_core::errors::{format_error, Result};
use admbwf_core::io::{ReadBytes, WriteBytes};
use admbwf_core::SampleFormat;

use crate::common::ParseChunk;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// The KSDATAFORMAT subformat GUID identifying PCM data inside a `WAVEFORMATEXTENSIBLE` chunk.
const KSDATAFORMAT_SUBTYPE_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// The KSDATAFORMAT subformat GUID identifying IEEE float data.
const KSDATAFORMAT_SUBTYPE_IEEE_FLOAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Parsed `fmt ` chunk payload, reduced to what this workspace's `ByteCodec` understands
/// (component C1's sample formats): S16, S24 packed, S32, F32, F64.
#[derive(Debug, Clone, Copy)]
pub struct WaveFormatChunk {
    pub n_channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub sample_format: SampleFormat,
}

impl WaveFormatChunk {
    fn sample_format_for_pcm(bits_per_sample: u16) -> Result<SampleFormat> {
        match bits_per_sample {
            16 => Ok(SampleFormat::S16),
            24 => Ok(SampleFormat::S24),
            32 => Ok(SampleFormat::S32),
            _ => format_error("wav: bits per sample for PCM fmt must be 16, 24 or 32"),
        }
    }

    fn sample_format_for_float(bits_per_sample: u16) -> Result<SampleFormat> {
        match bits_per_sample {
            32 => Ok(SampleFormat::F32),
            64 => Ok(SampleFormat::F64),
            _ => format_error("wav: bits per sample for IEEE float fmt must be 32 or 64"),
        }
    }

    /// Serializes a basic (16-byte) PCM or IEEE-float `fmt ` chunk body.
    pub fn write<W: WriteBytes>(&self, w: &mut W) -> Result<()> {
        let format_tag = match self.sample_format {
            SampleFormat::S16 | SampleFormat::S24 | SampleFormat::S32 => WAVE_FORMAT_PCM,
            SampleFormat::F32 | SampleFormat::F64 => WAVE_FORMAT_IEEE_FLOAT,
        };

        w.write_u16(format_tag)?;
        w.write_u16(self.n_channels)?;
        w.write_u32(self.sample_rate)?;
        w.write_u32(self.avg_bytes_per_sec)?;
        w.write_u16(self.block_align)?;
        w.write_u16(self.sample_format.bits_per_sample())?;
        Ok(())
    }

    /// Number of bytes this `fmt ` chunk's body occupies (always the basic 16-byte form on write).
    pub const WRITE_LEN: u32 = 16;
}

impl ParseChunk for WaveFormatChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        if len < 16 {
            return format_error("wav: fmt chunk shorter than WAVEFORMAT");
        }

        let format_tag = reader.read_u16()?;
        let n_channels = reader.read_u16()?;
        let sample_rate = reader.read_u32()?;
        let avg_bytes_per_sec = reader.read_u32()?;
        let block_align = reader.read_u16()?;
        let bits_per_sample = reader.read_u16()?;

        let mut consumed = 16u32;

        let sample_format = match format_tag {
            WAVE_FORMAT_PCM => {
                if len > consumed {
                    reader.ignore_bytes(u64::from(len - consumed))?;
                }
                Self::sample_format_for_pcm(bits_per_sample)?
            }
            WAVE_FORMAT_IEEE_FLOAT => {
                if len > consumed {
                    reader.ignore_bytes(u64::from(len - consumed))?;
                }
                Self::sample_format_for_float(bits_per_sample)?
            }
            WAVE_FORMAT_EXTENSIBLE => {
                if len < 40 {
                    return format_error("wav: fmt chunk too short for WAVEFORMATEXTENSIBLE");
                }

                let extension_len = reader.read_u16()?;
                consumed += 2;
                if extension_len < 22 {
                    return format_error("wav: WAVEFORMATEXTENSIBLE extension too short");
                }

                let valid_bits_per_sample = reader.read_u16()?;
                let _channel_mask = reader.read_u32()?;
                let mut sub_format = [0u8; 16];
                reader.read_buf_exact(&mut sub_format)?;
                consumed += 22;

                let effective_bits =
                    if valid_bits_per_sample != 0 { valid_bits_per_sample } else { bits_per_sample };

                let fmt = if sub_format == KSDATAFORMAT_SUBTYPE_PCM {
                    Self::sample_format_for_pcm(effective_bits)?
                }
                else if sub_format == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT {
                    Self::sample_format_for_float(effective_bits)?
                }
                else {
                    return format_error("wav: unsupported WAVEFORMATEXTENSIBLE subformat");
                };

                if len > consumed {
                    reader.ignore_bytes(u64::from(len - consumed))?;
                }

                fmt
            }
            _ => return format_error("wav: unsupported fmt format tag"),
        };

        Ok(WaveFormatChunk { n_channels, sample_rate, avg_bytes_per_sec, block_align, sample_format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pcm16_fmt_bytes(channels: u16, rate: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        v.extend_from_slice(&channels.to_le_bytes());
        v.extend_from_slice(&rate.to_le_bytes());
        v.extend_from_slice(&(rate * channels as u32 * 2).to_le_bytes());
        v.extend_from_slice(&(channels * 2).to_le_bytes());
        v.extend_from_slice(&16u16.to_le_bytes());
        v
    }

    #[test]
    fn parses_basic_pcm16() {
        let bytes = pcm16_fmt_bytes(2, 48_000);
        let mut cur = Cursor::new(bytes.clone());
        let chunk = WaveFormatChunk::parse(&mut cur, *b"fmt ", bytes.len() as u32).unwrap();
        assert_eq!(chunk.n_channels, 2);
        assert_eq!(chunk.sample_rate, 48_000);
        assert_eq!(chunk.sample_format, SampleFormat::S16);
    }

    #[test]
    fn parses_pcm24() {
        let mut v = Vec::new();
        v.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        v.extend_from_slice(&2u16.to_le_bytes());
        v.extend_from_slice(&48_000u32.to_le_bytes());
        v.extend_from_slice(&(48_000u32 * 6).to_le_bytes());
        v.extend_from_slice(&6u16.to_le_bytes());
        v.extend_from_slice(&24u16.to_le_bytes());

        let mut cur = Cursor::new(v.clone());
        let chunk = WaveFormatChunk::parse(&mut cur, *b"fmt ", v.len() as u32).unwrap();
        assert_eq!(chunk.sample_format, SampleFormat::S24);
    }

    #[test]
    fn round_trips_write_and_parse() {
        let chunk = WaveFormatChunk {
            n_channels: 2,
            sample_rate: 44_100,
            avg_bytes_per_sec: 44_100 * 4,
            block_align: 4,
            sample_format: SampleFormat::S16,
        };

        let mut buf = Vec::new();
        chunk.write(&mut buf).unwrap();

        let mut cur = Cursor::new(buf.clone());
        let parsed = WaveFormatChunk::parse(&mut cur, *b"fmt ", buf.len() as u32).unwrap();
        assert_eq!(parsed.n_channels, chunk.n_channels);
        assert_eq!(parsed.sample_rate, chunk.sample_rate);
        assert_eq!(parsed.sample_format, chunk.sample_format);
    }

    #[test]
    fn rejects_extensible_with_unsupported_subformat() {
        let mut v = Vec::new();
        v.extend_from_slice(&WAVE_FORMAT_EXTENSIBLE.to_le_bytes());
        v.extend_from_slice(&2u16.to_le_bytes());
        v.extend_from_slice(&48_000u32.to_le_bytes());
        v.extend_from_slice(&(48_000u32 * 6).to_le_bytes());
        v.extend_from_slice(&6u16.to_le_bytes());
        v.extend_from_slice(&24u16.to_le_bytes());
        v.extend_from_slice(&22u16.to_le_bytes());
        v.extend_from_slice(&24u16.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(&[0xAAu8; 16]);

        let mut cur = Cursor::new(v.clone());
        assert!(WaveFormatChunk::parse(&mut cur, *b"fmt ", v.len() as u32).is_err());
    }
}
