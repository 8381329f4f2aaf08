// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sample format conversion and interleave (ByteCodec, component C1).
//!
//! `transfer_samples` moves frames between two buffers that may differ in sample format,
//! endianness, channel count/offset, and frame stride, doing the conversion in one pass.

use crate::errors::{format_error, Result};

/// The PCM/float sample encodings this workspace understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 16-bit integer PCM.
    S16,
    /// Signed 24-bit integer PCM, packed 3 bytes per sample.
    S24,
    /// Signed 32-bit integer PCM.
    S32,
    /// IEEE 32-bit float, range `[-1.0, 1.0)`.
    F32,
    /// IEEE 64-bit float, range `[-1.0, 1.0)`.
    F64,
}

impl SampleFormat {
    /// Number of bytes one sample occupies on the wire.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 => 4,
            SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    /// The `fmt ` chunk's `wBitsPerSample` for this format.
    pub const fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }
}

#[inline]
fn read_int(buf: &[u8], big_endian: bool) -> i64 {
    let mut bytes = [0u8; 8];
    let n = buf.len();
    if big_endian {
        bytes[8 - n..].copy_from_slice(buf);
        let shift = 64 - n * 8;
        (i64::from_be_bytes(bytes) << shift) >> shift
    }
    else {
        bytes[..n].copy_from_slice(buf);
        let shift = 64 - n * 8;
        (i64::from_le_bytes(bytes) << shift) >> shift
    }
}

#[inline]
fn write_int(value: i64, nbytes: usize, big_endian: bool, out: &mut [u8]) {
    if big_endian {
        let full = value.to_be_bytes();
        out.copy_from_slice(&full[8 - nbytes..]);
    }
    else {
        let full = value.to_le_bytes();
        out.copy_from_slice(&full[..nbytes]);
    }
}

/// Converts one sample to a signed 64-bit integer representation, full-scale independent of
/// source width (i.e. a `S16` sample of `1` is scaled up to look like the equivalent `S32`
/// sample), so that narrowing/widening between integer widths is value-preserving.
fn decode_sample(buf: &[u8], fmt: SampleFormat, big_endian: bool) -> i64 {
    match fmt {
        SampleFormat::S16 => read_int(buf, big_endian) << 16,
        SampleFormat::S24 => read_int(buf, big_endian) << 8,
        SampleFormat::S32 => read_int(buf, big_endian),
        SampleFormat::F32 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(buf);
            let f = if big_endian { f32::from_be_bytes(b) } else { f32::from_le_bytes(b) };
            (f.clamp(-1.0, 1.0) as f64 * (1u64 << 31) as f64) as i64
        }
        SampleFormat::F64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(buf);
            let f = if big_endian { f64::from_be_bytes(b) } else { f64::from_le_bytes(b) };
            (f.clamp(-1.0, 1.0) * (1u64 << 31) as f64) as i64
        }
    }
}

fn encode_sample(value_s32: i64, fmt: SampleFormat, big_endian: bool, out: &mut [u8]) {
    match fmt {
        SampleFormat::S16 => {
            let narrowed = (value_s32 >> 16).clamp(i16::MIN as i64, i16::MAX as i64);
            write_int(narrowed, 2, big_endian, out);
        }
        SampleFormat::S24 => {
            let narrowed = (value_s32 >> 8).clamp(-(1 << 23), (1 << 23) - 1);
            write_int(narrowed, 3, big_endian, out);
        }
        SampleFormat::S32 => write_int(value_s32, 4, big_endian, out),
        SampleFormat::F32 => {
            let f = (value_s32 as f64 / (1u64 << 31) as f64) as f32;
            let b = if big_endian { f.to_be_bytes() } else { f.to_le_bytes() };
            out.copy_from_slice(&b);
        }
        SampleFormat::F64 => {
            let f = value_s32 as f64 / (1u64 << 31) as f64;
            let b = if big_endian { f.to_be_bytes() } else { f.to_le_bytes() };
            out.copy_from_slice(&b);
        }
    }
}

/// Description of one side (source or destination) of a `transfer_samples` call.
#[derive(Copy, Clone, Debug)]
pub struct BufferLayout {
    /// Sample format of every channel in this buffer.
    pub format: SampleFormat,
    /// `true` if multi-byte samples are stored big-endian.
    pub big_endian: bool,
    /// Index of the first channel this transfer touches.
    pub first_channel: usize,
    /// Distance, in samples, between the first sample of consecutive frames (i.e. the frame's
    /// total channel count, which may exceed `nchannels` below for partial-channel transfers).
    pub stride: usize,
}

/// Converts and interleaves `nframes` frames of `nchannels` channels from `src` to `dst`,
/// handling differing sample formats, endianness, channel offsets, and frame strides in one
/// pass (component C1, `ByteCodec::transfer_samples`).
pub fn transfer_samples(
    src: &[u8],
    src_layout: BufferLayout,
    dst: &mut [u8],
    dst_layout: BufferLayout,
    nchannels: usize,
    nframes: usize,
) -> Result<()> {
    let src_bps = src_layout.format.bytes_per_sample();
    let dst_bps = dst_layout.format.bytes_per_sample();

    let src_frame_bytes = src_layout.stride * src_bps;
    let dst_frame_bytes = dst_layout.stride * dst_bps;

    if src.len() < src_frame_bytes * nframes || dst.len() < dst_frame_bytes * nframes {
        return format_error("sample transfer: buffer too short for requested frame count");
    }

    for frame in 0..nframes {
        let src_frame = &src[frame * src_frame_bytes..];
        let dst_frame = &mut dst[frame * dst_frame_bytes..];

        for ch in 0..nchannels {
            let src_off = (src_layout.first_channel + ch) * src_bps;
            let dst_off = (dst_layout.first_channel + ch) * dst_bps;

            let raw = decode_sample(
                &src_frame[src_off..src_off + src_bps],
                src_layout.format,
                src_layout.big_endian,
            );
            encode_sample(
                raw,
                dst_layout.format,
                dst_layout.big_endian,
                &mut dst_frame[dst_off..dst_off + dst_bps],
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s16_round_trips_through_s32() {
        let src: [i16; 4] = [0, 1000, -1000, i16::MAX];
        let mut src_bytes = Vec::new();
        for s in src {
            src_bytes.extend_from_slice(&s.to_le_bytes());
        }

        let src_layout = BufferLayout {
            format: SampleFormat::S16,
            big_endian: false,
            first_channel: 0,
            stride: 1,
        };
        let mid_layout =
            BufferLayout { format: SampleFormat::S32, big_endian: false, first_channel: 0, stride: 1 };

        let mut mid = vec![0u8; 4 * 4];
        transfer_samples(&src_bytes, src_layout, &mut mid, mid_layout, 1, 4).unwrap();

        let mut back = vec![0u8; 4 * 2];
        transfer_samples(&mid, mid_layout, &mut back, src_layout, 1, 4).unwrap();

        for (i, s) in src.iter().enumerate() {
            let got = i16::from_le_bytes([back[i * 2], back[i * 2 + 1]]);
            assert_eq!(got, *s);
        }
    }

    #[test]
    fn channel_offset_selects_subset() {
        // Two interleaved stereo frames, transfer only channel 1 into a mono destination.
        let mut src_bytes = Vec::new();
        for (l, r) in [(1000i16, -1000i16), (500, -500)] {
            src_bytes.extend_from_slice(&l.to_le_bytes());
            src_bytes.extend_from_slice(&r.to_le_bytes());
        }

        let src_layout =
            BufferLayout { format: SampleFormat::S16, big_endian: false, first_channel: 1, stride: 2 };
        let dst_layout =
            BufferLayout { format: SampleFormat::S16, big_endian: false, first_channel: 0, stride: 1 };

        let mut dst = vec![0u8; 4];
        transfer_samples(&src_bytes, src_layout, &mut dst, dst_layout, 1, 2).unwrap();

        assert_eq!(i16::from_le_bytes([dst[0], dst[1]]), -1000);
        assert_eq!(i16::from_le_bytes([dst[2], dst[3]]), -500);
    }

    #[test]
    fn big_endian_source_decodes_correctly() {
        let src_layout =
            BufferLayout { format: SampleFormat::S16, big_endian: true, first_channel: 0, stride: 1 };
        let dst_layout =
            BufferLayout { format: SampleFormat::S16, big_endian: false, first_channel: 0, stride: 1 };

        let src_bytes = 1234i16.to_be_bytes();
        let mut dst = vec![0u8; 2];
        transfer_samples(&src_bytes, src_layout, &mut dst, dst_layout, 1, 1).unwrap();
        assert_eq!(i16::from_le_bytes([dst[0], dst[1]]), 1234);
    }
}
