// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Random-access, clip-bounded sample I/O over a `data` chunk's file region (component C4).

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::{Arc, Mutex};

use admbwf_core::errors::{read_only_error, Result};
use admbwf_core::io::{ReadBytes, WriteBytes};
use admbwf_core::sample::{transfer_samples, BufferLayout};
use admbwf_core::{SampleFormat, UniversalTime};

/// Static properties of the PCM data a `SampleStream` exposes, derived from the `fmt ` chunk.
#[derive(Debug, Clone, Copy)]
pub struct SoundFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub big_endian: bool,
}

impl SoundFormat {
    pub fn bytes_per_frame(&self) -> u64 {
        self.channels as u64 * self.sample_format.bytes_per_sample() as u64
    }
}

/// A window over a sample stream: `[start_frame, start_frame + nframes)` of channels
/// `[first_channel, first_channel + nchannels)`.
#[derive(Debug, Clone, Copy)]
pub struct Clip {
    pub start_frame: u64,
    pub nframes: u64,
    pub first_channel: u16,
    pub nchannels: u16,
}

/// Binds a (file, byte offset, byte length) region to a [`SoundFormat`] and a [`Clip`] window,
/// and tracks a read/write cursor position within that clip.
pub struct SampleStream {
    file: Arc<Mutex<File>>,
    /// Absolute byte offset of frame 0 of the *stream* (not the clip) within the file.
    base_offset: u64,
    /// Total byte length of the underlying `data` chunk region.
    total_bytes: u64,
    format: SoundFormat,
    clip: Clip,
    position: u64,
    time: UniversalTime,
    read_only: bool,
}

impl SampleStream {
    pub fn new(
        file: Arc<Mutex<File>>,
        base_offset: u64,
        total_bytes: u64,
        format: SoundFormat,
        read_only: bool,
    ) -> Self {
        let nframes = total_bytes / format.bytes_per_frame();
        let clip = Clip { start_frame: 0, nframes, first_channel: 0, nchannels: format.channels };

        SampleStream {
            file,
            base_offset,
            total_bytes,
            format,
            clip,
            position: 0,
            time: UniversalTime::ZERO,
            read_only,
        }
    }

    pub fn format(&self) -> SoundFormat {
        self.format
    }

    pub fn clip(&self) -> Clip {
        self.clip
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn time(&self) -> UniversalTime {
        self.time
    }

    /// Clamps `frame` to the clip's bounds and updates the stream's `UniversalTime`.
    pub fn set_position(&mut self, frame: u64) {
        self.position = frame.min(self.clip.nframes);
        self.time = UniversalTime::from_sample_pos(self.position, self.format.sample_rate);
    }

    fn byte_offset_for(&self, frame_in_clip: u64) -> u64 {
        self.base_offset + (self.clip.start_frame + frame_in_clip) * self.format.bytes_per_frame()
    }

    /// Reads up to `nframes` frames starting at the current position into `dst`, converting and
    /// interleaving through the byte codec, and advances the position. Returns the number of
    /// frames actually read; `0` signals clip exhaustion.
    pub fn read(
        &mut self,
        dst: &mut [u8],
        dst_format: SampleFormat,
        dst_big_endian: bool,
        dst_first_channel: u16,
        dst_nchannels: u16,
        dst_stride: u16,
        nframes: u64,
    ) -> Result<u64> {
        let available = self.clip.nframes.saturating_sub(self.position);
        let nframes = nframes.min(available);
        if nframes == 0 {
            return Ok(0);
        }

        let byte_off = self.byte_offset_for(self.position);
        let read_len = (nframes * self.format.bytes_per_frame()) as usize;
        let mut src_buf = vec![0u8; read_len];

        {
            let mut file = self.file.lock().expect("sample stream file handle poisoned");
            file.seek(SeekFrom::Start(byte_off))?;
            file.read_buf_exact(&mut src_buf)?;
        }

        let src_layout = BufferLayout {
            format: self.format.sample_format,
            big_endian: self.format.big_endian,
            first_channel: self.clip.first_channel as usize,
            stride: self.format.channels as usize,
        };
        let dst_layout = BufferLayout {
            format: dst_format,
            big_endian: dst_big_endian,
            first_channel: dst_first_channel as usize,
            stride: dst_stride as usize,
        };

        transfer_samples(
            &src_buf,
            src_layout,
            dst,
            dst_layout,
            dst_nchannels.min(self.clip.nchannels) as usize,
            nframes as usize,
        )?;

        self.set_position(self.position + nframes);

        Ok(nframes)
    }

    /// Writes `nframes` frames from `src` starting at the current position, extending the clip
    /// (and the underlying stream's reported length) if the write runs past its current end.
    /// When `src_nchannels` is fewer than the stream's channel count, existing frames are read
    /// first and merged so that untouched channels are preserved.
    pub fn write(
        &mut self,
        src: &[u8],
        src_format: SampleFormat,
        src_big_endian: bool,
        src_first_channel: u16,
        src_nchannels: u16,
        src_stride: u16,
        nframes: u64,
    ) -> Result<()> {
        if self.read_only {
            return read_only_error();
        }

        let write_len = (nframes * self.format.bytes_per_frame()) as usize;
        let mut dst_buf = vec![0u8; write_len];

        let partial_channels = src_nchannels < self.format.channels;
        if partial_channels && self.position < self.clip.nframes {
            let byte_off = self.byte_offset_for(self.position);
            let existing_frames = nframes.min(self.clip.nframes - self.position);
            let existing_len = (existing_frames * self.format.bytes_per_frame()) as usize;

            let mut file = self.file.lock().expect("sample stream file handle poisoned");
            file.seek(SeekFrom::Start(byte_off))?;
            file.read_buf_exact(&mut dst_buf[..existing_len])?;
        }

        let src_layout = BufferLayout {
            format: src_format,
            big_endian: src_big_endian,
            first_channel: src_first_channel as usize,
            stride: src_stride as usize,
        };
        let dst_layout = BufferLayout {
            format: self.format.sample_format,
            big_endian: self.format.big_endian,
            first_channel: self.clip.first_channel as usize,
            stride: self.format.channels as usize,
        };

        transfer_samples(
            src,
            src_layout,
            &mut dst_buf,
            dst_layout,
            src_nchannels as usize,
            nframes as usize,
        )?;

        let byte_off = self.byte_offset_for(self.position);
        {
            let mut file = self.file.lock().expect("sample stream file handle poisoned");
            file.seek(SeekFrom::Start(byte_off))?;
            file.write_buf(&dst_buf)?;
        }

        let end_frame = self.position + nframes;
        if end_frame > self.clip.nframes {
            self.clip.nframes = end_frame;
            self.total_bytes = self.clip.nframes * self.format.bytes_per_frame();
        }

        self.set_position(end_frame);

        Ok(())
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn make_stream(frames: u64, channels: u16) -> SampleStream {
        let format = SoundFormat { channels, sample_rate: 48_000, sample_format: SampleFormat::S16, big_endian: false };
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&vec![0u8; (frames * channels as u64 * 2) as usize]).unwrap();
        SampleStream::new(Arc::new(Mutex::new(file)), 0, frames * channels as u64 * 2, format, false)
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut stream = make_stream(10, 2);

        let mut src = Vec::new();
        for frame in 0..10i16 {
            src.extend_from_slice(&frame.to_le_bytes());
            src.extend_from_slice(&(-frame).to_le_bytes());
        }

        stream.set_position(0);
        stream.write(&src, SampleFormat::S16, false, 0, 2, 2, 10).unwrap();

        stream.set_position(0);
        let mut dst = vec![0u8; 10 * 2 * 2];
        let got = stream.read(&mut dst, SampleFormat::S16, false, 0, 2, 2, 10).unwrap();
        assert_eq!(got, 10);
        assert_eq!(dst, src);
    }

    #[test]
    fn read_past_clip_end_returns_short_count() {
        let mut stream = make_stream(5, 1);
        stream.set_position(3);
        let mut dst = vec![0u8; 20];
        let got = stream.read(&mut dst, SampleFormat::S16, false, 0, 1, 1, 10).unwrap();
        assert_eq!(got, 2);
    }

    #[test]
    fn write_extends_clip_length() {
        let mut stream = make_stream(4, 1);
        assert_eq!(stream.clip().nframes, 4);

        stream.set_position(4);
        let src = vec![0u8; 2 * 2];
        stream.write(&src, SampleFormat::S16, false, 0, 1, 1, 2).unwrap();

        assert_eq!(stream.clip().nframes, 6);
    }

    #[test]
    fn read_only_stream_rejects_writes() {
        let format =
            SoundFormat { channels: 1, sample_rate: 48_000, sample_format: SampleFormat::S16, big_endian: false };
        let file = tempfile::tempfile().unwrap();
        let mut stream = SampleStream::new(Arc::new(Mutex::new(file)), 0, 0, format, true);
        let err = stream.write(&[0, 0], SampleFormat::S16, false, 0, 1, 1, 1).unwrap_err();
        assert!(matches!(err, admbwf_core::AdmError::ReadOnly));
    }
}
