// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Playlist`: an ordered sequence of [`SampleStream`] clips with seek-triggered cross-fade
//! (component C8, spec.md §4.8). Ported field-for-field from `original_source/src/Playlist.cpp`
//! (`SetPlaybackPosition`, `SetPlaybackPositionEx`, `ReadSamples`), renamed to `snake_case` and
//! built on an owned `Vec<SampleStream>` instead of `Vec<SoundFileSamples*>` with manual `delete`.

use admbwf_core::errors::Result;
use admbwf_riff::SampleStream;

/// Default fade length in frames, matching `Playlist::Playlist`'s `fadesamples(100)`.
const DEFAULT_FADE_SAMPLES: u64 = 100;

/// The in-memory working sample format `Playlist::read_samples` operates on: interleaved 32-bit
/// signed PCM, little-endian. `PlaybackEngine` converts to/from this format at its edges.
pub const WORKING_SAMPLE_BYTES: usize = 4;

pub struct Playlist {
    clips: Vec<SampleStream>,
    /// Cumulative sample count of every clip before the current one.
    file_start_pos: u64,
    /// Index of the current clip; `== clips.len()` once the list is exhausted.
    current: usize,
    playlist_length: u64,
    fade_samples: u64,
    fade_down_count: u64,
    fade_up_count: u64,
    loop_all: bool,
    position_change: bool,
    new_position: u64,
}

impl Default for Playlist {
    fn default() -> Self {
        Playlist::new()
    }
}

impl Playlist {
    pub fn new() -> Self {
        Playlist {
            clips: Vec::new(),
            file_start_pos: 0,
            current: 0,
            playlist_length: 0,
            fade_samples: DEFAULT_FADE_SAMPLES,
            fade_down_count: 0,
            fade_up_count: 0,
            loop_all: false,
            position_change: false,
            new_position: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn at_end(&self) -> bool {
        self.current >= self.clips.len()
    }

    pub fn enable_loop(&mut self, enable: bool) {
        self.loop_all = enable;
    }

    pub fn fade_samples(&self) -> u64 {
        self.fade_samples
    }

    /// Adds a clip to the end of the list. Resets playback to the start of the list, mirroring
    /// `Playlist::AddFile`'s unconditional `Reset()` ("MUST reset here to ensure `it` is always
    /// valid").
    pub fn add_clip(&mut self, clip: SampleStream) {
        self.playlist_length += clip.clip().nframes;
        self.clips.push(clip);
        self.reset();
    }

    pub fn clear(&mut self) {
        self.clips.clear();
        self.playlist_length = 0;
        self.reset();
    }

    fn reset(&mut self) {
        self.file_start_pos = 0;
        self.fade_down_count = 0;
        self.fade_up_count = self.fade_samples;
        self.position_change = false;
        self.current = 0;
        if let Some(clip) = self.clips.first_mut() {
            clip.set_position(0);
        }
    }

    /// Advances to the next clip (or back to the start, if looping is enabled and the list has
    /// been exhausted).
    pub fn next(&mut self) {
        if self.current >= self.clips.len() {
            return;
        }

        self.file_start_pos += self.clips[self.current].clip().nframes;
        self.current += 1;

        if self.current < self.clips.len() {
            self.clips[self.current].set_position(0);
        }
        else if self.loop_all {
            self.reset();
        }
    }

    pub fn current_clip(&self) -> Option<&SampleStream> {
        self.clips.get(self.current)
    }

    pub fn max_output_channels(&self) -> u16 {
        self.clips.iter().map(|c| c.format().channels).max().unwrap_or(0)
    }

    /// Current absolute playback position, in samples.
    pub fn playback_position(&self) -> u64 {
        self.file_start_pos + self.clips.get(self.current).map_or(0, |c| c.position())
    }

    /// Requests a playback position change. With `force`, seeks immediately (may click). Without
    /// it, arms a fade-down; the actual seek happens mid-[`Playlist::read_samples`] once the fade
    /// has consumed `fade_samples` frames (spec.md §4.8).
    pub fn set_playback_position(&mut self, pos: u64, force: bool) -> bool {
        let pos = pos.min(self.playlist_length);
        if self.is_empty() {
            return false;
        }

        if force {
            self.fade_down_count = 0;
            self.position_change = false;

            if self.set_playback_position_ex(pos) {
                self.fade_up_count = self.fade_samples;
                true
            }
            else {
                false
            }
        }
        else {
            self.fade_down_count = self.fade_samples;
            self.new_position = pos;
            self.position_change = true;
            true
        }
    }

    /// The unconditional seek `SetPlaybackPosition` defers to once any fade-down has run out.
    fn set_playback_position_ex(&mut self, pos: u64) -> bool {
        while self.current > 0 && pos < self.file_start_pos {
            self.current -= 1;
            self.file_start_pos -= self.clips[self.current].clip().nframes;
        }
        while self.current < self.clips.len() && pos >= self.file_start_pos + self.clips[self.current].clip().nframes
        {
            self.file_start_pos += self.clips[self.current].clip().nframes;
            self.current += 1;
        }

        if self.current < self.clips.len()
            && pos >= self.file_start_pos
            && pos < self.file_start_pos + self.clips[self.current].clip().nframes
        {
            self.clips[self.current].set_position(pos - self.file_start_pos);
            true
        }
        else {
            false
        }
    }

    /// Reads up to `frames` interleaved frames of `channels` channels starting at channel offset
    /// `channel` into `dst` (working format: `i32` little-endian, see [`WORKING_SAMPLE_BYTES`]),
    /// applying the linear cross-fade envelope around any pending seek. Returns the number of
    /// frames actually written.
    pub fn read_samples(&mut self, dst: &mut [u8], channel: u16, channels: u16, frames: u64) -> Result<u64> {
        let frame_bytes = channels as usize * WORKING_SAMPLE_BYTES;
        let mut remaining = frames;
        let mut offset = 0usize;
        let mut total = 0u64;

        while !self.at_end() && remaining > 0 {
            let nread;

            if self.fade_down_count > 0 {
                let want = remaining.min(self.fade_down_count);
                nread = self.clips[self.current].read(
                    &mut dst[offset..],
                    admbwf_core::SampleFormat::S32,
                    false,
                    channel,
                    channels,
                    channels,
                    want,
                )?;

                for i in 0..nread {
                    let mul = (self.fade_down_count - 1) as f64 / self.fade_samples as f64;
                    let frame_off = offset + i as usize * frame_bytes;
                    scale_frame(&mut dst[frame_off..frame_off + frame_bytes], mul);
                    self.fade_down_count -= 1;
                }
            }
            else if self.position_change {
                let target = self.new_position;
                self.set_playback_position_ex(target);
                self.position_change = false;
                self.fade_up_count = self.fade_samples;
                continue;
            }
            else if self.fade_up_count > 0 {
                let want = remaining.min(self.fade_up_count);
                nread = self.clips[self.current].read(
                    &mut dst[offset..],
                    admbwf_core::SampleFormat::S32,
                    false,
                    channel,
                    channels,
                    channels,
                    want,
                )?;

                for i in 0..nread {
                    let mul = (self.fade_samples - self.fade_up_count) as f64 / self.fade_samples as f64;
                    let frame_off = offset + i as usize * frame_bytes;
                    scale_frame(&mut dst[frame_off..frame_off + frame_bytes], mul);
                    self.fade_up_count -= 1;
                }
            }
            else {
                nread = self.clips[self.current].read(
                    &mut dst[offset..],
                    admbwf_core::SampleFormat::S32,
                    false,
                    channel,
                    channels,
                    channels,
                    remaining,
                )?;
            }

            if nread == 0 {
                break;
            }

            offset += nread as usize * frame_bytes;
            remaining -= nread;
            total += nread;
        }

        Ok(total)
    }
}

/// Multiplies every channel of one interleaved `i32` frame by `mul`, in place.
fn scale_frame(frame: &mut [u8], mul: f64) {
    for sample in frame.chunks_exact_mut(WORKING_SAMPLE_BYTES) {
        let raw = i32::from_le_bytes(sample.try_into().expect("frame chunk is exactly 4 bytes"));
        let scaled = (raw as f64 * mul) as i32;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}
