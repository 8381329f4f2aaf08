// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `PlaybackEngine`: wraps a [`Playlist`] and one [`TrackCursor`] per output channel, pushing
//! cursor positions ahead of the audio they describe on every `render` call (component C8,
//! spec.md §4.8, §5). Grounded in `original_source/src/PlaybackEngine.cpp::Render` and
//! `FilePositionGenerator.cpp::Process`'s cursor push-before-render ordering.

use std::sync::Mutex;

use admbwf_core::errors::Result;
use admbwf_core::sample::{transfer_samples, BufferLayout};
use admbwf_core::{SampleFormat, UniversalTime};
use admbwf_graph::AdmGraph;

use crate::cursor::TrackCursor;
use crate::playlist::{Playlist, WORKING_SAMPLE_BYTES};

/// Frame count of the temporary buffer `PlaybackEngine::render` pulls from the playlist in one
/// go, mirroring `PlaybackEngine::PlaybackEngine`'s `samplesbuffer.resize(4096)` (spec.md §5: "clip
/// buffers are pre-sized... to bound per-call work").
const RENDER_BUFFER_FRAMES: u64 = 4096;

/// Receives a cursor's position push ahead of the samples it applies to (spec.md §5 "Ordering
/// guarantees"). Implemented by whatever downstream renderer owns spatialisation.
pub trait PositionSink {
    fn update_position(&mut self, channel: u16, position: admbwf_graph::Position, supplement: &std::collections::BTreeMap<String, String>);
}

/// Playlist state and cursor list behind a single mutex, so every public entry point can take one
/// lock and release it on every exit path (spec.md §5: "Each engine instance has a dedicated
/// mutex (`tlock`)").
struct EngineState {
    playlist: Playlist,
    cursors: Vec<TrackCursor>,
    input_channels: u16,
}

pub struct PlaybackEngine {
    state: Mutex<EngineState>,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        PlaybackEngine::new()
    }
}

impl PlaybackEngine {
    pub fn new() -> Self {
        PlaybackEngine {
            state: Mutex::new(EngineState { playlist: Playlist::new(), cursors: Vec::new(), input_channels: 0 }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().expect("engine mutex poisoned").playlist.is_empty()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("engine mutex poisoned");
        state.playlist.clear();
        state.input_channels = 0;
    }

    pub fn enable_loop(&self, enable: bool) {
        self.state.lock().expect("engine mutex poisoned").playlist.enable_loop(enable);
    }

    /// Adds a clip to the playlist and, the first time the playlist becomes non-empty, derives
    /// the input channel count and spins up one [`TrackCursor`] per channel.
    pub fn add_clip(&self, clip: admbwf_riff::SampleStream) {
        let mut state = self.state.lock().expect("engine mutex poisoned");
        let was_empty = state.playlist.is_empty();
        state.playlist.add_clip(clip);

        if was_empty {
            let channels = state.playlist.max_output_channels();
            state.input_channels = channels;
            state.cursors = (0..channels).map(TrackCursor::new).collect();
        }
    }

    /// Registers `object` with every channel cursor whose channel matches one of its track UIDs.
    pub fn add_object(&self, graph: &AdmGraph, object: admbwf_graph::ObjectHandle) {
        let mut state = self.state.lock().expect("engine mutex poisoned");
        for cursor in &mut state.cursors {
            cursor.add(graph, object);
        }
    }

    pub fn set_playback_position(&self, pos: u64, force: bool) -> bool {
        self.state.lock().expect("engine mutex poisoned").playlist.set_playback_position(pos, force)
    }

    /// Pulls audio from the playlist, remaps it from `nsrc_chan` to `ndst_chan` channels via the
    /// shared `ByteCodec` ([`transfer_samples`], component C1), and pushes each channel cursor's
    /// position to `sink` strictly before the samples it describes are handed off (spec.md §5
    /// "Ordering guarantees"). Working format is interleaved `i32` little-endian throughout (see
    /// [`crate::playlist::WORKING_SAMPLE_BYTES`]).
    ///
    /// Bypasses to a straight remap of `src` into `dst` when the playlist is empty, matching
    /// `PlaybackEngine::Render`'s "no files to play, revert to processing input". Samples may be
    /// lost if `nsrc_frames > ndst_frames`; the destination is never read, only overwritten.
    pub fn render(
        &self,
        graph: &AdmGraph,
        src: &[u8],
        dst: &mut [u8],
        nsrc_chan: u16,
        ndst_chan: u16,
        nsrc_frames: u64,
        ndst_frames: u64,
        sink: &mut dyn PositionSink,
    ) -> Result<u64> {
        let mut state = self.state.lock().expect("engine mutex poisoned");
        let working = |chan: usize| BufferLayout { format: SampleFormat::S32, big_endian: false, first_channel: 0, stride: chan };

        if state.playlist.is_empty() {
            let frames = nsrc_frames.min(ndst_frames);
            transfer_samples(
                src,
                working(nsrc_chan as usize),
                dst,
                working(ndst_chan as usize),
                nsrc_chan.min(ndst_chan) as usize,
                frames as usize,
            )?;
            return Ok(frames);
        }

        let src_frame_bytes = state.input_channels as usize * WORKING_SAMPLE_BYTES;
        let dst_frame_bytes = ndst_chan as usize * WORKING_SAMPLE_BYTES;
        let mut written = 0u64;
        let mut dst_offset = 0usize;
        let mut remaining_dst = ndst_frames;
        let mut scratch = vec![0u8; RENDER_BUFFER_FRAMES as usize * src_frame_bytes.max(1)];

        while remaining_dst > 0 {
            if state.playlist.at_end() {
                break;
            }

            let want = remaining_dst.min(RENDER_BUFFER_FRAMES);
            let nread = state.playlist.read_samples(&mut scratch, 0, state.input_channels, want)?;

            if nread == 0 {
                state.playlist.next();
                continue;
            }

            let abs_pos = state.playlist.playback_position().saturating_sub(nread);
            let sample_rate =
                state.playlist.current_clip().map(|c| c.format().sample_rate).unwrap_or(48_000);
            let t_ns = UniversalTime::from_sample_pos(abs_pos, sample_rate);

            for cursor in &mut state.cursors {
                cursor.seek(graph, t_ns);
                if let Some(position) = cursor.get_position(graph) {
                    let supplement = cursor.get_position_supplement(graph).unwrap_or_default();
                    sink.update_position(cursor.channel(), position, &supplement);
                }
            }

            let copy_len = nread as usize * dst_frame_bytes;
            transfer_samples(
                &scratch[..nread as usize * src_frame_bytes],
                working(state.input_channels as usize),
                &mut dst[dst_offset..dst_offset + copy_len],
                working(ndst_chan as usize),
                state.input_channels.min(ndst_chan) as usize,
                nread as usize,
            )?;

            dst_offset += copy_len;
            remaining_dst -= nread;
            written += nread;
        }

        if written == 0 {
            log::debug!("playback engine render produced zero frames; playlist exhausted");
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admbwf_core::SampleFormat;
    use admbwf_riff::{SampleStream, SoundFormat};
    use std::collections::BTreeMap;
    use std::io::Write as _;
    use std::sync::{Arc, Mutex as StdMutex};

    struct RecordingSink {
        updates: Vec<(u16, admbwf_graph::Position)>,
    }

    impl PositionSink for RecordingSink {
        fn update_position(&mut self, channel: u16, position: admbwf_graph::Position, _supplement: &BTreeMap<String, String>) {
            self.updates.push((channel, position));
        }
    }

    fn make_clip(frames: u64, channels: u16, value: i32) -> SampleStream {
        let format =
            SoundFormat { channels, sample_rate: 48_000, sample_format: SampleFormat::S32, big_endian: false };
        let mut file = tempfile::tempfile().unwrap();
        let mut bytes = Vec::new();
        for _ in 0..(frames * channels as u64) {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        file.write_all(&bytes).unwrap();
        SampleStream::new(Arc::new(StdMutex::new(file)), 0, bytes.len() as u64, format, false)
    }

    #[test]
    fn render_bypasses_to_source_when_playlist_empty() {
        let engine = PlaybackEngine::new();
        let graph = AdmGraph::new();
        let mut sink = RecordingSink { updates: Vec::new() };

        let src = vec![7u8; 10 * WORKING_SAMPLE_BYTES];
        let mut dst = vec![0u8; 10 * WORKING_SAMPLE_BYTES];
        let got = engine.render(&graph, &src, &mut dst, 1, 1, 10, 10, &mut sink).unwrap();

        assert_eq!(got, 10);
        assert_eq!(dst, src);
    }

    #[test]
    fn render_pulls_from_playlist_and_advances_position() {
        let engine = PlaybackEngine::new();
        engine.add_clip(make_clip(100, 1, 42));
        let graph = AdmGraph::new();
        let mut sink = RecordingSink { updates: Vec::new() };

        let src = vec![0u8; 50 * WORKING_SAMPLE_BYTES];
        let mut dst = vec![0u8; 50 * WORKING_SAMPLE_BYTES];
        let got = engine.render(&graph, &src, &mut dst, 1, 1, 50, 50, &mut sink).unwrap();

        assert_eq!(got, 50);
        // A freshly added clip plays under a fade-up (Playlist::Reset arms fadeupcount), so the
        // first frame is silent and later frames ramp toward the clip's constant value.
        let first = i32::from_le_bytes(dst[0..4].try_into().unwrap());
        let last = i32::from_le_bytes(dst[46..50].try_into().unwrap());
        assert_eq!(first, 0);
        assert!(last > first && last <= 42);
    }
}
