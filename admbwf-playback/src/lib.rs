// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-channel automation cursors and clip playback for the `admbwf` workspace: [`TrackCursor`]
//! resolves the active `audioBlockFormat` for a channel at a point in time (component C7), and
//! [`Playlist`]/[`PlaybackEngine`] sequence [`admbwf_riff::SampleStream`] clips with seek-triggered
//! cross-fade, pushing cursor positions to a renderer as playback advances (component C8).

pub mod cursor;
pub mod engine;
pub mod playlist;

pub use cursor::TrackCursor;
pub use engine::{PlaybackEngine, PositionSink};
pub use playlist::Playlist;
