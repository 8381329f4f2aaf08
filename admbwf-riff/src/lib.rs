// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RIFF/RF64 container support for the `admbwf` workspace: chunk parsing (`common`, `chunks`),
//! the file-level read/write protocol (`engine`), a process-wide chunk provider registry
//! (`registry`), and clip-bounded sample I/O over a `data` chunk region (`sample_stream`).

pub mod chunks;
pub mod common;
pub mod engine;
pub mod registry;
pub mod sample_stream;

pub use chunks::{AxmlChunk, BextChunk, ChnaChunk, DataChunk, Ds64Chunk, WaveFormatChunk};
pub use engine::{open, OpenedRiff, RiffWriter};
pub use registry::GenericChunk;
pub use sample_stream::{Clip, SampleStream, SoundFormat};
