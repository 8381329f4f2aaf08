// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Concrete chunk payloads a WAVE/RF64 ADM BWF file carries.

pub mod axml;
pub mod bext;
pub mod chna;
pub mod data;
pub mod ds64;
pub mod fmt;

pub use axml::AxmlChunk;
pub use bext::BextChunk;
pub use chna::ChnaChunk;
pub use data::DataChunk;
pub use ds64::Ds64Chunk;
pub use fmt::WaveFormatChunk;

use crate::common::{ChunkParser, ParseChunkTag};

/// The top-level chunks nested directly inside the `WAVE`/`RF64` form, dispatched by tag.
pub enum RiffWaveChunks {
    Ds64(ChunkParser<Ds64Chunk>),
    Format(ChunkParser<WaveFormatChunk>),
    Bext(ChunkParser<BextChunk>),
    Chna(ChunkParser<ChnaChunk>),
    Axml(ChunkParser<AxmlChunk>),
    Data(ChunkParser<DataChunk>),
}

macro_rules! parser {
    ($class:expr, $result:ty, $tag:expr, $len:expr) => {
        Some($class(ChunkParser::<$result>::new($tag, $len)))
    };
}

impl ParseChunkTag for RiffWaveChunks {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
        match &tag {
            b"ds64" => parser!(RiffWaveChunks::Ds64, Ds64Chunk, tag, len),
            b"fmt " => parser!(RiffWaveChunks::Format, WaveFormatChunk, tag, len),
            b"bext" => parser!(RiffWaveChunks::Bext, BextChunk, tag, len),
            b"chna" => parser!(RiffWaveChunks::Chna, ChnaChunk, tag, len),
            b"axml" => parser!(RiffWaveChunks::Axml, AxmlChunk, tag, len),
            b"data" => parser!(RiffWaveChunks::Data, DataChunk, tag, len),
            _ => None,
        }
    }
}
