// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `data` chunk descriptor. Never loaded into memory: parsing records only the chunk's
//! declared 32-bit length (or `None` when it reads as the RF64 sentinel), and the engine binds a
//! [`crate::sample_stream::SampleStream`] to the file region that follows.

use admbwf_core::errors::Result;
use admbwf_core::io::ReadBytes;

use crate::common::ParseChunk;

#[derive(Debug, Clone, Copy)]
pub struct DataChunk {
    /// `None` when the 32-bit length field was the RF64 sentinel `0xFFFFFFFF`; the engine must
    /// consult the `ds64` table's `data_size` field in that case.
    pub len: Option<u32>,
}

impl ParseChunk for DataChunk {
    fn parse<B: ReadBytes>(_reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        Ok(DataChunk { len: if len == u32::MAX { None } else { Some(len) } })
    }
}
