// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `ds64` chunk: the 64-bit size table an RF64 file uses to shadow 32-bit length fields
//! that read as the sentinel `0xFFFFFFFF` (EBU Tech 3306).

use admbwf_core::errors::{format_error, Result};
use admbwf_core::io::{ReadBytes, WriteBytes};

use crate::common::ParseChunk;

/// One entry of the ds64 chunk's generic size table, covering chunks other than `data` whose
/// 32-bit size field overflowed.
#[derive(Debug, Clone, Copy)]
pub struct Ds64TableEntry {
    pub chunk_id: [u8; 4],
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct Ds64Chunk {
    pub riff_size: u64,
    pub data_size: u64,
    pub sample_count: u64,
    pub table: Vec<Ds64TableEntry>,
}

impl Ds64Chunk {
    /// Looks up the 64-bit size for a non-`data` chunk tag from the generic table.
    pub fn size_for(&self, chunk_id: [u8; 4]) -> Option<u64> {
        self.table.iter().find(|e| e.chunk_id == chunk_id).map(|e| e.size)
    }

    /// Serialized length of this chunk's body, including the generic table.
    pub fn write_len(&self) -> u32 {
        28 + 12 * self.table.len() as u32
    }

    pub fn write<W: WriteBytes>(&self, w: &mut W) -> Result<()> {
        w.write_u64(self.riff_size)?;
        w.write_u64(self.data_size)?;
        w.write_u64(self.sample_count)?;
        w.write_u32(self.table.len() as u32)?;
        for entry in &self.table {
            w.write_tag(&entry.chunk_id)?;
            w.write_u64(entry.size)?;
        }
        Ok(())
    }
}

impl ParseChunk for Ds64Chunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        if len < 28 {
            return format_error("ds64: chunk shorter than fixed ds64 header");
        }

        let riff_size = reader.read_u64()?;
        let data_size = reader.read_u64()?;
        let sample_count = reader.read_u64()?;
        let table_length = reader.read_u32()?;

        let mut table = Vec::with_capacity(table_length as usize);
        for _ in 0..table_length {
            let chunk_id = reader.read_tag()?;
            let size = reader.read_u64()?;
            table.push(Ds64TableEntry { chunk_id, size });
        }

        let consumed = 28 + 12 * table_length;
        if len > consumed {
            reader.ignore_bytes(u64::from(len - consumed))?;
        }

        Ok(Ds64Chunk { riff_size, data_size, sample_count, table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_with_generic_table() {
        let ds64 = Ds64Chunk {
            riff_size: 5_000_000_000,
            data_size: 4_999_999_000,
            sample_count: 2_499_999_500,
            table: vec![Ds64TableEntry { chunk_id: *b"JUNK", size: 123_456_789_012 }],
        };

        let mut buf = Vec::new();
        ds64.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u32, ds64.write_len());

        let mut cur = Cursor::new(buf.clone());
        let parsed = Ds64Chunk::parse(&mut cur, *b"ds64", buf.len() as u32).unwrap();

        assert_eq!(parsed.riff_size, ds64.riff_size);
        assert_eq!(parsed.data_size, ds64.data_size);
        assert_eq!(parsed.sample_count, ds64.sample_count);
        assert_eq!(parsed.size_for(*b"JUNK"), Some(123_456_789_012));
        assert_eq!(parsed.size_for(*b"nope"), None);
    }
}
