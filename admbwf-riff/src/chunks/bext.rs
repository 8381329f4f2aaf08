// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `bext` (Broadcast Extension) chunk. Loaded and preserved, never interpreted further by
//! the core (per spec: "not interpreted further by the core but preserved").

use admbwf_core::errors::{format_error, Result};
use admbwf_core::io::{ReadBytes, WriteBytes};

use crate::common::ParseChunk;

const DESCRIPTION_LEN: usize = 256;
const ORIGINATOR_LEN: usize = 32;
const ORIGINATOR_REF_LEN: usize = 32;
const ORIGINATION_DATE_LEN: usize = 10;
const ORIGINATION_TIME_LEN: usize = 8;
const UMID_LEN: usize = 64;
const RESERVED_LEN: usize = 180;

/// EBU Tech 3285 Broadcast Extension chunk.
#[derive(Debug, Clone)]
pub struct BextChunk {
    pub description: String,
    pub originator: String,
    pub originator_reference: String,
    pub origination_date: String,
    pub origination_time: String,
    pub time_reference: u64,
    pub version: u16,
    pub umid: [u8; UMID_LEN],
    pub loudness_value: i16,
    pub loudness_range: i16,
    pub max_true_peak_level: i16,
    pub max_momentary_loudness: i16,
    pub max_short_term_loudness: i16,
    pub coding_history: String,
}

fn read_fixed_ascii<B: ReadBytes>(reader: &mut B, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    reader.read_buf_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

fn write_fixed_ascii<W: WriteBytes>(w: &mut W, s: &str, len: usize) -> Result<()> {
    let mut buf = vec![0u8; len];
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    buf[..n].copy_from_slice(&bytes[..n]);
    w.write_buf(&buf)
}

impl ParseChunk for BextChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        const FIXED_LEN: u32 = (DESCRIPTION_LEN
            + ORIGINATOR_LEN
            + ORIGINATOR_REF_LEN
            + ORIGINATION_DATE_LEN
            + ORIGINATION_TIME_LEN
            + 4
            + 4
            + 2
            + UMID_LEN
            + 2 * 5
            + RESERVED_LEN) as u32;

        if len < FIXED_LEN {
            return format_error("bext: chunk shorter than fixed BEXT header");
        }

        let description = read_fixed_ascii(reader, DESCRIPTION_LEN)?;
        let originator = read_fixed_ascii(reader, ORIGINATOR_LEN)?;
        let originator_reference = read_fixed_ascii(reader, ORIGINATOR_REF_LEN)?;
        let origination_date = read_fixed_ascii(reader, ORIGINATION_DATE_LEN)?;
        let origination_time = read_fixed_ascii(reader, ORIGINATION_TIME_LEN)?;

        let time_reference_low = reader.read_u32()?;
        let time_reference_high = reader.read_u32()?;
        let time_reference = (u64::from(time_reference_high) << 32) | u64::from(time_reference_low);

        let version = reader.read_u16()?;

        let mut umid = [0u8; UMID_LEN];
        reader.read_buf_exact(&mut umid)?;

        let loudness_value = reader.read_u16()? as i16;
        let loudness_range = reader.read_u16()? as i16;
        let max_true_peak_level = reader.read_u16()? as i16;
        let max_momentary_loudness = reader.read_u16()? as i16;
        let max_short_term_loudness = reader.read_u16()? as i16;

        reader.ignore_bytes(RESERVED_LEN as u64)?;

        let history_len = len - FIXED_LEN;
        let history_bytes = reader.read_boxed_slice_exact(history_len as usize)?;
        let coding_history = String::from_utf8_lossy(&history_bytes).into_owned();

        Ok(BextChunk {
            description,
            originator,
            originator_reference,
            origination_date,
            origination_time,
            time_reference,
            version,
            umid,
            loudness_value,
            loudness_range,
            max_true_peak_level,
            max_momentary_loudness,
            max_short_term_loudness,
            coding_history,
        })
    }
}

impl BextChunk {
    pub fn write<W: WriteBytes>(&self, w: &mut W) -> Result<()> {
        write_fixed_ascii(w, &self.description, DESCRIPTION_LEN)?;
        write_fixed_ascii(w, &self.originator, ORIGINATOR_LEN)?;
        write_fixed_ascii(w, &self.originator_reference, ORIGINATOR_REF_LEN)?;
        write_fixed_ascii(w, &self.origination_date, ORIGINATION_DATE_LEN)?;
        write_fixed_ascii(w, &self.origination_time, ORIGINATION_TIME_LEN)?;
        w.write_u32(self.time_reference as u32)?;
        w.write_u32((self.time_reference >> 32) as u32)?;
        w.write_u16(self.version)?;
        w.write_buf(&self.umid)?;
        w.write_u16(self.loudness_value as u16)?;
        w.write_u16(self.loudness_range as u16)?;
        w.write_u16(self.max_true_peak_level as u16)?;
        w.write_u16(self.max_momentary_loudness as u16)?;
        w.write_u16(self.max_short_term_loudness as u16)?;
        w.write_buf(&[0u8; RESERVED_LEN])?;
        w.write_buf(self.coding_history.as_bytes())?;
        Ok(())
    }
}
