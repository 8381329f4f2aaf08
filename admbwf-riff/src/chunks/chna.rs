// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `chna` (Channel/track UID assignment) chunk (spec component §4.5).
//!
//! Each record binds a 1-based track number to an `audioTrackUID`, and carries pending
//! (unresolved) references to a track format and a pack format that the caller resolves once
//! the `axml` chunk's object graph has been parsed.

use admbwf_core::errors::{format_error, Result};
use admbwf_core::io::{ReadBytes, WriteBytes};

use crate::common::ParseChunk;

const UID_LEN: usize = 12;
const TRACK_REF_LEN: usize = 14;
const PACK_REF_LEN: usize = 11;
/// `TrackNum(2) + UID(12) + TrackRef(14) + PackRef(11) + pad(1)`.
const RECORD_LEN: usize = 2 + UID_LEN + TRACK_REF_LEN + PACK_REF_LEN + 1;

#[derive(Debug, Clone)]
pub struct ChnaRecord {
    /// 1-based track number on the wire.
    pub track_num: u16,
    pub uid: String,
    /// Pending reference to the owning `audioTrackFormat`, resolved after `axml` is parsed.
    pub track_ref: String,
    /// Pending reference to the owning `audioPackFormat`, resolved after `axml` is parsed.
    pub pack_ref: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChnaChunk {
    pub records: Vec<ChnaRecord>,
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

impl ParseChunk for ChnaChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        if len < 4 {
            return format_error("chna: chunk shorter than fixed header");
        }

        let _track_count = reader.read_u16()?;
        let uid_count = reader.read_u16()?;

        let expected_len = 4 + RECORD_LEN * uid_count as usize;
        if (len as usize) < expected_len {
            return format_error("chna: chunk too short for declared UID count");
        }

        let mut records = Vec::with_capacity(uid_count as usize);
        for _ in 0..uid_count {
            let track_num = reader.read_u16()?;

            // A zero track number is skipped on read, per invariant (§3.4): still consume the
            // record's bytes to stay aligned, but don't keep it.
            let uid = read_fixed_ascii(reader, UID_LEN)?;
            let track_ref = read_fixed_ascii(reader, TRACK_REF_LEN)?;
            let pack_ref = read_fixed_ascii(reader, PACK_REF_LEN)?;
            reader.ignore_bytes(1)?; // pad byte

            if track_num == 0 {
                continue;
            }

            records.push(ChnaRecord { track_num, uid, track_ref, pack_ref });
        }

        let consumed = 4 + RECORD_LEN * uid_count as usize;
        if (len as usize) > consumed {
            reader.ignore_bytes((len as usize - consumed) as u64)?;
        }

        Ok(ChnaChunk { records })
    }
}

impl ChnaChunk {
    pub fn write_len(&self) -> u32 {
        4 + RECORD_LEN as u32 * self.records.len() as u32
    }

    pub fn write<W: WriteBytes>(&self, w: &mut W) -> Result<()> {
        let track_count = self.records.iter().map(|r| r.track_num).collect::<std::collections::BTreeSet<_>>().len();

        w.write_u16(track_count as u16)?;
        w.write_u16(self.records.len() as u16)?;

        for record in &self.records {
            w.write_u16(record.track_num)?;
            write_fixed_ascii(w, &record.uid, UID_LEN)?;
            write_fixed_ascii(w, &record.track_ref, TRACK_REF_LEN)?;
            write_fixed_ascii(w, &record.pack_ref, PACK_REF_LEN)?;
            w.write_u8(0)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_two_records() {
        let chna = ChnaChunk {
            records: vec![
                ChnaRecord {
                    track_num: 1,
                    uid: "ATU_00000001".to_string(),
                    track_ref: "AT_00031001_01".to_string(),
                    pack_ref: "AP_00031001".to_string(),
                },
                ChnaRecord {
                    track_num: 2,
                    uid: "ATU_00000002".to_string(),
                    track_ref: "AT_00031002_01".to_string(),
                    pack_ref: "AP_00031001".to_string(),
                },
            ],
        };

        let mut buf = Vec::new();
        chna.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u32, chna.write_len());

        let mut cur = Cursor::new(buf.clone());
        let parsed = ChnaChunk::parse(&mut cur, *b"chna", buf.len() as u32).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].track_num, 1);
        assert_eq!(parsed.records[0].uid, "ATU_00000001");
        assert_eq!(parsed.records[1].pack_ref, "AP_00031001");
    }

    #[test]
    fn skips_zero_track_number_records() {
        let chna = ChnaChunk {
            records: vec![ChnaRecord {
                track_num: 0,
                uid: "ATU_00000001".to_string(),
                track_ref: String::new(),
                pack_ref: String::new(),
            }],
        };

        // Bypass the normal writer (which would never emit a zero trackNum) to exercise the
        // reader's skip behavior directly.
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&[0u8; UID_LEN + TRACK_REF_LEN + PACK_REF_LEN + 1]);

        let mut cur = Cursor::new(buf.clone());
        let parsed = ChnaChunk::parse(&mut cur, *b"chna", buf.len() as u32).unwrap();
        assert!(parsed.records.is_empty());
        let _ = chna;
    }
}
