// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `axml` chunk: raw UTF-8 XML text, handed to `admbwf-graph`'s `AdmXmlCodec`. No
//! byte-swapping applies since the payload is text, not packed binary fields.

use admbwf_core::errors::Result;
use admbwf_core::io::{ReadBytes, WriteBytes};

use crate::common::ParseChunk;

#[derive(Debug, Clone)]
pub struct AxmlChunk {
    pub xml: String,
}

impl ParseChunk for AxmlChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        let bytes = reader.read_boxed_slice_exact(len as usize)?;
        Ok(AxmlChunk { xml: String::from_utf8_lossy(&bytes).into_owned() })
    }
}

impl AxmlChunk {
    pub fn write<W: WriteBytes>(&self, w: &mut W) -> Result<()> {
        w.write_buf(self.xml.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_utf8_text() {
        let axml = AxmlChunk { xml: "<ebuCoreMain><coreMetadata/></ebuCoreMain>".to_string() };

        let mut buf = Vec::new();
        axml.write(&mut buf).unwrap();

        let mut cur = Cursor::new(buf.clone());
        let parsed = AxmlChunk::parse(&mut cur, *b"axml", buf.len() as u32).unwrap();
        assert_eq!(parsed.xml, axml.xml);
    }
}
