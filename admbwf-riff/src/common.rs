// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generic chunked reading (component C3's read-side skeleton).

use std::marker::PhantomData;

use admbwf_core::errors::{format_error, Result};
use admbwf_core::io::ReadBytes;

use log::{debug, info};

use crate::registry::{self, ChunkObject, GenericChunk};

/// Byte order a chunk's length/payload fields are encoded in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Maps a 4-byte chunk tag to the type responsible for parsing it.
pub trait ParseChunkTag: Sized {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self>;
}

/// A `ParseChunkTag` that never recognizes anything; used where a parent chunk has no children
/// worth distinguishing by type.
pub enum NullChunks {}

impl ParseChunkTag for NullChunks {
    fn parse_tag(_tag: [u8; 4], _len: u32) -> Option<Self> {
        None
    }
}

/// Walks the sequence of sibling chunks inside a RIFF list (`RIFF`, `RF64`, `LIST`). Chunks the
/// caller's `T` doesn't recognize are routed through the [`crate::registry`] chunk-provider table
/// (component C2) and preserved as raw bytes so the writer can round-trip them (spec.md §4.2),
/// rather than being silently dropped. Enforces RIFF's 2-byte alignment throughout.
pub struct ChunksReader<T: ParseChunkTag> {
    len: Option<u64>,
    byte_order: ByteOrder,
    consumed: u64,
    unknown: Vec<GenericChunk>,
    phantom: PhantomData<T>,
}

impl<T: ParseChunkTag> ChunksReader<T> {
    pub fn new(len: Option<u64>, byte_order: ByteOrder) -> Self {
        ChunksReader { len, byte_order, consumed: 0, unknown: Vec::new(), phantom: PhantomData }
    }

    /// Drains the unknown chunks accumulated so far, preserved verbatim via the chunk registry.
    pub fn take_unknown(&mut self) -> Vec<GenericChunk> {
        std::mem::take(&mut self.unknown)
    }

    pub fn next<B: ReadBytes>(&mut self, reader: &mut B) -> Result<Option<T>> {
        loop {
            if let Some(len) = self.len {
                if self.consumed >= len {
                    return Ok(None);
                }
            }

            // Align to the next 2-byte boundary if not currently aligned.
            if self.consumed & 0x1 == 1 {
                reader.read_u8()?;
                self.consumed += 1;
            }

            if let Some(len) = self.len {
                if self.consumed + 8 > len {
                    return Ok(None);
                }
            }

            let tag = reader.read_tag()?;

            let chunk_len = match self.byte_order {
                ByteOrder::LittleEndian => reader.read_u32()?,
                ByteOrder::BigEndian => reader.read_be_u32()?,
            };

            self.consumed += 8;

            if let Some(len) = self.len {
                if len - self.consumed < u64::from(chunk_len) {
                    debug!(
                        "chunk length of {} exceeds parent (list) chunk length",
                        String::from_utf8_lossy(&tag)
                    );
                    return format_error("riff: chunk length exceeds parent chunk length");
                }
            }

            self.consumed = self.consumed.saturating_add(u64::from(chunk_len));

            match T::parse_tag(tag, chunk_len) {
                Some(chunk) => return Ok(Some(chunk)),
                None => {
                    info!(
                        "preserving unknown chunk via registry: tag={}, len={}",
                        String::from_utf8_lossy(&tag),
                        chunk_len
                    );
                    let data = reader.read_boxed_slice_exact(chunk_len as usize)?;
                    let chunk = registry::construct(tag, &data);
                    if let Some(generic) = chunk.as_any().downcast_ref::<GenericChunk>() {
                        self.unknown.push(generic.clone());
                    }
                    if chunk_len & 1 == 1 {
                        reader.read_u8()?;
                        self.consumed += 1;
                    }
                }
            }
        }
    }

    pub fn finish<B: ReadBytes>(&mut self, reader: &mut B) -> Result<()> {
        if let Some(parent_len) = self.len {
            if self.consumed < parent_len {
                let remaining = parent_len - self.consumed;
                reader.ignore_bytes(remaining)?;
                self.consumed += remaining;
            }
            if parent_len & 0x1 == 1 {
                reader.read_u8()?;
            }
        }
        Ok(())
    }
}

/// Implemented by every concrete chunk payload, e.g. `WaveFormatChunk`, `ChnaChunk`.
pub trait ParseChunk: Sized {
    fn parse<B: ReadBytes>(reader: &mut B, tag: [u8; 4], len: u32) -> Result<Self>;
}

/// Binds a chunk's tag/length pair to its `ParseChunk` implementation so parsing is deferred
/// until the chunk is actually consumed.
pub struct ChunkParser<P: ParseChunk> {
    tag: [u8; 4],
    pub len: u32,
    phantom: PhantomData<P>,
}

impl<P: ParseChunk> ChunkParser<P> {
    pub fn new(tag: [u8; 4], len: u32) -> Self {
        ChunkParser { tag, len, phantom: PhantomData }
    }

    pub fn parse<B: ReadBytes>(&self, reader: &mut B) -> Result<P> {
        P::parse(reader, self.tag, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct OnlyFoo;
    enum TestChunks {
        Foo(ChunkParser<OnlyFoo>),
    }

    impl ParseChunk for OnlyFoo {
        fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
            reader.ignore_bytes(u64::from(len))?;
            Ok(OnlyFoo)
        }
    }

    impl ParseChunkTag for TestChunks {
        fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
            match &tag {
                b"foo " => Some(TestChunks::Foo(ChunkParser::new(tag, len))),
                _ => None,
            }
        }
    }

    #[test]
    fn skips_unknown_chunks_and_finds_known() {
        let mut data = Vec::new();
        data.extend_from_slice(b"junk");
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"\x01\x02\x03\x04");
        data.extend_from_slice(b"foo ");
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut cur = Cursor::new(data.clone());
        let mut reader = ChunksReader::<TestChunks>::new(Some(data.len() as u64), ByteOrder::LittleEndian);

        match reader.next(&mut cur).unwrap() {
            Some(TestChunks::Foo(_)) => (),
            None => panic!("expected to find foo chunk"),
        }

        let unknown = reader.take_unknown();
        assert_eq!(unknown.len(), 1);
        assert_eq!(&unknown[0].tag, b"junk");
        assert_eq!(unknown[0].data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn pads_odd_length_chunks() {
        let mut data = Vec::new();
        data.extend_from_slice(b"odd ");
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(b"\x01\x02\x03");
        data.push(0); // pad byte
        data.extend_from_slice(b"foo ");
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut cur = Cursor::new(data.clone());
        let mut reader = ChunksReader::<TestChunks>::new(Some(data.len() as u64), ByteOrder::LittleEndian);

        assert!(matches!(reader.next(&mut cur).unwrap(), Some(TestChunks::Foo(_))));
    }
}
