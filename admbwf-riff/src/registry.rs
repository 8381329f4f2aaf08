// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process-wide chunk provider table (component C2).
//!
//! `admbwf-riff`'s fast path parses the handful of chunks the core actually interprets
//! (`fmt `, `bext`, `chna`, `axml`, `ds64`, `data`) directly via [`crate::common::ParseChunkTag`].
//! This registry exists alongside that path for chunk kinds the core does not interpret: it
//! lets a chunk ID round-trip through a load/save cycle as opaque bytes, and lets an application
//! register a constructor for a private chunk type before the first file is opened.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

/// A chunk payload produced by a registered constructor.
///
/// Built-in registrations all yield [`GenericChunk`]; `as_any` exists so an application that
/// registers its own constructor can downcast back to its own payload type.
pub trait ChunkObject: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// The fallback payload: raw, unvalidated chunk bytes, preserved verbatim for round-trip.
#[derive(Debug, Clone)]
pub struct GenericChunk {
    pub tag: [u8; 4],
    pub data: Vec<u8>,
}

impl ChunkObject for GenericChunk {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A chunk provider: given the tag and raw payload bytes, produces a [`ChunkObject`].
pub type ChunkCtor = fn(tag: [u8; 4], data: &[u8]) -> Box<dyn ChunkObject>;

fn generic_ctor(tag: [u8; 4], data: &[u8]) -> Box<dyn ChunkObject> {
    Box::new(GenericChunk { tag, data: data.to_vec() })
}

/// Packs a 4-byte chunk tag into the registry's big-endian `u32` key.
pub fn tag_to_id(tag: [u8; 4]) -> u32 {
    u32::from_be_bytes(tag)
}

struct Registry {
    providers: HashMap<u32, ChunkCtor>,
}

impl Registry {
    fn with_builtins() -> Self {
        let mut providers = HashMap::new();
        for tag in [*b"RIFF", *b"RF64", *b"WAVE", *b"ds64", *b"fmt ", *b"bext", *b"chna", *b"axml", *b"data"]
        {
            providers.insert(tag_to_id(tag), generic_ctor as ChunkCtor);
        }
        Registry { providers }
    }
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::with_builtins()));

/// Registers a constructor for `tag`. Idempotent: if `tag` is already registered (including one
/// of the built-ins above), this call is silently ignored and the first registration wins.
pub fn register(tag: [u8; 4], ctor: ChunkCtor) {
    let mut reg = REGISTRY.lock().expect("chunk registry poisoned");
    reg.providers.entry(tag_to_id(tag)).or_insert(ctor);
}

/// Looks up the constructor registered for `tag`, falling back to [`GenericChunk`] preservation
/// for any tag nothing has registered.
pub fn lookup(tag: [u8; 4]) -> ChunkCtor {
    let reg = REGISTRY.lock().expect("chunk registry poisoned");
    *reg.providers.get(&tag_to_id(tag)).unwrap_or(&(generic_ctor as ChunkCtor))
}

/// Constructs the chunk object registered (or falling back to generic) for `tag`.
pub fn construct(tag: [u8; 4], data: &[u8]) -> Box<dyn ChunkObject> {
    lookup(tag)(tag, data)
}
