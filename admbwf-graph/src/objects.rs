// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The eight ADM entity types plus the `audioBlockFormat` leaf (spec.md §3.1).
//!
//! Objects are owned exclusively by the [`crate::graph::AdmGraph`] arena; cross-references are
//! non-owning [`ObjectHandle`]s, replacing the dynamic-cast dispatch the C++ original uses to
//! route `Add()` calls (REDESIGN FLAGS, spec.md §9).

use std::collections::BTreeMap;

use admbwf_core::UniversalTime;

use crate::ids::EntityKind;
use crate::value::XmlValues;

/// A non-owning reference to an object held by an [`crate::graph::AdmGraph`] arena, identified by
/// its index within that type's storage vector.
///
/// `audioBlockFormat` has no handle variant: blocks are owned directly by their
/// `audioChannelFormat`'s `blocks` vector and nothing else ever references one by ID, so there is
/// no arena for them to index into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectHandle {
    Programme(usize),
    Content(usize),
    Object(usize),
    PackFormat(usize),
    ChannelFormat(usize),
    StreamFormat(usize),
    TrackFormat(usize),
    TrackUid(usize),
}

impl ObjectHandle {
    pub fn kind(self) -> EntityKind {
        match self {
            ObjectHandle::Programme(_) => EntityKind::Programme,
            ObjectHandle::Content(_) => EntityKind::Content,
            ObjectHandle::Object(_) => EntityKind::Object,
            ObjectHandle::PackFormat(_) => EntityKind::PackFormat,
            ObjectHandle::ChannelFormat(_) => EntityKind::ChannelFormat,
            ObjectHandle::StreamFormat(_) => EntityKind::StreamFormat,
            ObjectHandle::TrackFormat(_) => EntityKind::TrackFormat,
            ObjectHandle::TrackUid(_) => EntityKind::TrackUid,
        }
    }

    pub fn index(self) -> usize {
        match self {
            ObjectHandle::Programme(i)
            | ObjectHandle::Content(i)
            | ObjectHandle::Object(i)
            | ObjectHandle::PackFormat(i)
            | ObjectHandle::ChannelFormat(i)
            | ObjectHandle::StreamFormat(i)
            | ObjectHandle::TrackFormat(i)
            | ObjectHandle::TrackUid(i) => i,
        }
    }
}

/// A spatial position: exactly one of polar or Cartesian, never mixed within a block
/// (spec.md §6: "mixing within a block is not supported").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    Polar { azimuth: f64, elevation: f64, distance: f64 },
    Cartesian { x: f64, y: f64, z: f64 },
}

#[derive(Debug, Clone)]
pub struct BlockFormat {
    pub id: String,
    pub channel_format: Option<ObjectHandle>,
    pub rtime: UniversalTime,
    pub duration: UniversalTime,
    pub position: Option<Position>,
    /// Opaque supplementary parameters (`diffuse`, etc.) with no fixed schema (spec.md §9 Open
    /// Question: "If a consuming renderer requires a schema, it must be added as a separate
    /// concern").
    pub supplement: BTreeMap<String, String>,
    pub values: XmlValues,
}

impl BlockFormat {
    pub fn new(id: String) -> Self {
        BlockFormat {
            id,
            channel_format: None,
            rtime: UniversalTime::ZERO,
            duration: UniversalTime::ZERO,
            position: None,
            supplement: BTreeMap::new(),
            values: XmlValues::new(),
        }
    }

    pub fn end_time(&self) -> UniversalTime {
        self.rtime + self.duration
    }
}

#[derive(Debug, Clone)]
pub struct ChannelFormat {
    pub id: String,
    pub name: String,
    pub type_label: u16,
    pub blocks: Vec<BlockFormat>,
    pub values: XmlValues,
}

impl ChannelFormat {
    pub fn new(id: String, name: String) -> Self {
        ChannelFormat { id, name, type_label: 0, blocks: Vec::new(), values: XmlValues::new() }
    }

    /// Appends a block and re-sorts by `rtime` (spec.md invariant: "An `audioChannelFormat`'s
    /// block list is strictly sorted by `rtime`"), mirroring `ADMAudioChannelFormat::Add`'s
    /// sort-on-insert.
    pub fn add_block(&mut self, block: BlockFormat) {
        self.blocks.push(block);
        self.blocks.sort_by_key(|b| b.rtime);
    }
}

#[derive(Debug, Clone)]
pub struct StreamFormat {
    pub id: String,
    pub name: String,
    pub format_label: u16,
    pub channel_format: Option<ObjectHandle>,
    pub track_formats: Vec<ObjectHandle>,
    pub pack_format: Option<ObjectHandle>,
    pub values: XmlValues,
}

impl StreamFormat {
    pub fn new(id: String, name: String) -> Self {
        StreamFormat {
            id,
            name,
            format_label: 0,
            channel_format: None,
            track_formats: Vec::new(),
            pack_format: None,
            values: XmlValues::new(),
        }
    }

    /// Routes a reference by the target's runtime kind, matching `ADMAudioStreamFormat`'s
    /// overloaded `Add()` methods. Returns `false` for kinds this object cannot reference,
    /// signalling a `TypeError` to the caller.
    pub fn add_reference(&mut self, handle: ObjectHandle) -> bool {
        match handle {
            ObjectHandle::ChannelFormat(_) => {
                if self.channel_format.is_none() {
                    self.channel_format = Some(handle);
                }
                true
            }
            ObjectHandle::TrackFormat(_) => {
                if !self.track_formats.contains(&handle) {
                    self.track_formats.push(handle);
                }
                true
            }
            ObjectHandle::PackFormat(_) => {
                if self.pack_format.is_none() {
                    self.pack_format = Some(handle);
                }
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackFormat {
    pub id: String,
    pub name: String,
    pub type_label: u16,
    pub format_label: u16,
    pub stream_format: Option<ObjectHandle>,
    pub values: XmlValues,
}

impl TrackFormat {
    pub fn new(id: String, name: String) -> Self {
        TrackFormat {
            id,
            name,
            type_label: 0,
            format_label: 0,
            stream_format: None,
            values: XmlValues::new(),
        }
    }

    pub fn add_reference(&mut self, handle: ObjectHandle) -> bool {
        match handle {
            ObjectHandle::StreamFormat(_) => {
                if self.stream_format.is_none() {
                    self.stream_format = Some(handle);
                }
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackFormat {
    pub id: String,
    pub name: String,
    pub type_label: u16,
    pub channel_formats: Vec<ObjectHandle>,
    pub pack_formats: Vec<ObjectHandle>,
    pub values: XmlValues,
}

impl PackFormat {
    pub fn new(id: String, name: String) -> Self {
        PackFormat {
            id,
            name,
            type_label: 0,
            channel_formats: Vec::new(),
            pack_formats: Vec::new(),
            values: XmlValues::new(),
        }
    }

    pub fn add_reference(&mut self, handle: ObjectHandle) -> bool {
        match handle {
            ObjectHandle::ChannelFormat(_) => {
                if !self.channel_formats.contains(&handle) {
                    self.channel_formats.push(handle);
                }
                true
            }
            ObjectHandle::PackFormat(_) => {
                if !self.pack_formats.contains(&handle) {
                    self.pack_formats.push(handle);
                }
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackUid {
    pub id: String,
    /// 0-based internally; the `chna` wire form is 1-based (spec.md §3.1).
    pub track_num: u16,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u16>,
    pub track_format: Option<ObjectHandle>,
    pub pack_format: Option<ObjectHandle>,
    pub values: XmlValues,
}

impl TrackUid {
    pub fn new(id: String, track_num: u16) -> Self {
        TrackUid {
            id,
            track_num,
            sample_rate: None,
            bit_depth: None,
            track_format: None,
            pack_format: None,
            values: XmlValues::new(),
        }
    }

    pub fn add_reference(&mut self, handle: ObjectHandle) -> bool {
        match handle {
            ObjectHandle::TrackFormat(_) => {
                if self.track_format.is_none() {
                    self.track_format = Some(handle);
                }
                true
            }
            ObjectHandle::PackFormat(_) => {
                if self.pack_format.is_none() {
                    self.pack_format = Some(handle);
                }
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub id: String,
    pub name: String,
    pub start_time: Option<UniversalTime>,
    pub duration: Option<UniversalTime>,
    /// Set once `startTime`/`duration` are assigned from authored XML, so
    /// `AdmGraph::update_object_limits` knows not to overwrite an explicit value with one
    /// derived from the object's block formats (`ADMData.cpp`'s `StartTimeSet()`/`DurationSet()`).
    pub limits_set: bool,
    pub nested_objects: Vec<ObjectHandle>,
    pub pack_formats: Vec<ObjectHandle>,
    pub track_uids: Vec<ObjectHandle>,
    pub values: XmlValues,
}

impl Object {
    pub fn new(id: String, name: String) -> Self {
        Object {
            id,
            name,
            start_time: None,
            duration: None,
            limits_set: false,
            nested_objects: Vec::new(),
            pack_formats: Vec::new(),
            track_uids: Vec::new(),
            values: XmlValues::new(),
        }
    }

    pub fn add_reference(&mut self, handle: ObjectHandle) -> bool {
        match handle {
            ObjectHandle::Object(_) => {
                if !self.nested_objects.contains(&handle) {
                    self.nested_objects.push(handle);
                }
                true
            }
            ObjectHandle::PackFormat(_) => {
                if !self.pack_formats.contains(&handle) {
                    self.pack_formats.push(handle);
                }
                true
            }
            ObjectHandle::TrackUid(_) => {
                if !self.track_uids.contains(&handle) {
                    self.track_uids.push(handle);
                }
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Content {
    pub id: String,
    pub name: String,
    pub language: Option<String>,
    pub objects: Vec<ObjectHandle>,
    pub values: XmlValues,
}

impl Content {
    pub fn new(id: String, name: String) -> Self {
        Content { id, name, language: None, objects: Vec::new(), values: XmlValues::new() }
    }

    pub fn add_reference(&mut self, handle: ObjectHandle) -> bool {
        match handle {
            ObjectHandle::Object(_) => {
                if !self.objects.contains(&handle) {
                    self.objects.push(handle);
                }
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Programme {
    pub id: String,
    pub name: String,
    pub language: Option<String>,
    pub contents: Vec<ObjectHandle>,
    pub values: XmlValues,
}

impl Programme {
    pub fn new(id: String, name: String) -> Self {
        Programme { id, name, language: None, contents: Vec::new(), values: XmlValues::new() }
    }

    pub fn add_reference(&mut self, handle: ObjectHandle) -> bool {
        match handle {
            ObjectHandle::Content(_) => {
                if !self.contents.contains(&handle) {
                    self.contents.push(handle);
                }
                true
            }
            _ => false,
        }
    }
}
