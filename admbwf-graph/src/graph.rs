// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `AdmGraph`: the arena that owns every ADM entity (component C5, spec.md §4.6).
//!
//! Each entity type lives in its own `Vec`, addressed by [`ObjectHandle`] rather than a pointer,
//! and a single `id -> handle` map replaces the C++ original's `admobjects` lookup table. This
//! sidesteps the aliasing problems the original solves with raw `ADMObject*` back-pointers and
//! RTTI `dynamic_cast` (REDESIGN FLAGS, spec.md §9): references are disjoint indices, so resolving
//! them never needs more than one field of `AdmGraph` borrowed mutably at a time.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::ids::{EntityKind, IdAllocator};
use crate::objects::{
    BlockFormat, ChannelFormat, Content, Object, ObjectHandle, PackFormat, Programme,
    StreamFormat, TrackFormat, TrackUid,
};
use crate::value::XmlValues;

/// The object graph underlying a single ADM document (spec.md §3).
#[derive(Default)]
pub struct AdmGraph {
    programmes: Vec<Programme>,
    contents: Vec<Content>,
    objects: Vec<Object>,
    pack_formats: Vec<PackFormat>,
    channel_formats: Vec<ChannelFormat>,
    stream_formats: Vec<StreamFormat>,
    track_formats: Vec<TrackFormat>,
    track_uids: Vec<TrackUid>,
    map: HashMap<String, ObjectHandle>,
    ids: IdAllocator,
}

/// Macro-free accessor boilerplate: one pair of (by-ref, by-mut) getters per arena, matching the
/// shape of `ADMData::GetObjects<type>` without the single-interface RTTI dispatch those methods
/// serve.
impl AdmGraph {
    pub fn new() -> Self {
        AdmGraph::default()
    }

    pub fn programme(&self, h: ObjectHandle) -> &Programme {
        &self.programmes[h.index()]
    }
    pub fn programme_mut(&mut self, h: ObjectHandle) -> &mut Programme {
        &mut self.programmes[h.index()]
    }
    pub fn programmes(&self) -> &[Programme] {
        &self.programmes
    }

    pub fn content(&self, h: ObjectHandle) -> &Content {
        &self.contents[h.index()]
    }
    pub fn content_mut(&mut self, h: ObjectHandle) -> &mut Content {
        &mut self.contents[h.index()]
    }
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    pub fn object(&self, h: ObjectHandle) -> &Object {
        &self.objects[h.index()]
    }
    pub fn object_mut(&mut self, h: ObjectHandle) -> &mut Object {
        &mut self.objects[h.index()]
    }
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn pack_format(&self, h: ObjectHandle) -> &PackFormat {
        &self.pack_formats[h.index()]
    }
    pub fn pack_format_mut(&mut self, h: ObjectHandle) -> &mut PackFormat {
        &mut self.pack_formats[h.index()]
    }
    pub fn pack_formats(&self) -> &[PackFormat] {
        &self.pack_formats
    }

    pub fn channel_format(&self, h: ObjectHandle) -> &ChannelFormat {
        &self.channel_formats[h.index()]
    }
    pub fn channel_format_mut(&mut self, h: ObjectHandle) -> &mut ChannelFormat {
        &mut self.channel_formats[h.index()]
    }
    pub fn channel_formats(&self) -> &[ChannelFormat] {
        &self.channel_formats
    }

    pub fn stream_format(&self, h: ObjectHandle) -> &StreamFormat {
        &self.stream_formats[h.index()]
    }
    pub fn stream_format_mut(&mut self, h: ObjectHandle) -> &mut StreamFormat {
        &mut self.stream_formats[h.index()]
    }
    pub fn stream_formats(&self) -> &[StreamFormat] {
        &self.stream_formats
    }

    pub fn track_format(&self, h: ObjectHandle) -> &TrackFormat {
        &self.track_formats[h.index()]
    }
    pub fn track_format_mut(&mut self, h: ObjectHandle) -> &mut TrackFormat {
        &mut self.track_formats[h.index()]
    }
    pub fn track_formats(&self) -> &[TrackFormat] {
        &self.track_formats
    }

    pub fn track_uid(&self, h: ObjectHandle) -> &TrackUid {
        &self.track_uids[h.index()]
    }
    pub fn track_uid_mut(&mut self, h: ObjectHandle) -> &mut TrackUid {
        &mut self.track_uids[h.index()]
    }
    pub fn track_uids(&self) -> &[TrackUid] {
        &self.track_uids
    }

    pub fn find(&self, kind: EntityKind, id: &str) -> Option<ObjectHandle> {
        self.map.get(&map_key(kind, id)).copied()
    }

    /// Creates a named object of `kind` (every entity but `audioTrackUID`, which has no name and
    /// is created via [`AdmGraph::create_track_uid`]), reusing the handle of an existing object
    /// sharing the same `(kind, id)` key (spec.md §3.2: "Re-creating with the same id returns the
    /// existing handle"). `id` of `None` allocates a fresh one; `Some` that collides with an
    /// existing id of a different object is disambiguated via [`IdAllocator::make_unique`].
    pub fn create(&mut self, kind: EntityKind, id: Option<String>, name: String) -> ObjectHandle {
        if let Some(ref id) = id {
            if let Some(existing) = self.find(kind, id) {
                return existing;
            }
        }

        let id = self.alloc_id(kind, id);
        let handle = match kind {
            EntityKind::Programme => {
                self.programmes.push(Programme::new(id.clone(), name));
                ObjectHandle::Programme(self.programmes.len() - 1)
            }
            EntityKind::Content => {
                self.contents.push(Content::new(id.clone(), name));
                ObjectHandle::Content(self.contents.len() - 1)
            }
            EntityKind::Object => {
                self.objects.push(Object::new(id.clone(), name));
                ObjectHandle::Object(self.objects.len() - 1)
            }
            EntityKind::PackFormat => {
                self.pack_formats.push(PackFormat::new(id.clone(), name));
                ObjectHandle::PackFormat(self.pack_formats.len() - 1)
            }
            EntityKind::ChannelFormat => {
                self.channel_formats.push(ChannelFormat::new(id.clone(), name));
                ObjectHandle::ChannelFormat(self.channel_formats.len() - 1)
            }
            EntityKind::StreamFormat => {
                self.stream_formats.push(StreamFormat::new(id.clone(), name));
                ObjectHandle::StreamFormat(self.stream_formats.len() - 1)
            }
            EntityKind::TrackFormat => {
                self.track_formats.push(TrackFormat::new(id.clone(), name));
                ObjectHandle::TrackFormat(self.track_formats.len() - 1)
            }
            EntityKind::TrackUid | EntityKind::BlockFormat => {
                unreachable!("{:?} is created through a dedicated method, not AdmGraph::create", kind)
            }
        };

        self.map.insert(map_key(kind, &id), handle);
        handle
    }

    /// Creates an `audioTrackUID`, following the same id-reuse/disambiguation rules as
    /// [`AdmGraph::create`].
    pub fn create_track_uid(&mut self, id: Option<String>, track_num: u16) -> ObjectHandle {
        if let Some(ref id) = id {
            if let Some(existing) = self.find(EntityKind::TrackUid, id) {
                return existing;
            }
        }

        let id = self.alloc_id(EntityKind::TrackUid, id);
        self.track_uids.push(TrackUid::new(id.clone(), track_num));
        let handle = ObjectHandle::TrackUid(self.track_uids.len() - 1);
        self.map.insert(map_key(EntityKind::TrackUid, &id), handle);
        handle
    }

    fn alloc_id(&mut self, kind: EntityKind, id: Option<String>) -> String {
        let exists = |candidate: &str| self.map.contains_key(&map_key(kind, candidate));
        match id {
            Some(id) => self.ids.make_unique(kind, &id, exists),
            None => self.ids.create_id(kind, exists),
        }
    }

    /// Adds a finished `audioBlockFormat` to the `audioChannelFormat` it belongs to.
    pub fn add_block(&mut self, channel: ObjectHandle, block: BlockFormat) {
        self.channel_format_mut(channel).add_block(block);
    }

    /// Allocates a fresh block format id without creating an arena entry for it.
    pub fn create_block_id(&mut self) -> String {
        self.ids.create_id(EntityKind::BlockFormat, |_| false)
    }

    /// Runs every post-load pass the spec requires before a graph is considered usable: reference
    /// resolution, duplicate-track sorting, object limit recomputation and temporary id rewriting
    /// (spec.md §4.6 "Finalisation").
    pub fn finalise(&mut self) {
        self.connect_references();
        self.track_uids.sort_by_key(|t| t.track_num);
        for cf in &mut self.channel_formats {
            cf.blocks.sort_by_key(|b| b.rtime);
        }
        self.update_object_limits();
        self.change_temporary_ids();
    }

    /// Resolves every `IDRef`/`Ref` entry left in each object's value bag against `self.map`,
    /// logging and dropping anything that doesn't resolve or resolves to the wrong type (spec.md
    /// §4.6: "unresolved references are logged as warnings... load still succeeds").
    fn connect_references(&mut self) {
        connect_refs_for(&mut self.programmes, &self.map);
        connect_refs_for(&mut self.contents, &self.map);
        connect_refs_for(&mut self.objects, &self.map);
        connect_refs_for(&mut self.pack_formats, &self.map);
        connect_refs_for(&mut self.channel_formats, &self.map);
        connect_refs_for(&mut self.stream_formats, &self.map);
        connect_refs_for(&mut self.track_formats, &self.map);
        connect_refs_for(&mut self.track_uids, &self.map);
    }

    /// Recomputes each `audioObject`'s `startTime`/`duration` from the block formats reachable
    /// through its pack/channel format tree, shifting that object's blocks so the earliest starts
    /// at zero (spec.md §4.6 "Updating audio object limits"). Skipped for any object that shares a
    /// channel format with another object, since the shift would then be ambiguous.
    fn update_object_limits(&mut self) {
        let shared = self.channel_formats_used_by_multiple_objects();

        for i in 0..self.objects.len() {
            let handle = ObjectHandle::Object(i);
            let channels = self.channel_formats_reachable_from(handle);
            if channels.iter().any(|c| shared.contains(c)) {
                continue;
            }

            // Don't update audio object limits if they have been explicitly set.
            if self.objects[i].limits_set {
                continue;
            }

            let mut min_start: Option<admbwf_core::UniversalTime> = None;
            let mut max_end: Option<admbwf_core::UniversalTime> = None;
            for &cf in &channels {
                for block in &self.channel_format(cf).blocks {
                    min_start = Some(min_start.map_or(block.rtime, |m| m.min(block.rtime)));
                    max_end = Some(max_end.map_or(block.end_time(), |m| m.max(block.end_time())));
                }
            }

            let (min_start, max_end) = match (min_start, max_end) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            for &cf in &channels {
                for block in &mut self.channel_format_mut(cf).blocks {
                    block.rtime = block.rtime - min_start;
                }
            }

            let object = &mut self.objects[i];
            object.start_time = Some(min_start);
            object.duration = Some(max_end - min_start);
        }
    }

    fn channel_formats_used_by_multiple_objects(&self) -> HashSet<ObjectHandle> {
        let mut owner: HashMap<ObjectHandle, usize> = HashMap::new();
        let mut shared = HashSet::new();
        for i in 0..self.objects.len() {
            for cf in self.channel_formats_reachable_from(ObjectHandle::Object(i)) {
                match owner.get(&cf) {
                    Some(&other) if other != i => {
                        shared.insert(cf);
                    }
                    Some(_) => {}
                    None => {
                        owner.insert(cf, i);
                    }
                }
            }
        }
        shared
    }

    fn channel_formats_reachable_from(&self, object: ObjectHandle) -> Vec<ObjectHandle> {
        let mut out = Vec::new();
        for &pf in &self.object(object).pack_formats {
            self.collect_channel_formats(pf, &mut out);
        }
        out
    }

    fn collect_channel_formats(&self, pack: ObjectHandle, out: &mut Vec<ObjectHandle>) {
        let pf = self.pack_format(pack);
        for &cf in &pf.channel_formats {
            if !out.contains(&cf) {
                out.push(cf);
            }
        }
        for &nested in &pf.pack_formats {
            self.collect_channel_formats(nested, out);
        }
    }

    /// Rewrites every temporary id (`_T`-suffixed) reachable from the four root entity types, in
    /// the same fixed order and recursive walk as `ADMData::ChangeTemporaryIDs`/
    /// `ChangeTemporaryID`: a depth-first visit, each object rewritten exactly once, each root
    /// type pulling along whatever it transitively references.
    fn change_temporary_ids(&mut self) {
        let mut visited = HashSet::new();

        for i in 0..self.programmes.len() {
            self.rewrite_from(ObjectHandle::Programme(i), &mut visited);
        }
        for i in 0..self.contents.len() {
            self.rewrite_from(ObjectHandle::Content(i), &mut visited);
        }
        for i in 0..self.objects.len() {
            self.rewrite_from(ObjectHandle::Object(i), &mut visited);
        }
        for i in 0..self.pack_formats.len() {
            self.rewrite_from(ObjectHandle::PackFormat(i), &mut visited);
        }
    }

    fn rewrite_from(&mut self, handle: ObjectHandle, visited: &mut HashSet<ObjectHandle>) {
        if !visited.insert(handle) {
            return;
        }

        self.rewrite_id(handle);

        let children = self.referenced_handles(handle);
        for child in children {
            self.rewrite_from(child, visited);
        }
    }

    /// Rewrites a single object's own id if it is temporary, updating the `map` key in lockstep.
    /// `audioChannelFormat`s additionally rewrite their owned blocks, since blocks have no handle
    /// of their own to be visited through (spec.md §3.1).
    fn rewrite_id(&mut self, handle: ObjectHandle) {
        let kind = handle.kind();
        if !kind.uses_temp_id() {
            return;
        }

        let old_id = self.id_of(handle).to_string();
        if !old_id.ends_with(crate::ids::TEMP_ID_SUFFIX) {
            return;
        }

        let (type_label, format_label) = match handle {
            ObjectHandle::PackFormat(i) => (self.pack_formats[i].type_label, 0),
            ObjectHandle::ChannelFormat(i) => (self.channel_formats[i].type_label, 0),
            ObjectHandle::StreamFormat(i) => (self.stream_formats[i].format_label, 0),
            ObjectHandle::TrackFormat(i) => {
                (self.track_formats[i].type_label, self.track_formats[i].format_label)
            }
            _ => (0, 0),
        };
        let exists = |candidate: &str| self.map.contains_key(&map_key(kind, candidate));
        let new_id = self.ids.canonical_id(kind, type_label, format_label, exists);

        self.map.remove(&map_key(kind, &old_id));
        self.set_id(handle, new_id.clone());
        self.map.insert(map_key(kind, &new_id), handle);

        if let ObjectHandle::ChannelFormat(_) = handle {
            self.rewrite_block_ids(handle, &new_id);
        }
    }

    /// Gives every block owned by `channel` a permanent id built from the channel's own rewritten
    /// suffix plus a fresh ordinal, mirroring `ADMAudioBlockFormat::UpdateID`'s reuse of the owning
    /// channel format's id.
    fn rewrite_block_ids(&mut self, channel: ObjectHandle, new_channel_id: &str) {
        let suffix = new_channel_id
            .strip_prefix(EntityKind::ChannelFormat.id_prefix())
            .unwrap_or(new_channel_id);
        let prefix = EntityKind::BlockFormat.id_prefix();

        let cf = self.channel_format_mut(channel);
        for (i, block) in cf.blocks.iter_mut().enumerate() {
            block.id = format!("{}{}_{:08x}", prefix, suffix, i + 1);
        }
    }

    fn id_of(&self, handle: ObjectHandle) -> &str {
        match handle {
            ObjectHandle::Programme(i) => &self.programmes[i].id,
            ObjectHandle::Content(i) => &self.contents[i].id,
            ObjectHandle::Object(i) => &self.objects[i].id,
            ObjectHandle::PackFormat(i) => &self.pack_formats[i].id,
            ObjectHandle::ChannelFormat(i) => &self.channel_formats[i].id,
            ObjectHandle::StreamFormat(i) => &self.stream_formats[i].id,
            ObjectHandle::TrackFormat(i) => &self.track_formats[i].id,
            ObjectHandle::TrackUid(i) => &self.track_uids[i].id,
        }
    }

    fn set_id(&mut self, handle: ObjectHandle, id: String) {
        match handle {
            ObjectHandle::Programme(i) => self.programmes[i].id = id,
            ObjectHandle::Content(i) => self.contents[i].id = id,
            ObjectHandle::Object(i) => self.objects[i].id = id,
            ObjectHandle::PackFormat(i) => self.pack_formats[i].id = id,
            ObjectHandle::ChannelFormat(i) => self.channel_formats[i].id = id,
            ObjectHandle::StreamFormat(i) => self.stream_formats[i].id = id,
            ObjectHandle::TrackFormat(i) => self.track_formats[i].id = id,
            ObjectHandle::TrackUid(i) => self.track_uids[i].id = id,
        }
    }

    /// The handles each entity type owns or references, in the same shape `ChangeTemporaryID`
    /// walks via `GetValuesAndReferences`.
    fn referenced_handles(&self, handle: ObjectHandle) -> Vec<ObjectHandle> {
        match handle {
            ObjectHandle::Programme(i) => self.programmes[i].contents.clone(),
            ObjectHandle::Content(i) => self.contents[i].objects.clone(),
            ObjectHandle::Object(i) => {
                let o = &self.objects[i];
                let mut all = o.nested_objects.clone();
                all.extend(o.pack_formats.iter().copied());
                all.extend(o.track_uids.iter().copied());
                all
            }
            ObjectHandle::PackFormat(i) => {
                let p = &self.pack_formats[i];
                let mut all = p.channel_formats.clone();
                all.extend(p.pack_formats.iter().copied());
                all
            }
            ObjectHandle::ChannelFormat(_) => Vec::new(),
            ObjectHandle::StreamFormat(i) => {
                let s = &self.stream_formats[i];
                let mut all: Vec<ObjectHandle> = s.channel_format.into_iter().collect();
                all.extend(s.track_formats.iter().copied());
                all
            }
            ObjectHandle::TrackFormat(i) => self.track_formats[i].stream_format.into_iter().collect(),
            ObjectHandle::TrackUid(i) => {
                let t = &self.track_uids[i];
                t.track_format.into_iter().chain(t.pack_format).collect()
            }
        }
    }
}

fn map_key(kind: EntityKind, id: &str) -> String {
    format!("{}/{}", kind.type_name(), id)
}

/// Resolves and applies every reference left in `objs`' value bags against `map`, logging and
/// dropping whatever doesn't resolve. A free function rather than a method so the caller can pass
/// `&mut self.pack_formats` and `&self.map` (two disjoint fields of `AdmGraph`) without the borrow
/// checker seeing a conflict.
fn connect_refs_for<T: HasValuesAndReferences>(objs: &mut [T], map: &HashMap<String, ObjectHandle>) {
    for obj in objs.iter_mut() {
        let refs = obj.values_mut().take_references();
        for (target_type, target_id) in refs {
            let key = format!("{}/{}", target_type, target_id);
            match map.get(&key) {
                Some(&handle) => {
                    if !obj.add_reference(handle) {
                        warn!(
                            "{} {}: reference to {} is of an unsupported type",
                            obj.self_type_name(),
                            obj.self_id(),
                            key
                        );
                    }
                }
                None => {
                    warn!("{} {}: unresolved reference {}", obj.self_type_name(), obj.self_id(), key);
                }
            }
        }
    }
}

/// The subset of entity behavior `connect_refs_for` needs, implemented identically by every
/// referencing entity type.
trait HasValuesAndReferences {
    fn values_mut(&mut self) -> &mut XmlValues;
    fn add_reference(&mut self, handle: ObjectHandle) -> bool;
    fn self_type_name(&self) -> &'static str;
    fn self_id(&self) -> &str;
}

macro_rules! impl_has_values_and_references {
    ($ty:ty, $kind:expr) => {
        impl HasValuesAndReferences for $ty {
            fn values_mut(&mut self) -> &mut XmlValues {
                &mut self.values
            }
            fn add_reference(&mut self, handle: ObjectHandle) -> bool {
                <$ty>::add_reference(self, handle)
            }
            fn self_type_name(&self) -> &'static str {
                $kind.type_name()
            }
            fn self_id(&self) -> &str {
                &self.id
            }
        }
    };
}

impl_has_values_and_references!(Programme, EntityKind::Programme);
impl_has_values_and_references!(Content, EntityKind::Content);
impl_has_values_and_references!(Object, EntityKind::Object);
impl_has_values_and_references!(PackFormat, EntityKind::PackFormat);
impl_has_values_and_references!(ChannelFormat, EntityKind::ChannelFormat);
impl_has_values_and_references!(StreamFormat, EntityKind::StreamFormat);
impl_has_values_and_references!(TrackFormat, EntityKind::TrackFormat);
impl_has_values_and_references!(TrackUid, EntityKind::TrackUid);

impl HasValuesAndReferences for ChannelFormat {
    fn values_mut(&mut self) -> &mut XmlValues {
        &mut self.values
    }
    fn add_reference(&mut self, _handle: ObjectHandle) -> bool {
        false
    }
    fn self_type_name(&self) -> &'static str {
        EntityKind::ChannelFormat.type_name()
    }
    fn self_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::XmlValue;
    use admbwf_core::UniversalTime;

    fn sample_graph() -> AdmGraph {
        let mut g = AdmGraph::new();

        let cf = g.create(EntityKind::ChannelFormat, None, "front".to_string());
        let mut block = BlockFormat::new(g.create_block_id());
        block.rtime = UniversalTime::from_nanos(1_000_000_000);
        block.duration = UniversalTime::from_nanos(2_000_000_000);
        g.add_block(cf, block);

        let pf = g.create(EntityKind::PackFormat, None, "pack0".to_string());
        g.pack_format_mut(pf).values.push(XmlValue::elem(
            "audioChannelFormatIDRef",
            g.channel_format(cf).id.clone(),
        ));

        let obj = g.create(EntityKind::Object, None, "obj0".to_string());
        g.object_mut(obj)
            .values
            .push(XmlValue::elem("audioPackFormatIDRef", g.pack_format(pf).id.clone()));

        g
    }

    #[test]
    fn create_returns_existing_handle_for_known_id() {
        let mut g = AdmGraph::new();
        let a = g.create(EntityKind::Content, Some("ACO_1001".to_string()), "x".to_string());
        let b = g.create(EntityKind::Content, Some("ACO_1001".to_string()), "y".to_string());
        assert_eq!(a, b);
        assert_eq!(g.content(a).name, "x");
    }

    #[test]
    fn create_disambiguates_colliding_explicit_id() {
        let mut g = AdmGraph::new();
        let first = g.create(EntityKind::Programme, Some("APR_1000".to_string()), "a".to_string());
        let second = g.create(EntityKind::Programme, Some("APR_1000".to_string()), "b".to_string());
        assert_ne!(first, second);
        assert_ne!(g.programme(second).id, g.programme(first).id);
    }

    #[test]
    fn finalise_connects_references_end_to_end() {
        let mut g = sample_graph();
        g.finalise();

        let obj = ObjectHandle::Object(0);
        assert_eq!(g.object(obj).pack_formats.len(), 1);
        let pf = g.object(obj).pack_formats[0];
        assert_eq!(g.pack_format(pf).channel_formats.len(), 1);
    }

    #[test]
    fn finalise_updates_object_limits_and_shifts_blocks_to_zero() {
        let mut g = sample_graph();
        g.finalise();

        let obj = ObjectHandle::Object(0);
        assert_eq!(g.object(obj).start_time, Some(UniversalTime::from_nanos(1_000_000_000)));
        assert_eq!(g.object(obj).duration, Some(UniversalTime::from_nanos(2_000_000_000)));

        let cf = ObjectHandle::ChannelFormat(0);
        assert_eq!(g.channel_format(cf).blocks[0].rtime, UniversalTime::ZERO);
    }

    #[test]
    fn finalise_preserves_explicitly_authored_object_limits() {
        let mut g = sample_graph();

        let obj = ObjectHandle::Object(0);
        g.object_mut(obj).start_time = Some(UniversalTime::from_nanos(9_000_000_000));
        g.object_mut(obj).duration = Some(UniversalTime::from_nanos(3_000_000_000));
        g.object_mut(obj).limits_set = true;

        let cf = ObjectHandle::ChannelFormat(0);
        let original_rtime = g.channel_format(cf).blocks[0].rtime;

        g.finalise();

        assert_eq!(g.object(obj).start_time, Some(UniversalTime::from_nanos(9_000_000_000)));
        assert_eq!(g.object(obj).duration, Some(UniversalTime::from_nanos(3_000_000_000)));
        // Blocks are left unshifted too, consistent with not recomputing limits from them.
        assert_eq!(g.channel_format(cf).blocks[0].rtime, original_rtime);
    }

    #[test]
    fn finalise_leaves_shared_channel_formats_unshifted() {
        let mut g = AdmGraph::new();
        let cf = g.create(EntityKind::ChannelFormat, None, "shared".to_string());
        let mut block = BlockFormat::new(g.create_block_id());
        block.rtime = UniversalTime::from_nanos(5_000_000_000);
        g.add_block(cf, block);

        let pf = g.create(EntityKind::PackFormat, None, "pack0".to_string());
        g.pack_format_mut(pf).add_reference(cf);

        let obj_a = g.create(EntityKind::Object, None, "a".to_string());
        g.object_mut(obj_a).add_reference(pf);
        let obj_b = g.create(EntityKind::Object, None, "b".to_string());
        g.object_mut(obj_b).add_reference(pf);

        g.finalise();

        assert_eq!(g.object(obj_a).start_time, None);
        assert_eq!(g.object(obj_b).start_time, None);
        assert_eq!(g.channel_format(cf).blocks[0].rtime, UniversalTime::from_nanos(5_000_000_000));
    }

    #[test]
    fn unresolved_reference_is_dropped_without_failing() {
        let mut g = AdmGraph::new();
        let obj = g.create(EntityKind::Object, None, "o".to_string());
        g.object_mut(obj)
            .values
            .push(XmlValue::elem("audioPackFormatIDRef", "AP_deadbeef_T".to_string()));

        g.finalise();
        assert!(g.object(obj).pack_formats.is_empty());
    }

    #[test]
    fn change_temporary_ids_embeds_type_label_in_canonical_id() {
        let mut g = AdmGraph::new();
        let pf = g.create(EntityKind::PackFormat, None, "pack0".to_string());
        g.pack_format_mut(pf).type_label = 0x0003;

        let cf = g.create(EntityKind::ChannelFormat, None, "ch0".to_string());
        g.channel_format_mut(cf).type_label = 0x0003;
        let mut block = BlockFormat::new(g.create_block_id());
        block.rtime = UniversalTime::ZERO;
        g.add_block(cf, block);
        g.pack_format_mut(pf).add_reference(cf);

        let obj = g.create(EntityKind::Object, None, "o".to_string());
        g.object_mut(obj).add_reference(pf);

        g.finalise();

        let pf_id = g.pack_format(pf).id.clone();
        let cf_id = g.channel_format(cf).id.clone();
        assert!(pf_id.starts_with("AP_0003"));
        assert!(cf_id.starts_with("AC_0003"));

        let block_id = &g.channel_format(cf).blocks[0].id;
        let cf_suffix = cf_id.strip_prefix("AC_").unwrap();
        assert!(block_id.starts_with(&format!("AB_{}_", cf_suffix)));
    }

    #[test]
    fn change_temporary_ids_strips_suffix_and_is_reachable_via_map() {
        let mut g = AdmGraph::new();
        let pf = g.create(EntityKind::PackFormat, None, "pack0".to_string());
        let temp_id = g.pack_format(pf).id.clone();
        assert!(temp_id.ends_with(crate::ids::TEMP_ID_SUFFIX));

        let obj = g.create(EntityKind::Object, None, "o".to_string());
        g.object_mut(obj).add_reference(pf);

        g.finalise();

        let final_id = g.pack_format(pf).id.clone();
        assert!(!final_id.ends_with(crate::ids::TEMP_ID_SUFFIX));
        assert_eq!(g.find(EntityKind::PackFormat, &final_id), Some(pf));
        assert_eq!(g.find(EntityKind::PackFormat, &temp_id), None);
    }
}
