// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ID allocation and formatting (component C5's `ids` module).
//!
//! Grounded in `ADMData::CreateID`/`FindUniqueID`/`ChangeTemporaryIDs` (original_source's
//! `ADMData.cpp`): programme/content/object IDs are always searched from `0x1000`; pack/channel/
//! stream/track-format IDs are temporary (`_T`-suffixed) and searched starting from this
//! allocator's own per-type counter rather than rescanning from zero; block format IDs are a flat
//! incrementing counter with no uniqueness scan once seeded, since automation tracks can create
//! thousands of them.

use std::collections::HashMap;

pub const TEMP_ID_SUFFIX: &str = "_T";

/// The nine kinds of object an `AdmGraph` can own (eight ADM entities plus the block format leaf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Programme,
    Content,
    Object,
    PackFormat,
    ChannelFormat,
    StreamFormat,
    TrackFormat,
    TrackUid,
    BlockFormat,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Programme,
        EntityKind::Content,
        EntityKind::Object,
        EntityKind::PackFormat,
        EntityKind::ChannelFormat,
        EntityKind::StreamFormat,
        EntityKind::TrackFormat,
        EntityKind::TrackUid,
        EntityKind::BlockFormat,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            EntityKind::Programme => "audioProgramme",
            EntityKind::Content => "audioContent",
            EntityKind::Object => "audioObject",
            EntityKind::PackFormat => "audioPackFormat",
            EntityKind::ChannelFormat => "audioChannelFormat",
            EntityKind::StreamFormat => "audioStreamFormat",
            EntityKind::TrackFormat => "audioTrackFormat",
            EntityKind::TrackUid => "audioTrackUID",
            EntityKind::BlockFormat => "audioBlockFormat",
        }
    }

    pub fn from_type_name(name: &str) -> Option<EntityKind> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// Maps a reference attribute/element name (`audioContentIDRef`, `audioTrackUIDRef`, ...)
    /// back to the entity kind it targets, by checking each kind's own
    /// `type_name() + reference_suffix()` rather than guessing from a generic `IDRef`/`Ref`
    /// split. A blind suffix split is ambiguous: `audioTrackUIDRef` ends in `IDRef` too, since
    /// `audioTrackUID` itself ends in `ID`, so stripping `IDRef` first would wrongly yield
    /// `audioTrackU` instead of `audioTrackUID`.
    pub fn from_reference_name(name: &str) -> Option<EntityKind> {
        Self::ALL
            .into_iter()
            .filter(|k| *k != EntityKind::BlockFormat)
            .find(|k| name == format!("{}{}", k.type_name(), k.reference_suffix()))
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Programme => "APR_",
            EntityKind::Content => "ACO_",
            EntityKind::Object => "AO_",
            EntityKind::PackFormat => "AP_",
            EntityKind::ChannelFormat => "AC_",
            EntityKind::StreamFormat => "AS_",
            EntityKind::TrackFormat => "AT_",
            EntityKind::TrackUid => "ATU_",
            EntityKind::BlockFormat => "AB_",
        }
    }

    /// The reference attribute name suffix: `Ref` for `audioTrackUID`, `IDRef` otherwise
    /// (spec.md §3.1).
    pub fn reference_suffix(self) -> &'static str {
        match self {
            EntityKind::TrackUid => "Ref",
            _ => "IDRef",
        }
    }

    /// Whether this kind's freshly allocated ID is temporary (`_T`-suffixed, rewritten by
    /// `Graph::finalise`) rather than already in canonical form.
    pub fn uses_temp_id(self) -> bool {
        matches!(
            self,
            EntityKind::PackFormat
                | EntityKind::ChannelFormat
                | EntityKind::StreamFormat
                | EntityKind::TrackFormat
                | EntityKind::BlockFormat
        )
    }
}

/// Per-graph ID counters, mirroring `ADMData::uniqueids`.
#[derive(Default)]
pub struct IdAllocator {
    counters: HashMap<EntityKind, u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator::default()
    }

    /// Allocates a fresh ID for `kind`. `exists` reports whether a candidate `<type>/<id>` key is
    /// already taken; the search continues until it returns `false`.
    pub fn create_id(&mut self, kind: EntityKind, exists: impl Fn(&str) -> bool) -> String {
        match kind {
            EntityKind::Programme | EntityKind::Content | EntityKind::Object => {
                self.scan_unique(kind, 0x1000, 4, "", &exists, false)
            }
            EntityKind::TrackUid => self.scan_unique(kind, 0, 8, "", &exists, false),
            EntityKind::BlockFormat => {
                let counter = *self.counters.get(&kind).unwrap_or(&0);
                if counter == 0 {
                    self.scan_unique(kind, 0, 8, TEMP_ID_SUFFIX, &exists, true)
                }
                else {
                    let next = counter + 1;
                    self.counters.insert(kind, next);
                    format!("{}{:08x}{}", kind.id_prefix(), next, TEMP_ID_SUFFIX)
                }
            }
            EntityKind::PackFormat
            | EntityKind::ChannelFormat
            | EntityKind::StreamFormat
            | EntityKind::TrackFormat => {
                let start = *self.counters.get(&kind).unwrap_or(&0);
                self.scan_unique(kind, start, 8, TEMP_ID_SUFFIX, &exists, true)
            }
        }
    }

    /// Increments `n` from `start` until `<type>/<prefix><n as hex><suffix>` is free, saving the
    /// winning counter value when `persist` is set (the format-specific types that continue a
    /// running counter rather than rescanning from zero every call).
    fn scan_unique(
        &mut self,
        kind: EntityKind,
        start: u32,
        hex_digits: usize,
        suffix: &str,
        exists: &impl Fn(&str) -> bool,
        persist: bool,
    ) -> String {
        let mut n = start;
        loop {
            n += 1;
            let candidate = format!("{}{:0width$x}{}", kind.id_prefix(), n, suffix, width = hex_digits);
            if !exists(&candidate) {
                if persist {
                    self.counters.insert(kind, n);
                }
                return candidate;
            }
        }
    }

    /// Allocates the canonical (non-temporary) id for a pack/channel/stream/track format,
    /// embedding `type_label` (and, for track formats, `format_label`) the way spec.md §3.2's
    /// `AP_yyyyxxxx`/`AC_yyyyxxxx`/`AS_yyyyxxxx`/`AT_yyyyffff_zz` shapes require. Called from
    /// `Graph::finalise`'s temporary-id rewrite, once the object's typed fields are known.
    pub fn canonical_id(
        &self,
        kind: EntityKind,
        type_label: u16,
        format_label: u16,
        exists: impl Fn(&str) -> bool,
    ) -> String {
        match kind {
            EntityKind::PackFormat | EntityKind::ChannelFormat | EntityKind::StreamFormat => {
                let mut n: u32 = 0;
                loop {
                    n += 1;
                    let candidate = format!("{}{:04x}{:04x}", kind.id_prefix(), type_label, n);
                    if !exists(&candidate) {
                        return candidate;
                    }
                }
            }
            EntityKind::TrackFormat => {
                let mut n: u32 = 0;
                loop {
                    n += 1;
                    let candidate =
                        format!("{}{:04x}{:04x}_{:02x}", kind.id_prefix(), type_label, format_label, n);
                    if !exists(&candidate) {
                        return candidate;
                    }
                }
            }
            _ => unreachable!("canonical_id only applies to pack/channel/stream/track format kinds"),
        }
    }

    /// Disambiguates an explicit, caller-supplied ID that collides with an existing object, by
    /// appending `_%02x` and retrying (spec.md §3.2: "the allocator appends `_%02x` and retries
    /// until unique").
    pub fn make_unique(&self, kind: EntityKind, id: &str, exists: impl Fn(&str) -> bool) -> String {
        if !exists(id) {
            return id.to_string();
        }

        let mut n: u32 = 0;
        loop {
            let candidate = format!("{}_{:02x}", id, n);
            if !exists(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn programme_ids_start_at_0x1001_and_increment() {
        let mut seen = HashSet::new();
        let mut alloc = IdAllocator::new();

        let a = alloc.create_id(EntityKind::Programme, |id| seen.contains(id));
        seen.insert(a.clone());
        let b = alloc.create_id(EntityKind::Programme, |id| seen.contains(id));

        assert_eq!(a, "APR_1001");
        assert_eq!(b, "APR_1002");
    }

    #[test]
    fn block_format_ids_increment_without_rescanning() {
        let mut alloc = IdAllocator::new();
        let a = alloc.create_id(EntityKind::BlockFormat, |_| false);
        let b = alloc.create_id(EntityKind::BlockFormat, |_| false);
        assert_eq!(a, "AB_00000001_T");
        assert_eq!(b, "AB_00000002_T");
    }

    #[test]
    fn pack_format_ids_are_temporary() {
        let mut alloc = IdAllocator::new();
        let id = alloc.create_id(EntityKind::PackFormat, |_| false);
        assert!(id.starts_with("AP_"));
        assert!(id.ends_with(TEMP_ID_SUFFIX));
    }

    #[test]
    fn make_unique_appends_hex_suffix_on_collision() {
        let alloc = IdAllocator::new();
        let taken: HashSet<&str> = ["APR_1234", "APR_1234_00"].into_iter().collect();
        let id = alloc.make_unique(EntityKind::Programme, "APR_1234", |id| taken.contains(id));
        assert_eq!(id, "APR_1234_01");
    }

    #[test]
    fn reference_suffix_differs_for_track_uid() {
        assert_eq!(EntityKind::TrackUid.reference_suffix(), "Ref");
        assert_eq!(EntityKind::Object.reference_suffix(), "IDRef");
    }

    #[test]
    fn reference_name_lookup_disambiguates_track_uid_from_generic_idref() {
        assert_eq!(EntityKind::from_reference_name("audioContentIDRef"), Some(EntityKind::Content));
        assert_eq!(EntityKind::from_reference_name("audioTrackUIDRef"), Some(EntityKind::TrackUid));
        assert_eq!(EntityKind::from_reference_name("language"), None);
    }

    #[test]
    fn canonical_id_embeds_type_label() {
        let alloc = IdAllocator::new();
        let id = alloc.canonical_id(EntityKind::PackFormat, 0x0003, 0, |_| false);
        assert_eq!(id, "AP_00030001");
    }

    #[test]
    fn canonical_id_for_track_format_embeds_both_labels() {
        let alloc = IdAllocator::new();
        let id = alloc.canonical_id(EntityKind::TrackFormat, 0x0003, 0x0001, |_| false);
        assert_eq!(id, "AT_00030001_01");
    }
}
