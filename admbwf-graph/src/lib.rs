// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The ADM object graph and its `axml` XML codec for the `admbwf` workspace: the entity arena
//! (`graph`, `objects`), id allocation and canonicalisation (`ids`), the round-trip value bag
//! (`value`), and EBU/ITU XML serialisation (`xml`).

pub mod graph;
pub mod ids;
pub mod objects;
pub mod value;
pub mod xml;

pub use graph::AdmGraph;
pub use ids::EntityKind;
pub use objects::{
    BlockFormat, ChannelFormat, Content, Object, ObjectHandle, PackFormat, Position, Programme,
    StreamFormat, TrackFormat, TrackUid,
};
pub use value::{XmlValue, XmlValues};
pub use xml::{AdmMode, AdmXmlCodec};
