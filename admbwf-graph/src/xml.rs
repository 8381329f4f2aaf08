// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `AdmXmlCodec`: DOM-level translation between `axml`'s XML text and an [`crate::graph::AdmGraph`]
//! (component C6, spec.md §6).
//!
//! Parsing builds a generic [`XmlValue`] tree with `quick_xml`'s streaming reader, then walks
//! `audioFormatExtended`'s children in the fixed type order the spec requires, extracting typed
//! fields (`language`, `typeLabel`, `rtime`, position, ...) and leaving everything else —
//! crucially, every `...IDRef`/`...Ref` entry — in the object's value bag, where
//! `AdmGraph::finalise` resolves it. Serialisation walks the graph in the same order and emits
//! the mirror-image tree with `quick_xml`'s writer.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use admbwf_core::errors::{AdmError, Result};
use admbwf_core::UniversalTime;

use crate::graph::AdmGraph;
use crate::ids::EntityKind;
use crate::objects::{
    BlockFormat, ChannelFormat, Content, Object, PackFormat, Position, Programme, StreamFormat,
    TrackFormat, TrackUid,
};
use crate::value::{XmlValue, XmlValues};

/// Which top-level wrapper element and `audioFormatExtended` nesting a document uses.
/// Parsing tolerates either shape regardless of the configured mode; only serialisation is
/// mode-specific (spec.md §6: "selectable by a mode flag").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmMode {
    /// `<ebuCoreMain><coreMetadata><format><audioFormatExtended>`.
    Ebu,
    /// `<ituADM><coreMetadata><audioFormatExtended>`.
    Itu,
}

/// The `axml` XML codec. Stateless beyond the serialisation mode.
#[derive(Debug, Clone, Copy)]
pub struct AdmXmlCodec {
    mode: AdmMode,
}

impl AdmXmlCodec {
    pub fn new(mode: AdmMode) -> Self {
        AdmXmlCodec { mode }
    }

    /// Parses an `axml` document's text into a freshly populated, not-yet-finalised `AdmGraph`.
    /// Caller is expected to call `AdmGraph::finalise()` afterwards (spec.md §4.9: chna then axml,
    /// then finalise).
    pub fn parse(&self, xml: &str) -> Result<AdmGraph> {
        let mut graph = AdmGraph::new();
        self.parse_into(xml, &mut graph)?;
        Ok(graph)
    }

    /// Like [`AdmXmlCodec::parse`], but populates an existing graph rather than a fresh one, so
    /// the `audioTrackUID`s a `chna` chunk already created (spec.md §4.5: "pending references to
    /// be resolved after the `axml` is parsed") are reused by id instead of duplicated.
    pub fn parse_into(&self, xml: &str, graph: &mut AdmGraph) -> Result<()> {
        let root = parse_tree(xml)?;
        let core = find_child(&root, "coreMetadata")
            .ok_or(AdmError::Format("axml: missing coreMetadata"))?;
        let format_ext = find_child(core, "format")
            .and_then(|fmt| find_child(fmt, "audioFormatExtended"))
            .or_else(|| find_child(core, "audioFormatExtended"))
            .ok_or(AdmError::Format("axml: missing audioFormatExtended"))?;

        parse_programmes(format_ext, graph);
        parse_contents(format_ext, graph);
        parse_objects(format_ext, graph);
        parse_pack_formats(format_ext, graph);
        parse_channel_formats(format_ext, graph);
        parse_stream_formats(format_ext, graph);
        parse_track_formats(format_ext, graph);
        parse_track_uids(format_ext, graph);
        Ok(())
    }

    /// Serialises a finalised `AdmGraph` into `axml` document text, in this codec's mode.
    pub fn serialize(&self, graph: &AdmGraph) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_write_err)?;

        let root_name = match self.mode {
            AdmMode::Ebu => "ebuCoreMain",
            AdmMode::Itu => "ituADM",
        };
        writer.write_event(Event::Start(BytesStart::new(root_name))).map_err(xml_write_err)?;
        writer.write_event(Event::Start(BytesStart::new("coreMetadata"))).map_err(xml_write_err)?;

        let wraps_in_format = matches!(self.mode, AdmMode::Ebu);
        if wraps_in_format {
            writer.write_event(Event::Start(BytesStart::new("format"))).map_err(xml_write_err)?;
        }

        writer
            .write_event(Event::Start(BytesStart::new("audioFormatExtended")))
            .map_err(xml_write_err)?;

        for p in graph.programmes() {
            write_programme(&mut writer, graph, p)?;
        }
        for c in graph.contents() {
            write_content(&mut writer, graph, c)?;
        }
        for o in graph.objects() {
            write_object(&mut writer, graph, o)?;
        }
        for pf in graph.pack_formats() {
            write_pack_format(&mut writer, graph, pf)?;
        }
        for cf in graph.channel_formats() {
            write_channel_format(&mut writer, cf)?;
        }
        for sf in graph.stream_formats() {
            write_stream_format(&mut writer, graph, sf)?;
        }
        for tf in graph.track_formats() {
            write_track_format(&mut writer, graph, tf)?;
        }
        for tu in graph.track_uids() {
            write_track_uid(&mut writer, graph, tu)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("audioFormatExtended")))
            .map_err(xml_write_err)?;
        if wraps_in_format {
            writer.write_event(Event::End(BytesEnd::new("format"))).map_err(xml_write_err)?;
        }
        writer.write_event(Event::End(BytesEnd::new("coreMetadata"))).map_err(xml_write_err)?;
        writer.write_event(Event::End(BytesEnd::new(root_name))).map_err(xml_write_err)?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|_| AdmError::Format("generated axml was not valid utf-8"))
    }
}

fn xml_write_err(_: quick_xml::Error) -> AdmError {
    AdmError::Format("axml: xml write failure")
}

// ---------------------------------------------------------------------------------------------
// Generic XML -> XmlValue tree parsing
// ---------------------------------------------------------------------------------------------

struct OpenElem {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<XmlValue>,
}

fn parse_tree(xml: &str) -> Result<XmlValue> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<OpenElem> = Vec::new();
    let mut root: Option<XmlValue> = None;

    loop {
        let event = reader.read_event().map_err(|_| AdmError::Format("axml: malformed xml"))?;
        match event {
            Event::Start(ref e) => {
                stack.push(OpenElem {
                    name: elem_name(e)?,
                    attrs: read_attrs(e)?,
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            Event::Empty(ref e) => {
                let node = XmlValue::Elem {
                    name: elem_name(e)?,
                    text: String::new(),
                    attrs: read_attrs(e)?,
                    children: Vec::new(),
                };
                attach(&mut stack, &mut root, node);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    let text =
                        t.unescape().map_err(|_| AdmError::Format("axml: malformed xml text"))?;
                    top.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let open = stack.pop().ok_or(AdmError::Format("axml: unbalanced xml"))?;
                let node = XmlValue::Elem {
                    name: open.name,
                    text: open.text,
                    attrs: open.attrs,
                    children: open.children,
                };
                attach(&mut stack, &mut root, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or(AdmError::Format("axml: empty document"))
}

fn attach(stack: &mut [OpenElem], root: &mut Option<XmlValue>, node: XmlValue) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn elem_name(e: &BytesStart) -> Result<String> {
    Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned())
}

fn read_attrs(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|_| AdmError::Format("axml: malformed xml attribute"))?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a
            .unescape_value()
            .map_err(|_| AdmError::Format("axml: malformed xml attribute value"))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------------------------
// Tree navigation helpers
// ---------------------------------------------------------------------------------------------

fn find_child<'a>(node: &'a XmlValue, name: &str) -> Option<&'a XmlValue> {
    match node {
        XmlValue::Elem { children, .. } => children.iter().find(|c| c.name() == name),
        XmlValue::Attr { .. } => None,
    }
}

fn find_children<'a>(node: &'a XmlValue, name: &str) -> Vec<&'a XmlValue> {
    match node {
        XmlValue::Elem { children, .. } => children.iter().filter(|c| c.name() == name).collect(),
        XmlValue::Attr { .. } => Vec::new(),
    }
}

fn attr<'a>(node: &'a XmlValue, name: &str) -> Option<&'a str> {
    match node {
        XmlValue::Elem { attrs, .. } => {
            attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
        }
        XmlValue::Attr { .. } => None,
    }
}

fn text_of(node: &XmlValue) -> &str {
    match node {
        XmlValue::Elem { text, .. } => text.as_str(),
        XmlValue::Attr { value, .. } => value.as_str(),
    }
}

/// Collects an element's attributes and children not named in `skip_attrs`/`skip_elems` into a
/// `Vec<XmlValue>`, ready to be appended to an object's value bag for round-trip.
fn collect_extras(node: &XmlValue, skip_attrs: &[&str], skip_elems: &[&str]) -> Vec<XmlValue> {
    let (attrs, children) = match node {
        XmlValue::Elem { attrs, children, .. } => (attrs, children),
        XmlValue::Attr { .. } => return Vec::new(),
    };

    let mut out = Vec::new();
    for (k, v) in attrs {
        if !skip_attrs.contains(&k.as_str()) {
            out.push(XmlValue::attr(k.clone(), v.clone()));
        }
    }
    for c in children {
        if !skip_elems.contains(&c.name()) {
            out.push(c.clone());
        }
    }
    out
}

/// Parses a `typeLabel`/`formatLabel` attribute, tolerating both hex (`"0003"`) and decimal
/// (`"3"`) spellings (spec.md §3.1 lists the recognised values in decimal; ids embed them as hex).
fn parse_label(s: &str) -> u16 {
    let trimmed = s.trim();
    u16::from_str_radix(trimmed, 16).or_else(|_| trimmed.parse()).unwrap_or(0)
}

// ---------------------------------------------------------------------------------------------
// Parsing: one function per entity type, in the fixed order spec.md §6 requires
// ---------------------------------------------------------------------------------------------

fn parse_programmes(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioProgramme") {
        let id = attr(el, "audioProgrammeID").map(|s| s.to_string());
        let name = attr(el, "audioProgrammeName").unwrap_or_default().to_string();
        let h = graph.create(EntityKind::Programme, id, name);

        let p = graph.programme_mut(h);
        if let Some(lang) = attr(el, "language") {
            p.language = Some(lang.to_string());
        }
        p.values.extend(collect_extras(
            el,
            &["audioProgrammeID", "audioProgrammeName", "language"],
            &[],
        ));
    }
}

fn parse_contents(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioContent") {
        let id = attr(el, "audioContentID").map(|s| s.to_string());
        let name = attr(el, "audioContentName").unwrap_or_default().to_string();
        let h = graph.create(EntityKind::Content, id, name);

        let c = graph.content_mut(h);
        if let Some(lang) = attr(el, "language") {
            c.language = Some(lang.to_string());
        }
        c.values.extend(collect_extras(el, &["audioContentID", "audioContentName", "language"], &[]));
    }
}

fn parse_objects(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioObject") {
        let id = attr(el, "audioObjectID").map(|s| s.to_string());
        let name = attr(el, "audioObjectName").unwrap_or_default().to_string();
        let h = graph.create(EntityKind::Object, id, name);

        let o = graph.object_mut(h);
        if let Some(start) = attr(el, "startTime").and_then(|s| UniversalTime::parse(s).ok()) {
            o.start_time = Some(start);
            o.limits_set = true;
        }
        if let Some(dur) = attr(el, "duration").and_then(|s| UniversalTime::parse(s).ok()) {
            o.duration = Some(dur);
            o.limits_set = true;
        }
        o.values.extend(collect_extras(el, &["audioObjectID", "audioObjectName", "startTime", "duration"], &[]));
    }
}

fn parse_pack_formats(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioPackFormat") {
        let id = attr(el, "audioPackFormatID").map(|s| s.to_string());
        let name = attr(el, "audioPackFormatName").unwrap_or_default().to_string();
        let h = graph.create(EntityKind::PackFormat, id, name);

        let pf = graph.pack_format_mut(h);
        if let Some(t) = attr(el, "typeLabel") {
            pf.type_label = parse_label(t);
        }
        pf.values.extend(collect_extras(
            el,
            &["audioPackFormatID", "audioPackFormatName", "typeLabel"],
            &[],
        ));
    }
}

fn parse_channel_formats(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioChannelFormat") {
        let id = attr(el, "audioChannelFormatID").map(|s| s.to_string());
        let name = attr(el, "audioChannelFormatName").unwrap_or_default().to_string();
        let h = graph.create(EntityKind::ChannelFormat, id, name);

        if let Some(t) = attr(el, "typeLabel") {
            graph.channel_format_mut(h).type_label = parse_label(t);
        }

        for block_el in find_children(el, "audioBlockFormat") {
            let block = parse_block(block_el);
            graph.add_block(h, block);
        }

        graph.channel_format_mut(h).values.extend(collect_extras(
            el,
            &["audioChannelFormatID", "audioChannelFormatName", "typeLabel"],
            &["audioBlockFormat"],
        ));
    }
}

fn parse_block(el: &XmlValue) -> BlockFormat {
    let id = attr(el, "audioBlockFormatID").unwrap_or_default().to_string();
    let mut block = BlockFormat::new(id);

    if let Some(rt) = attr(el, "rtime").and_then(|s| UniversalTime::parse(s).ok()) {
        block.rtime = rt;
    }
    if let Some(d) = attr(el, "duration").and_then(|s| UniversalTime::parse(s).ok()) {
        block.duration = d;
    }

    let positions = find_children(el, "position");
    if !positions.is_empty() {
        let mut polar: Option<(f64, f64, f64)> = None;
        let mut cartesian: Option<(f64, f64, f64)> = None;
        for p in &positions {
            let coord = attr(p, "coordinate").unwrap_or("");
            let value: f64 = text_of(p).trim().parse().unwrap_or(0.0);
            match coord {
                "azimuth" => polar.get_or_insert((0.0, 0.0, 1.0)).0 = value,
                "elevation" => polar.get_or_insert((0.0, 0.0, 1.0)).1 = value,
                "distance" => polar.get_or_insert((0.0, 0.0, 1.0)).2 = value,
                "x" => cartesian.get_or_insert((0.0, 0.0, 0.0)).0 = value,
                "y" => cartesian.get_or_insert((0.0, 0.0, 0.0)).1 = value,
                "z" => cartesian.get_or_insert((0.0, 0.0, 0.0)).2 = value,
                _ => {}
            }
        }
        block.position = cartesian
            .map(|(x, y, z)| Position::Cartesian { x, y, z })
            .or_else(|| polar.map(|(azimuth, elevation, distance)| Position::Polar { azimuth, elevation, distance }));
    }

    let extras = collect_extras(el, &["audioBlockFormatID", "rtime", "duration"], &["position"]);
    for extra in extras {
        match extra {
            XmlValue::Attr { name, value } => {
                block.values.push(XmlValue::attr(name, value));
            }
            XmlValue::Elem { name, text, .. } => {
                block.supplement.insert(name, text);
            }
        }
    }

    block
}

fn parse_stream_formats(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioStreamFormat") {
        let id = attr(el, "audioStreamFormatID").map(|s| s.to_string());
        let name = attr(el, "audioStreamFormatName").unwrap_or_default().to_string();
        let h = graph.create(EntityKind::StreamFormat, id, name);

        let sf = graph.stream_format_mut(h);
        if let Some(f) = attr(el, "formatLabel") {
            sf.format_label = parse_label(f);
        }
        sf.values.extend(collect_extras(
            el,
            &["audioStreamFormatID", "audioStreamFormatName", "formatLabel"],
            &[],
        ));
    }
}

fn parse_track_formats(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioTrackFormat") {
        let id = attr(el, "audioTrackFormatID").map(|s| s.to_string());
        let name = attr(el, "audioTrackFormatName").unwrap_or_default().to_string();
        let h = graph.create(EntityKind::TrackFormat, id, name);

        let tf = graph.track_format_mut(h);
        if let Some(f) = attr(el, "formatLabel") {
            tf.format_label = parse_label(f);
        }
        // `audioTrackFormat` has no typeLabel of its own in the ADM schema; a document that
        // still carries one (e.g. round-tripping this codec's own output) is honoured, and
        // otherwise it stays 0 until `finalise` assigns one via its stream/channel format chain.
        if let Some(t) = attr(el, "typeLabel") {
            tf.type_label = parse_label(t);
        }
        tf.values.extend(collect_extras(
            el,
            &["audioTrackFormatID", "audioTrackFormatName", "formatLabel", "typeLabel"],
            &[],
        ));
    }
}

fn parse_track_uids(format_ext: &XmlValue, graph: &mut AdmGraph) {
    for el in find_children(format_ext, "audioTrackUID") {
        let id = attr(el, "UID").map(|s| s.to_string());
        // `trackNum` is authoritatively assigned by `chna`; a pre-existing track uid (created
        // while parsing `chna`) is reused as-is, so 0 here is only a placeholder for documents
        // parsed through this codec alone.
        let h = graph.create_track_uid(id, 0);

        let tu = graph.track_uid_mut(h);
        if let Some(sr) = attr(el, "sampleRate").and_then(|s| s.parse().ok()) {
            tu.sample_rate = Some(sr);
        }
        if let Some(bd) = attr(el, "bitDepth").and_then(|s| s.parse().ok()) {
            tu.bit_depth = Some(bd);
        }
        tu.values.extend(collect_extras(el, &["UID", "sampleRate", "bitDepth"], &[]));
    }
}

// ---------------------------------------------------------------------------------------------
// Serialization: one function per entity type, in the same fixed order
// ---------------------------------------------------------------------------------------------

fn write_extra_attrs(start: &mut BytesStart, values: &XmlValues) {
    for v in values.iter() {
        if let XmlValue::Attr { name, value } = v {
            start.push_attribute((name.as_str(), value.as_str()));
        }
    }
}

fn write_extra_elems<W: Write>(writer: &mut Writer<W>, values: &XmlValues) -> Result<()> {
    for v in values.iter() {
        if let XmlValue::Elem { name, text, attrs, children } = v {
            write_value_elem(writer, name, text, attrs, children)?;
        }
    }
    Ok(())
}

fn write_value_elem<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
    attrs: &[(String, String)],
    children: &[XmlValue],
) -> Result<()> {
    let mut start = BytesStart::new(name);
    for (k, v) in attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if children.is_empty() && text.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_write_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;
    if !text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_write_err)?;
    }
    for c in children {
        if let XmlValue::Elem { name: n, text: t, attrs: a, children: ch } = c {
            write_value_elem(writer, n, t, a, ch)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_write_err)?;
    Ok(())
}

fn write_ref<W: Write>(writer: &mut Writer<W>, tag: &str, id: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag))).map_err(xml_write_err)?;
    writer.write_event(Event::Text(BytesText::new(id))).map_err(xml_write_err)?;
    writer.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_write_err)?;
    Ok(())
}

fn write_programme<W: Write>(writer: &mut Writer<W>, graph: &AdmGraph, p: &Programme) -> Result<()> {
    let mut start = BytesStart::new("audioProgramme");
    start.push_attribute(("audioProgrammeID", p.id.as_str()));
    start.push_attribute(("audioProgrammeName", p.name.as_str()));
    if let Some(lang) = &p.language {
        start.push_attribute(("language", lang.as_str()));
    }
    write_extra_attrs(&mut start, &p.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    for &h in &p.contents {
        write_ref(writer, "audioContentIDRef", &graph.content(h).id)?;
    }
    write_extra_elems(writer, &p.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioProgramme"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_content<W: Write>(writer: &mut Writer<W>, graph: &AdmGraph, c: &Content) -> Result<()> {
    let mut start = BytesStart::new("audioContent");
    start.push_attribute(("audioContentID", c.id.as_str()));
    start.push_attribute(("audioContentName", c.name.as_str()));
    if let Some(lang) = &c.language {
        start.push_attribute(("language", lang.as_str()));
    }
    write_extra_attrs(&mut start, &c.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    for &h in &c.objects {
        write_ref(writer, "audioObjectIDRef", &graph.object(h).id)?;
    }
    write_extra_elems(writer, &c.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioContent"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_object<W: Write>(writer: &mut Writer<W>, graph: &AdmGraph, o: &Object) -> Result<()> {
    let mut start = BytesStart::new("audioObject");
    start.push_attribute(("audioObjectID", o.id.as_str()));
    start.push_attribute(("audioObjectName", o.name.as_str()));
    let start_time_str = o.start_time.map(|t| t.format_adm());
    if let Some(ref s) = start_time_str {
        start.push_attribute(("startTime", s.as_str()));
    }
    let duration_str = o.duration.map(|t| t.format_adm());
    if let Some(ref s) = duration_str {
        start.push_attribute(("duration", s.as_str()));
    }
    write_extra_attrs(&mut start, &o.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    for &h in &o.nested_objects {
        write_ref(writer, "audioObjectIDRef", &graph.object(h).id)?;
    }
    for &h in &o.pack_formats {
        write_ref(writer, "audioPackFormatIDRef", &graph.pack_format(h).id)?;
    }
    for &h in &o.track_uids {
        write_ref(writer, "audioTrackUIDRef", &graph.track_uid(h).id)?;
    }
    write_extra_elems(writer, &o.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioObject"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_pack_format<W: Write>(
    writer: &mut Writer<W>,
    graph: &AdmGraph,
    pf: &crate::objects::PackFormat,
) -> Result<()> {
    let type_label = format!("{:04x}", pf.type_label);
    let mut start = BytesStart::new("audioPackFormat");
    start.push_attribute(("audioPackFormatID", pf.id.as_str()));
    start.push_attribute(("audioPackFormatName", pf.name.as_str()));
    start.push_attribute(("typeLabel", type_label.as_str()));
    write_extra_attrs(&mut start, &pf.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    for &h in &pf.channel_formats {
        write_ref(writer, "audioChannelFormatIDRef", &graph.channel_format(h).id)?;
    }
    for &h in &pf.pack_formats {
        write_ref(writer, "audioPackFormatIDRef", &graph.pack_format(h).id)?;
    }
    write_extra_elems(writer, &pf.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioPackFormat"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_channel_format<W: Write>(writer: &mut Writer<W>, cf: &ChannelFormat) -> Result<()> {
    let type_label = format!("{:04x}", cf.type_label);
    let mut start = BytesStart::new("audioChannelFormat");
    start.push_attribute(("audioChannelFormatID", cf.id.as_str()));
    start.push_attribute(("audioChannelFormatName", cf.name.as_str()));
    start.push_attribute(("typeLabel", type_label.as_str()));
    write_extra_attrs(&mut start, &cf.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    for block in &cf.blocks {
        write_block(writer, block)?;
    }
    write_extra_elems(writer, &cf.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioChannelFormat"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_block<W: Write>(writer: &mut Writer<W>, block: &BlockFormat) -> Result<()> {
    let rtime = block.rtime.format_adm();
    let duration = block.duration.format_adm();
    let mut start = BytesStart::new("audioBlockFormat");
    start.push_attribute(("audioBlockFormatID", block.id.as_str()));
    start.push_attribute(("rtime", rtime.as_str()));
    start.push_attribute(("duration", duration.as_str()));
    write_extra_attrs(&mut start, &block.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    match block.position {
        Some(Position::Polar { azimuth, elevation, distance }) => {
            write_position_coord(writer, "azimuth", azimuth)?;
            write_position_coord(writer, "elevation", elevation)?;
            write_position_coord(writer, "distance", distance)?;
        }
        Some(Position::Cartesian { x, y, z }) => {
            write_position_coord(writer, "x", x)?;
            write_position_coord(writer, "y", y)?;
            write_position_coord(writer, "z", z)?;
        }
        None => {}
    }

    for (name, value) in &block.supplement {
        write_ref(writer, name, value)?;
    }
    write_extra_elems(writer, &block.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioBlockFormat"))).map_err(xml_write_err)?;
    Ok(())
}

/// Writes a single `<position coordinate="...">value</position>` element, with the value
/// formatted to 6 decimal places (spec.md §6: "serialised with 6 decimal places").
fn write_position_coord<W: Write>(writer: &mut Writer<W>, coord: &str, value: f64) -> Result<()> {
    let mut start = BytesStart::new("position");
    start.push_attribute(("coordinate", coord));
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&format!("{:.6}", value))))
        .map_err(xml_write_err)?;
    writer.write_event(Event::End(BytesEnd::new("position"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_stream_format<W: Write>(
    writer: &mut Writer<W>,
    graph: &AdmGraph,
    sf: &StreamFormat,
) -> Result<()> {
    let format_label = format!("{:04x}", sf.format_label);
    let mut start = BytesStart::new("audioStreamFormat");
    start.push_attribute(("audioStreamFormatID", sf.id.as_str()));
    start.push_attribute(("audioStreamFormatName", sf.name.as_str()));
    start.push_attribute(("formatLabel", format_label.as_str()));
    write_extra_attrs(&mut start, &sf.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    if let Some(h) = sf.channel_format {
        write_ref(writer, "audioChannelFormatIDRef", &graph.channel_format(h).id)?;
    }
    for &h in &sf.track_formats {
        write_ref(writer, "audioTrackFormatIDRef", &graph.track_format(h).id)?;
    }
    if let Some(h) = sf.pack_format {
        write_ref(writer, "audioPackFormatIDRef", &graph.pack_format(h).id)?;
    }
    write_extra_elems(writer, &sf.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioStreamFormat"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_track_format<W: Write>(
    writer: &mut Writer<W>,
    graph: &AdmGraph,
    tf: &TrackFormat,
) -> Result<()> {
    let type_label = format!("{:04x}", tf.type_label);
    let format_label = format!("{:04x}", tf.format_label);
    let mut start = BytesStart::new("audioTrackFormat");
    start.push_attribute(("audioTrackFormatID", tf.id.as_str()));
    start.push_attribute(("audioTrackFormatName", tf.name.as_str()));
    start.push_attribute(("typeLabel", type_label.as_str()));
    start.push_attribute(("formatLabel", format_label.as_str()));
    write_extra_attrs(&mut start, &tf.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    if let Some(h) = tf.stream_format {
        write_ref(writer, "audioStreamFormatIDRef", &graph.stream_format(h).id)?;
    }
    write_extra_elems(writer, &tf.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioTrackFormat"))).map_err(xml_write_err)?;
    Ok(())
}

fn write_track_uid<W: Write>(writer: &mut Writer<W>, graph: &AdmGraph, tu: &TrackUid) -> Result<()> {
    let sample_rate_str = tu.sample_rate.map(|sr| sr.to_string());
    let bit_depth_str = tu.bit_depth.map(|bd| bd.to_string());
    let mut start = BytesStart::new("audioTrackUID");
    start.push_attribute(("UID", tu.id.as_str()));
    if let Some(ref s) = sample_rate_str {
        start.push_attribute(("sampleRate", s.as_str()));
    }
    if let Some(ref s) = bit_depth_str {
        start.push_attribute(("bitDepth", s.as_str()));
    }
    write_extra_attrs(&mut start, &tu.values);
    writer.write_event(Event::Start(start)).map_err(xml_write_err)?;

    if let Some(h) = tu.track_format {
        write_ref(writer, "audioTrackFormatIDRef", &graph.track_format(h).id)?;
    }
    if let Some(h) = tu.pack_format {
        write_ref(writer, "audioPackFormatIDRef", &graph.pack_format(h).id)?;
    }
    write_extra_elems(writer, &tu.values)?;

    writer.write_event(Event::End(BytesEnd::new("audioTrackUID"))).map_err(xml_write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_EBU_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ebuCoreMain>
  <coreMetadata>
    <format>
      <audioFormatExtended>
        <audioProgramme audioProgrammeID="APR_1001" audioProgrammeName="Main" language="en">
          <audioContentIDRef>ACO_1001</audioContentIDRef>
        </audioProgramme>
        <audioContent audioContentID="ACO_1001" audioContentName="Dialogue" language="en">
          <audioObjectIDRef>AO_1001</audioObjectIDRef>
        </audioContent>
        <audioObject audioObjectID="AO_1001" audioObjectName="Obj0">
          <audioPackFormatIDRef>AP_00030001</audioPackFormatIDRef>
          <audioTrackUIDRef>ATU_00000001</audioTrackUIDRef>
        </audioObject>
        <audioPackFormat audioPackFormatID="AP_00030001" audioPackFormatName="Pack0" typeLabel="0003">
          <audioChannelFormatIDRef>AC_00030001</audioChannelFormatIDRef>
        </audioPackFormat>
        <audioChannelFormat audioChannelFormatID="AC_00030001" audioChannelFormatName="Chan0" typeLabel="0003">
          <audioBlockFormat audioBlockFormatID="AB_00030001_00000001" rtime="00:00:00.00000" duration="00:00:05.00000">
            <position coordinate="azimuth">30.000000</position>
            <position coordinate="elevation">0.000000</position>
            <position coordinate="distance">1.000000</position>
          </audioBlockFormat>
        </audioChannelFormat>
        <audioTrackUID UID="ATU_00000001" sampleRate="48000" bitDepth="24">
          <audioPackFormatIDRef>AP_00030001</audioPackFormatIDRef>
        </audioTrackUID>
      </audioFormatExtended>
    </format>
  </coreMetadata>
</ebuCoreMain>"#;

    #[test]
    fn parses_references_and_typed_fields_from_ebu_document() {
        let codec = AdmXmlCodec::new(AdmMode::Ebu);
        let mut graph = codec.parse(SAMPLE_EBU_XML).unwrap();
        graph.finalise();

        let pf = graph.find(EntityKind::PackFormat, "AP_00030001").expect("pack format present");
        assert_eq!(graph.pack_format(pf).type_label, 0x0003);
        assert_eq!(graph.pack_format(pf).channel_formats.len(), 1);

        let cf = graph.find(EntityKind::ChannelFormat, "AC_00030001").expect("channel format present");
        assert_eq!(graph.channel_format(cf).blocks.len(), 1);
        let block = &graph.channel_format(cf).blocks[0];
        assert_eq!(block.position, Some(Position::Polar { azimuth: 30.0, elevation: 0.0, distance: 1.0 }));

        let obj =
            graph.find(EntityKind::Object, "AO_1001").expect("object present");
        assert_eq!(graph.object(obj).pack_formats.len(), 1);
        assert_eq!(graph.object(obj).track_uids.len(), 1);

        let tu = graph.find(EntityKind::TrackUid, "ATU_00000001").expect("track uid present");
        assert_eq!(graph.track_uid(tu).sample_rate, Some(48000));
        assert_eq!(graph.track_uid(tu).bit_depth, Some(24));
    }

    #[test]
    fn serialize_round_trips_position_and_references() {
        let codec = AdmXmlCodec::new(AdmMode::Ebu);
        let mut graph = codec.parse(SAMPLE_EBU_XML).unwrap();
        graph.finalise();

        let xml = codec.serialize(&graph).unwrap();
        assert!(xml.contains("<ebuCoreMain>"));
        assert!(xml.contains("audioFormatExtended"));
        assert!(xml.contains("coordinate=\"azimuth\">30.000000<"));

        let reparsed = codec.parse(&xml).unwrap();
        assert_eq!(reparsed.pack_formats().len(), graph.pack_formats().len());
        assert_eq!(reparsed.channel_formats()[0].blocks.len(), 1);
    }

    #[test]
    fn itu_mode_has_no_format_wrapper() {
        let codec = AdmXmlCodec::new(AdmMode::Itu);
        let mut graph = AdmGraph::new();
        graph.finalise();
        let xml = codec.serialize(&graph).unwrap();
        assert!(xml.contains("<ituADM>"));
        assert!(!xml.contains("<format>"));
    }
}
