// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `AdmRiffFile`: the single entry point for reading and writing ADM Broadcast WAVE files
//! (component C9, spec.md §4.9), composing the RIFF/RF64 chunk engine (`admbwf-riff`), the ADM
//! object graph and its `axml`/`chna` codecs (`admbwf-graph`), and the sample format/units
//! primitives underneath (`admbwf-core`).
//!
//! `open` parses `chna` into a fresh [`AdmGraph`] first (so its `audioTrackUID`s exist under
//! their final ids before `axml` is parsed into the same graph), then `axml`, then finalises.
//! `create` pre-populates the fixed chunks (`fmt `/`data`) and defers graph serialisation to
//! [`AdmRiffFile::close`], which finalises the graph, derives `chna` from it, serialises `axml`,
//! and hands both to the chunk engine's write protocol (upgrading to RF64 if the result exceeds
//! 4 GiB, spec.md §4.3/testable property 7).

use std::fs::File;
use std::path::Path;

use admbwf_core::errors::{format_error, read_only_error, Result};
use admbwf_core::SampleFormat;
use admbwf_graph::{AdmGraph, AdmMode, AdmXmlCodec, XmlValue};
use admbwf_riff::chunks::chna::ChnaRecord;
use admbwf_riff::{AxmlChunk, BextChunk, ChnaChunk, RiffWriter, SampleStream, WaveFormatChunk};

/// Either side of an open ADM BWF file: a read-only view bound to an on-disk `data` chunk, or a
/// write-in-progress view staging samples to a sidecar file until [`AdmRiffFile::close`].
enum Mode {
    Read { samples: SampleStream, bext: Option<BextChunk> },
    Write { writer: RiffWriter, xml_mode: AdmMode, bext: Option<BextChunk> },
}

/// The read/write façade over a single ADM Broadcast WAVE file (component C9).
pub struct AdmRiffFile {
    graph: AdmGraph,
    mode: Mode,
}

impl AdmRiffFile {
    /// Opens `path` read-only: parses the RIFF/RF64 chunk list, builds `audioTrackUID`s from
    /// `chna` (stashing its `TrackRef`/`PackRef` as pending value-bag references), parses `axml`
    /// into the same graph, then finalises (spec.md §4.9).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let opened = admbwf_riff::engine::open(path.as_ref(), true)?;

        let mut graph = AdmGraph::new();
        if let Some(chna) = &opened.chna {
            populate_track_uids_from_chna(&mut graph, chna);
        }
        if let Some(axml) = &opened.axml {
            // Either wrapper element parses regardless of which mode constructed it; the mode
            // only matters for `serialize` (spec.md §6: "selectable by a mode flag").
            AdmXmlCodec::new(AdmMode::Ebu).parse_into(&axml.xml, &mut graph)?;
        }
        graph.finalise();

        Ok(AdmRiffFile { graph, mode: Mode::Read { samples: opened.samples, bext: opened.bext } })
    }

    /// Opens a new, empty file for writing at the given format, ready to accept sample data and
    /// a programmatically built graph before [`AdmRiffFile::close`] (spec.md §4.9).
    pub fn create(sample_rate: u32, channels: u16, sample_format: SampleFormat, xml_mode: AdmMode) -> Result<Self> {
        let block_align = channels * sample_format.bytes_per_sample() as u16;
        let format = WaveFormatChunk {
            n_channels: channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * block_align as u32,
            block_align,
            sample_format,
        };

        let writer = RiffWriter::new(format)?;
        Ok(AdmRiffFile { graph: AdmGraph::new(), mode: Mode::Write { writer, xml_mode, bext: None } })
    }

    pub fn graph(&self) -> &AdmGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut AdmGraph {
        &mut self.graph
    }

    /// The `bext` chunk, if the file carried or was given one.
    pub fn bext(&self) -> Option<&BextChunk> {
        match &self.mode {
            Mode::Read { bext, .. } => bext.as_ref(),
            Mode::Write { bext, .. } => bext.as_ref(),
        }
    }

    /// Attaches a `bext` chunk to a file opened with [`AdmRiffFile::create`].
    pub fn set_bext(&mut self, bext: BextChunk) -> Result<()> {
        match &mut self.mode {
            Mode::Write { bext: slot, .. } => {
                *slot = Some(bext);
                Ok(())
            }
            Mode::Read { .. } => format_error("adm riff file: cannot set bext on a file opened read-only"),
        }
    }

    /// The sample stream bound to this file's `data` chunk region, for a file opened with
    /// [`AdmRiffFile::open`].
    pub fn samples(&mut self) -> Result<&mut SampleStream> {
        match &mut self.mode {
            Mode::Read { samples, .. } => Ok(samples),
            Mode::Write { .. } => {
                format_error("adm riff file: samples() is only available on a file opened for reading")
            }
        }
    }

    /// The staging file sample data should be appended to before [`AdmRiffFile::close`], for a
    /// file opened with [`AdmRiffFile::create`].
    pub fn sample_sink(&mut self) -> Result<&mut File> {
        match &mut self.mode {
            Mode::Write { writer, .. } => Ok(writer.sample_sink()),
            Mode::Read { .. } => read_only_error(),
        }
    }

    /// Finalises the graph, derives `chna` from its `audioTrackUID`s, serialises `axml`, and
    /// writes the completed WAVE/RF64 file at `path` (spec.md §4.9, §4.3's write protocol).
    /// Only valid for a file opened with [`AdmRiffFile::create`]; any failure aborts the write,
    /// per spec.md §7's strict write policy — the caller is responsible for removing a partially
    /// written `path`.
    pub fn close(mut self, path: impl AsRef<Path>) -> Result<()> {
        let (mut writer, xml_mode, bext) = match self.mode {
            Mode::Write { writer, xml_mode, bext } => (writer, xml_mode, bext),
            Mode::Read { .. } => return format_error("adm riff file: close() is only valid on a file opened for writing"),
        };

        self.graph.finalise();

        writer.set_chna(build_chna(&self.graph));
        let xml = AdmXmlCodec::new(xml_mode).serialize(&self.graph)?;
        writer.set_axml(AxmlChunk { xml });
        if let Some(bext) = bext {
            writer.set_bext(bext);
        }

        writer.finish(path.as_ref())
    }
}

/// Builds `audioTrackUID` objects from `chna`'s records, carrying `TrackRef`/`PackRef` over as
/// pending value-bag references so `AdmGraph::finalise`'s reference pass resolves them once
/// `axml` has been parsed into the same graph (spec.md §4.5).
fn populate_track_uids_from_chna(graph: &mut AdmGraph, chna: &ChnaChunk) {
    for record in &chna.records {
        // `chna`'s `TrackNum` is 1-based on the wire; zero is already filtered out by the
        // chunk's own reader (spec.md §3.4), so the subtraction below never underflows.
        let track_num = record.track_num - 1;
        let handle = graph.create_track_uid(Some(record.uid.clone()), track_num);
        let track_uid = graph.track_uid_mut(handle);

        if !record.track_ref.is_empty() {
            track_uid.values.push(XmlValue::elem("audioTrackFormatIDRef", record.track_ref.clone()));
        }
        if !record.pack_ref.is_empty() {
            track_uid.values.push(XmlValue::elem("audioPackFormatIDRef", record.pack_ref.clone()));
        }
    }
}

/// Derives a `chna` chunk from every `audioTrackUID` in a finalised graph, writing back the
/// `trackFormat`/`packFormat` each one resolved to (spec.md §4.5 "on write").
fn build_chna(graph: &AdmGraph) -> ChnaChunk {
    let records = graph
        .track_uids()
        .iter()
        .map(|tu| ChnaRecord {
            track_num: tu.track_num + 1,
            uid: tu.id.clone(),
            track_ref: tu.track_format.map(|h| graph.track_format(h).id.clone()).unwrap_or_default(),
            pack_ref: tu.pack_format.map(|h| graph.pack_format(h).id.clone()).unwrap_or_default(),
        })
        .collect();

    ChnaChunk { records }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admbwf_graph::{EntityKind, Position};
    use admbwf_core::UniversalTime;
    use std::io::Write as _;

    /// End-to-end analogue of scenario S1 (spec.md §8): one programme -> one content -> one
    /// object referencing two track UIDs, each wired through a pack/channel/stream/track format
    /// chain, with one block per channel.
    fn minimal_ebu_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ebuCoreMain xmlns="urn:ebu:metadata-schema:ebuCore_2014">
 <coreMetadata>
  <format>
   <audioFormatExtended>
    <audioProgramme audioProgrammeID="APR_1001" audioProgrammeName="Mix">
     <audioContentIDRef>ACO_1001</audioContentIDRef>
    </audioProgramme>
    <audioContent audioContentID="ACO_1001" audioContentName="Dialogue">
     <audioObjectIDRef>AO_1001</audioObjectIDRef>
    </audioContent>
    <audioObject audioObjectID="AO_1001" audioObjectName="Voice">
     <audioPackFormatIDRef>AP_00031001</audioPackFormatIDRef>
     <audioTrackUIDRef>ATU_00000001</audioTrackUIDRef>
     <audioTrackUIDRef>ATU_00000002</audioTrackUIDRef>
    </audioObject>
    <audioPackFormat audioPackFormatID="AP_00031001" audioPackFormatName="pack" typeLabel="0003">
     <audioChannelFormatIDRef>AC_00031001</audioChannelFormatIDRef>
     <audioChannelFormatIDRef>AC_00031002</audioChannelFormatIDRef>
    </audioPackFormat>
    <audioChannelFormat audioChannelFormatID="AC_00031001" audioChannelFormatName="L" typeLabel="0003">
     <audioBlockFormat audioBlockFormatID="AB_00031001_00000001" rtime="00:00:00.00000" duration="00:00:10.00000">
      <position coordinate="azimuth">0.000000</position>
      <position coordinate="elevation">0.000000</position>
      <position coordinate="distance">1.000000</position>
     </audioBlockFormat>
    </audioChannelFormat>
    <audioChannelFormat audioChannelFormatID="AC_00031002" audioChannelFormatName="R" typeLabel="0003">
     <audioBlockFormat audioBlockFormatID="AB_00031002_00000001" rtime="00:00:00.00000" duration="00:00:10.00000">
      <position coordinate="azimuth">30.000000</position>
      <position coordinate="elevation">0.000000</position>
      <position coordinate="distance">1.000000</position>
     </audioBlockFormat>
    </audioChannelFormat>
    <audioStreamFormat audioStreamFormatID="AS_00031001" audioStreamFormatName="s1" formatLabel="0001">
     <audioChannelFormatIDRef>AC_00031001</audioChannelFormatIDRef>
     <audioTrackFormatIDRef>AT_00010001_01</audioTrackFormatIDRef>
    </audioStreamFormat>
    <audioStreamFormat audioStreamFormatID="AS_00031002" audioStreamFormatName="s2" formatLabel="0001">
     <audioChannelFormatIDRef>AC_00031002</audioChannelFormatIDRef>
     <audioTrackFormatIDRef>AT_00010002_01</audioTrackFormatIDRef>
    </audioStreamFormat>
    <audioTrackFormat audioTrackFormatID="AT_00010001_01" audioTrackFormatName="t1" formatLabel="0001">
     <audioStreamFormatIDRef>AS_00031001</audioStreamFormatIDRef>
    </audioTrackFormat>
    <audioTrackFormat audioTrackFormatID="AT_00010002_01" audioTrackFormatName="t2" formatLabel="0001">
     <audioStreamFormatIDRef>AS_00031002</audioStreamFormatIDRef>
    </audioTrackFormat>
   </audioFormatExtended>
  </format>
 </coreMetadata>
</ebuCoreMain>"#
    }

    fn minimal_wav_with_chna_and_axml(xml: &str) -> Vec<u8> {
        let pcm: Vec<u8> = vec![0u8; 480_000 * 2 * 3]; // 480,000 frames, 2ch, 24-bit

        let mut chna = Vec::new();
        chna.extend_from_slice(&2u16.to_le_bytes()); // TrackCount
        chna.extend_from_slice(&2u16.to_le_bytes()); // UIDCount
        let mut push_record = |track_num: u16, uid: &str| {
            chna.extend_from_slice(&track_num.to_le_bytes());
            let mut uid_buf = [0u8; 12];
            uid_buf[..uid.len()].copy_from_slice(uid.as_bytes());
            chna.extend_from_slice(&uid_buf);
            chna.extend_from_slice(&[0u8; 14]);
            chna.extend_from_slice(&[0u8; 11]);
            chna.push(0);
        };
        push_record(1, "ATU_00000001");
        push_record(2, "ATU_00000002");

        let axml = xml.as_bytes();

        let mut fmt_body = Vec::new();
        fmt_body.extend_from_slice(&1u16.to_le_bytes()); // PCM
        fmt_body.extend_from_slice(&2u16.to_le_bytes()); // channels
        fmt_body.extend_from_slice(&48_000u32.to_le_bytes());
        fmt_body.extend_from_slice(&(48_000 * 6u32).to_le_bytes());
        fmt_body.extend_from_slice(&6u16.to_le_bytes());
        fmt_body.extend_from_slice(&24u16.to_le_bytes());

        let chunk = |tag: &[u8; 4], body: &[u8], out: &mut Vec<u8>| {
            out.extend_from_slice(tag);
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(body);
            if body.len() % 2 == 1 {
                out.push(0);
            }
        };

        let mut payload = Vec::new();
        payload.extend_from_slice(b"WAVE");
        chunk(b"fmt ", &fmt_body, &mut payload);
        chunk(b"chna", &chna, &mut payload);
        chunk(b"axml", axml, &mut payload);
        chunk(b"data", &pcm, &mut payload);

        let mut file = Vec::new();
        file.extend_from_slice(b"RIFF");
        file.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        file.extend_from_slice(&payload);
        file
    }

    #[test]
    fn opens_minimal_adm_file_and_resolves_full_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.wav");
        std::fs::write(&path, minimal_wav_with_chna_and_axml(minimal_ebu_xml())).unwrap();

        let mut file = AdmRiffFile::open(&path).unwrap();

        assert_eq!(file.graph().programmes().len(), 1);
        assert_eq!(file.graph().contents().len(), 1);
        assert_eq!(file.graph().objects().len(), 1);

        let object = &file.graph().objects()[0];
        assert_eq!(object.start_time, Some(UniversalTime::ZERO));
        assert_eq!(object.duration, Some(UniversalTime::from_nanos(10_000_000_000)));
        assert_eq!(object.track_uids.len(), 2);
        assert_eq!(object.pack_formats.len(), 1);

        let pack = file.graph().pack_format(object.pack_formats[0]);
        assert_eq!(pack.channel_formats.len(), 2);

        for &tu in &object.track_uids {
            let track_uid = file.graph().track_uid(tu);
            assert!(track_uid.track_format.is_some(), "trackUID {} missing trackFormat link", track_uid.id);
            assert!(track_uid.pack_format.is_none()); // this fixture's chna carries no PackRef
        }

        let samples = file.samples().unwrap();
        assert_eq!(samples.clip().nframes, 480_000);
    }

    #[test]
    fn create_then_close_then_reopen_round_trips_graph_and_samples() {
        let mut file = AdmRiffFile::create(48_000, 1, SampleFormat::S16, AdmMode::Ebu).unwrap();

        let content = file.graph_mut().create(EntityKind::Content, None, "content".to_string());
        file.graph_mut().content_mut(content).language = Some("eng".to_string());

        let cf = file.graph_mut().create(EntityKind::ChannelFormat, None, "ch".to_string());
        file.graph_mut().channel_format_mut(cf).type_label = 0x0003;
        let mut block = admbwf_graph::BlockFormat::new(file.graph_mut().create_block_id());
        block.rtime = UniversalTime::ZERO;
        block.duration = UniversalTime::from_nanos(1_000_000_000);
        block.position = Some(Position::Polar { azimuth: 0.0, elevation: 0.0, distance: 1.0 });
        file.graph_mut().add_block(cf, block);

        let sf = file.graph_mut().create(EntityKind::StreamFormat, None, "sf".to_string());
        file.graph_mut().stream_format_mut(sf).add_reference(cf);

        let tf = file.graph_mut().create(EntityKind::TrackFormat, None, "tf".to_string());
        file.graph_mut().track_format_mut(tf).add_reference(sf);

        let tu = file.graph_mut().create_track_uid(None, 0);
        file.graph_mut().track_uid_mut(tu).add_reference(tf);

        let obj = file.graph_mut().create(EntityKind::Object, None, "obj".to_string());
        file.graph_mut().object_mut(obj).add_reference(tu);

        let samples: Vec<u8> = (0i16..100).flat_map(|s| s.to_le_bytes()).collect();
        file.sample_sink().unwrap().write_all(&samples).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        file.close(&path).unwrap();

        let mut reopened = AdmRiffFile::open(&path).unwrap();
        assert_eq!(reopened.graph().objects().len(), 1);
        assert_eq!(reopened.graph().track_uids().len(), 1);
        assert_eq!(reopened.samples().unwrap().clip().nframes, 100);
    }
}
