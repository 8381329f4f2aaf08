// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The RIFF/RF64 chunk engine (component C3): the file-level read and write protocol.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use admbwf_core::errors::{format_error, Result};
use admbwf_core::io::{ReadBytes, WriteBytes};

use log::{debug, warn};

use crate::chunks::{AxmlChunk, BextChunk, ChnaChunk, DataChunk, Ds64Chunk, RiffWaveChunks, WaveFormatChunk};
use crate::common::{ByteOrder, ChunksReader};
use crate::registry::GenericChunk;
use crate::sample_stream::{SampleStream, SoundFormat};

const RIFF_MARKER: [u8; 4] = *b"RIFF";
const RF64_MARKER: [u8; 4] = *b"RF64";
const WAVE_FORM: [u8; 4] = *b"WAVE";

/// Everything the engine extracted from a file's top-level chunks on `open`.
pub struct OpenedRiff {
    pub format: WaveFormatChunk,
    pub bext: Option<BextChunk>,
    pub chna: Option<ChnaChunk>,
    pub axml: Option<AxmlChunk>,
    pub samples: SampleStream,
    /// Chunks this engine doesn't interpret, preserved verbatim via [`crate::registry`] so a
    /// subsequent [`RiffWriter::finish`] can round-trip them (spec.md §4.2).
    pub unknown: Vec<GenericChunk>,
}

/// Reads the RIFF/RF64 header, walks the top-level chunk list, and binds a [`SampleStream`] to
/// the `data` chunk's file region (component C3's read protocol, spec §4.3).
pub fn open(path: &Path, read_only: bool) -> Result<OpenedRiff> {
    let mut file = if read_only {
        File::open(path)?
    }
    else {
        File::options().read(true).write(true).open(path)?
    };

    let marker = file.read_tag()?;
    let is_rf64 = match marker {
        RIFF_MARKER => false,
        RF64_MARKER => true,
        _ => return format_error("riff: missing RIFF/RF64 stream marker"),
    };

    let riff_len = file.read_u32()?;
    if riff_len < 4 && riff_len != u32::MAX {
        return format_error("riff: invalid riff length");
    }

    let riff_form = file.read_tag()?;
    if riff_form != WAVE_FORM {
        return format_error("riff: form is not WAVE");
    }

    let riff_data_len = if riff_len != u32::MAX { Some(u64::from(riff_len - 4)) } else { None };
    let mut chunks = ChunksReader::<RiffWaveChunks>::new(riff_data_len, ByteOrder::LittleEndian);

    let mut format = None;
    let mut bext = None;
    let mut chna = None;
    let mut axml = None;
    let mut ds64: Option<Ds64Chunk> = None;

    loop {
        let Some(chunk) = chunks.next(&mut file)? else {
            return format_error("riff: missing data chunk");
        };

        match chunk {
            RiffWaveChunks::Ds64(parser) => {
                let parsed = parser.parse(&mut file)?;
                if !is_rf64 {
                    debug!("ignoring ds64 chunk in non-RF64 file");
                    continue;
                }
                ds64 = Some(parsed);
            }
            RiffWaveChunks::Format(parser) => {
                format = Some(parser.parse(&mut file)?);
            }
            RiffWaveChunks::Bext(parser) => {
                bext = Some(parser.parse(&mut file)?);
            }
            RiffWaveChunks::Chna(parser) => {
                chna = Some(parser.parse(&mut file)?);
            }
            RiffWaveChunks::Axml(parser) => {
                axml = Some(parser.parse(&mut file)?);
            }
            RiffWaveChunks::Data(parser) => {
                let data = parser.parse(&mut file)?;
                let data_start_pos = file.stream_position()?;

                let data_len = match data.len {
                    Some(len) => u64::from(len),
                    None => match ds64.as_ref().map(|d| d.data_size) {
                        Some(len) => len,
                        None => {
                            warn!("riff: RF64 data chunk has no ds64 data size, treating as empty");
                            0
                        }
                    },
                };

                let format = match format {
                    Some(format) => format,
                    None => return format_error("riff: missing fmt chunk"),
                };

                let sound_format = SoundFormat {
                    channels: format.n_channels,
                    sample_rate: format.sample_rate,
                    sample_format: format.sample_format,
                    big_endian: false,
                };

                let shared_file = Arc::new(Mutex::new(file));
                let samples = SampleStream::new(shared_file, data_start_pos, data_len, sound_format, read_only);
                let unknown = chunks.take_unknown();

                return Ok(OpenedRiff { format, bext, chna, axml, samples, unknown });
            }
        }
    }
}

/// Holds the state needed to assemble a complete WAVE/RF64 file on `finish`: the fixed `fmt `
/// description plus the optional chunks, and a sidecar temp file the sample data is staged into
/// (mirroring "sample data is staged to a temp file and copied into the `data` chunk at close",
/// spec §2).
pub struct RiffWriter {
    format: WaveFormatChunk,
    bext: Option<BextChunk>,
    chna: Option<ChnaChunk>,
    axml: Option<AxmlChunk>,
    unknown: Vec<GenericChunk>,
    sample_sink: tempfile::NamedTempFile,
}

impl RiffWriter {
    pub fn new(format: WaveFormatChunk) -> Result<Self> {
        let sample_sink = tempfile::NamedTempFile::new()?;
        Ok(RiffWriter { format, bext: None, chna: None, axml: None, unknown: Vec::new(), sample_sink })
    }

    pub fn format(&self) -> WaveFormatChunk {
        self.format
    }

    pub fn set_bext(&mut self, bext: BextChunk) {
        self.bext = Some(bext);
    }

    pub fn set_chna(&mut self, chna: ChnaChunk) {
        self.chna = Some(chna);
    }

    pub fn set_axml(&mut self, axml: AxmlChunk) {
        self.axml = Some(axml);
    }

    /// Carries chunks preserved from a prior `open` (or registered by an embedding application)
    /// through to `finish`, so they round-trip unmodified (spec.md §4.2).
    pub fn set_unknown(&mut self, unknown: Vec<GenericChunk>) {
        self.unknown = unknown;
    }

    /// The staging file sample data should be appended to before `finish` is called.
    pub fn sample_sink(&mut self) -> &mut File {
        self.sample_sink.as_file_mut()
    }

    /// Assembles the final WAVE/RF64 file at `path`, upgrading to RF64 with a `ds64` chunk if
    /// the total size would exceed `0xFFFFFFFE` (spec §4.3's write protocol, testable property
    /// 7). Copies staged sample bytes from the sidecar file in 64 KiB blocks (spec §4.3).
    pub fn finish(mut self, path: &Path) -> Result<()> {
        self.sample_sink.as_file_mut().flush()?;
        let data_len = self.sample_sink.as_file().metadata()?.len();

        let fmt_body = {
            let mut buf = Vec::new();
            self.format.write(&mut buf)?;
            buf
        };

        let bext_body = self.bext.as_ref().map(|b| {
            let mut buf = Vec::new();
            b.write(&mut buf).expect("writing to a Vec cannot fail");
            buf
        });

        let chna_body = self.chna.as_ref().map(|c| {
            let mut buf = Vec::new();
            c.write(&mut buf).expect("writing to a Vec cannot fail");
            buf
        });

        let axml_body = self.axml.as_ref().map(|a| {
            let mut buf = Vec::new();
            a.write(&mut buf).expect("writing to a Vec cannot fail");
            buf
        });

        let chunked_len = |body_len: u64| body_len + 8 + (body_len & 1);

        let mut payload_len: u64 = 4; // "WAVE"
        payload_len += chunked_len(fmt_body.len() as u64);
        if let Some(b) = &bext_body {
            payload_len += chunked_len(b.len() as u64);
        }
        if let Some(c) = &chna_body {
            payload_len += chunked_len(c.len() as u64);
        }
        if let Some(a) = &axml_body {
            payload_len += chunked_len(a.len() as u64);
        }
        for chunk in &self.unknown {
            payload_len += chunked_len(chunk.data.len() as u64);
        }
        payload_len += chunked_len(data_len);

        // Determine up front whether any individual chunk or the whole riff payload needs RF64.
        let needs_rf64 = data_len >= u64::from(u32::MAX) || payload_len + 8 >= u64::from(u32::MAX);

        let mut out = File::create(path)?;

        if needs_rf64 {
            let ds64 = Ds64Chunk {
                riff_size: payload_len,
                data_size: data_len,
                sample_count: data_len / self.format.sample_format.bytes_per_sample() as u64
                    / self.format.n_channels as u64,
                table: Vec::new(),
            };

            out.write_tag(&RF64_MARKER)?;
            out.write_u32(u32::MAX)?;
            out.write_tag(&WAVE_FORM)?;

            out.write_tag(b"ds64")?;
            out.write_u32(ds64.write_len())?;
            ds64.write(&mut out)?;
            if ds64.write_len() & 1 == 1 {
                out.write_u8(0)?;
            }
        }
        else {
            out.write_tag(&RIFF_MARKER)?;
            out.write_u32(payload_len as u32)?;
            out.write_tag(&WAVE_FORM)?;
        }

        write_chunk(&mut out, b"fmt ", &fmt_body, needs_rf64 && fmt_body.len() as u64 >= u64::from(u32::MAX))?;
        if let Some(b) = &bext_body {
            write_chunk(&mut out, b"bext", b, false)?;
        }
        if let Some(c) = &chna_body {
            write_chunk(&mut out, b"chna", c, false)?;
        }
        if let Some(a) = &axml_body {
            write_chunk(&mut out, b"axml", a, false)?;
        }
        for chunk in &self.unknown {
            write_chunk(&mut out, &chunk.tag, &chunk.data, false)?;
        }

        out.write_tag(b"data")?;
        out.write_u32(if needs_rf64 && data_len >= u64::from(u32::MAX) {
            u32::MAX
        }
        else {
            data_len as u32
        })?;

        self.sample_sink.as_file_mut().seek(SeekFrom::Start(0))?;
        copy_in_blocks(self.sample_sink.as_file_mut(), &mut out, data_len)?;
        if data_len & 1 == 1 {
            out.write_u8(0)?;
        }

        admbwf_core::io::finalize_file(&mut out)?;

        Ok(())
    }
}

fn write_chunk(out: &mut File, tag: &[u8; 4], body: &[u8], sentinel_len: bool) -> Result<()> {
    out.write_tag(tag)?;
    out.write_u32(if sentinel_len { u32::MAX } else { body.len() as u32 })?;
    out.write_buf(body)?;
    if body.len() & 1 == 1 {
        out.write_u8(0)?;
    }
    Ok(())
}

fn copy_in_blocks(src: &mut File, dst: &mut File, len: u64) -> Result<()> {
    const BLOCK: usize = 64 * 1024;
    let mut remaining = len;
    let mut buf = vec![0u8; BLOCK];

    while remaining > 0 {
        let n = remaining.min(BLOCK as u64) as usize;
        src.read_buf_exact(&mut buf[..n])?;
        dst.write_buf(&buf[..n])?;
        remaining -= n as u64;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use admbwf_core::SampleFormat;
    use std::io::Read as _;

    fn minimal_wav_bytes(pcm_data: &[u8]) -> Vec<u8> {
        let mut file = Vec::new();
        let data_len = pcm_data.len() as u32;

        file.extend_from_slice(b"RIFF");
        let total_size = 4 + 8 + 16 + 8 + data_len;
        file.extend_from_slice(&total_size.to_le_bytes());
        file.extend_from_slice(b"WAVE");

        file.extend_from_slice(b"fmt ");
        file.extend_from_slice(&16u32.to_le_bytes());
        file.extend_from_slice(&1u16.to_le_bytes());
        file.extend_from_slice(&1u16.to_le_bytes());
        file.extend_from_slice(&44_100u32.to_le_bytes());
        file.extend_from_slice(&88_200u32.to_le_bytes());
        file.extend_from_slice(&2u16.to_le_bytes());
        file.extend_from_slice(&16u16.to_le_bytes());

        file.extend_from_slice(b"data");
        file.extend_from_slice(&data_len.to_le_bytes());
        file.extend_from_slice(pcm_data);

        file
    }

    #[test]
    fn opens_minimal_standard_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        std::fs::write(&path, minimal_wav_bytes(&vec![0u8; 100])).unwrap();

        let opened = open(&path, true).unwrap();
        assert_eq!(opened.format.n_channels, 1);
        assert_eq!(opened.format.sample_format, SampleFormat::S16);
        assert_eq!(opened.samples.clip().nframes, 50);
    }

    #[test]
    fn write_then_reopen_round_trips_small_file() {
        let format = WaveFormatChunk {
            n_channels: 1,
            sample_rate: 48_000,
            avg_bytes_per_sec: 96_000,
            block_align: 2,
            sample_format: SampleFormat::S16,
        };

        let mut writer = RiffWriter::new(format).unwrap();
        let samples: Vec<u8> = (0i16..100).flat_map(|s| s.to_le_bytes()).collect();
        writer.sample_sink().write_all(&samples).unwrap();
        writer.set_chna(ChnaChunk {
            records: vec![crate::chunks::chna::ChnaRecord {
                track_num: 1,
                uid: "ATU_00000001".to_string(),
                track_ref: String::new(),
                pack_ref: String::new(),
            }],
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        writer.finish(&path).unwrap();

        let mut raw = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[0..4], b"RIFF");

        let opened = open(&path, true).unwrap();
        assert_eq!(opened.format.n_channels, 1);
        assert!(opened.chna.is_some());
        assert_eq!(opened.samples.clip().nframes, 100);
    }

    #[test]
    fn unknown_chunks_round_trip_through_the_registry() {
        let mut pcm_chunk = Vec::new();
        pcm_chunk.extend_from_slice(&vec![0u8; 100]);

        let mut file = Vec::new();
        file.extend_from_slice(b"RIFF");
        let junk_body = b"not an admbwf chunk!"; // even length: no RIFF pad byte to account for
        let total_size = 4 + 8 + 16 + 8 + junk_body.len() as u32 + 8 + pcm_chunk.len() as u32;
        file.extend_from_slice(&total_size.to_le_bytes());
        file.extend_from_slice(b"WAVE");

        file.extend_from_slice(b"fmt ");
        file.extend_from_slice(&16u32.to_le_bytes());
        file.extend_from_slice(&1u16.to_le_bytes());
        file.extend_from_slice(&1u16.to_le_bytes());
        file.extend_from_slice(&44_100u32.to_le_bytes());
        file.extend_from_slice(&88_200u32.to_le_bytes());
        file.extend_from_slice(&2u16.to_le_bytes());
        file.extend_from_slice(&16u16.to_le_bytes());

        file.extend_from_slice(b"JUNK");
        file.extend_from_slice(&(junk_body.len() as u32).to_le_bytes());
        file.extend_from_slice(junk_body);

        file.extend_from_slice(b"data");
        file.extend_from_slice(&(pcm_chunk.len() as u32).to_le_bytes());
        file.extend_from_slice(&pcm_chunk);

        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("in.wav");
        std::fs::write(&in_path, &file).unwrap();

        let mut opened = open(&in_path, true).unwrap();
        assert_eq!(opened.unknown.len(), 1);
        assert_eq!(&opened.unknown[0].tag, b"JUNK");
        assert_eq!(opened.unknown[0].data, junk_body);

        let nframes = opened.samples.clip().nframes;
        let mut raw_samples = vec![0u8; (nframes * opened.format.n_channels as u64 * 2) as usize];
        opened
            .samples
            .read(&mut raw_samples, opened.format.sample_format, false, 0, opened.format.n_channels, opened.format.n_channels, nframes)
            .unwrap();

        let mut writer = RiffWriter::new(opened.format).unwrap();
        writer.sample_sink().write_all(&raw_samples).unwrap();
        writer.set_unknown(opened.unknown);

        let out_path = dir.path().join("out.wav");
        writer.finish(&out_path).unwrap();

        let reopened = open(&out_path, true).unwrap();
        assert_eq!(reopened.unknown.len(), 1);
        assert_eq!(&reopened.unknown[0].tag, b"JUNK");
        assert_eq!(reopened.unknown[0].data, junk_body);
    }
}
