// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared primitives for the `admbwf` workspace: the common error type, byte-level I/O
//! extension traits, sample format conversion, and time units.
//!
//! Nothing in this crate knows about RIFF chunks, the ADM object graph, or playback; those live
//! in `admbwf-riff`, `admbwf-graph`, and `admbwf-playback` respectively, all of which depend on
//! this crate.

pub mod errors;
pub mod io;
pub mod sample;
pub mod units;

pub use errors::{AdmError, Result};
pub use sample::{transfer_samples, BufferLayout, SampleFormat};
pub use units::UniversalTime;
