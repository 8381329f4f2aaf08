// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time units shared between the RIFF, graph, and playback crates.
//!
//! ADM timestamps are conventionally written as `hh:mm:ss.SSSSS`, where the fractional part is
//! in units of 1/100000th of a second. Internally every duration and position is carried as
//! nanoseconds so that arithmetic never loses the sub-sample precision audio sample positions
//! require.

use std::fmt;
use std::time::Duration;

use crate::errors::{format_error, Result};

const NS_PER_TICK: u64 = 10_000;
const TICKS_PER_SEC: u64 = 100_000;

/// A point in time or a duration, stored as nanoseconds.
///
/// `UniversalTime` is the common currency between `chna`/`axml` timestamps, sample-accurate
/// track cursor positions, and playback engine clock state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniversalTime(u64);

impl UniversalTime {
    pub const ZERO: UniversalTime = UniversalTime(0);

    /// Constructs a `UniversalTime` directly from a nanosecond count.
    pub const fn from_nanos(ns: u64) -> Self {
        UniversalTime(ns)
    }

    /// Returns the underlying nanosecond count.
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Constructs a `UniversalTime` from a sample count and sample rate.
    pub fn from_sample_pos(sample: u64, sample_rate: u32) -> Self {
        UniversalTime(sample.saturating_mul(1_000_000_000) / sample_rate as u64)
    }

    /// Converts this time to the nearest sample index at the given sample rate, rounding down.
    pub fn to_sample_pos(self, sample_rate: u32) -> u64 {
        self.0 * sample_rate as u64 / 1_000_000_000
    }

    /// Parses an ADM `hh:mm:ss.SSSSS` timestamp (component C1/C6, `CalcTime`).
    ///
    /// The fractional field is always five digits, counting in 1/100000ths of a second, per the
    /// ADM timestamp convention; a value with a different number of fractional digits is
    /// rejected rather than silently rescaled.
    pub fn parse(s: &str) -> Result<Self> {
        // sscanf("%u:%u:%u.%u") requires all four fields present and numeric.
        let parts: Vec<&str> = s.split(&[':', '.'][..]).collect();
        if parts.len() != 4 {
            return format_error("malformed timestamp: expected hh:mm:ss.SSSSS");
        }

        let parse_field = |f: &str, what: &'static str| -> Result<u64> {
            f.parse().map_err(|_| crate::errors::AdmError::Format(what))
        };

        let hr = parse_field(parts[0], "malformed timestamp: non-numeric hours field")?;
        let mn = parse_field(parts[1], "malformed timestamp: non-numeric minutes field")?;
        let s_ = parse_field(parts[2], "malformed timestamp: non-numeric seconds field")?;
        let ss = parse_field(parts[3], "malformed timestamp: non-numeric fraction field")?;

        let mut t = hr;
        t = t * 60 + mn;
        t = t * 60 + s_;
        t = t * TICKS_PER_SEC + ss;
        Ok(UniversalTime(t * NS_PER_TICK))
    }

    /// Formats this time as `hh:mm:ss.SSSSS` (component C1/C6, `GenTime`).
    pub fn format_adm(self) -> String {
        let mut t = self.0 / NS_PER_TICK;
        let ss = t % TICKS_PER_SEC;
        t /= TICKS_PER_SEC;
        let s = t % 60;
        t /= 60;
        let mn = t % 60;
        t /= 60;
        let hr = t;
        format!("{:02}:{:02}:{:02}.{:05}", hr, mn, s, ss)
    }
}

impl fmt::Display for UniversalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_adm())
    }
}

impl From<Duration> for UniversalTime {
    fn from(d: Duration) -> Self {
        UniversalTime(d.as_nanos() as u64)
    }
}

impl From<UniversalTime> for Duration {
    fn from(t: UniversalTime) -> Self {
        Duration::from_nanos(t.0)
    }
}

impl std::ops::Add for UniversalTime {
    type Output = UniversalTime;
    fn add(self, rhs: UniversalTime) -> UniversalTime {
        UniversalTime(self.0 + rhs.0)
    }
}

impl std::ops::Sub for UniversalTime {
    type Output = UniversalTime;
    fn sub(self, rhs: UniversalTime) -> UniversalTime {
        UniversalTime(self.0.saturating_sub(rhs.0))
    }
}
