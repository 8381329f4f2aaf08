// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type shared by every crate in the workspace.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// `AdmError` enumerates every way a read, write, or graph operation in this workspace can fail.
///
/// Read-side operations are maximally tolerant: `Reference` and `Type` errors are logged and
/// absorbed by the caller rather than propagated (see `admbwf-graph::graph`). Write-side
/// operations are strict and propagate every error.
#[derive(Debug)]
pub enum AdmError {
    /// File open/read/write/seek failure, including a short read where a full one was required.
    Io(io::Error),
    /// Malformed chunk header, wrong `fmt ` code, invalid sample width, or other structural fault.
    Format(&'static str),
    /// A reference (`...IDRef`/`...Ref`) did not resolve to any object of the expected type.
    Reference(String),
    /// A reference resolved to an object, but of the wrong type for the referencing attribute.
    Type(String),
    /// A write was attempted on a stream opened read-only.
    ReadOnly,
    /// A value exceeded the ADM numeric range (track number, NaN position, ...).
    Overflow(&'static str),
}

impl fmt::Display for AdmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmError::Io(err) => write!(f, "io error: {}", err),
            AdmError::Format(msg) => write!(f, "malformed data: {}", msg),
            AdmError::Reference(msg) => write!(f, "unresolved reference: {}", msg),
            AdmError::Type(msg) => write!(f, "reference type mismatch: {}", msg),
            AdmError::ReadOnly => write!(f, "stream is read-only"),
            AdmError::Overflow(msg) => write!(f, "value out of range: {}", msg),
        }
    }
}

impl StdError for AdmError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AdmError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AdmError {
    fn from(err: io::Error) -> AdmError {
        AdmError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, AdmError>;

/// Convenience function to create a format error.
pub fn format_error<T>(desc: &'static str) -> Result<T> {
    Err(AdmError::Format(desc))
}

/// Convenience function to create a reference error.
pub fn reference_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(AdmError::Reference(desc.into()))
}

/// Convenience function to create a type-mismatch error.
pub fn type_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(AdmError::Type(desc.into()))
}

/// Convenience function to create a read-only error.
pub fn read_only_error<T>() -> Result<T> {
    Err(AdmError::ReadOnly)
}

/// Convenience function to create an overflow error.
pub fn overflow_error<T>(desc: &'static str) -> Result<T> {
    Err(AdmError::Overflow(desc))
}
