// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The low-level reader/writer contract and its physical backends.
//!
//! Framing is a *contract*, not a byte layout: the binary backends realize a
//! section as a length prefix that is back-patched on close, while the JSON,
//! tree and record-list backends nest natively. Because the hierarchical
//! layer only ever talks to [`SectionWriter`]/[`SectionReader`], one
//! implementation of it drives every backend unmodified.
//!
//! Nullable strings, byte arrays and container counts share one sentinel
//! convention on the wire: `0` means null, anything else is `length + 1`.

pub mod binary;
pub mod json;
pub mod records;
pub mod stream;
pub mod tokio_stream;
pub mod tree;

use crate::error::Error;

/// Sink half of the contract. Writes are infallible: every backend
/// accumulates into memory and defers real I/O to an explicit flush.
pub trait SectionWriter {
    fn put_bool(&mut self, v: bool);
    fn put_u8(&mut self, v: u8);
    fn put_i8(&mut self, v: i8);
    fn put_u16(&mut self, v: u16);
    fn put_i16(&mut self, v: i16);
    fn put_u32(&mut self, v: u32);
    fn put_i32(&mut self, v: i32);
    fn put_u64(&mut self, v: u64);
    fn put_i64(&mut self, v: i64);
    fn put_u128(&mut self, v: u128);
    fn put_i128(&mut self, v: i128);
    fn put_f32(&mut self, v: f32);
    fn put_f64(&mut self, v: f64);
    fn put_char(&mut self, v: char);
    /// Compact unsigned value used for lengths, counts and tokens.
    fn put_var_u32(&mut self, v: u32);
    fn put_string(&mut self, v: Option<&str>);
    fn put_bytes(&mut self, v: Option<&[u8]>);

    /// Opens a framed sub-region. Closed by the matching [`end_section`].
    ///
    /// [`end_section`]: SectionWriter::end_section
    fn begin_section(&mut self);
    fn end_section(&mut self);

    /// Attempts to switch framing on or off. Returns `false` when the
    /// backend cannot honor the request, either because framing is inherent
    /// to its layout or because a section has already been opened under the
    /// current mode.
    fn try_set_framing(&mut self, enabled: bool) -> bool;
}

/// Source half of the contract. Reads are checked; corrupt input surfaces as
/// an `Err`, never as a panic.
pub trait SectionReader {
    fn get_bool(&mut self) -> Result<bool, Error>;
    fn get_u8(&mut self) -> Result<u8, Error>;
    fn get_i8(&mut self) -> Result<i8, Error>;
    fn get_u16(&mut self) -> Result<u16, Error>;
    fn get_i16(&mut self) -> Result<i16, Error>;
    fn get_u32(&mut self) -> Result<u32, Error>;
    fn get_i32(&mut self) -> Result<i32, Error>;
    fn get_u64(&mut self) -> Result<u64, Error>;
    fn get_i64(&mut self) -> Result<i64, Error>;
    fn get_u128(&mut self) -> Result<u128, Error>;
    fn get_i128(&mut self) -> Result<i128, Error>;
    fn get_f32(&mut self) -> Result<f32, Error>;
    fn get_f64(&mut self) -> Result<f64, Error>;
    fn get_char(&mut self) -> Result<char, Error>;
    fn get_var_u32(&mut self) -> Result<u32, Error>;
    fn get_string(&mut self) -> Result<Option<String>, Error>;
    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, Error>;

    fn begin_section(&mut self) -> Result<(), Error>;

    /// Closes the innermost open section. Returns whether the consumed
    /// content exactly filled the declared extent. On mismatch the cursor is
    /// repositioned at the section end before returning, so the caller can
    /// keep parsing the enclosing stream.
    fn end_section(&mut self) -> Result<bool, Error>;

    /// See [`SectionWriter::try_set_framing`].
    fn try_set_framing(&mut self, enabled: bool) -> bool;
}

pub(crate) fn char_from_u32(v: u32) -> Result<char, Error> {
    char::from_u32(v).ok_or_else(|| Error::invalid_data(format!("invalid char scalar {v:#x}")))
}
