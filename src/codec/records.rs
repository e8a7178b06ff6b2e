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

//! Flat tagged-union record-list backend.
//!
//! The stream is a flat `Vec` of tagged records. A section is encoded as a
//! [`WireRecord::Section`] carrying its own flat child count (nested section
//! records and their children all count individually), which makes skipping
//! a mismatched section a single index jump.

use crate::codec::{SectionReader, SectionWriter};
use crate::error::Error;

/// One entry of the flat record list. Narrow integers are widened for
/// storage and range-checked on extraction.
#[derive(Clone, Debug, PartialEq)]
pub enum WireRecord {
    Bool(bool),
    I64(i64),
    U64(u64),
    I128(i128),
    U128(u128),
    F64(f64),
    Char(char),
    Str(Option<String>),
    Bytes(Option<Vec<u8>>),
    Section { count: u32 },
}

#[derive(Default)]
pub struct RecordListWriter {
    recs: Vec<WireRecord>,
    open: Vec<usize>,
}

impl RecordListWriter {
    pub fn new() -> Self {
        RecordListWriter::default()
    }

    pub fn finish(self) -> Vec<WireRecord> {
        assert!(self.open.is_empty(), "unbalanced sections at finish");
        self.recs
    }
}

impl SectionWriter for RecordListWriter {
    fn put_bool(&mut self, v: bool) {
        self.recs.push(WireRecord::Bool(v));
    }

    fn put_u8(&mut self, v: u8) {
        self.recs.push(WireRecord::U64(v as u64));
    }

    fn put_i8(&mut self, v: i8) {
        self.recs.push(WireRecord::I64(v as i64));
    }

    fn put_u16(&mut self, v: u16) {
        self.recs.push(WireRecord::U64(v as u64));
    }

    fn put_i16(&mut self, v: i16) {
        self.recs.push(WireRecord::I64(v as i64));
    }

    fn put_u32(&mut self, v: u32) {
        self.recs.push(WireRecord::U64(v as u64));
    }

    fn put_i32(&mut self, v: i32) {
        self.recs.push(WireRecord::I64(v as i64));
    }

    fn put_u64(&mut self, v: u64) {
        self.recs.push(WireRecord::U64(v));
    }

    fn put_i64(&mut self, v: i64) {
        self.recs.push(WireRecord::I64(v));
    }

    fn put_u128(&mut self, v: u128) {
        self.recs.push(WireRecord::U128(v));
    }

    fn put_i128(&mut self, v: i128) {
        self.recs.push(WireRecord::I128(v));
    }

    fn put_f32(&mut self, v: f32) {
        self.recs.push(WireRecord::F64(v as f64));
    }

    fn put_f64(&mut self, v: f64) {
        self.recs.push(WireRecord::F64(v));
    }

    fn put_char(&mut self, v: char) {
        self.recs.push(WireRecord::Char(v));
    }

    fn put_var_u32(&mut self, v: u32) {
        self.recs.push(WireRecord::U64(v as u64));
    }

    fn put_string(&mut self, v: Option<&str>) {
        self.recs.push(WireRecord::Str(v.map(str::to_owned)));
    }

    fn put_bytes(&mut self, v: Option<&[u8]>) {
        self.recs.push(WireRecord::Bytes(v.map(<[u8]>::to_vec)));
    }

    fn begin_section(&mut self) {
        self.open.push(self.recs.len());
        self.recs.push(WireRecord::Section { count: 0 });
    }

    fn end_section(&mut self) {
        let at = self.open.pop().expect("unbalanced end_section");
        let count = (self.recs.len() - at - 1) as u32;
        self.recs[at] = WireRecord::Section { count };
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        enabled
    }
}

pub struct RecordListReader {
    recs: Vec<WireRecord>,
    pos: usize,
    // absolute end index per open section
    ends: Vec<usize>,
}

impl RecordListReader {
    pub fn new(recs: Vec<WireRecord>) -> Self {
        RecordListReader {
            recs,
            pos: 0,
            ends: Vec::new(),
        }
    }

    fn next(&mut self) -> Result<WireRecord, Error> {
        if self.pos >= self.recs.len() {
            return Err(Error::buffer_out_of_bound(self.pos, 1, self.recs.len()));
        }
        let v = std::mem::replace(&mut self.recs[self.pos], WireRecord::Section { count: 0 });
        self.pos += 1;
        Ok(v)
    }

    fn next_i64(&mut self) -> Result<i64, Error> {
        match self.next()? {
            WireRecord::I64(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected signed record, found {other:?}"
            ))),
        }
    }

    fn next_u64(&mut self) -> Result<u64, Error> {
        match self.next()? {
            WireRecord::U64(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected unsigned record, found {other:?}"
            ))),
        }
    }
}

macro_rules! narrow {
    ($v:expr, $ty:ty) => {
        <$ty>::try_from($v).map_err(|_| Error::invalid_data("integer record out of range"))
    };
}

impl SectionReader for RecordListReader {
    fn get_bool(&mut self) -> Result<bool, Error> {
        match self.next()? {
            WireRecord::Bool(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected bool record, found {other:?}"
            ))),
        }
    }

    fn get_u8(&mut self) -> Result<u8, Error> {
        narrow!(self.next_u64()?, u8)
    }

    fn get_i8(&mut self) -> Result<i8, Error> {
        narrow!(self.next_i64()?, i8)
    }

    fn get_u16(&mut self) -> Result<u16, Error> {
        narrow!(self.next_u64()?, u16)
    }

    fn get_i16(&mut self) -> Result<i16, Error> {
        narrow!(self.next_i64()?, i16)
    }

    fn get_u32(&mut self) -> Result<u32, Error> {
        narrow!(self.next_u64()?, u32)
    }

    fn get_i32(&mut self) -> Result<i32, Error> {
        narrow!(self.next_i64()?, i32)
    }

    fn get_u64(&mut self) -> Result<u64, Error> {
        self.next_u64()
    }

    fn get_i64(&mut self) -> Result<i64, Error> {
        self.next_i64()
    }

    fn get_u128(&mut self) -> Result<u128, Error> {
        match self.next()? {
            WireRecord::U128(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected u128 record, found {other:?}"
            ))),
        }
    }

    fn get_i128(&mut self) -> Result<i128, Error> {
        match self.next()? {
            WireRecord::I128(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected i128 record, found {other:?}"
            ))),
        }
    }

    fn get_f32(&mut self) -> Result<f32, Error> {
        Ok(self.get_f64()? as f32)
    }

    fn get_f64(&mut self) -> Result<f64, Error> {
        match self.next()? {
            WireRecord::F64(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected float record, found {other:?}"
            ))),
        }
    }

    fn get_char(&mut self) -> Result<char, Error> {
        match self.next()? {
            WireRecord::Char(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected char record, found {other:?}"
            ))),
        }
    }

    fn get_var_u32(&mut self) -> Result<u32, Error> {
        narrow!(self.next_u64()?, u32)
    }

    fn get_string(&mut self) -> Result<Option<String>, Error> {
        match self.next()? {
            WireRecord::Str(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected string record, found {other:?}"
            ))),
        }
    }

    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.next()? {
            WireRecord::Bytes(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected bytes record, found {other:?}"
            ))),
        }
    }

    fn begin_section(&mut self) -> Result<(), Error> {
        match self.next()? {
            WireRecord::Section { count } => {
                self.ends.push(self.pos + count as usize);
                Ok(())
            }
            other => Err(Error::invalid_data(format!(
                "expected section record, found {other:?}"
            ))),
        }
    }

    fn end_section(&mut self) -> Result<bool, Error> {
        let end = self
            .ends
            .pop()
            .ok_or_else(|| Error::not_allowed("end_section without begin_section"))?;
        let ok = self.pos == end;
        if !ok {
            self.pos = end.min(self.recs.len());
        }
        Ok(ok)
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_counts_are_flat() {
        let mut w = RecordListWriter::new();
        w.begin_section();
        w.put_u8(1);
        w.begin_section();
        w.put_u8(2);
        w.end_section();
        w.end_section();
        let recs = w.finish();
        // outer counts the inner section record plus both scalars
        assert_eq!(recs[0], WireRecord::Section { count: 3 });
        assert_eq!(recs[2], WireRecord::Section { count: 1 });
    }

    #[test]
    fn skip_on_mismatch() {
        let mut w = RecordListWriter::new();
        w.begin_section();
        w.put_u8(1);
        w.put_u8(2);
        w.end_section();
        w.put_u8(99);
        let recs = w.finish();

        let mut r = RecordListReader::new(recs);
        r.begin_section().unwrap();
        r.get_u8().unwrap();
        assert!(!r.end_section().unwrap());
        assert_eq!(r.get_u8().unwrap(), 99);
    }
}
