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

//! Fixed binary buffer backend.
//!
//! A section is a `u32` length prefix written as a placeholder on open and
//! back-patched on close. The reader turns the prefix into an absolute end
//! position; on mismatch it seeks the cursor straight to that end, which is
//! the corruption-containment guarantee.

use crate::buffer::{Reader, Writer};
use crate::codec::{char_from_u32, SectionReader, SectionWriter};
use crate::error::Error;

#[derive(Default)]
pub struct BinaryWriter {
    buf: Writer,
    sections: Vec<usize>,
    framing: bool,
    committed: bool,
}

impl BinaryWriter {
    pub fn new() -> Self {
        BinaryWriter {
            buf: Writer::default(),
            sections: Vec::new(),
            framing: true,
            committed: false,
        }
    }

    /// Clears all content and framing state for reuse from a pool.
    pub fn reset(&mut self) {
        self.buf.reset();
        self.sections.clear();
        self.framing = true;
        self.committed = false;
    }

    pub fn dump(&self) -> Vec<u8> {
        self.buf.dump()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl SectionWriter for BinaryWriter {
    fn put_bool(&mut self, v: bool) {
        self.buf.write_u8(v as u8);
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.write_u8(v);
    }

    fn put_i8(&mut self, v: i8) {
        self.buf.write_i8(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.buf.write_u16(v);
    }

    fn put_i16(&mut self, v: i16) {
        self.buf.write_i16(v);
    }

    fn put_u32(&mut self, v: u32) {
        self.buf.write_u32(v);
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.write_i32(v);
    }

    fn put_u64(&mut self, v: u64) {
        self.buf.write_u64(v);
    }

    fn put_i64(&mut self, v: i64) {
        self.buf.write_i64(v);
    }

    fn put_u128(&mut self, v: u128) {
        self.buf.write_u128(v);
    }

    fn put_i128(&mut self, v: i128) {
        self.buf.write_i128(v);
    }

    fn put_f32(&mut self, v: f32) {
        self.buf.write_f32(v);
    }

    fn put_f64(&mut self, v: f64) {
        self.buf.write_f64(v);
    }

    fn put_char(&mut self, v: char) {
        self.buf.write_u32(v as u32);
    }

    fn put_var_u32(&mut self, v: u32) {
        self.buf.write_varuint32(v);
    }

    fn put_string(&mut self, v: Option<&str>) {
        match v {
            None => self.buf.write_varuint32(0),
            Some(s) => {
                self.buf.write_varuint32(s.len() as u32 + 1);
                self.buf.write_bytes(s.as_bytes());
            }
        }
    }

    fn put_bytes(&mut self, v: Option<&[u8]>) {
        match v {
            None => self.buf.write_varuint32(0),
            Some(b) => {
                self.buf.write_varuint32(b.len() as u32 + 1);
                self.buf.write_bytes(b);
            }
        }
    }

    fn begin_section(&mut self) {
        self.commit();
        if self.framing {
            self.buf.reserve(32);
            self.sections.push(self.buf.len());
            self.buf.write_u32(0);
        }
    }

    fn end_section(&mut self) {
        if self.framing {
            // open/close pairing is an internal invariant of the engine
            let offset = self.sections.pop().expect("unbalanced end_section");
            let len = (self.buf.len() - offset - 4) as u32;
            self.buf.set_bytes(offset, &len.to_le_bytes());
        }
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        if self.framing == enabled {
            return true;
        }
        if self.committed {
            return false;
        }
        self.framing = enabled;
        true
    }
}

pub struct BinaryReader<'a> {
    buf: Reader<'a>,
    sections: Vec<usize>,
    framing: bool,
    committed: bool,
}

impl<'a> BinaryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BinaryReader {
            buf: Reader::new(bytes),
            sections: Vec::new(),
            framing: true,
            committed: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl SectionReader for BinaryReader<'_> {
    fn get_bool(&mut self) -> Result<bool, Error> {
        Ok(self.buf.read_u8()? != 0)
    }

    fn get_u8(&mut self) -> Result<u8, Error> {
        self.buf.read_u8()
    }

    fn get_i8(&mut self) -> Result<i8, Error> {
        self.buf.read_i8()
    }

    fn get_u16(&mut self) -> Result<u16, Error> {
        self.buf.read_u16()
    }

    fn get_i16(&mut self) -> Result<i16, Error> {
        self.buf.read_i16()
    }

    fn get_u32(&mut self) -> Result<u32, Error> {
        self.buf.read_u32()
    }

    fn get_i32(&mut self) -> Result<i32, Error> {
        self.buf.read_i32()
    }

    fn get_u64(&mut self) -> Result<u64, Error> {
        self.buf.read_u64()
    }

    fn get_i64(&mut self) -> Result<i64, Error> {
        self.buf.read_i64()
    }

    fn get_u128(&mut self) -> Result<u128, Error> {
        self.buf.read_u128()
    }

    fn get_i128(&mut self) -> Result<i128, Error> {
        self.buf.read_i128()
    }

    fn get_f32(&mut self) -> Result<f32, Error> {
        self.buf.read_f32()
    }

    fn get_f64(&mut self) -> Result<f64, Error> {
        self.buf.read_f64()
    }

    fn get_char(&mut self) -> Result<char, Error> {
        char_from_u32(self.buf.read_u32()?)
    }

    fn get_var_u32(&mut self) -> Result<u32, Error> {
        self.buf.read_varuint32()
    }

    fn get_string(&mut self) -> Result<Option<String>, Error> {
        match self.buf.read_varuint32()? {
            0 => Ok(None),
            n => {
                let bytes = self.buf.read_bytes(n as usize - 1)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|e| Error::invalid_data(format!("invalid utf-8 string: {e}")))?;
                Ok(Some(s.to_owned()))
            }
        }
    }

    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.buf.read_varuint32()? {
            0 => Ok(None),
            n => Ok(Some(self.buf.read_bytes(n as usize - 1)?.to_vec())),
        }
    }

    fn begin_section(&mut self) -> Result<(), Error> {
        self.commit();
        if self.framing {
            let len = self.buf.read_u32()? as usize;
            self.sections.push(self.buf.cursor() + len);
        }
        Ok(())
    }

    fn end_section(&mut self) -> Result<bool, Error> {
        if !self.framing {
            return Ok(true);
        }
        let end = self
            .sections
            .pop()
            .ok_or_else(|| Error::not_allowed("end_section without begin_section"))?;
        let ok = self.buf.cursor() == end;
        if !ok {
            self.buf.set_cursor(end);
        }
        Ok(ok)
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        if self.framing == enabled {
            return true;
        }
        if self.committed {
            return false;
        }
        self.framing = enabled;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_length_is_back_patched() {
        let mut w = BinaryWriter::new();
        w.begin_section();
        w.put_u32(7);
        w.end_section();
        let bytes = w.dump();
        assert_eq!(&bytes[..4], &4u32.to_le_bytes());
    }

    #[test]
    fn mismatched_section_repositions_cursor() {
        let mut w = BinaryWriter::new();
        w.begin_section();
        w.put_u32(1);
        w.put_u32(2);
        w.end_section();
        w.put_u8(0xAB);
        let bytes = w.dump();

        let mut r = BinaryReader::new(&bytes);
        r.begin_section().unwrap();
        // deliberately under-consume
        r.get_u32().unwrap();
        assert!(!r.end_section().unwrap());
        assert_eq!(r.get_u8().unwrap(), 0xAB);
    }

    #[test]
    fn framing_cannot_change_after_first_section() {
        let mut w = BinaryWriter::new();
        w.put_u8(1);
        assert!(w.try_set_framing(false));
        w.begin_section();
        w.end_section();
        assert!(!w.try_set_framing(true));
    }
}
