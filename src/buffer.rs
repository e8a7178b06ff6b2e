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

//! Byte-level buffer primitives shared by the binary backends.
//!
//! All multi-byte values are little-endian. Reads are bounds-checked and
//! return `Err` instead of panicking; corrupted input must surface as an
//! error the hierarchical layer can contain.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::Error;

/// Grow-on-write byte sink backing the binary writers.
#[derive(Default)]
pub struct Writer {
    bf: Vec<u8>,
}

impl Writer {
    /// Keeps capacity, drops content.
    pub fn reset(&mut self) {
        self.bf.clear();
    }

    pub fn dump(&self) -> Vec<u8> {
        self.bf.clone()
    }

    pub fn len(&self) -> usize {
        self.bf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.bf.reserve(additional);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bf
    }

    /// Back-patches previously skipped bytes, used to fix up section lengths.
    pub fn set_bytes(&mut self, offset: usize, data: &[u8]) {
        self.bf[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.bf.extend_from_slice(v);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.bf.write_i8(value).unwrap();
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bf.write_u16::<LittleEndian>(value).unwrap();
    }

    pub fn write_i16(&mut self, value: i16) {
        self.bf.write_i16::<LittleEndian>(value).unwrap();
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bf.write_u32::<LittleEndian>(value).unwrap();
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bf.write_i32::<LittleEndian>(value).unwrap();
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bf.write_u64::<LittleEndian>(value).unwrap();
    }

    pub fn write_i64(&mut self, value: i64) {
        self.bf.write_i64::<LittleEndian>(value).unwrap();
    }

    pub fn write_u128(&mut self, value: u128) {
        self.bf.write_u128::<LittleEndian>(value).unwrap();
    }

    pub fn write_i128(&mut self, value: i128) {
        self.bf.write_i128::<LittleEndian>(value).unwrap();
    }

    pub fn write_f32(&mut self, value: f32) {
        self.bf.write_f32::<LittleEndian>(value).unwrap();
    }

    pub fn write_f64(&mut self, value: f64) {
        self.bf.write_f64::<LittleEndian>(value).unwrap();
    }

    pub fn write_varuint32(&mut self, value: u32) {
        self.write_varuint64(value as u64);
    }

    pub fn write_varuint64(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.bf.push((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.bf.push(value as u8);
    }

    pub fn write_varint32(&mut self, value: i32) {
        let zigzag = ((value as i64) << 1) ^ ((value as i64) >> 31);
        self.write_varuint64(zigzag as u64);
    }

    pub fn write_varint64(&mut self, value: i64) {
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        self.write_varuint64(zigzag);
    }
}

/// Cursor over a borrowed byte slice, used by the binary readers.
pub struct Reader<'a> {
    bf: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bf: &'a [u8]) -> Reader<'a> {
        Reader { bf, cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Repositions the cursor; clamped to the buffer length so a corrupt
    /// section length cannot push it out of bounds.
    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = pos.min(self.bf.len());
    }

    pub fn remaining(&self) -> usize {
        self.bf.len() - self.cursor
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.cursor + n > self.bf.len() {
            return Err(Error::buffer_out_of_bound(self.cursor, n, self.bf.len()));
        }
        let s = &self.bf[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(s)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_u128(&mut self) -> Result<u128, Error> {
        Ok(LittleEndian::read_u128(self.take(16)?))
    }

    pub fn read_i128(&mut self) -> Result<i128, Error> {
        Ok(LittleEndian::read_i128(self.take(16)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    pub fn read_varuint32(&mut self) -> Result<u32, Error> {
        let v = self.read_varuint64()?;
        u32::try_from(v).map_err(|_| Error::invalid_data("varuint32 overflow"))
    }

    pub fn read_varuint64(&mut self) -> Result<u64, Error> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let b = self.read_u8()?;
            if shift == 63 && b > 1 {
                return Err(Error::invalid_data("varuint64 overflow"));
            }
            result |= ((b & 0x7F) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn read_varint32(&mut self) -> Result<i32, Error> {
        let encoded = self.read_varuint64()? as u32;
        Ok(((encoded >> 1) as i32) ^ -((encoded & 1) as i32))
    }

    pub fn read_varint64(&mut self) -> Result<i64, Error> {
        let encoded = self.read_varuint64()?;
        Ok(((encoded >> 1) as i64) ^ -((encoded & 1) as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_round_trip() {
        let mut w = Writer::default();
        w.write_i32(i32::MIN);
        w.write_u64(u64::MAX);
        w.write_f64(-0.25);
        w.write_u128(u128::MAX - 7);
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_i32().unwrap(), i32::MIN);
        assert_eq!(r.read_u64().unwrap(), u64::MAX);
        assert_eq!(r.read_f64().unwrap(), -0.25);
        assert_eq!(r.read_u128().unwrap(), u128::MAX - 7);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn varint_round_trip() {
        let values = [0i64, 1, -1, 127, 128, -300, i64::MIN, i64::MAX];
        let mut w = Writer::default();
        for v in values {
            w.write_varint64(v);
        }
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        for v in values {
            assert_eq!(r.read_varint64().unwrap(), v);
        }
    }

    #[test]
    fn short_read_is_an_error() {
        let mut r = Reader::new(&[1, 2]);
        assert!(r.read_u32().is_err());
    }

    #[test]
    fn set_bytes_patches_in_place() {
        let mut w = Writer::default();
        w.write_u32(0);
        w.write_u8(9);
        w.set_bytes(0, &42u32.to_le_bytes());
        let mut r = Reader::new(w.as_slice());
        assert_eq!(r.read_u32().unwrap(), 42);
        assert_eq!(r.read_u8().unwrap(), 9);
    }
}
