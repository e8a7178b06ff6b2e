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

//! Async-buffered streaming backend over tokio I/O.
//!
//! Suspension is confined to the I/O boundary: [`AsyncStreamWriter::flush`]
//! and [`AsyncStreamReader::preload`] await the transport, while every
//! `SectionWriter`/`SectionReader` primitive stays synchronous against the
//! in-memory buffer. A primitive read that outruns what was preloaded fails
//! with a buffer error instead of blocking; callers preload ahead of
//! parsing. An abandoned preload leaves the instance indeterminate, so a
//! cancelled operation must not be pooled for reuse.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::buffer::Writer;
use crate::codec::{char_from_u32, SectionReader, SectionWriter};
use crate::error::Error;

const PRELOAD_CHUNK: usize = 4096;

pub struct AsyncStreamWriter<W: AsyncWrite + Unpin> {
    buf: Writer,
    sections: Vec<usize>,
    framing: bool,
    committed: bool,
    inner: W,
}

impl<W: AsyncWrite + Unpin> AsyncStreamWriter<W> {
    pub fn new(inner: W) -> Self {
        AsyncStreamWriter {
            buf: Writer::default(),
            sections: Vec::new(),
            framing: true,
            committed: false,
            inner,
        }
    }

    /// Awaits the transport while draining the pending buffer. Rejected
    /// while a section is open.
    pub async fn flush(&mut self) -> Result<(), Error> {
        if !self.sections.is_empty() {
            return Err(Error::not_allowed("flush inside an open section"));
        }
        self.inner.write_all(self.buf.as_slice()).await?;
        self.inner.flush().await?;
        self.buf.reset();
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> SectionWriter for AsyncStreamWriter<W> {
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
        self.committed = true;
        if self.framing {
            self.sections.push(self.buf.len());
            self.buf.write_u32(0);
        }
    }

    fn end_section(&mut self) {
        if self.framing {
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

pub struct AsyncStreamReader<R: AsyncRead + Unpin> {
    data: Vec<u8>,
    pos: usize,
    sections: Vec<usize>,
    framing: bool,
    committed: bool,
    inner: R,
    eof: bool,
}

impl<R: AsyncRead + Unpin> AsyncStreamReader<R> {
    pub fn new(inner: R) -> Self {
        AsyncStreamReader {
            data: Vec::new(),
            pos: 0,
            sections: Vec::new(),
            framing: true,
            committed: false,
            inner,
            eof: false,
        }
    }

    /// Awaits the transport until at least `n` unread bytes are buffered or
    /// the transport is exhausted.
    pub async fn preload(&mut self, n: usize) -> Result<(), Error> {
        while self.data.len() - self.pos < n && !self.eof {
            let mut chunk = [0u8; PRELOAD_CHUNK];
            let got = self.inner.read(&mut chunk).await?;
            if got == 0 {
                self.eof = true;
            } else {
                self.data.extend_from_slice(&chunk[..got]);
            }
        }
        if self.data.len() - self.pos < n {
            return Err(Error::buffer_out_of_bound(self.pos, n, self.data.len()));
        }
        Ok(())
    }

    /// Buffers every remaining transport byte.
    pub async fn preload_to_end(&mut self) -> Result<usize, Error> {
        while !self.eof {
            let mut chunk = [0u8; PRELOAD_CHUNK];
            let got = self.inner.read(&mut chunk).await?;
            if got == 0 {
                self.eof = true;
            } else {
                self.data.extend_from_slice(&chunk[..got]);
            }
        }
        Ok(self.data.len() - self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&[u8], Error> {
        if self.data.len() - self.pos < n {
            return Err(Error::buffer_out_of_bound(self.pos, n, self.data.len()));
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn get_var_u64(&mut self) -> Result<u64, Error> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let b = self.take_array::<1>()?[0];
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
}

impl<R: AsyncRead + Unpin> SectionReader for AsyncStreamReader<R> {
    fn get_bool(&mut self) -> Result<bool, Error> {
        Ok(self.take_array::<1>()?[0] != 0)
    }

    fn get_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take_array::<1>()?[0])
    }

    fn get_i8(&mut self) -> Result<i8, Error> {
        Ok(self.take_array::<1>()?[0] as i8)
    }

    fn get_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    fn get_i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    fn get_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    fn get_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    fn get_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    fn get_i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    fn get_u128(&mut self) -> Result<u128, Error> {
        Ok(u128::from_le_bytes(self.take_array()?))
    }

    fn get_i128(&mut self) -> Result<i128, Error> {
        Ok(i128::from_le_bytes(self.take_array()?))
    }

    fn get_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    fn get_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    fn get_char(&mut self) -> Result<char, Error> {
        char_from_u32(self.get_u32()?)
    }

    fn get_var_u32(&mut self) -> Result<u32, Error> {
        let v = self.get_var_u64()?;
        u32::try_from(v).map_err(|_| Error::invalid_data("varuint32 overflow"))
    }

    fn get_string(&mut self) -> Result<Option<String>, Error> {
        match self.get_var_u32()? {
            0 => Ok(None),
            n => {
                let bytes = self.take(n as usize - 1)?.to_vec();
                String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|e| Error::invalid_data(format!("invalid utf-8 string: {e}")))
            }
        }
    }

    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.get_var_u32()? {
            0 => Ok(None),
            n => Ok(Some(self.take(n as usize - 1)?.to_vec())),
        }
    }

    fn begin_section(&mut self) -> Result<(), Error> {
        self.committed = true;
        // at a top-level boundary no stored section end refers to the
        // consumed prefix, so it can be dropped to bound memory
        if self.sections.is_empty() && self.pos > 0 {
            self.data.drain(..self.pos);
            self.pos = 0;
        }
        if self.framing {
            let len = self.get_u32()? as usize;
            self.sections.push(self.pos + len);
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
        let ok = self.pos == end;
        if !ok {
            self.pos = end.min(self.data.len());
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
