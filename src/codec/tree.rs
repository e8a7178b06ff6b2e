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

//! Structured in-memory tree backend.
//!
//! Like the JSON backend this one frames structurally: a section is a
//! [`TreeValue::Section`] node holding its children, so only an explicit
//! element-count mismatch is possible. Unlike JSON the nodes stay typed,
//! which makes this the backend of choice for in-process snapshots and
//! tests that want to inspect a stream without parsing bytes.

use crate::codec::{SectionReader, SectionWriter};
use crate::error::Error;

/// One node of the structured tree. Narrow integers are widened to 64 bits
/// for storage and range-checked on the way back out.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    I128(i128),
    U128(u128),
    F64(f64),
    Char(char),
    Str(Option<String>),
    Bytes(Option<Vec<u8>>),
    Section(Vec<TreeValue>),
}

#[derive(Default)]
pub struct TreeWriter {
    stack: Vec<Vec<TreeValue>>,
}

impl TreeWriter {
    pub fn new() -> Self {
        TreeWriter { stack: vec![Vec::new()] }
    }

    fn push(&mut self, v: TreeValue) {
        self.stack.last_mut().expect("writer finished").push(v);
    }

    pub fn finish(mut self) -> Vec<TreeValue> {
        assert_eq!(self.stack.len(), 1, "unbalanced sections at finish");
        self.stack.pop().unwrap()
    }
}

impl SectionWriter for TreeWriter {
    fn put_bool(&mut self, v: bool) {
        self.push(TreeValue::Bool(v));
    }

    fn put_u8(&mut self, v: u8) {
        self.push(TreeValue::U64(v as u64));
    }

    fn put_i8(&mut self, v: i8) {
        self.push(TreeValue::I64(v as i64));
    }

    fn put_u16(&mut self, v: u16) {
        self.push(TreeValue::U64(v as u64));
    }

    fn put_i16(&mut self, v: i16) {
        self.push(TreeValue::I64(v as i64));
    }

    fn put_u32(&mut self, v: u32) {
        self.push(TreeValue::U64(v as u64));
    }

    fn put_i32(&mut self, v: i32) {
        self.push(TreeValue::I64(v as i64));
    }

    fn put_u64(&mut self, v: u64) {
        self.push(TreeValue::U64(v));
    }

    fn put_i64(&mut self, v: i64) {
        self.push(TreeValue::I64(v));
    }

    fn put_u128(&mut self, v: u128) {
        self.push(TreeValue::U128(v));
    }

    fn put_i128(&mut self, v: i128) {
        self.push(TreeValue::I128(v));
    }

    fn put_f32(&mut self, v: f32) {
        self.push(TreeValue::F64(v as f64));
    }

    fn put_f64(&mut self, v: f64) {
        self.push(TreeValue::F64(v));
    }

    fn put_char(&mut self, v: char) {
        self.push(TreeValue::Char(v));
    }

    fn put_var_u32(&mut self, v: u32) {
        self.push(TreeValue::U64(v as u64));
    }

    fn put_string(&mut self, v: Option<&str>) {
        self.push(TreeValue::Str(v.map(str::to_owned)));
    }

    fn put_bytes(&mut self, v: Option<&[u8]>) {
        self.push(TreeValue::Bytes(v.map(<[u8]>::to_vec)));
    }

    fn begin_section(&mut self) {
        self.stack.push(Vec::new());
    }

    fn end_section(&mut self) {
        assert!(self.stack.len() > 1, "unbalanced end_section");
        let section = self.stack.pop().unwrap();
        self.push(TreeValue::Section(section));
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        enabled
    }
}

pub struct TreeReader {
    stack: Vec<(std::vec::IntoIter<TreeValue>, usize, usize)>,
}

impl TreeReader {
    pub fn new(root: Vec<TreeValue>) -> Self {
        let len = root.len();
        TreeReader {
            stack: vec![(root.into_iter(), 0, len)],
        }
    }

    fn next(&mut self) -> Result<TreeValue, Error> {
        let (iter, consumed, len) = self.stack.last_mut().expect("reader finished");
        match iter.next() {
            Some(v) => {
                *consumed += 1;
                Ok(v)
            }
            None => Err(Error::buffer_out_of_bound(*consumed, 1, *len)),
        }
    }

    fn next_i64(&mut self) -> Result<i64, Error> {
        match self.next()? {
            TreeValue::I64(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected signed node, found {other:?}"
            ))),
        }
    }

    fn next_u64(&mut self) -> Result<u64, Error> {
        match self.next()? {
            TreeValue::U64(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected unsigned node, found {other:?}"
            ))),
        }
    }
}

macro_rules! narrow {
    ($v:expr, $ty:ty) => {
        <$ty>::try_from($v).map_err(|_| Error::invalid_data("integer node out of range"))
    };
}

impl SectionReader for TreeReader {
    fn get_bool(&mut self) -> Result<bool, Error> {
        match self.next()? {
            TreeValue::Bool(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected bool node, found {other:?}"
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
            TreeValue::U128(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected u128 node, found {other:?}"
            ))),
        }
    }

    fn get_i128(&mut self) -> Result<i128, Error> {
        match self.next()? {
            TreeValue::I128(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected i128 node, found {other:?}"
            ))),
        }
    }

    fn get_f32(&mut self) -> Result<f32, Error> {
        Ok(self.get_f64()? as f32)
    }

    fn get_f64(&mut self) -> Result<f64, Error> {
        match self.next()? {
            TreeValue::F64(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected float node, found {other:?}"
            ))),
        }
    }

    fn get_char(&mut self) -> Result<char, Error> {
        match self.next()? {
            TreeValue::Char(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected char node, found {other:?}"
            ))),
        }
    }

    fn get_var_u32(&mut self) -> Result<u32, Error> {
        narrow!(self.next_u64()?, u32)
    }

    fn get_string(&mut self) -> Result<Option<String>, Error> {
        match self.next()? {
            TreeValue::Str(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected string node, found {other:?}"
            ))),
        }
    }

    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.next()? {
            TreeValue::Bytes(v) => Ok(v),
            other => Err(Error::invalid_data(format!(
                "expected bytes node, found {other:?}"
            ))),
        }
    }

    fn begin_section(&mut self) -> Result<(), Error> {
        match self.next()? {
            TreeValue::Section(items) => {
                let len = items.len();
                self.stack.push((items.into_iter(), 0, len));
                Ok(())
            }
            other => Err(Error::invalid_data(format!(
                "expected section node, found {other:?}"
            ))),
        }
    }

    fn end_section(&mut self) -> Result<bool, Error> {
        if self.stack.len() < 2 {
            return Err(Error::not_allowed("end_section without begin_section"));
        }
        let (_, consumed, len) = self.stack.pop().unwrap();
        Ok(consumed == len)
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        enabled
    }
}
