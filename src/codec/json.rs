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

//! JSON array-tree backend.
//!
//! The stream is a flat JSON array of scalars; a section is literally a
//! nested array, so content cannot desynchronize the outer stream and a
//! framing mismatch only shows up as leftover (or missing) elements when
//! the section closes. Framing cannot be turned off.
//!
//! Encoding notes: 128-bit integers exceed JSON number range and travel as
//! decimal strings; chars travel as one-character strings; byte arrays as
//! number arrays. Non-finite floats are unsupported on this backend.

use serde_json::{json, Value};

use crate::codec::{SectionReader, SectionWriter};
use crate::error::Error;

#[derive(Default)]
pub struct JsonWriter {
    // stack[0] is the root stream, deeper entries are open sections
    stack: Vec<Vec<Value>>,
}

impl JsonWriter {
    pub fn new() -> Self {
        JsonWriter { stack: vec![Vec::new()] }
    }

    fn push(&mut self, v: Value) {
        self.stack.last_mut().expect("writer finished").push(v);
    }

    /// Consumes the writer, yielding the root array. Open sections are an
    /// engine invariant violation.
    pub fn finish(mut self) -> Value {
        assert_eq!(self.stack.len(), 1, "unbalanced sections at finish");
        Value::Array(self.stack.pop().unwrap())
    }

    pub fn finish_to_string(self) -> String {
        self.finish().to_string()
    }
}

impl SectionWriter for JsonWriter {
    fn put_bool(&mut self, v: bool) {
        self.push(Value::Bool(v));
    }

    fn put_u8(&mut self, v: u8) {
        self.push(json!(v));
    }

    fn put_i8(&mut self, v: i8) {
        self.push(json!(v));
    }

    fn put_u16(&mut self, v: u16) {
        self.push(json!(v));
    }

    fn put_i16(&mut self, v: i16) {
        self.push(json!(v));
    }

    fn put_u32(&mut self, v: u32) {
        self.push(json!(v));
    }

    fn put_i32(&mut self, v: i32) {
        self.push(json!(v));
    }

    fn put_u64(&mut self, v: u64) {
        self.push(json!(v));
    }

    fn put_i64(&mut self, v: i64) {
        self.push(json!(v));
    }

    fn put_u128(&mut self, v: u128) {
        self.push(Value::String(v.to_string()));
    }

    fn put_i128(&mut self, v: i128) {
        self.push(Value::String(v.to_string()));
    }

    fn put_f32(&mut self, v: f32) {
        self.push(json!(v as f64));
    }

    fn put_f64(&mut self, v: f64) {
        self.push(json!(v));
    }

    fn put_char(&mut self, v: char) {
        self.push(Value::String(v.to_string()));
    }

    fn put_var_u32(&mut self, v: u32) {
        self.push(json!(v));
    }

    fn put_string(&mut self, v: Option<&str>) {
        match v {
            None => self.push(Value::Null),
            Some(s) => self.push(Value::String(s.to_owned())),
        }
    }

    fn put_bytes(&mut self, v: Option<&[u8]>) {
        match v {
            None => self.push(Value::Null),
            Some(b) => self.push(Value::Array(b.iter().map(|x| json!(x)).collect())),
        }
    }

    fn begin_section(&mut self) {
        self.stack.push(Vec::new());
    }

    fn end_section(&mut self) {
        assert!(self.stack.len() > 1, "unbalanced end_section");
        let section = self.stack.pop().unwrap();
        self.push(Value::Array(section));
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        // sections are structural here, framing is not optional
        enabled
    }
}

pub struct JsonReader {
    // (elements, next index) per nesting level
    stack: Vec<(Vec<Value>, usize)>,
}

impl JsonReader {
    pub fn new(root: Value) -> Result<Self, Error> {
        match root {
            Value::Array(items) => Ok(JsonReader {
                stack: vec![(items, 0)],
            }),
            other => Err(Error::invalid_data(format!(
                "json stream root must be an array, found {other}"
            ))),
        }
    }

    pub fn from_str(text: &str) -> Result<Self, Error> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| Error::invalid_data(format!("malformed json stream: {e}")))?;
        Self::new(root)
    }

    fn next(&mut self) -> Result<Value, Error> {
        let (items, idx) = self.stack.last_mut().expect("reader finished");
        if *idx >= items.len() {
            return Err(Error::buffer_out_of_bound(*idx, 1, items.len()));
        }
        let v = std::mem::replace(&mut items[*idx], Value::Null);
        *idx += 1;
        Ok(v)
    }

    fn next_i64(&mut self) -> Result<i64, Error> {
        self.next()?
            .as_i64()
            .ok_or_else(|| Error::invalid_data("expected integer element"))
    }

    fn next_u64(&mut self) -> Result<u64, Error> {
        self.next()?
            .as_u64()
            .ok_or_else(|| Error::invalid_data("expected unsigned element"))
    }
}

macro_rules! narrow {
    ($v:expr, $ty:ty) => {
        <$ty>::try_from($v).map_err(|_| Error::invalid_data("integer element out of range"))
    };
}

impl SectionReader for JsonReader {
    fn get_bool(&mut self) -> Result<bool, Error> {
        self.next()?
            .as_bool()
            .ok_or_else(|| Error::invalid_data("expected bool element"))
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
            Value::String(s) => s
                .parse()
                .map_err(|_| Error::invalid_data("malformed u128 element")),
            _ => Err(Error::invalid_data("expected u128 string element")),
        }
    }

    fn get_i128(&mut self) -> Result<i128, Error> {
        match self.next()? {
            Value::String(s) => s
                .parse()
                .map_err(|_| Error::invalid_data("malformed i128 element")),
            _ => Err(Error::invalid_data("expected i128 string element")),
        }
    }

    fn get_f32(&mut self) -> Result<f32, Error> {
        Ok(self.get_f64()? as f32)
    }

    fn get_f64(&mut self) -> Result<f64, Error> {
        self.next()?
            .as_f64()
            .ok_or_else(|| Error::invalid_data("expected float element"))
    }

    fn get_char(&mut self) -> Result<char, Error> {
        match self.next()? {
            Value::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(Error::invalid_data("expected single-char element")),
                }
            }
            _ => Err(Error::invalid_data("expected char element")),
        }
    }

    fn get_var_u32(&mut self) -> Result<u32, Error> {
        narrow!(self.next_u64()?, u32)
    }

    fn get_string(&mut self) -> Result<Option<String>, Error> {
        match self.next()? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            _ => Err(Error::invalid_data("expected string or null element")),
        }
    }

    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.next()? {
            Value::Null => Ok(None),
            Value::Array(items) => items
                .into_iter()
                .map(|v| {
                    v.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| Error::invalid_data("byte element out of range"))
                })
                .collect::<Result<Vec<u8>, Error>>()
                .map(Some),
            _ => Err(Error::invalid_data("expected byte array or null element")),
        }
    }

    fn begin_section(&mut self) -> Result<(), Error> {
        match self.next()? {
            Value::Array(items) => {
                self.stack.push((items, 0));
                Ok(())
            }
            _ => Err(Error::invalid_data("expected section array")),
        }
    }

    fn end_section(&mut self) -> Result<bool, Error> {
        if self.stack.len() < 2 {
            return Err(Error::not_allowed("end_section without begin_section"));
        }
        let (items, idx) = self.stack.pop().unwrap();
        Ok(idx == items.len())
    }

    fn try_set_framing(&mut self, enabled: bool) -> bool {
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_nested_arrays() {
        let mut w = JsonWriter::new();
        w.put_u8(1);
        w.begin_section();
        w.put_string(Some("x"));
        w.end_section();
        let v = w.finish();
        assert_eq!(v, serde_json::json!([1, ["x"]]));
    }

    #[test]
    fn leftover_elements_fail_end_section() {
        let mut r = JsonReader::new(serde_json::json!([[1, 2]])).unwrap();
        r.begin_section().unwrap();
        r.get_u8().unwrap();
        assert!(!r.end_section().unwrap());
        // outer stream is still positioned correctly
        assert!(r.end_section().is_err());
    }
}
