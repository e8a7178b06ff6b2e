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

//! Mode-discriminated object-graph traversal.
//!
//! An [`Archive`] is constructed per stream in either write or read mode and
//! handed to each record's `fields` body; every `add_*` operation dispatches
//! on the mode internally, so one body describes both directions. The
//! archive owns the per-stream state the wire format depends on: the dynamic
//! type table, the default-type-set table, and the ambient version stack.
//!
//! Failures inside one record are contained at that record's section
//! boundary and routed through the error sink; failures in the header or in
//! the token stream itself abort the call.

use std::any::TypeId;
use std::collections::HashMap;

use crate::codec::{SectionReader, SectionWriter};
use crate::container::Container;
use crate::engine::{DefaultTypeSet, Record, RecordFactory};
use crate::ensure;
use crate::error::{Error, ErrorCallback, ErrorSink};
use crate::resolver::{TypeRegistry, TypeResolver};
use crate::types::{NO_DEFAULT_TYPE_SET, NULL_TOKEN, PROTOCOL_ID, RESERVED_HEADER_BYTE};

pub(crate) struct WriteSide<'a> {
    out: &'a mut dyn SectionWriter,
    registry: &'a TypeRegistry,
    resolver: &'a TypeResolver,
    /// Runtime type to positive token, grown lazily as new types appear.
    dynamic: HashMap<TypeId, i16>,
    /// Runtime type to negative token, fixed at prepare time.
    default_set: HashMap<TypeId, i16>,
}

pub(crate) struct ReadSide<'a> {
    input: &'a mut dyn SectionReader,
    registry: &'a TypeRegistry,
    resolver: &'a TypeResolver,
    /// Token index to factory; `None` marks an identity that failed to
    /// resolve, so repeats of the token stay cheap.
    dynamic: Vec<Option<RecordFactory>>,
    default_set: Vec<RecordFactory>,
}

pub(crate) enum Side<'a> {
    Write(WriteSide<'a>),
    Read(ReadSide<'a>),
}

pub struct Archive<'a> {
    side: Side<'a>,
    version: u8,
    version_stack: Vec<u8>,
    sink: ErrorSink,
}

impl<'a> Archive<'a> {
    /// Opens a writing archive over `out` and emits the stream header.
    ///
    /// The header records the protocol byte, the framing mode actually in
    /// effect, the default-type-set version (`-1` if none) and a reserved
    /// byte. When the backend cannot honor the requested framing mode its
    /// inherent mode is recorded instead.
    pub fn for_write(
        out: &'a mut dyn SectionWriter,
        registry: &'a TypeRegistry,
        resolver: &'a TypeResolver,
        framing: bool,
        default_set: Option<&dyn DefaultTypeSet>,
        callback: Option<ErrorCallback>,
    ) -> Result<Archive<'a>, Error> {
        let effective = if out.try_set_framing(framing) {
            framing
        } else {
            !framing
        };
        let mut set_version = NO_DEFAULT_TYPE_SET;
        let mut tokens = HashMap::new();
        if let Some(provider) = default_set {
            set_version = provider.version();
            let entries = provider.entries(set_version).ok_or_else(|| {
                Error::not_allowed("default type set provider rejected its own version")
            })?;
            for (i, (rust_id, _)) in entries.into_iter().enumerate() {
                tokens.insert(rust_id, -(i as i16) - 1);
            }
        }
        out.put_u8(PROTOCOL_ID);
        out.put_bool(effective);
        out.put_i32(set_version);
        out.put_u8(RESERVED_HEADER_BYTE);
        Ok(Archive {
            side: Side::Write(WriteSide {
                out,
                registry,
                resolver,
                dynamic: HashMap::new(),
                default_set: tokens,
            }),
            version: 0,
            version_stack: Vec::new(),
            sink: ErrorSink::new(callback),
        })
    }

    /// Opens a reading archive over `input` and validates the stream header.
    ///
    /// A wrong protocol byte is fatal. A stream that declares a default type
    /// set requires a provider that knows the declared version; pairing such
    /// a stream with no provider is a caller contract violation, not a data
    /// error, and fails fatally as well.
    pub fn for_read(
        input: &'a mut dyn SectionReader,
        registry: &'a TypeRegistry,
        resolver: &'a TypeResolver,
        default_set: Option<&dyn DefaultTypeSet>,
        callback: Option<ErrorCallback>,
    ) -> Result<Archive<'a>, Error> {
        let protocol = input.get_u8()?;
        if protocol != PROTOCOL_ID {
            return Err(Error::ProtocolMismatch {
                expected: PROTOCOL_ID,
                found: protocol,
            });
        }
        let framing = input.get_bool()?;
        if !input.try_set_framing(framing) {
            return Err(Error::unsupported(
                "stream framing mode is not supported by this reader",
            ));
        }
        let set_version = input.get_i32()?;
        let mut factories = Vec::new();
        if set_version != NO_DEFAULT_TYPE_SET {
            let provider =
                default_set.ok_or(Error::MissingTypeSetProvider(set_version))?;
            let entries = provider
                .entries(set_version)
                .ok_or(Error::MissingTypeSetProvider(set_version))?;
            factories = entries.into_iter().map(|(_, factory)| factory).collect();
        }
        let _reserved = input.get_u8()?;
        Ok(Archive {
            side: Side::Read(ReadSide {
                input,
                registry,
                resolver,
                dynamic: Vec::new(),
                default_set: factories,
            }),
            version: 0,
            version_stack: Vec::new(),
            sink: ErrorSink::new(callback),
        })
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.side, Side::Read(_))
    }

    /// Ambient schema version of the record currently being traversed.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Soft errors reported so far.
    pub fn soft_errors(&self) -> &[Error] {
        self.sink.errors()
    }

    /// Closes the archive and hands back the soft errors it contained.
    pub fn finish(mut self) -> Vec<Error> {
        debug_assert!(self.version_stack.is_empty());
        self.sink.take()
    }

    fn write_side(&mut self) -> &mut WriteSide<'a> {
        match &mut self.side {
            Side::Write(w) => w,
            // operations dispatch on the mode before landing here
            Side::Read(_) => unreachable!("writer state on a reading archive"),
        }
    }

    fn read_side(&mut self) -> &mut ReadSide<'a> {
        match &mut self.side {
            Side::Read(r) => r,
            Side::Write(_) => unreachable!("reader state on a writing archive"),
        }
    }
}

macro_rules! scalar_op {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $put:ident, $get:ident) => {
        $(#[$meta])*
        pub fn $name(&mut self, v: &mut $ty) -> Result<(), Error> {
            match &mut self.side {
                Side::Write(w) => {
                    w.out.$put(*v);
                    Ok(())
                }
                Side::Read(r) => {
                    *v = r.input.$get()?;
                    Ok(())
                }
            }
        }
    };
}

/// Field operations. Each one writes the field in write mode and populates
/// it in read mode; call order is the wire layout.
impl Archive<'_> {
    scalar_op!(add_bool, bool, put_bool, get_bool);
    scalar_op!(add_u8, u8, put_u8, get_u8);
    scalar_op!(add_i8, i8, put_i8, get_i8);
    scalar_op!(add_u16, u16, put_u16, get_u16);
    scalar_op!(add_i16, i16, put_i16, get_i16);
    scalar_op!(add_u32, u32, put_u32, get_u32);
    scalar_op!(add_i32, i32, put_i32, get_i32);
    scalar_op!(add_u64, u64, put_u64, get_u64);
    scalar_op!(add_i64, i64, put_i64, get_i64);
    scalar_op!(add_u128, u128, put_u128, get_u128);
    scalar_op!(add_i128, i128, put_i128, get_i128);
    scalar_op!(add_f32, f32, put_f32, get_f32);
    scalar_op!(add_f64, f64, put_f64, get_f64);
    scalar_op!(add_char, char, put_char, get_char);
    scalar_op!(
        /// Compact unsigned value, for counts and small enumerations.
        add_var_u32,
        u32,
        put_var_u32,
        get_var_u32
    );

    pub fn add_string(&mut self, v: &mut Option<String>) -> Result<(), Error> {
        match &mut self.side {
            Side::Write(w) => {
                w.out.put_string(v.as_deref());
                Ok(())
            }
            Side::Read(r) => {
                *v = r.input.get_string()?;
                Ok(())
            }
        }
    }

    pub fn add_bytes(&mut self, v: &mut Option<Vec<u8>>) -> Result<(), Error> {
        match &mut self.side {
            Side::Write(w) => {
                w.out.put_bytes(v.as_deref());
                Ok(())
            }
            Side::Read(r) => {
                *v = r.input.get_bytes()?;
                Ok(())
            }
        }
    }

    /// A nullable container of [`Container`] shape. Count `0` on the wire
    /// means a null container, anything else is `count + 1`.
    pub fn add_container<C: Container>(&mut self, v: &mut Option<C>) -> Result<(), Error> {
        match &mut self.side {
            Side::Write(w) => {
                match v {
                    None => w.out.put_var_u32(0),
                    Some(c) => {
                        w.out.put_var_u32(c.count() as u32 + 1);
                        c.write_elems(&mut *w.out);
                    }
                }
                Ok(())
            }
            Side::Read(r) => {
                *v = match r.input.get_var_u32()? {
                    0 => None,
                    n => Some(C::read_elems(&mut *r.input, n as usize - 1)?),
                };
                Ok(())
            }
        }
    }

    /// A polymorphic, nullable reference record.
    ///
    /// Write mode resolves the value's runtime type to a token, wraps the
    /// fields in a section and captures field failures in the sink. Read
    /// mode mirrors it; an unresolvable type leaves `None` and skips the
    /// section, and a section mismatch is reported without desynchronizing
    /// the enclosing stream.
    pub fn add_class(&mut self, value: &mut Option<Box<dyn Record>>) -> Result<(), Error> {
        if self.is_reading() {
            return self.read_class(value);
        }
        let Some(rec) = value.as_mut() else {
            self.write_side().out.put_i16(NULL_TOKEN);
            return Ok(());
        };
        if !self.write_class_token(rec.as_ref()) {
            return Ok(());
        }
        self.begin_section()?;
        let versioned = rec.version().is_some();
        if let Err(err) = self.run_fields(rec.as_mut(), versioned) {
            self.sink.report(err);
        }
        self.end_section_checked()
    }

    /// A non-polymorphic, nullable record of a statically known type. Skips
    /// token negotiation entirely; only a presence byte and the framed
    /// fields go on the wire.
    pub fn add_static_class<T: Record + Default>(
        &mut self,
        value: &mut Option<T>,
    ) -> Result<(), Error> {
        if self.is_reading() {
            if !self.read_side().input.get_bool()? {
                *value = None;
                return Ok(());
            }
            self.begin_section()?;
            let mut rec = T::default();
            let versioned = rec.version().is_some();
            if let Err(err) = self.run_fields(&mut rec, versioned) {
                self.sink.report(err);
            }
            *value = Some(rec);
            return self.end_section_checked();
        }
        match value {
            None => {
                self.write_side().out.put_bool(false);
                Ok(())
            }
            Some(rec) => {
                self.write_side().out.put_bool(true);
                self.begin_section()?;
                let versioned = rec.version().is_some();
                if let Err(err) = self.run_fields(rec, versioned) {
                    self.sink.report(err);
                }
                self.end_section_checked()
            }
        }
    }

    /// A value record: always present, no token, no section. Failures
    /// propagate to the caller, there is no boundary to contain them at.
    pub fn add_struct<T: Record>(&mut self, value: &mut T) -> Result<(), Error> {
        self.run_fields(value, false)
    }

    /// A value record carrying a schema version byte ahead of its fields.
    pub fn add_versioned_struct<T: Record>(&mut self, value: &mut T) -> Result<(), Error> {
        self.run_fields(value, true)
    }

    /// Emits the type token for `rec`, and its full identity on its first
    /// dynamic occurrence. Returns false when nothing may follow the token.
    fn write_class_token(&mut self, rec: &dyn Record) -> bool {
        // upcast first: TypeId of the concrete type, not of the trait object
        let any: &dyn std::any::Any = rec;
        let rust_id = any.type_id();
        let mut resolved = true;
        let mut table_full = false;
        let w = self.write_side();
        if let Some(token) = w.default_set.get(&rust_id) {
            w.out.put_i16(*token);
        } else if let Some(token) = w.dynamic.get(&rust_id) {
            w.out.put_i16(*token);
        } else if w.dynamic.len() >= i16::MAX as usize {
            w.out.put_i16(NULL_TOKEN);
            resolved = false;
            table_full = true;
        } else if let Some(entry) = w.registry.entry_by_rust(rust_id) {
            let token = w.dynamic.len() as i16 + 1;
            w.out.put_i16(token);
            w.resolver.write_identity(&mut *w.out, entry);
            w.dynamic.insert(rust_id, token);
        } else {
            w.out.put_i16(NULL_TOKEN);
            resolved = false;
        }
        if !resolved {
            self.sink.report(if table_full {
                Error::unknown_type("dynamic type table is full")
            } else {
                Error::unknown_type("record type was never registered")
            });
        }
        resolved
    }

    fn read_class(&mut self, value: &mut Option<Box<dyn Record>>) -> Result<(), Error> {
        let token = self.read_side().input.get_i16()?;
        if token == NULL_TOKEN {
            *value = None;
            return Ok(());
        }
        let factory = self.resolve_token(token)?;
        self.begin_section()?;
        match factory {
            None => {
                // unknown type: leave null, the section skips its payload
                *value = None;
                let _ = self.read_side().input.end_section()?;
                Ok(())
            }
            Some(build) => {
                let mut rec = build();
                let versioned = rec.version().is_some();
                if let Err(err) = self.run_fields(rec.as_mut(), versioned) {
                    self.sink.report(err);
                }
                // a partially populated record is still handed back; the
                // caller decides whether to keep it
                *value = Some(rec);
                self.end_section_checked()
            }
        }
    }

    /// Maps a non-null token to a factory. `Ok(None)` marks an identity
    /// nobody registered; a token the table layout cannot explain is fatal.
    fn resolve_token(&mut self, token: i16) -> Result<Option<RecordFactory>, Error> {
        let r = self.read_side();
        if token < 0 {
            let idx = (-(token as i32) - 1) as usize;
            let Some(build) = r.default_set.get(idx) else {
                return Err(Error::invalid_data(format!(
                    "default type set token {token} out of range"
                )));
            };
            return Ok(Some(*build));
        }
        let idx = token as usize - 1;
        if idx < r.dynamic.len() {
            return Ok(r.dynamic[idx]);
        }
        ensure!(
            idx == r.dynamic.len(),
            "dynamic type token {} skips table entries",
            token
        );
        let entry = r.resolver.read_identity(&mut *r.input, r.registry)?;
        let thunk = entry.map(|e| e.factory);
        r.dynamic.push(thunk);
        if thunk.is_none() {
            self.sink.report(Error::unknown_type(format!(
                "unresolved identity for dynamic type token {token}"
            )));
        }
        Ok(thunk)
    }

    /// Runs one record's fields, installing the wire version as the ambient
    /// version for the duration when the record is versioned.
    fn run_fields(&mut self, rec: &mut dyn Record, versioned: bool) -> Result<(), Error> {
        if !versioned {
            return rec.fields(self);
        }
        let declared = rec.version().unwrap_or(0);
        let wire = match &mut self.side {
            Side::Write(w) => {
                w.out.put_u8(declared);
                declared
            }
            Side::Read(r) => r.input.get_u8()?,
        };
        self.version_stack.push(self.version);
        self.version = wire;
        let result = rec.fields(self);
        self.version = self.version_stack.pop().unwrap_or(0);
        result
    }

    fn begin_section(&mut self) -> Result<(), Error> {
        match &mut self.side {
            Side::Write(w) => {
                w.out.begin_section();
                Ok(())
            }
            Side::Read(r) => r.input.begin_section(),
        }
    }

    /// Closes the innermost section; a read-side extent mismatch is
    /// reported softly, the backend has already repositioned the cursor.
    fn end_section_checked(&mut self) -> Result<(), Error> {
        let ok = match &mut self.side {
            Side::Write(w) => {
                w.out.end_section();
                true
            }
            Side::Read(r) => r.input.end_section()?,
        };
        if !ok {
            self.sink.report(Error::framing_mismatch(
                "record did not fill its declared section",
            ));
        }
        Ok(())
    }
}
