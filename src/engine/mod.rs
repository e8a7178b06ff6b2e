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

//! The hierarchical (de)serialization engine.
//!
//! User types implement [`Record`] and move their fields through an
//! [`Archive`], which discriminates write mode from read mode internally so
//! one `fields` body serves both directions.

pub mod archive;

pub use archive::Archive;

use std::any::{Any, TypeId};

use crate::error::Error;

/// A user type that can move its own fields through an [`Archive`].
///
/// The same `fields` body runs on both sides: each `add_*` call writes the
/// field in write mode and populates it in read mode, so field order is the
/// wire layout. Types whose layout changed over time return `Some(version)`;
/// the engine persists that byte ahead of the fields and the record branches
/// on [`Archive::version`] inside `fields`.
///
/// Object graphs are trees on the wire. Reference cycles are not detected:
/// a record that reaches itself through `add_class` recurses without bound.
pub trait Record: Any {
    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error>;

    /// Schema version of this record's current layout, or `None` for
    /// unversioned records.
    fn version(&self) -> Option<u8> {
        None
    }
}

/// Zero-argument constructor used to materialize records on the read side.
pub type RecordFactory = fn() -> Box<dyn Record>;

/// The factory for a defaultable record type.
pub fn factory_of<T: Record + Default>() -> RecordFactory {
    make::<T>
}

fn make<T: Record + Default>() -> Box<dyn Record> {
    Box::new(T::default())
}

/// Recovers the concrete type behind a polymorphic record.
pub fn downcast<T: Record>(rec: Box<dyn Record>) -> Option<Box<T>> {
    let any: Box<dyn Any> = rec;
    any.downcast::<T>().ok()
}

/// Caller-supplied, versioned list of well-known types agreed out-of-band.
///
/// Members of the set are addressed on the wire by a negative token alone,
/// never through the type resolver. The reader asks for the version the
/// stream declares; `None` means the provider does not know that version.
pub trait DefaultTypeSet: Send + Sync {
    fn version(&self) -> i32;

    /// Ordered factories for the given set version. Order is the wire
    /// contract: entry `i` answers token `-(i + 1)`.
    fn entries(&self, version: i32) -> Option<Vec<(TypeId, RecordFactory)>>;
}
