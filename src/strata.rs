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

//! The crate facade.
//!
//! A [`Strata`] instance holds the registration and configuration state that
//! outlives any single stream: the type registry, the resolver strategy, the
//! framing preference, the optional default type set and the error callback.
//! `serialize`/`deserialize` run one record through a pooled fixed-buffer
//! backend; `writer`/`reader` open an [`Archive`] over any backend the
//! caller supplies.

use std::any::TypeId;

use crate::codec::binary::{BinaryReader, BinaryWriter};
use crate::codec::{SectionReader, SectionWriter};
use crate::engine::{factory_of, Archive, DefaultTypeSet, Record};
use crate::error::{Error, ErrorCallback};
use crate::ident::TypeIdentity;
use crate::resolver::{Pool, Strategy, TypeRegistry, TypeResolver};

pub struct Strata {
    registry: TypeRegistry,
    resolver: TypeResolver,
    framing: bool,
    default_set: Option<Box<dyn DefaultTypeSet>>,
    callback: Option<ErrorCallback>,
    writers: Pool<BinaryWriter>,
}

impl Default for Strata {
    fn default() -> Self {
        Strata {
            registry: TypeRegistry::default(),
            resolver: TypeResolver::new(Strategy::default()),
            framing: true,
            default_set: None,
            callback: None,
            writers: Pool::new(BinaryWriter::new),
        }
    }
}

impl Strata {
    pub fn new() -> Self {
        Strata::default()
    }

    /// Whether streams produced by this instance frame each record in a
    /// section. Disabling framing shrinks the wire format and gives up
    /// corruption containment.
    pub fn framing(mut self, enabled: bool) -> Self {
        self.framing = enabled;
        self
    }

    /// Picks how type identities travel on the wire.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.resolver = TypeResolver::new(strategy);
        self
    }

    /// Installs a callback invoked for every soft error as it is reported.
    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Installs the out-of-band default type set shared with peers.
    pub fn default_types(mut self, provider: Box<dyn DefaultTypeSet>) -> Self {
        self.default_set = Some(provider);
        self
    }

    /// Registers a record type under a single wire identity.
    pub fn register<T: Record + Default>(&mut self, identity: TypeIdentity) -> Result<(), Error> {
        self.registry
            .register(TypeId::of::<T>(), factory_of::<T>(), identity)
    }

    /// Registers a closed generic record type under a depth-first identity
    /// path: the definition's identity followed by each argument's, in
    /// declaration order.
    pub fn register_path<T: Record + Default>(
        &mut self,
        path: Vec<TypeIdentity>,
    ) -> Result<(), Error> {
        self.registry
            .register_path(TypeId::of::<T>(), factory_of::<T>(), path)
    }

    /// Serializes one record to a standalone byte stream using a pooled
    /// fixed-buffer writer. Soft errors go to the callback; the bytes are
    /// still produced.
    pub fn serialize(&self, value: &mut Option<Box<dyn Record>>) -> Result<Vec<u8>, Error> {
        self.writers.borrow_mut(|out| {
            out.reset();
            let mut ar = self.writer(out)?;
            ar.add_class(value)?;
            ar.finish();
            Ok(out.dump())
        })
    }

    /// Deserializes one record from a byte stream produced by [`serialize`].
    ///
    /// [`serialize`]: Strata::serialize
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Option<Box<dyn Record>>, Error> {
        let mut input = BinaryReader::new(bytes);
        let mut ar = self.reader(&mut input)?;
        let mut value = None;
        ar.add_class(&mut value)?;
        ar.finish();
        Ok(value)
    }

    /// Opens a writing archive over a caller-supplied backend.
    pub fn writer<'a>(&'a self, out: &'a mut dyn SectionWriter) -> Result<Archive<'a>, Error> {
        Archive::for_write(
            out,
            &self.registry,
            &self.resolver,
            self.framing,
            self.default_set.as_deref(),
            self.callback.clone(),
        )
    }

    /// Opens a reading archive over a caller-supplied backend.
    pub fn reader<'a>(&'a self, input: &'a mut dyn SectionReader) -> Result<Archive<'a>, Error> {
        Archive::for_read(
            input,
            &self.registry,
            &self.resolver,
            self.default_set.as_deref(),
            self.callback.clone(),
        )
    }
}
