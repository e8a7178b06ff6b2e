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

//! The three interchangeable type-identity strategies.
//!
//! Name writes one fully-qualified string per identity; GUID and ID write
//! one fixed-width identifier per node of the depth-first identity path.
//! An identity that was consumed whole but matches no registration resolves
//! to `Ok(None)`: one unknown type in one record is a data-quality problem
//! for that record alone, and the section framing around it keeps the rest
//! of the stream parseable. A path *node* nobody registered is different:
//! its arity, and with it the extent of its argument list, is unknowable,
//! so nothing after it on the wire can be trusted and the read aborts.

use crate::codec::{SectionReader, SectionWriter};
use crate::error::Error;
use crate::resolver::registry::{RegisteredType, TypeRegistry};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Fully-qualified type name. Simplest, largest, no identifier
    /// assignment needed.
    #[default]
    Name,
    /// 128-bit GUID per identity node.
    Guid,
    /// 16-bit group/local pair per identity node. Most compact.
    Id,
}

pub struct TypeResolver {
    strategy: Strategy,
}

impl TypeResolver {
    pub fn new(strategy: Strategy) -> Self {
        TypeResolver { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Writes the full identity of a registered type, emitted once per
    /// dynamic-table entry.
    pub fn write_identity(&self, out: &mut dyn SectionWriter, entry: &RegisteredType) {
        match self.strategy {
            Strategy::Name => out.put_string(Some(&entry.full_name)),
            Strategy::Guid => {
                for node in &entry.path {
                    out.put_u128(node.guid);
                }
            }
            Strategy::Id => {
                for node in &entry.path {
                    out.put_u16(node.id.code());
                }
            }
        }
    }

    /// Reads one full identity and resolves it against the registry.
    /// `Ok(None)` means the identity was consumed whole but not registered
    /// locally; it is up to the caller to skip or keep going. A path node
    /// with no locally known arity is a hard error: the walk cannot tell
    /// where that identity ends, so continuing would desynchronize the
    /// stream.
    pub fn read_identity<'r>(
        &self,
        input: &mut dyn SectionReader,
        registry: &'r TypeRegistry,
    ) -> Result<Option<&'r RegisteredType>, Error> {
        match self.strategy {
            Strategy::Name => {
                let name = input
                    .get_string()?
                    .ok_or_else(|| Error::invalid_data("null type name on wire"))?;
                let entry = registry.entry_by_name(&name);
                if entry.is_none() {
                    log::debug!("unresolved type name {name:?}");
                }
                Ok(entry)
            }
            Strategy::Guid => {
                let mut path = Vec::new();
                read_guid_path(input, registry, &mut path)?;
                Ok(registry.entry_by_guid_path(&path))
            }
            Strategy::Id => {
                let mut path = Vec::new();
                read_id_path(input, registry, &mut path)?;
                Ok(registry.entry_by_id_path(&path))
            }
        }
    }
}

fn read_guid_path(
    input: &mut dyn SectionReader,
    registry: &TypeRegistry,
    path: &mut Vec<u128>,
) -> Result<(), Error> {
    let guid = input.get_u128()?;
    path.push(guid);
    let Some(arity) = registry.arity_of_guid(guid) else {
        return Err(Error::invalid_data(format!(
            "type guid {guid:#x} in an identity path has unknown arity"
        )));
    };
    for _ in 0..arity {
        read_guid_path(input, registry, path)?;
    }
    Ok(())
}

fn read_id_path(
    input: &mut dyn SectionReader,
    registry: &TypeRegistry,
    path: &mut Vec<u16>,
) -> Result<(), Error> {
    let code = input.get_u16()?;
    path.push(code);
    let Some(arity) = registry.arity_of_id(code) else {
        return Err(Error::invalid_data(format!(
            "type id {code:#06x} in an identity path has unknown arity"
        )));
    };
    for _ in 0..arity {
        read_id_path(input, registry, path)?;
    }
    Ok(())
}
