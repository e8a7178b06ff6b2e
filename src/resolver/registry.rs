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

//! Construction-time registry of constructible record types.
//!
//! There is no runtime reflection here: every type that can appear behind a
//! polymorphic reference is registered up front with a zero-argument factory
//! and its wire identity. Closed generic types register an identity *path*
//! (definition followed by arguments, depth-first), which is the
//! monomorphized answer to building generic types at runtime. Identifier
//! collisions are a fatal registration error; an identifier missing at read
//! time is a soft failure handled by the resolver.

use std::any::TypeId;
use std::collections::HashMap;

use crate::engine::RecordFactory;
use crate::error::Error;
use crate::ident::TypeIdentity;
use crate::types::{ReservedIdent, FIRST_USER_GROUP};

/// One registered constructible type.
pub struct RegisteredType {
    /// Depth-first identity path; a single node for non-generic records.
    pub path: Vec<TypeIdentity>,
    /// Composed display name, e.g. `list<demo.Point>`.
    pub full_name: String,
    pub factory: RecordFactory,
    pub rust_id: TypeId,
}

const RESERVED: &[ReservedIdent] = &[
    ReservedIdent::Bool,
    ReservedIdent::I8,
    ReservedIdent::U8,
    ReservedIdent::I16,
    ReservedIdent::U16,
    ReservedIdent::I32,
    ReservedIdent::U32,
    ReservedIdent::I64,
    ReservedIdent::U64,
    ReservedIdent::F32,
    ReservedIdent::F64,
    ReservedIdent::Char,
    ReservedIdent::Decimal,
    ReservedIdent::String,
    ReservedIdent::Bytes,
    ReservedIdent::Guid,
    ReservedIdent::Timestamp,
    ReservedIdent::List,
    ReservedIdent::Map,
    ReservedIdent::Set,
    ReservedIdent::Deque,
    ReservedIdent::SortedMap,
    ReservedIdent::SortedSet,
];

pub struct TypeRegistry {
    entries: Vec<RegisteredType>,
    by_rust: HashMap<TypeId, usize>,
    by_name: HashMap<String, usize>,
    by_guid_path: HashMap<Vec<u128>, usize>,
    by_id_path: HashMap<Vec<u16>, usize>,
    // per-node arity tables, consulted while parsing depth-first identity
    arity_by_guid: HashMap<u128, u8>,
    arity_by_id: HashMap<u16, u8>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = TypeRegistry {
            entries: Vec::new(),
            by_rust: HashMap::new(),
            by_name: HashMap::new(),
            by_guid_path: HashMap::new(),
            by_id_path: HashMap::new(),
            arity_by_guid: HashMap::new(),
            arity_by_id: HashMap::new(),
        };
        for ident in RESERVED {
            let identity = TypeIdentity::system(*ident);
            registry.arity_by_guid.insert(identity.guid, identity.arity);
            registry
                .arity_by_id
                .insert(identity.id.code(), identity.arity);
        }
        registry
    }
}

impl TypeRegistry {
    /// Registers a non-generic record under a single identity.
    pub fn register(
        &mut self,
        rust_id: TypeId,
        factory: RecordFactory,
        identity: TypeIdentity,
    ) -> Result<(), Error> {
        self.register_path(rust_id, factory, vec![identity])
    }

    /// Registers a closed generic record under a depth-first identity path.
    pub fn register_path(
        &mut self,
        rust_id: TypeId,
        factory: RecordFactory,
        path: Vec<TypeIdentity>,
    ) -> Result<(), Error> {
        validate_path(&path)?;
        let full_name = compose_name(&path);
        let index = self.entries.len();

        if self.by_rust.contains_key(&rust_id) {
            return Err(Error::duplicate_identity(format!(
                "type already registered as {full_name}"
            )));
        }
        if self.by_name.contains_key(&full_name) {
            return Err(Error::duplicate_identity(full_name));
        }
        // guid 0 and id (0, 0) mean "never assigned": such a path lives only
        // in the name index, so name-only registrations cannot collide
        let guid_path: Option<Vec<u128>> = path
            .iter()
            .map(|n| (n.guid != 0).then_some(n.guid))
            .collect();
        if let Some(guid_path) = &guid_path {
            if self.by_guid_path.contains_key(guid_path) {
                return Err(Error::duplicate_identity(format!(
                    "guid path of {full_name}"
                )));
            }
        }
        let id_path: Option<Vec<u16>> = path
            .iter()
            .map(|n| (n.id.code() != 0).then_some(n.id.code()))
            .collect();
        if let Some(id_path) = &id_path {
            if self.by_id_path.contains_key(id_path) {
                return Err(Error::duplicate_identity(format!("id path of {full_name}")));
            }
        }
        for node in &path {
            if node.guid != 0 {
                if let Some(prev) = self.arity_by_guid.get(&node.guid) {
                    if *prev != node.arity {
                        return Err(Error::duplicate_identity(format!(
                            "guid {:#x} registered with conflicting arity",
                            node.guid
                        )));
                    }
                }
            }
            if node.id.code() != 0 {
                if let Some(prev) = self.arity_by_id.get(&node.id.code()) {
                    if *prev != node.arity {
                        return Err(Error::duplicate_identity(format!(
                            "id {}/{} registered with conflicting arity",
                            node.id.group, node.id.local
                        )));
                    }
                }
            }
        }

        for node in &path {
            if node.guid != 0 {
                self.arity_by_guid.insert(node.guid, node.arity);
            }
            if node.id.code() != 0 {
                self.arity_by_id.insert(node.id.code(), node.arity);
            }
        }
        self.by_rust.insert(rust_id, index);
        self.by_name.insert(full_name.clone(), index);
        if let Some(guid_path) = guid_path {
            self.by_guid_path.insert(guid_path, index);
        }
        if let Some(id_path) = id_path {
            self.by_id_path.insert(id_path, index);
        }
        log::debug!("registered record type {full_name}");
        self.entries.push(RegisteredType {
            path,
            full_name,
            factory,
            rust_id,
        });
        Ok(())
    }

    pub fn entry_by_rust(&self, rust_id: TypeId) -> Option<&RegisteredType> {
        self.by_rust.get(&rust_id).map(|i| &self.entries[*i])
    }

    pub fn entry_by_name(&self, name: &str) -> Option<&RegisteredType> {
        self.by_name.get(name).map(|i| &self.entries[*i])
    }

    pub fn entry_by_guid_path(&self, path: &[u128]) -> Option<&RegisteredType> {
        self.by_guid_path.get(path).map(|i| &self.entries[*i])
    }

    pub fn entry_by_id_path(&self, path: &[u16]) -> Option<&RegisteredType> {
        self.by_id_path.get(path).map(|i| &self.entries[*i])
    }

    pub fn arity_of_guid(&self, guid: u128) -> Option<u8> {
        self.arity_by_guid.get(&guid).copied()
    }

    pub fn arity_of_id(&self, code: u16) -> Option<u8> {
        self.arity_by_id.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_path(path: &[TypeIdentity]) -> Result<(), Error> {
    if path.is_empty() {
        return Err(Error::invalid_data("empty identity path"));
    }
    if path[0].id.group != 0 && path[0].id.group < FIRST_USER_GROUP && path[0].arity == 0 {
        return Err(Error::duplicate_identity(format!(
            "identifier group {} is reserved",
            path[0].id.group
        )));
    }
    // the path must encode exactly one complete depth-first tree
    let mut i = 0usize;
    walk(path, &mut i)?;
    if i != path.len() {
        return Err(Error::invalid_data("identity path has trailing nodes"));
    }
    Ok(())
}

fn walk(path: &[TypeIdentity], i: &mut usize) -> Result<(), Error> {
    let Some(node) = path.get(*i) else {
        return Err(Error::invalid_data("identity path is truncated"));
    };
    *i += 1;
    for _ in 0..node.arity {
        walk(path, i)?;
    }
    Ok(())
}

fn compose_name(path: &[TypeIdentity]) -> String {
    fn render(path: &[TypeIdentity], i: &mut usize, out: &mut String) {
        let node = &path[*i];
        *i += 1;
        out.push_str(&node.name);
        if node.arity > 0 {
            out.push('<');
            for a in 0..node.arity {
                if a > 0 {
                    out.push(',');
                }
                render(path, i, out);
            }
            out.push('>');
        }
    }
    let mut out = String::new();
    let mut i = 0;
    render(path, &mut i, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{factory_of, Archive, Record};

    #[derive(Default)]
    struct Dummy;

    impl Record for Dummy {
        fn fields(&mut self, _ar: &mut Archive<'_>) -> Result<(), Error> {
            Ok(())
        }
    }

    fn dummy_identity() -> TypeIdentity {
        TypeIdentity::new("test.Dummy").guid(0xD000_0001).id(2, 1)
    }

    #[test]
    fn duplicate_identity_is_fatal() {
        let mut reg = TypeRegistry::default();
        reg.register(TypeId::of::<Dummy>(), factory_of::<Dummy>(), dummy_identity())
            .unwrap();
        let err = reg
            .register(TypeId::of::<String>(), factory_of::<Dummy>(), dummy_identity())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(_)));
    }

    #[test]
    fn name_only_registrations_do_not_collide() {
        #[derive(Default)]
        struct Other;
        impl Record for Other {
            fn fields(&mut self, _ar: &mut Archive<'_>) -> Result<(), Error> {
                Ok(())
            }
        }

        let mut reg = TypeRegistry::default();
        reg.register(
            TypeId::of::<Dummy>(),
            factory_of::<Dummy>(),
            TypeIdentity::new("test.Alpha"),
        )
        .unwrap();
        reg.register(
            TypeId::of::<Other>(),
            factory_of::<Other>(),
            TypeIdentity::new("test.Beta"),
        )
        .unwrap();
        assert!(reg.entry_by_name("test.Beta").is_some());
    }

    #[test]
    fn composed_generic_name() {
        let path = vec![
            TypeIdentity::system(ReservedIdent::Map),
            TypeIdentity::system(ReservedIdent::String),
            TypeIdentity::new("test.Dummy").guid(0xD000_0001).id(2, 1),
        ];
        assert_eq!(compose_name(&path), "map<string,test.Dummy>");
        assert!(validate_path(&path).is_ok());
    }

    #[test]
    fn truncated_path_is_rejected() {
        let path = vec![TypeIdentity::system(ReservedIdent::Map)];
        assert!(validate_path(&path).is_err());
    }
}
