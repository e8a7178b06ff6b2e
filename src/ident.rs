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

//! Stable wire identity for registered types.
//!
//! A type carries three interchangeable identifiers so any resolver strategy
//! can be picked per stream: a fully-qualified name, a 128-bit GUID, and a
//! compact group/local pair. Generic definitions additionally carry an
//! arity; a closed generic type is identified on the wire by its definition
//! followed by each argument's identity, depth-first.

use std::borrow::Cow;

use crate::types::ReservedIdent;

/// Compact 16-bit identifier: a group byte and a local byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WireId {
    pub group: u8,
    pub local: u8,
}

impl WireId {
    pub fn new(group: u8, local: u8) -> Self {
        WireId { group, local }
    }

    pub fn code(self) -> u16 {
        ((self.group as u16) << 8) | self.local as u16
    }

    pub fn from_code(code: u16) -> Self {
        WireId {
            group: (code >> 8) as u8,
            local: (code & 0xFF) as u8,
        }
    }
}

/// Declarative identity attached to a registered type or generic definition.
///
/// A guid of `0` or an id of `(0, 0)` means the identifier was never
/// assigned; such a type is reachable by name only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeIdentity {
    pub name: Cow<'static, str>,
    pub guid: u128,
    pub id: WireId,
    pub arity: u8,
}

impl TypeIdentity {
    pub fn new<S: Into<Cow<'static, str>>>(name: S) -> Self {
        TypeIdentity {
            name: name.into(),
            guid: 0,
            id: WireId::new(0, 0),
            arity: 0,
        }
    }

    pub fn guid(mut self, guid: u128) -> Self {
        self.guid = guid;
        self
    }

    pub fn id(mut self, group: u8, local: u8) -> Self {
        self.id = WireId::new(group, local);
        self
    }

    pub fn arity(mut self, arity: u8) -> Self {
        self.arity = arity;
        self
    }

    /// Identity of a reserved system definition, usable as a generic
    /// argument or definition in an identity path without registration.
    /// GUIDs for these are fixed values in a namespace user GUIDs will not
    /// collide with.
    pub fn system(ident: ReservedIdent) -> Self {
        let code: u16 = ident.into();
        TypeIdentity {
            name: Cow::Borrowed(ident.name()),
            guid: 0xFFFF_0000_0000_0000_0000_0000_0000_0000u128 | code as u128,
            id: WireId::from_code(code),
            arity: ident.arity(),
        }
    }
}
