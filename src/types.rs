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

//! Wire constants and reserved identifiers.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Current protocol byte. Protocol 2 added the framing-mode flag to the header.
pub const PROTOCOL_ID: u8 = 2;

/// Trailing header byte, always zero, kept for future use.
pub const RESERVED_HEADER_BYTE: u8 = 0;

/// Header value meaning "no default type set in effect".
pub const NO_DEFAULT_TYPE_SET: i32 = -1;

/// Type token written for a null reference record.
pub const NULL_TOKEN: i16 = 0;

/// Reserved wire identifiers, encoded as `(group << 8) | local`.
///
/// Group 0 holds the scalar leaves so they can appear as generic arguments
/// without per-crate registration; group 1 holds the generic container
/// definitions used by composed identity paths. User registrations must use
/// groups 2 and above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum ReservedIdent {
    Bool = 0x0001,
    I8 = 0x0002,
    U8 = 0x0003,
    I16 = 0x0004,
    U16 = 0x0005,
    I32 = 0x0006,
    U32 = 0x0007,
    I64 = 0x0008,
    U64 = 0x0009,
    F32 = 0x000A,
    F64 = 0x000B,
    Char = 0x000C,
    Decimal = 0x000D,
    String = 0x000E,
    Bytes = 0x000F,
    Guid = 0x0010,
    Timestamp = 0x0011,
    List = 0x0101,
    Map = 0x0102,
    Set = 0x0103,
    Deque = 0x0104,
    SortedMap = 0x0105,
    SortedSet = 0x0106,
}

impl ReservedIdent {
    /// Generic arity of the definition this identifier names.
    pub fn arity(self) -> u8 {
        match self {
            ReservedIdent::List
            | ReservedIdent::Set
            | ReservedIdent::Deque
            | ReservedIdent::SortedSet => 1,
            ReservedIdent::Map | ReservedIdent::SortedMap => 2,
            _ => 0,
        }
    }

    pub fn group(self) -> u8 {
        (u16::from(self) >> 8) as u8
    }

    pub fn local(self) -> u8 {
        (u16::from(self) & 0xFF) as u8
    }

    /// Canonical display name, used when identities travel by name and when
    /// composing generic type names.
    pub fn name(self) -> &'static str {
        match self {
            ReservedIdent::Bool => "bool",
            ReservedIdent::I8 => "i8",
            ReservedIdent::U8 => "u8",
            ReservedIdent::I16 => "i16",
            ReservedIdent::U16 => "u16",
            ReservedIdent::I32 => "i32",
            ReservedIdent::U32 => "u32",
            ReservedIdent::I64 => "i64",
            ReservedIdent::U64 => "u64",
            ReservedIdent::F32 => "f32",
            ReservedIdent::F64 => "f64",
            ReservedIdent::Char => "char",
            ReservedIdent::Decimal => "decimal",
            ReservedIdent::String => "string",
            ReservedIdent::Bytes => "bytes",
            ReservedIdent::Guid => "guid",
            ReservedIdent::Timestamp => "timestamp",
            ReservedIdent::List => "list",
            ReservedIdent::Map => "map",
            ReservedIdent::Set => "set",
            ReservedIdent::Deque => "deque",
            ReservedIdent::SortedMap => "sorted_map",
            ReservedIdent::SortedSet => "sorted_set",
        }
    }
}

/// Lowest identifier group available to user registrations.
pub const FIRST_USER_GROUP: u8 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ident_groups() {
        assert_eq!(ReservedIdent::Bool.group(), 0);
        assert_eq!(ReservedIdent::Map.group(), 1);
        assert_eq!(ReservedIdent::Map.local(), 2);
        assert_eq!(ReservedIdent::Map.arity(), 2);
        assert_eq!(ReservedIdent::List.arity(), 1);
        assert_eq!(ReservedIdent::Guid.arity(), 0);
    }

    #[test]
    fn reserved_ident_round_trips_through_u16() {
        let code: u16 = ReservedIdent::Timestamp.into();
        assert_eq!(ReservedIdent::try_from(code).unwrap(), ReservedIdent::Timestamp);
        assert!(ReservedIdent::try_from(0xFFFFu16).is_err());
    }
}
