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

//! Schema-evolvable hierarchical serialization.
//!
//! Strata turns typed trees of records into byte streams and back across
//! interchangeable physical encodings. Records describe their own fields
//! once, through a mode-discriminated [`Archive`], and the engine supplies
//! the rest: type-identity negotiation for polymorphic references, ambient
//! schema versions so a record can branch its layout over time, and section
//! framing that contains a corrupt record to its own span of the stream.
//!
//! ```
//! use strata::{Archive, Error, Record, Strata, TypeIdentity};
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Record for Point {
//!     fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
//!         ar.add_i32(&mut self.x)?;
//!         ar.add_i32(&mut self.y)
//!     }
//! }
//!
//! # fn main() -> Result<(), Error> {
//! let mut strata = Strata::new();
//! strata.register::<Point>(TypeIdentity::new("demo.Point").guid(0x10).id(2, 1))?;
//!
//! let mut value: Option<Box<dyn Record>> = Some(Box::new(Point { x: 3, y: -4 }));
//! let bytes = strata.serialize(&mut value)?;
//! let back = strata.deserialize(&bytes)?.unwrap();
//! assert_eq!(*strata::downcast::<Point>(back).unwrap(), Point { x: 3, y: -4 });
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod codec;
pub mod container;
pub mod engine;
pub mod error;
pub mod ident;
pub mod resolver;
pub mod strata;
pub mod types;
pub mod util;

pub use crate::container::{Container, Element, ExtensionFactory};
pub use crate::engine::{downcast, factory_of, Archive, DefaultTypeSet, Record, RecordFactory};
pub use crate::error::{Error, ErrorCallback};
pub use crate::ident::{TypeIdentity, WireId};
pub use crate::resolver::{Strategy, TypeRegistry, TypeResolver};
pub use crate::strata::Strata;
