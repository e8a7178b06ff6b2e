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

//! Generic container serialization.
//!
//! [`Element`] is the leaf contract: one value, written and read without a
//! null sentinel. [`Container`] is the count-bearing contract the archive's
//! `add_container` drives; implementations exist for the standard list,
//! deque, set and map shapes, and containers are themselves elements, so
//! nesting composes by monomorphization. A nested container is never null;
//! only the outermost one, behind `Option`, uses the `0` sentinel.
//!
//! The [`ExtensionFactory`] keeps type-erased modules for container types
//! that must be driven through `dyn Any`, populated once per concrete
//! instantiation and shared across threads.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::codec::{SectionReader, SectionWriter};
use crate::error::Error;
use crate::util::{Spinlock, EPOCH};

// guards preallocation against corrupt on-wire counts
const MAX_PREALLOC: usize = 4096;

/// A single non-null value inside a container.
pub trait Element: Sized + 'static {
    fn write_elem(&self, out: &mut dyn SectionWriter);
    fn read_elem(input: &mut dyn SectionReader) -> Result<Self, Error>;
}

/// A counted collection of elements. The count itself is written by the
/// caller, which is what lets the outermost container be nullable.
pub trait Container: Sized + 'static {
    fn count(&self) -> usize;
    fn write_elems(&self, out: &mut dyn SectionWriter);
    fn read_elems(input: &mut dyn SectionReader, count: usize) -> Result<Self, Error>;
}

macro_rules! scalar_element {
    ($ty:ty, $put:ident, $get:ident) => {
        impl Element for $ty {
            fn write_elem(&self, out: &mut dyn SectionWriter) {
                out.$put(*self);
            }

            fn read_elem(input: &mut dyn SectionReader) -> Result<Self, Error> {
                input.$get()
            }
        }
    };
}

scalar_element!(bool, put_bool, get_bool);
scalar_element!(u8, put_u8, get_u8);
scalar_element!(i8, put_i8, get_i8);
scalar_element!(u16, put_u16, get_u16);
scalar_element!(i16, put_i16, get_i16);
scalar_element!(u32, put_u32, get_u32);
scalar_element!(i32, put_i32, get_i32);
scalar_element!(u64, put_u64, get_u64);
scalar_element!(i64, put_i64, get_i64);
scalar_element!(u128, put_u128, get_u128);
scalar_element!(i128, put_i128, get_i128);
scalar_element!(f32, put_f32, get_f32);
scalar_element!(f64, put_f64, get_f64);
scalar_element!(char, put_char, get_char);

impl Element for String {
    fn write_elem(&self, out: &mut dyn SectionWriter) {
        out.put_string(Some(self));
    }

    fn read_elem(input: &mut dyn SectionReader) -> Result<Self, Error> {
        input
            .get_string()?
            .ok_or_else(|| Error::invalid_data("null string in a non-null position"))
    }
}

impl Element for NaiveDate {
    fn write_elem(&self, out: &mut dyn SectionWriter) {
        out.put_i32(self.signed_duration_since(EPOCH).num_days() as i32);
    }

    fn read_elem(input: &mut dyn SectionReader) -> Result<Self, Error> {
        let days = input.get_i32()?;
        EPOCH
            .checked_add_signed(chrono::TimeDelta::days(days as i64))
            .ok_or_else(|| Error::invalid_data(format!("date out of range: {days} days")))
    }
}

impl Element for NaiveDateTime {
    fn write_elem(&self, out: &mut dyn SectionWriter) {
        out.put_i64(self.and_utc().timestamp_micros());
    }

    fn read_elem(input: &mut dyn SectionReader) -> Result<Self, Error> {
        let micros = input.get_i64()?;
        chrono::DateTime::from_timestamp_micros(micros)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| Error::invalid_data(format!("timestamp out of range: {micros}")))
    }
}

impl<T: Element> Container for Vec<T> {
    fn count(&self) -> usize {
        self.len()
    }

    fn write_elems(&self, out: &mut dyn SectionWriter) {
        for elem in self {
            elem.write_elem(out);
        }
    }

    fn read_elems(input: &mut dyn SectionReader, count: usize) -> Result<Self, Error> {
        let mut out = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            out.push(T::read_elem(input)?);
        }
        Ok(out)
    }
}

impl<T: Element> Container for VecDeque<T> {
    fn count(&self) -> usize {
        self.len()
    }

    fn write_elems(&self, out: &mut dyn SectionWriter) {
        for elem in self {
            elem.write_elem(out);
        }
    }

    fn read_elems(input: &mut dyn SectionReader, count: usize) -> Result<Self, Error> {
        let mut out = VecDeque::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            out.push_back(T::read_elem(input)?);
        }
        Ok(out)
    }
}

impl<T: Element + Eq + Hash> Container for HashSet<T> {
    fn count(&self) -> usize {
        self.len()
    }

    fn write_elems(&self, out: &mut dyn SectionWriter) {
        for elem in self {
            elem.write_elem(out);
        }
    }

    fn read_elems(input: &mut dyn SectionReader, count: usize) -> Result<Self, Error> {
        let mut out = HashSet::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            out.insert(T::read_elem(input)?);
        }
        Ok(out)
    }
}

impl<T: Element + Ord> Container for BTreeSet<T> {
    fn count(&self) -> usize {
        self.len()
    }

    fn write_elems(&self, out: &mut dyn SectionWriter) {
        for elem in self {
            elem.write_elem(out);
        }
    }

    fn read_elems(input: &mut dyn SectionReader, count: usize) -> Result<Self, Error> {
        let mut out = BTreeSet::new();
        for _ in 0..count {
            out.insert(T::read_elem(input)?);
        }
        Ok(out)
    }
}

impl<K: Element + Eq + Hash, V: Element> Container for HashMap<K, V> {
    fn count(&self) -> usize {
        self.len()
    }

    fn write_elems(&self, out: &mut dyn SectionWriter) {
        for (key, value) in self {
            key.write_elem(out);
            value.write_elem(out);
        }
    }

    fn read_elems(input: &mut dyn SectionReader, count: usize) -> Result<Self, Error> {
        let mut out = HashMap::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            let key = K::read_elem(input)?;
            let value = V::read_elem(input)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl<K: Element + Ord, V: Element> Container for BTreeMap<K, V> {
    fn count(&self) -> usize {
        self.len()
    }

    fn write_elems(&self, out: &mut dyn SectionWriter) {
        for (key, value) in self {
            key.write_elem(out);
            value.write_elem(out);
        }
    }

    fn read_elems(input: &mut dyn SectionReader, count: usize) -> Result<Self, Error> {
        let mut out = BTreeMap::new();
        for _ in 0..count {
            let key = K::read_elem(input)?;
            let value = V::read_elem(input)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

macro_rules! element_from_container {
    ($ty:ident < $($g:ident),+ >, $($bounds:tt)+) => {
        impl<$($g),+> Element for $ty<$($g),+>
        where
            $($bounds)+
        {
            fn write_elem(&self, out: &mut dyn SectionWriter) {
                out.put_var_u32(self.count() as u32 + 1);
                self.write_elems(out);
            }

            fn read_elem(input: &mut dyn SectionReader) -> Result<Self, Error> {
                match input.get_var_u32()? {
                    0 => Err(Error::invalid_data("null container in a non-null position")),
                    n => Self::read_elems(input, n as usize - 1),
                }
            }
        }
    };
}

element_from_container!(Vec<T>, T: Element);
element_from_container!(VecDeque<T>, T: Element);
element_from_container!(HashSet<T>, T: Element + Eq + Hash);
element_from_container!(BTreeSet<T>, T: Element + Ord);
element_from_container!(HashMap<K, V>, K: Element + Eq + Hash, V: Element);
element_from_container!(BTreeMap<K, V>, K: Element + Ord, V: Element);

/// Type-erased serializer for one concrete container instantiation.
pub struct ContainerModule {
    pub write: fn(&dyn Any, &mut dyn SectionWriter) -> Result<(), Error>,
    pub read: fn(&mut dyn SectionReader) -> Result<Box<dyn Any>, Error>,
}

fn erased_write<C: Element>(value: &dyn Any, out: &mut dyn SectionWriter) -> Result<(), Error> {
    let container = value
        .downcast_ref::<C>()
        .ok_or_else(|| Error::invalid_data("container value does not match its module"))?;
    container.write_elem(out);
    Ok(())
}

fn erased_read<C: Element>(input: &mut dyn SectionReader) -> Result<Box<dyn Any>, Error> {
    Ok(Box::new(C::read_elem(input)?))
}

/// Shared cache of [`ContainerModule`]s, keyed by concrete container type.
///
/// Read-mostly after warm-up. A lookup for a type that was never populated
/// caches the miss, so repeated failing lookups stay cheap.
#[derive(Default)]
pub struct ExtensionFactory {
    modules: Spinlock<HashMap<TypeId, Option<Arc<ContainerModule>>>>,
}

impl ExtensionFactory {
    pub fn new() -> Self {
        ExtensionFactory::default()
    }

    /// The module for `C`, building and caching it on first use.
    pub fn module_of<C: Element>(&self) -> Arc<ContainerModule> {
        let key = TypeId::of::<C>();
        if let Some(Some(module)) = self.modules.lock().get(&key) {
            return Arc::clone(module);
        }
        let module = Arc::new(ContainerModule {
            write: erased_write::<C>,
            read: erased_read::<C>,
        });
        // double-check: another thread may have populated the slot meanwhile
        let mut modules = self.modules.lock();
        match modules.get(&key) {
            Some(Some(existing)) => Arc::clone(existing),
            _ => {
                modules.insert(key, Some(Arc::clone(&module)));
                module
            }
        }
    }

    /// Cache-only lookup by runtime type. A miss is recorded as a permanent
    /// negative entry and reported once.
    pub fn resolve(&self, rust_id: TypeId) -> Option<Arc<ContainerModule>> {
        let mut modules = self.modules.lock();
        match modules.get(&rust_id) {
            Some(Some(module)) => Some(Arc::clone(module)),
            Some(None) => None,
            None => {
                log::warn!("no container module registered for {rust_id:?}");
                modules.insert(rust_id, None);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::binary::{BinaryReader, BinaryWriter};

    #[test]
    fn nested_containers_compose() {
        let mut w = BinaryWriter::new();
        let value: Vec<Vec<i32>> = vec![vec![1, 2], vec![], vec![3]];
        value.write_elem(&mut w);
        let bytes = w.dump();

        let mut r = BinaryReader::new(&bytes);
        let back = <Vec<Vec<i32>>>::read_elem(&mut r).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn map_round_trip() {
        let mut w = BinaryWriter::new();
        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u64);
        value.insert("b".to_string(), 2u64);
        value.write_elem(&mut w);
        let bytes = w.dump();

        let mut r = BinaryReader::new(&bytes);
        let back = <BTreeMap<String, u64>>::read_elem(&mut r).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn timestamp_round_trip() {
        let stamp = chrono::DateTime::from_timestamp_micros(1_700_000_000_123_456)
            .unwrap()
            .naive_utc();
        let mut w = BinaryWriter::new();
        stamp.write_elem(&mut w);
        let bytes = w.dump();
        let mut r = BinaryReader::new(&bytes);
        assert_eq!(NaiveDateTime::read_elem(&mut r).unwrap(), stamp);
    }

    #[test]
    fn factory_caches_modules_and_misses() {
        let factory = ExtensionFactory::new();
        let module = factory.module_of::<Vec<u8>>();

        let mut w = BinaryWriter::new();
        let value: Box<dyn Any> = Box::new(vec![1u8, 2, 3]);
        (module.write)(value.as_ref(), &mut w).unwrap();
        let bytes = w.dump();

        let mut r = BinaryReader::new(&bytes);
        let cached = factory.resolve(TypeId::of::<Vec<u8>>()).unwrap();
        let back = (cached.read)(&mut r).unwrap();
        assert_eq!(*back.downcast::<Vec<u8>>().unwrap(), vec![1u8, 2, 3]);

        assert!(factory.resolve(TypeId::of::<Vec<i64>>()).is_none());
        assert!(factory.resolve(TypeId::of::<Vec<i64>>()).is_none());
    }
}
