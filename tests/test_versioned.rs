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

//! Ambient schema versions and layout evolution.

use strata::codec::binary::{BinaryReader, BinaryWriter};
use strata::{downcast, Archive, Error, Record, Strata, TypeIdentity};

#[derive(Default, Debug, PartialEq)]
struct VersionWitness {
    seen_version: u8,
}

impl Record for VersionWitness {
    fn version(&self) -> Option<u8> {
        Some(134)
    }

    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
        self.seen_version = ar.version();
        ar.add_u8(&mut self.seen_version)
    }
}

#[test]
fn ambient_version_is_visible_inside_fields() {
    let mut strata = Strata::new();
    strata
        .register::<VersionWitness>(TypeIdentity::new("test.Witness").guid(0x70).id(2, 1))
        .unwrap();

    let mut value: Option<Box<dyn Record>> = Some(Box::new(VersionWitness::default()));
    let bytes = strata.serialize(&mut value).unwrap();
    // writer side observed its own version
    let back = downcast::<VersionWitness>(strata.deserialize(&bytes).unwrap().unwrap()).unwrap();
    // reader side observed the version carried on the wire
    assert_eq!(back.seen_version, 134);
}

#[test]
fn version_stack_nests() {
    #[derive(Default)]
    struct Outer {
        inner: Option<VersionWitness>,
        outer_version_after_inner: u8,
    }

    impl Record for Outer {
        fn version(&self) -> Option<u8> {
            Some(7)
        }

        fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
            assert_eq!(ar.version(), 7);
            ar.add_static_class(&mut self.inner)?;
            // the inner record's version was popped on exit
            self.outer_version_after_inner = ar.version();
            ar.add_u8(&mut self.outer_version_after_inner)
        }
    }

    let strata = Strata::new();
    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();
    let mut value = Some(Outer {
        inner: Some(VersionWitness::default()),
        outer_version_after_inner: 0,
    });
    ar.add_static_class(&mut value).unwrap();
    assert!(ar.finish().is_empty());

    let bytes = out.dump();
    let mut input = BinaryReader::new(&bytes);
    let mut ar = strata.reader(&mut input).unwrap();
    let mut back: Option<Outer> = None;
    ar.add_static_class(&mut back).unwrap();
    assert!(ar.finish().is_empty());
    let back = back.unwrap();
    assert_eq!(back.outer_version_after_inner, 7);
    assert_eq!(back.inner.unwrap().seen_version, 134);
}

// Two editions of "app.Doc": version 1 has only the base field, version 2
// appends an extra one and branches on the ambient version.
#[derive(Default, Debug, PartialEq)]
struct DocV1 {
    base: i32,
}

impl Record for DocV1 {
    fn version(&self) -> Option<u8> {
        Some(1)
    }

    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
        ar.add_i32(&mut self.base)
    }
}

#[derive(Default, Debug, PartialEq)]
struct DocV2 {
    base: i32,
    extra: i32,
}

impl Record for DocV2 {
    fn version(&self) -> Option<u8> {
        Some(2)
    }

    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
        ar.add_i32(&mut self.base)?;
        if ar.version() >= 2 {
            ar.add_i32(&mut self.extra)?;
        }
        Ok(())
    }
}

fn doc_identity() -> TypeIdentity {
    TypeIdentity::new("app.Doc").guid(0xD0C).id(2, 9)
}

#[test]
fn new_reader_accepts_old_stream() {
    let mut writer = Strata::new();
    writer.register::<DocV1>(doc_identity()).unwrap();
    let mut reader = Strata::new();
    reader.register::<DocV2>(doc_identity()).unwrap();

    let mut value: Option<Box<dyn Record>> = Some(Box::new(DocV1 { base: 41 }));
    let bytes = writer.serialize(&mut value).unwrap();
    let back = downcast::<DocV2>(reader.deserialize(&bytes).unwrap().unwrap()).unwrap();
    assert_eq!(*back, DocV2 { base: 41, extra: 0 });
}

#[test]
fn old_reader_skips_newer_fields() {
    let mut writer = Strata::new();
    writer.register::<DocV2>(doc_identity()).unwrap();
    let mut reader = Strata::new();
    reader.register::<DocV1>(doc_identity()).unwrap();

    let mut out = BinaryWriter::new();
    let mut ar = writer.writer(&mut out).unwrap();
    let mut value: Option<Box<dyn Record>> = Some(Box::new(DocV2 { base: 8, extra: 99 }));
    let mut after: Option<Box<dyn Record>> = Some(Box::new(DocV2 { base: 9, extra: 0 }));
    ar.add_class(&mut value).unwrap();
    ar.add_class(&mut after).unwrap();
    assert!(ar.finish().is_empty());

    let bytes = out.dump();
    let mut input = BinaryReader::new(&bytes);
    let mut ar = reader.reader(&mut input).unwrap();
    let mut first: Option<Box<dyn Record>> = None;
    let mut second: Option<Box<dyn Record>> = None;
    ar.add_class(&mut first).unwrap();
    ar.add_class(&mut second).unwrap();
    let soft = ar.finish();

    // the unread extra field shows up as a framing report, the known
    // fields and the following record are intact
    assert_eq!(soft.len(), 2);
    assert!(soft
        .iter()
        .all(|e| matches!(e, Error::FramingMismatch(_))));
    assert_eq!(downcast::<DocV1>(first.unwrap()).unwrap().base, 8);
    assert_eq!(downcast::<DocV1>(second.unwrap()).unwrap().base, 9);
}
