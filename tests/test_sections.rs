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

//! Corruption containment at section boundaries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strata::codec::binary::{BinaryReader, BinaryWriter};
use strata::{downcast, Archive, Error, Record, Strata, TypeIdentity};

/// Writes one field but reads two, simulating a record whose payload was
/// shortened on the wire.
#[derive(Default, Debug, PartialEq)]
struct Lopsided {
    a: i32,
    b: i32,
}

impl Record for Lopsided {
    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
        ar.add_i32(&mut self.a)?;
        if ar.is_reading() {
            ar.add_i32(&mut self.b)?;
        }
        Ok(())
    }
}

#[derive(Default, Debug, PartialEq)]
struct Healthy {
    text: Option<String>,
}

impl Record for Healthy {
    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
        ar.add_string(&mut self.text)
    }
}

fn paired_strata() -> Strata {
    let mut strata = Strata::new();
    strata
        .register::<Lopsided>(TypeIdentity::new("test.Lopsided").guid(0x51).id(2, 1))
        .unwrap();
    strata
        .register::<Healthy>(TypeIdentity::new("test.Healthy").guid(0x52).id(2, 2))
        .unwrap();
    strata
}

#[test]
fn sibling_survives_corrupt_record() {
    let strata = paired_strata();
    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();
    let mut first: Option<Box<dyn Record>> = Some(Box::new(Lopsided { a: 1, b: 0 }));
    let mut second: Option<Box<dyn Record>> = Some(Box::new(Healthy {
        text: Some("intact".into()),
    }));
    ar.add_class(&mut first).unwrap();
    ar.add_class(&mut second).unwrap();
    assert!(ar.finish().is_empty());
    let bytes = out.dump();

    let mut input = BinaryReader::new(&bytes);
    let mut ar = strata.reader(&mut input).unwrap();
    let mut first: Option<Box<dyn Record>> = None;
    let mut second: Option<Box<dyn Record>> = None;
    ar.add_class(&mut first).unwrap();
    ar.add_class(&mut second).unwrap();
    let soft = ar.finish();

    // the overrun is detected and reported, the record is still handed back
    assert_eq!(soft.len(), 1);
    assert!(matches!(soft[0], Error::FramingMismatch(_)));
    let first = downcast::<Lopsided>(first.unwrap()).unwrap();
    assert_eq!(first.a, 1);

    // the sibling after the corrupt record reads cleanly
    let second = downcast::<Healthy>(second.unwrap()).unwrap();
    assert_eq!(second.text.as_deref(), Some("intact"));
}

#[test]
fn field_failure_is_contained() {
    #[derive(Default)]
    struct Sour;
    impl Record for Sour {
        fn fields(&mut self, _ar: &mut Archive<'_>) -> Result<(), Error> {
            Err(Error::field_error("deliberate"))
        }
    }

    let mut strata = paired_strata();
    strata
        .register::<Sour>(TypeIdentity::new("test.Sour").guid(0x53).id(2, 3))
        .unwrap();

    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();
    let mut bad: Option<Box<dyn Record>> = Some(Box::new(Sour));
    let mut good: Option<Box<dyn Record>> = Some(Box::new(Healthy {
        text: Some("after".into()),
    }));
    ar.add_class(&mut bad).unwrap();
    ar.add_class(&mut good).unwrap();
    let soft = ar.finish();
    assert_eq!(soft.len(), 1);
    assert!(matches!(soft[0], Error::FieldError(_)));

    let bytes = out.dump();
    let mut input = BinaryReader::new(&bytes);
    let mut ar = strata.reader(&mut input).unwrap();
    let mut bad: Option<Box<dyn Record>> = None;
    let mut good: Option<Box<dyn Record>> = None;
    ar.add_class(&mut bad).unwrap();
    ar.add_class(&mut good).unwrap();
    assert!(bad.is_some());
    assert_eq!(
        downcast::<Healthy>(good.unwrap()).unwrap().text.as_deref(),
        Some("after")
    );
}

#[test]
fn soft_errors_reach_the_callback() {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let mut strata = Strata::new().on_error(Arc::new(move |_err: &Error| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    strata
        .register::<Lopsided>(TypeIdentity::new("test.Lopsided").guid(0x51).id(2, 1))
        .unwrap();

    let mut value: Option<Box<dyn Record>> = Some(Box::new(Lopsided { a: 5, b: 0 }));
    let bytes = strata.serialize(&mut value).unwrap();
    strata.deserialize(&bytes).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn struct_failures_propagate() {
    // no section around a value record, so there is nothing to contain the
    // failure at and it reaches the caller
    #[derive(Default)]
    struct Sour;
    impl Record for Sour {
        fn fields(&mut self, _ar: &mut Archive<'_>) -> Result<(), Error> {
            Err(Error::field_error("deliberate"))
        }
    }

    let strata = Strata::new();
    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();
    let mut value = Sour;
    assert!(ar.add_struct(&mut value).is_err());
}
