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

use rand::Rng;
use strata::codec::binary::{BinaryReader, BinaryWriter};
use strata::{downcast, Archive, Error, Record, Strata, TypeIdentity};

#[derive(Clone, Default, Debug, PartialEq)]
struct Everything {
    flag: bool,
    tiny: i8,
    wide: i64,
    huge: i128,
    ratio: f64,
    glyph: char,
    name: Option<String>,
    blob: Option<Vec<u8>>,
}

impl Record for Everything {
    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
        ar.add_bool(&mut self.flag)?;
        ar.add_i8(&mut self.tiny)?;
        ar.add_i64(&mut self.wide)?;
        ar.add_i128(&mut self.huge)?;
        ar.add_f64(&mut self.ratio)?;
        ar.add_char(&mut self.glyph)?;
        ar.add_string(&mut self.name)?;
        ar.add_bytes(&mut self.blob)
    }
}

fn strata_with_everything() -> Strata {
    let mut strata = Strata::new();
    strata
        .register::<Everything>(TypeIdentity::new("test.Everything").guid(0xE0).id(2, 1))
        .unwrap();
    strata
}

#[test]
fn all_fields_round_trip() {
    let strata = strata_with_everything();
    let original = Everything {
        flag: true,
        tiny: i8::MIN,
        wide: i64::MAX,
        huge: -(1i128 << 100),
        ratio: -0.25,
        glyph: '\u{1F600}',
        name: Some(String::new()),
        blob: Some(vec![0, 255]),
    };
    let mut value: Option<Box<dyn Record>> = Some(Box::new(original.clone()));
    let bytes = strata.serialize(&mut value).unwrap();
    let back = strata.deserialize(&bytes).unwrap().unwrap();
    assert_eq!(*downcast::<Everything>(back).unwrap(), original);
}

#[test]
fn randomized_round_trips() {
    let _ = env_logger::builder().is_test(true).try_init();
    let strata = strata_with_everything();
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let original = Everything {
            flag: rng.gen(),
            tiny: rng.gen(),
            wide: rng.gen(),
            huge: rng.gen(),
            ratio: rng.gen(),
            glyph: rng.gen(),
            name: Some(format!("n{}", rng.gen::<u32>())),
            blob: Some((0..rng.gen_range(0..32)).map(|_| rng.gen()).collect()),
        };
        let mut value: Option<Box<dyn Record>> = Some(Box::new(original.clone()));
        let bytes = strata.serialize(&mut value).unwrap();
        let back = strata.deserialize(&bytes).unwrap().unwrap();
        assert_eq!(*downcast::<Everything>(back).unwrap(), original);
    }
}

#[test]
fn null_string_and_bytes_round_trip() {
    let strata = strata_with_everything();
    let mut value: Option<Box<dyn Record>> = Some(Box::new(Everything::default()));
    let bytes = strata.serialize(&mut value).unwrap();
    let back = downcast::<Everything>(strata.deserialize(&bytes).unwrap().unwrap()).unwrap();
    assert_eq!(back.name, None);
    assert_eq!(back.blob, None);
}

// the canonical five-value sequence on the fixed binary buffer backend
#[test]
fn mixed_primitive_sequence() {
    let strata = Strata::new();
    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();

    let mut min = i32::MIN;
    let mut hello = Some("hello".to_string());
    let mut absent: Option<String> = None;
    let mut empty: Option<Vec<u8>> = Some(Vec::new());
    let mut high = Some(vec![200u8, 201, 202]);
    ar.add_i32(&mut min).unwrap();
    ar.add_string(&mut hello).unwrap();
    ar.add_string(&mut absent).unwrap();
    ar.add_bytes(&mut empty).unwrap();
    ar.add_bytes(&mut high).unwrap();
    assert!(ar.finish().is_empty());

    let bytes = out.dump();
    let mut input = BinaryReader::new(&bytes);
    let mut ar = strata.reader(&mut input).unwrap();
    let mut min = 0i32;
    let mut hello = None;
    let mut absent = Some("junk".to_string());
    let mut empty = None;
    let mut high = None;
    ar.add_i32(&mut min).unwrap();
    ar.add_string(&mut hello).unwrap();
    ar.add_string(&mut absent).unwrap();
    ar.add_bytes(&mut empty).unwrap();
    ar.add_bytes(&mut high).unwrap();
    assert!(ar.finish().is_empty());

    assert_eq!(min, i32::MIN);
    assert_eq!(hello.as_deref(), Some("hello"));
    assert_eq!(absent, None);
    assert_eq!(empty.as_deref(), Some(&[][..]));
    assert_eq!(high, Some(vec![200, 201, 202]));
}

#[test]
fn static_class_skips_token_negotiation() {
    // no registration at all: the concrete type is fixed by the call site
    let strata = Strata::new();
    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();
    let mut value = Some(Everything {
        wide: 77,
        ..Everything::default()
    });
    ar.add_static_class(&mut value).unwrap();
    let mut gone: Option<Everything> = None;
    ar.add_static_class(&mut gone).unwrap();
    assert!(ar.finish().is_empty());

    let bytes = out.dump();
    let mut input = BinaryReader::new(&bytes);
    let mut ar = strata.reader(&mut input).unwrap();
    let mut back: Option<Everything> = None;
    let mut still_gone: Option<Everything> = Some(Everything::default());
    ar.add_static_class(&mut back).unwrap();
    ar.add_static_class(&mut still_gone).unwrap();
    assert!(ar.finish().is_empty());
    assert_eq!(back.unwrap().wide, 77);
    assert!(still_gone.is_none());
}

// Object graphs are trees: deep nesting is fine, cycles are out of contract.
#[test]
fn deep_trees_round_trip() {
    #[derive(Default, Debug)]
    struct Chain {
        depth: u32,
        next: Option<Box<Chain>>,
    }

    impl Record for Chain {
        fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
            ar.add_u32(&mut self.depth)?;
            ar.add_static_class(&mut self.next)
        }
    }

    impl Record for Box<Chain> {
        fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
            (**self).fields(ar)
        }
    }

    let mut node = Chain { depth: 99, next: None };
    for depth in (0..99).rev() {
        node = Chain {
            depth,
            next: Some(Box::new(node)),
        };
    }

    let strata = Strata::new();
    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();
    let mut value = Some(node);
    ar.add_static_class(&mut value).unwrap();
    assert!(ar.finish().is_empty());

    let bytes = out.dump();
    let mut input = BinaryReader::new(&bytes);
    let mut ar = strata.reader(&mut input).unwrap();
    let mut back: Option<Chain> = None;
    ar.add_static_class(&mut back).unwrap();
    assert!(ar.finish().is_empty());

    let back = back.unwrap();
    let mut cur = &back;
    let mut expect = 0;
    while let Some(next) = &cur.next {
        assert_eq!(cur.depth, expect);
        cur = next;
        expect += 1;
    }
    assert_eq!(cur.depth, 99);
    assert_eq!(expect, 99);
}

#[test]
fn structs_have_no_wrapping() {
    #[derive(Default, Debug, PartialEq)]
    struct Plain {
        n: u16,
    }
    impl Record for Plain {
        fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
            ar.add_u16(&mut self.n)
        }
    }

    let strata = Strata::new();
    let mut out = BinaryWriter::new();
    let mut ar = strata.writer(&mut out).unwrap();
    let mut value = Plain { n: 9 };
    ar.add_struct(&mut value).unwrap();
    ar.finish();
    let bytes = out.dump();
    // header (7 bytes) plus exactly the two field bytes
    assert_eq!(bytes.len(), 9);

    let mut input = BinaryReader::new(&bytes);
    let mut ar = strata.reader(&mut input).unwrap();
    let mut back = Plain::default();
    ar.add_struct(&mut back).unwrap();
    assert_eq!(back, value);
}
