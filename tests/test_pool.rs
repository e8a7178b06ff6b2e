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

use std::sync::Arc;
use std::thread;

use strata::{downcast, Archive, Error, Record, Strata, TypeIdentity};

#[derive(Default, Debug, PartialEq)]
struct Counter {
    owner: u64,
    round: u32,
}

impl Record for Counter {
    fn fields(&mut self, ar: &mut Archive<'_>) -> Result<(), Error> {
        ar.add_u64(&mut self.owner)?;
        ar.add_u32(&mut self.round)
    }
}

#[test]
fn concurrent_round_trips_share_one_instance() {
    let mut strata = Strata::new();
    strata
        .register::<Counter>(TypeIdentity::new("test.Counter"))
        .unwrap();
    let strata = Arc::new(strata);

    let handles: Vec<_> = (0..8u64)
        .map(|owner| {
            let strata = Arc::clone(&strata);
            thread::spawn(move || {
                for round in 0..200u32 {
                    let mut value: Option<Box<dyn Record>> =
                        Some(Box::new(Counter { owner, round }));
                    let bytes = strata.serialize(&mut value).unwrap();
                    let back = strata.deserialize(&bytes).unwrap().unwrap();
                    let back = downcast::<Counter>(back).unwrap();
                    assert_eq!(*back, Counter { owner, round });
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
