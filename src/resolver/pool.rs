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

//! Segmented pool of pre-constructed writer state.
//!
//! One (de)serializer instance is single-threaded; concurrency comes from
//! pooling instances across calls. Acquisition is scope-based: the item is
//! handed to a closure and returned to its segment on every exit path, so a
//! propagated error cannot leak a pool slot. Threads hash onto segments so
//! concurrent callers usually touch different locks.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::Spinlock;

const NUM_SEGMENTS: usize = 8;

static THREAD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SEGMENT_INDEX: Cell<usize> = Cell::new(
        (THREAD_ID_COUNTER.fetch_add(1, Ordering::Relaxed) as usize) % NUM_SEGMENTS
    );
}

pub struct Pool<T> {
    segments: Vec<Spinlock<Vec<T>>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Pool<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Pool {
            segments: (0..NUM_SEGMENTS).map(|_| Spinlock::new(Vec::new())).collect(),
            factory: Box::new(factory),
        }
    }

    /// Borrows an item for the duration of `handler`, constructing one if
    /// the segment is empty, and returns it to the segment afterwards.
    pub fn borrow_mut<R>(&self, handler: impl FnOnce(&mut T) -> R) -> R {
        let segment = &self.segments[SEGMENT_INDEX.with(|idx| idx.get())];
        let mut item = segment.lock().pop().unwrap_or_else(&*self.factory);
        let result = handler(&mut item);
        segment.lock().push(item);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_returned_items() {
        let pool: Pool<Vec<u8>> = Pool::new(Vec::new);
        pool.borrow_mut(|v| v.push(7));
        // same thread lands on the same segment and gets the item back
        let seen = pool.borrow_mut(|v| v.clone());
        assert_eq!(seen, vec![7]);
    }
}
