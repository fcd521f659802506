// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Benchmark for the hash primitive and the min-hash fingerprint
//! compression, the two pieces on the hot path of every trace.
//!
//! Make sure the result of the benchmarked function is used,
//! whether by sending it to black_box, or to return it from the closure.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use blanket_fp::event::{Event, EventSet};
use blanket_fp::hash::{self, READ_SALT};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("hash", |b| {
        b.iter(|| black_box(hash::hash(black_box(READ_SALT), black_box(0x1000))));
    });

    let mut events = EventSet::new();
    for addr in 0..2048u64 {
        events.insert(Event::Read { addr });
    }

    c.bench_function("fingerprint_32", |b| {
        b.iter(|| black_box(events.fingerprint(black_box(32))));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
