use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fst_lattice::{Capabilities, Lattice, TableTransducer, Transducer};

const NUM_STATES: usize = 16;
const SYMBOLS: [&str; 4] = ["a", "b", "c", "d"];

/// Fully connected transducer with one transition per state pair and symbol.
fn dense_transducer() -> TableTransducer {
    let mut fst = TableTransducer::new(Capabilities::TRAINABLE);
    for s in 0..NUM_STATES {
        fst.add_state(&format!("s{s}"), s as f64 * 0.1, 0.0)
            .expect("failed to add state");
    }
    for s in 0..NUM_STATES {
        for d in 0..NUM_STATES {
            for (k, x) in SYMBOLS.iter().enumerate() {
                let cost = ((s * 31 + d * 17 + k * 7) % 23) as f64 / 7.0;
                fst.add_transition(s, Some(x), &format!("L{d}"), d, cost)
                    .expect("failed to add transition");
            }
        }
    }
    fst
}

fn input(len: usize) -> Vec<String> {
    (0..len).map(|i| SYMBOLS[(i * 7 + 3) % SYMBOLS.len()].to_string()).collect()
}

fn lattice_benchmark(c: &mut Criterion) {
    let fst = dense_transducer();
    let alphabet = fst.output_alphabet();
    let input = input(50);

    c.bench_function("lattice", |b| {
        b.iter(|| Lattice::new(black_box(&fst), black_box(&input[..]), None, false, None).expect("failed to build lattice"))
    });
    c.bench_function("lattice_counts_labelings", |b| {
        b.iter(|| {
            Lattice::new(black_box(&fst), black_box(&input[..]), None, true, Some(&alphabet))
                .expect("failed to build lattice")
        })
    });
    c.bench_function("viterbi", |b| {
        b.iter(|| fst.viterbi_path(black_box(&input[..]), None).expect("failed to decode").cost())
    });
}

criterion_group! {
    name = benchmarks;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = lattice_benchmark
}

criterion_main!(benchmarks);
