// Lab 61: Concurrent Priority Heap — test driver
//
// Runs the two scenarios the heap core is specified against:
//   1. concurrent insert, then concurrent pop
//   2. concurrent insert, then sequential pop, checked against a
//      descending sort of everything inserted
//
// This binary is the "external collaborator" the heap core itself does
// not depend on: it owns thread spawning, random data generation, and
// the pass/fail exit code. Run with `RUST_LOG=info` to see progress.

use std::sync::Arc;
use std::thread;

use concurrent_priority_heap::Heap;
use log::{info, warn};
use rand::Rng;

struct Args {
    thread_count: usize,
    requested_capacity: usize,
    items_per_thread: usize,
    priority_min: i64,
    priority_max: i64,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            thread_count: 4,
            requested_capacity: (1 << 15) - 1,
            items_per_thread: 1000,
            priority_min: 1,
            priority_max: 1000,
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let raw: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "--threads" => {
                i += 1;
                args.thread_count = raw[i].parse().expect("--threads takes an integer");
            }
            "--capacity" => {
                i += 1;
                args.requested_capacity = raw[i].parse().expect("--capacity takes an integer");
            }
            "--items-per-thread" => {
                i += 1;
                args.items_per_thread = raw[i].parse().expect("--items-per-thread takes an integer");
            }
            "--priority-min" => {
                i += 1;
                args.priority_min = raw[i].parse().expect("--priority-min takes an integer");
            }
            "--priority-max" => {
                i += 1;
                args.priority_max = raw[i].parse().expect("--priority-max takes an integer");
            }
            other => {
                eprintln!("unrecognized argument: {other}");
                eprintln!(
                    "usage: concurrent-priority-heap [--threads N] [--capacity N] [--items-per-thread N] [--priority-min N] [--priority-max N]"
                );
                std::process::exit(2);
            }
        }
        i += 1;
    }

    args
}

fn random_values(count: usize, min: i64, max: i64) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(min..=max)).collect()
}

/// Scenario 1: insert concurrently, then pop concurrently. Checks that
/// the heap property survives both phases and that the right number of
/// entries remain.
fn scenario_insert_concurrent_then_pop_concurrent(args: &Args) -> bool {
    info!("scenario: concurrent insert, concurrent pop");
    let heap = Arc::new(Heap::new(args.requested_capacity));

    let inserters: Vec<_> = (0..args.thread_count)
        .map(|tag| {
            let heap = Arc::clone(&heap);
            let values = random_values(args.items_per_thread, args.priority_min, args.priority_max);
            thread::spawn(move || {
                for v in values {
                    if let Err(e) = heap.insert(v, v, tag as u64) {
                        warn!("insert failed during scenario 1: {e}");
                    }
                }
            })
        })
        .collect();

    for h in inserters {
        h.join().expect("inserter thread panicked");
    }

    if !heap.is_heap_valid() {
        eprintln!("FAIL: heap invalid after concurrent inserts");
        return false;
    }

    let total_inserted = args.thread_count * args.items_per_thread;
    let poppers = args.thread_count.saturating_sub(1).max(1);
    let per_popper = args.items_per_thread;

    let pop_threads: Vec<_> = (0..poppers)
        .map(|_| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                for _ in 0..per_popper {
                    heap.pop();
                }
            })
        })
        .collect();

    for h in pop_threads {
        h.join().expect("popper thread panicked");
    }

    if !heap.is_heap_valid() {
        eprintln!("FAIL: heap invalid after concurrent pops");
        return false;
    }

    let expected_remaining = total_inserted - poppers * per_popper;
    if heap.len() != expected_remaining {
        eprintln!(
            "FAIL: expected {} entries remaining, found {}",
            expected_remaining,
            heap.len()
        );
        return false;
    }

    info!(
        "scenario 1 passed: {} inserted, {} popped, {} remaining",
        total_inserted,
        poppers * per_popper,
        heap.len()
    );
    true
}

/// Scenario 2: insert concurrently, then pop sequentially to
/// exhaustion. Checks that the popped sequence is the full input
/// multiset sorted descending.
fn scenario_insert_concurrent_then_pop_sequential(args: &Args) -> bool {
    info!("scenario: concurrent insert, sequential pop");
    let heap = Arc::new(Heap::new(args.requested_capacity));
    let mut expected: Vec<i64> = Vec::with_capacity(args.thread_count * args.items_per_thread);

    let inserters: Vec<_> = (0..args.thread_count)
        .map(|tag| {
            let heap = Arc::clone(&heap);
            let values = random_values(args.items_per_thread, args.priority_min, args.priority_max);
            expected.extend(&values);
            thread::spawn(move || {
                for v in values {
                    if let Err(e) = heap.insert(v, v, tag as u64) {
                        warn!("insert failed during scenario 2: {e}");
                    }
                }
            })
        })
        .collect();

    for h in inserters {
        h.join().expect("inserter thread panicked");
    }

    if !heap.is_heap_valid() {
        eprintln!("FAIL: heap invalid after concurrent inserts");
        return false;
    }
    if heap.is_empty() {
        eprintln!("FAIL: heap reports empty right after inserts");
        return false;
    }

    let mut popped = Vec::with_capacity(expected.len());
    while let Some(v) = heap.pop() {
        popped.push(v);
    }

    if !heap.is_empty() {
        eprintln!("FAIL: heap not empty after draining");
        return false;
    }

    expected.sort_unstable_by(|a, b| b.cmp(a));
    if popped != expected {
        eprintln!("FAIL: popped sequence does not match descending sort of input");
        return false;
    }

    info!("scenario 2 passed: {} entries popped in descending order", popped.len());
    true
}

fn main() {
    env_logger::init();
    let args = parse_args();

    let results = [
        scenario_insert_concurrent_then_pop_concurrent(&args),
        scenario_insert_concurrent_then_pop_sequential(&args),
    ];

    if results.iter().all(|ok| *ok) {
        println!("All scenarios passed.");
        std::process::exit(0);
    } else {
        println!("One or more scenarios failed.");
        std::process::exit(1);
    }
}
