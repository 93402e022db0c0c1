//! End-to-end equivalence between the two execution substrates.
//!
//! Both substrates must produce the same results for the same input: the
//! concurrency mechanism is an execution detail, not part of either
//! workload's semantics.

use parlab::{run_max, run_sort, Substrate, SyncStrategy};

#[test]
fn sort_results_agree_across_substrates() {
    let data = parlab::input::generate(1234, 50_000);

    let threaded = run_sort(&data, 6, Substrate::Threaded).unwrap();
    let isolated = run_sort(&data, 6, Substrate::ProcessIsolated).unwrap();

    assert!(threaded.is_correct);
    assert!(isolated.is_correct);
    assert_eq!(threaded.sorted, isolated.sorted);
}

#[test]
fn max_results_agree_across_substrates() {
    let data = parlab::input::generate(5678, 50_000);
    let expected = data.iter().copied().max().unwrap();

    let threaded = run_max(&data, 6, Substrate::Threaded, SyncStrategy::Locked).unwrap();
    let isolated = run_max(&data, 6, Substrate::ProcessIsolated, SyncStrategy::Locked).unwrap();

    assert_eq!(threaded.global_max, expected);
    assert_eq!(isolated.global_max, expected);
    assert!(threaded.is_correct);
    assert!(isolated.is_correct);
}

#[test]
fn worker_counts_do_not_change_results() {
    let data = parlab::input::generate(9, 10_001);
    let baseline = run_sort(&data, 1, Substrate::Threaded).unwrap();

    for workers in [2, 3, 7, 16, 64] {
        for substrate in [Substrate::Threaded, Substrate::ProcessIsolated] {
            let outcome = run_sort(&data, workers, substrate).unwrap();
            assert!(outcome.is_correct, "workers={workers} {substrate}");
            assert_eq!(outcome.sorted, baseline.sorted);
        }
    }
}
