//! Two independent swap jobs racing across worker threads (spec.md §8
//! scenario 6: `SET a 1; SET b 1; MGET a b` with N=2 workers and
//! `hash(a)%2 != hash(b)%2` — the two SETs may finish in either order,
//! but whichever arrives, the completion queue must still let a caller
//! recover the right result for the right key by token, not by arrival
//! order).

use std::sync::{Arc, Barrier};
use std::time::Duration;

use swapcore_engine::completion::{CompletionPayload, SwapResultEnvelope};
use swapcore_engine::{CompletionQueue, WorkerPool};
use swapcore_storage::RioResult;

fn get_result_bytes(results: &[RioResult]) -> Vec<u8> {
    match results.first() {
        Some(RioResult::Get(Some(bytes))) => bytes.clone(),
        other => panic!("expected a single Get(Some(_)) result, got {other:?}"),
    }
}

/// Find two keys that hash to different shards, so the race below is
/// genuinely cross-worker rather than two jobs serialized on one FIFO.
fn keys_on_different_shards(pool: &WorkerPool) -> (Vec<u8>, Vec<u8>) {
    let a = b"a".to_vec();
    for candidate in 0..10_000u32 {
        let b = format!("b{candidate}").into_bytes();
        if pool.shard_of(&a) != pool.shard_of(&b) {
            return (a, b);
        }
    }
    panic!("couldn't find two keys on different shards");
}

/// Runs the race enough times that, if job order ever leaked into
/// result order, at least one iteration would catch it.
#[test]
fn completions_are_recovered_by_token_regardless_of_finish_order() {
    for round in 0..50 {
        let pool = WorkerPool::new(2, 1024);
        let (key_a, key_b) = keys_on_different_shards(&pool);
        let completions = Arc::new(CompletionQueue::new());

        // A barrier makes both jobs start at the same instant so which
        // one actually finishes first is genuinely racy rather than an
        // artifact of submission order. Token 0 carries key "a", token 1
        // carries key "b"; alternating which one sleeps exercises both
        // finish orders across the loop.
        let start = Arc::new(Barrier::new(2));
        let (slow_token, fast_token) = if round % 2 == 0 { (0usize, 1usize) } else { (1usize, 0usize) };

        for (token, delay_micros) in [(slow_token, 200), (fast_token, 0)] {
            let completions = completions.clone();
            let start = start.clone();
            let key = if token == 0 { key_a.clone() } else { key_b.clone() };
            pool.submit(
                &key,
                Box::new(move || {
                    start.wait();
                    if delay_micros > 0 {
                        std::thread::sleep(Duration::from_micros(delay_micros));
                    }
                    let value = if token == 0 { b"1-a".to_vec() } else { b"1-b".to_vec() };
                    completions.push(SwapResultEnvelope {
                        token,
                        payload: CompletionPayload::Rio(vec![RioResult::Get(Some(value))]),
                    });
                }),
            );
        }

        // Block until both results are in, the way the single executor
        // thread's `dispatch_one` loop drains after `wait()`.
        let mut by_token = std::collections::HashMap::new();
        while by_token.len() < 2 {
            completions.wait();
            for envelope in completions.drain() {
                by_token.insert(envelope.token, envelope.payload);
            }
        }

        let CompletionPayload::Rio(results) = by_token.remove(&0).unwrap() else {
            panic!("expected a Rio payload for token 0")
        };
        assert_eq!(get_result_bytes(&results), b"1-a".to_vec());

        let CompletionPayload::Rio(results) = by_token.remove(&1).unwrap() else {
            panic!("expected a Rio payload for token 1")
        };
        assert_eq!(get_result_bytes(&results), b"1-b".to_vec());
    }
}
