//! MPSC delivery and ordering through FastQueue

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fastloop_runtime::{Batch, FastQueue, MicroTime};

#[test]
fn every_item_once_in_per_producer_order() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: u64 = 20_000;

    let queue = Arc::new(FastQueue::with_capacity(16, 256));
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    queue.push((p, seq));
                }
            })
        })
        .collect();

    let mut next = [0u64; PRODUCERS];
    let mut total = 0u64;
    let mut batch = Batch::new();
    let deadline = Instant::now() + Duration::from_secs(30);

    while total < PRODUCERS as u64 * PER_PRODUCER {
        assert!(Instant::now() < deadline, "consumer stalled at {}", total);
        if !queue.get_work(MicroTime::now().after(100), &mut batch) {
            continue;
        }
        for &(p, seq) in &batch {
            assert_eq!(seq, next[p], "producer {} out of order", p);
            next[p] += 1;
            total += 1;
        }
    }

    for h in handles {
        h.join().unwrap();
    }
    assert!(next.iter().all(|&n| n == PER_PRODUCER));
    assert!(queue.is_empty());
}

#[test]
fn empty_queue_with_past_deadline_does_not_block() {
    let queue: FastQueue<u8> = FastQueue::with_capacity(4, 4);
    let mut batch = Batch::new();
    let past = MicroTime::from_micros(MicroTime::now().as_micros() - 1_000_000);

    let start = Instant::now();
    for _ in 0..100 {
        assert!(!queue.get_work(past, &mut batch));
    }
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn drained_batch_is_not_extended_by_later_pushes() {
    let queue = FastQueue::with_capacity(4, 4);
    let mut batch = Batch::new();
    queue.push("a");
    queue.push("b");
    assert!(queue.get_work(MicroTime::MAX, &mut batch));

    queue.push("c");
    assert_eq!(batch.to_vec(), ["a", "b"]);
    assert_eq!(queue.len(), 1);

    let taken: Vec<_> = batch.drain().collect();
    assert_eq!(taken, vec!["a", "b"]);
    assert!(queue.get_work(MicroTime::MAX, &mut batch));
    assert_eq!(batch.to_vec(), ["c"]);
}
