//! Stress test - many producers, one loop
//!
//! Usage: `stress [producers] [events_per_producer]`
//!
//! Every producer pushes its events as fast as it can; the loop checks
//! that each producer's sequence numbers arrive in order and counts the
//! total. A final event from the main thread stops the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use fastloop::{kerror, OrAbort};
use fastloop::{Event, EventHandler, EventLoop, RuntimeConfig, SpinLock};

const EVENT_ITEM: i32 = 1;
const EVENT_STOP: i32 = 2;

fn main() {
    println!("=== fastloop Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let producers: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(4);
    let per_producer: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(250_000);

    let config = RuntimeConfig::from_env();
    let el = Arc::new(EventLoop::with_config(&config));

    // Last sequence seen per producer; only the loop thread takes it, the
    // spin lock is here for the final read from main.
    let last_seen = Arc::new(SpinLock::with_backoff(vec![0u64; producers], config.backoff));
    let received = Arc::new(AtomicU64::new(0));
    let out_of_order = Arc::new(AtomicU64::new(0));

    let handler: Arc<dyn EventHandler> = {
        let el = Arc::downgrade(&el);
        let last_seen = Arc::clone(&last_seen);
        let received = Arc::clone(&received);
        let out_of_order = Arc::clone(&out_of_order);
        Arc::new(move |ev: &Event| match ev.kind {
            EVENT_ITEM => {
                let Some(&(producer, seq)) = ev.payload_as::<(usize, u64)>() else {
                    return;
                };
                let mut last = last_seen.lock();
                if seq != last[producer] + 1 {
                    out_of_order.fetch_add(1, Ordering::Relaxed);
                }
                last[producer] = seq;
                received.fetch_add(1, Ordering::Relaxed);
            }
            EVENT_STOP => {
                if let Some(el) = el.upgrade() {
                    el.stop();
                }
            }
            _ => {}
        })
    };

    println!("{} producers x {} events", producers, per_producer);
    let start = Instant::now();

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let el = Arc::clone(&el);
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                for seq in 1..=per_producer {
                    let item = Event::new(EVENT_ITEM, Arc::clone(&handler));
                    el.push(item.with_payload(Arc::new((p, seq)), 16));
                }
            })
        })
        .collect();

    let stopper = {
        let el = Arc::clone(&el);
        let handler = Arc::clone(&handler);
        thread::spawn(move || {
            for h in handles {
                let _ = h.join();
            }
            el.push(Event::new(EVENT_STOP, handler));
        })
    };

    el.run(0).or_abort();
    let _ = stopper.join();

    let elapsed = start.elapsed();
    let total = received.load(Ordering::Relaxed);
    let expected = producers as u64 * per_producer;

    println!("\nReceived: {}/{}", total, expected);
    println!("Elapsed:  {:?}", elapsed);
    println!("Rate:     {:.0} events/sec", total as f64 / elapsed.as_secs_f64());

    let bad = out_of_order.load(Ordering::Relaxed);
    let tails_ok = last_seen.lock().iter().all(|&s| s == per_producer);
    if total != expected || bad != 0 || !tails_ok {
        kerror!("ordering check failed: {} out of order", bad);
        std::process::exit(1);
    }
    println!("\n=== Stress Test Complete ===");
}
