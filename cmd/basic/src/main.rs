//! Basic fastloop example
//!
//! Two producer threads feed events into one loop while a recurring timer
//! ticks. The loop runs for a fixed time and then returns.
//!
//! # Environment Variables
//!
//! - `FL_FLUSH_EPRINT=1` - Flush log output immediately
//! - `FL_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fastloop::{kinfo, kdebug, OrAbort};
use fastloop::{Event, EventHandler, EventLoop, MicroTime, RuntimeConfig, Timer, TimerAction};

const EVENT_GREETING: i32 = 1;
const EVENT_WORK: i32 = 2;

// FL_LOG_LEVEL=debug cargo run -p fastloop-basic
fn main() {
    println!("=== fastloop Basic Example ===\n");

    let config = RuntimeConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    config.print();

    let el = Arc::new(EventLoop::with_config(&config));
    let handled = Arc::new(AtomicUsize::new(0));

    let handler: Arc<dyn EventHandler> = {
        let handled = Arc::clone(&handled);
        Arc::new(move |ev: &Event| {
            match ev.kind {
                EVENT_GREETING => {
                    let text = ev.payload_as::<String>().map(String::as_str).unwrap_or("");
                    kinfo!("greeting: {}", text);
                }
                EVENT_WORK => kdebug!("work item, {} bytes", ev.len),
                other => kdebug!("unknown event {}", other),
            }
            handled.fetch_add(1, Ordering::Relaxed);
        })
    };

    let ticks = Arc::new(AtomicUsize::new(0));
    {
        let ticks = Arc::clone(&ticks);
        el.add_timer(Timer::every(MicroTime::now().after(100), 100, move |fired| {
            let n = ticks.fetch_add(1, Ordering::Relaxed) + 1;
            kinfo!("tick {} at {}", n, fired.time);
            TimerAction::Recurring
        }));
    }

    let producers: Vec<_> = (0..2)
        .map(|id| {
            let el = Arc::clone(&el);
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                let hello = format!("hello from producer {}", id);
                let len = hello.len();
                el.push(
                    Event::new(EVENT_GREETING, Arc::clone(&handler))
                        .with_payload(Arc::new(hello), len),
                );
                for i in 0..50u64 {
                    el.push(
                        Event::new(EVENT_WORK, Arc::clone(&handler)).with_payload(Arc::new(i), 8),
                    );
                    thread::sleep(Duration::from_millis(5));
                }
            })
        })
        .collect();

    el.run(1_000).or_abort();

    for p in producers {
        let _ = p.join();
    }

    println!(
        "\nHandled {} events, {} ticks",
        handled.load(Ordering::Relaxed),
        ticks.load(Ordering::Relaxed)
    );
    println!("=== Done ===");
}
