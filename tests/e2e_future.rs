//! Future/Promise end-to-end suite.
//!
//! Exercises the composition invariants through the public API:
//! - **Single completion**: exactly one writer wins, late writers refused
//! - **Deep iteration**: unbounded `flat_map` loops complete in constant
//!   stack, no waiter accumulation
//! - **Cancellation routing**: signals reach the pending stage, and only
//!   the pending stage
//! - **Aggregate ordering**: `collect` preserves input order,
//!   `select_all` returns the winner plus the ordered remainder

use promissory::test_utils::init_test_logging;
use promissory::{collect, select_all, times, Error, Future, Promise, Try};
use std::future::Future as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn init_test(name: &str) {
    init_test_logging();
    promissory::test_phase!(name);
}

#[test]
fn producer_thread_completes_consumer_thread_observes() {
    init_test("producer_thread_completes_consumer_thread_observes");
    let p: Promise<u64> = Promise::new();
    let fut = p.future();

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        p.set_value(99).expect("single completion");
    });
    let got = fut.get(Duration::from_secs(5));
    producer.join().expect("producer thread");
    promissory::assert_with_log!(got == Ok(99), "value crossed threads", "Ok(99)", format!("{got:?}"));
    promissory::test_complete!("producer_thread_completes_consumer_thread_observes");
}

#[test]
fn exactly_one_concurrent_writer_wins() {
    init_test("exactly_one_concurrent_writer_wins");
    let p: Promise<usize> = Promise::new();
    let wins = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for i in 0..16 {
        let p = p.clone();
        let wins = Arc::clone(&wins);
        handles.push(thread::spawn(move || {
            if p.update_if_empty(Try::Return(i)) {
                wins.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for h in handles {
        h.join().expect("writer thread");
    }
    promissory::assert_with_log!(
        wins.load(Ordering::SeqCst) == 1,
        "one winner",
        1usize,
        wins.load(Ordering::SeqCst)
    );
    promissory::test_complete!("exactly_one_concurrent_writer_wins");
}

#[test]
fn iterated_flat_map_completes_without_stack_growth() {
    init_test("iterated_flat_map_completes_without_stack_growth");
    // A chain this deep overflows the stack if stages nest calls instead
    // of trampolining, and exhausts memory if links are not merged.
    let rounds = 500_000u32;
    let mut fut = Future::value(0u32);
    for _ in 0..rounds {
        fut = fut.flat_map(|x| Future::value(x + 1));
    }
    promissory::assert_with_log!(
        fut.poll() == Some(Try::Return(rounds)),
        "loop completed",
        format!("Return({rounds})"),
        format!("{:?}", fut.poll())
    );

    let counted = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&counted);
    let looped = times(200_000, move || {
        c.fetch_add(1, Ordering::SeqCst);
        Future::unit()
    });
    promissory::assert_with_log!(
        looped.poll() == Some(Try::Return(())),
        "times loop completed",
        "Return(())",
        format!("{:?}", looped.poll())
    );
    promissory::assert_with_log!(
        counted.load(Ordering::SeqCst) == 200_000,
        "every round ran",
        200_000usize,
        counted.load(Ordering::SeqCst)
    );
    promissory::test_complete!("iterated_flat_map_completes_without_stack_growth");
}

#[test]
fn cancellation_propagates_through_flat_map_stages() {
    init_test("cancellation_propagates_through_flat_map_stages");
    let a: Promise<i32> = Promise::new();
    let inner: Promise<i32> = Promise::new();
    let inner_fut = inner.future();
    let b = a.future().flat_map(move |_| inner_fut);

    b.cancel();
    promissory::assert_with_log!(
        a.is_cancelled(),
        "pending parent cancelled",
        true,
        a.is_cancelled()
    );
    promissory::assert_with_log!(
        !a.is_defined(),
        "cancellation did not complete the result",
        false,
        a.is_defined()
    );

    a.set_value(0).expect("parent completion");
    promissory::assert_with_log!(
        inner.is_cancelled(),
        "inner stage cancelled after advance",
        true,
        inner.is_cancelled()
    );
    promissory::test_complete!("cancellation_propagates_through_flat_map_stages");
}

#[test]
fn collect_preserves_order_with_late_middle_completion() {
    init_test("collect_preserves_order_with_late_middle_completion");
    let p: Promise<i32> = Promise::new();
    let out = collect(vec![Future::value(1), p.future(), Future::value(3)]);

    let completer = {
        let p = p.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            p.set_value(2).expect("middle completion");
        })
    };
    let got = out.get(Duration::from_secs(5));
    completer.join().expect("completer thread");
    promissory::assert_with_log!(
        got == Ok(vec![1, 2, 3]),
        "input order kept",
        "[1, 2, 3]",
        format!("{got:?}")
    );
    promissory::test_complete!("collect_preserves_order_with_late_middle_completion");
}

#[test]
fn select_all_returns_winner_and_ordered_remainder() {
    init_test("select_all_returns_winner_and_ordered_remainder");
    let a: Promise<i32> = Promise::new();
    let b: Promise<i32> = Promise::new();
    let c: Promise<i32> = Promise::new();
    let out = select_all(vec![a.future(), b.future(), c.future()]);

    b.set_value(42).expect("winner completion");
    let (winner, rest) = match out.poll() {
        Some(Try::Return(pair)) => pair,
        other => unreachable!("expected winner, got {other:?}"),
    };
    promissory::assert_with_log!(
        winner == Try::Return(42),
        "winner result",
        "Return(42)",
        format!("{winner:?}")
    );
    promissory::assert_with_log!(rest.len() == 2, "remainder size", 2usize, rest.len());

    a.set_value(1).expect("a completion");
    c.set_value(3).expect("c completion");
    promissory::assert_with_log!(
        rest[0].poll() == Some(Try::Return(1)) && rest[1].poll() == Some(Try::Return(3)),
        "remainder keeps input order",
        "[a, c]",
        format!("{:?}", (rest[0].poll(), rest[1].poll()))
    );
    promissory::test_complete!("select_all_returns_winner_and_ordered_remainder");
}

#[test]
fn failures_propagate_and_rescue_recovers() {
    init_test("failures_propagate_and_rescue_recovers");
    let p: Promise<i32> = Promise::new();
    let pipeline = p
        .future()
        .map(|x| x * 2)
        .flat_map(|x| {
            if x > 10 {
                Future::exception(Error::user("too large"))
            } else {
                Future::value(x)
            }
        })
        .rescue(|e| (e == &Error::user("too large")).then(|| Future::value(-1)));

    p.set_value(50).expect("completion");
    promissory::assert_with_log!(
        pipeline.poll() == Some(Try::Return(-1)),
        "rescued",
        "Return(-1)",
        format!("{:?}", pipeline.poll())
    );
    promissory::test_complete!("failures_propagate_and_rescue_recovers");
}

#[test]
fn awaiting_a_future_through_the_std_bridge() {
    init_test("awaiting_a_future_through_the_std_bridge");
    let p: Promise<u32> = Promise::new();
    let fut = p.future();

    let completer = {
        let p = p.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            p.set_value(11).expect("completion");
        })
    };

    // Minimal block_on: park until the waker fires.
    let parked = thread::current();
    struct Unparker(thread::Thread);
    impl std::task::Wake for Unparker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }
    }
    let waker = std::task::Waker::from(Arc::new(Unparker(parked)));
    let mut cx = std::task::Context::from_waker(&waker);
    let mut pinned = Box::pin(std::future::IntoFuture::into_future(fut));
    let got = loop {
        match pinned.as_mut().poll(&mut cx) {
            std::task::Poll::Ready(t) => break t,
            std::task::Poll::Pending => thread::park_timeout(Duration::from_secs(5)),
        }
    };
    completer.join().expect("completer thread");
    promissory::assert_with_log!(
        got == Try::Return(11),
        "awaited value",
        "Return(11)",
        format!("{got:?}")
    );
    promissory::test_complete!("awaiting_a_future_through_the_std_bridge");
}
