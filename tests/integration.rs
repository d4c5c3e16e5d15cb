//! Integration tests for composed pipelines

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lazyweld::prelude::*;

/// A consume callback that appends every item to a shared vector.
fn collector<T: Send + 'static>(
    items: &Arc<Mutex<Vec<T>>>,
) -> impl Fn(Context, T) -> std::future::Ready<Result<()>> + Send + Sync + 'static {
    let items = items.clone();
    move |_, item| {
        items.lock().unwrap().push(item);
        std::future::ready(Ok(()))
    }
}

/// Uneven per-item latency, so parallel workers finish out of order.
async fn jitter(x: u64) {
    if x % 5 == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    } else {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_slice_preserves_order() -> Result<()> {
    let items = Arc::new(Mutex::new(Vec::new()));
    consume(
        from_slice(vec![1, 2, 3], Options::new()),
        collector(&items),
        Options::new(),
    )
    .await?;

    assert_eq!(*items.lock().unwrap(), vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_filter_even() {
    let items = Arc::new(Mutex::new(Vec::new()));
    from_slice(vec![1, 2, 3, 4], Options::new())
        .filter(|_, x| Ok(x % 2 == 0), Options::new())
        .consume(collector(&items), Options::new())
        .await
        .unwrap();

    assert_eq!(*items.lock().unwrap(), vec![2, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_map_sum() {
    let total = Arc::new(AtomicU64::new(0));
    let sum = total.clone();

    from_slice((1..=100).collect::<Vec<u64>>(), Options::new())
        .map(
            |_, x| async move { Ok(x * 2) },
            Options::new().parallelism(4).capacity(4),
        )
        .consume(
            move |_, x| {
                sum.fetch_add(x, Ordering::SeqCst);
                async { Ok(()) }
            },
            Options::new(),
        )
        .await
        .unwrap();

    assert_eq!(total.load(Ordering::SeqCst), 10100);
}

#[tokio::test]
async fn test_failing_map_with_stop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let result = from_slice(vec![1, 2, 3], Options::new())
        .map(
            move |_, _: i32| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>(Error::custom("transform failed")) }
            },
            Options::new().on_error(Decision::stop_all),
        )
        .consume(|_, _| async { Ok(()) }, Options::new())
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "transform failed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ignored_filter_errors() {
    let items = Arc::new(Mutex::new(Vec::new()));
    from_slice(vec![1, 2, 3, 4], Options::new())
        .filter(
            |_, x: &i32| {
                if x % 2 == 0 {
                    Err(Error::custom("even"))
                } else {
                    Ok(true)
                }
            },
            Options::new().on_error(Decision::ignore_all),
        )
        .consume(collector(&items), Options::new())
        .await
        .unwrap();

    assert_eq!(*items.lock().unwrap(), vec![1, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_consume_sees_every_item_once() {
    for parallelism in [1, 2, 8] {
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let total = Arc::new(AtomicU64::new(0));
        let (set, sum) = (seen.clone(), total.clone());

        from_slice((0..1000u64).collect(), Options::new().capacity(16))
            .consume(
                move |_, x| {
                    assert!(set.lock().unwrap().insert(x), "duplicate item {x}");
                    sum.fetch_add(x, Ordering::SeqCst);
                    async { Ok(()) }
                },
                Options::new().parallelism(parallelism),
            )
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1000);
        assert_eq!(total.load(Ordering::SeqCst), 999 * 1000 / 2);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_map_and_filter_deliver_every_item_once() {
    for parallelism in [2, 8] {
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let set = seen.clone();

        from_slice((0..1000u64).collect(), Options::new().capacity(16))
            .map(
                |_, x| async move {
                    jitter(x).await;
                    Ok(x * 2)
                },
                Options::new().parallelism(parallelism).capacity(4),
            )
            .filter(
                |_, x| Ok(x % 4 == 0),
                Options::new().parallelism(parallelism),
            )
            .consume(
                move |_, x| {
                    assert!(set.lock().unwrap().insert(x), "duplicate item {x}");
                    async { Ok(()) }
                },
                Options::new().parallelism(parallelism),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 500, "parallelism {parallelism}");
        assert!((0..1000u64).step_by(2).all(|x| seen.contains(&(x * 2))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_stops_an_endless_pipeline() {
    let token = CancellationToken::new();
    let opts = || Options::new().cancellation(token.clone());

    let pipeline = from_iter(0u64.., opts())
        .map(|_, x| async move { Ok(x + 1) }, opts().parallelism(2))
        .consume(
            |_, _| async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(())
            },
            opts(),
        );
    let handle = tokio::spawn(pipeline);

    tokio::time::sleep(Duration::from_millis(30)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("pipeline must stop promptly")
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_consume_stop_propagates_upstream() {
    let source = from_iter(0u32.., Options::new());
    let head = source.clone();

    let result = source
        .map(|_, x| async move { Ok(x) }, Options::new())
        .consume(
            |_, x| async move {
                if x == 5 {
                    Err(Error::custom("sink is full"))
                } else {
                    Ok(())
                }
            },
            Options::new().on_error(Decision::stop_all),
        )
        .await;

    assert_eq!(result.unwrap_err().to_string(), "sink is full");
    // the endless source was released with the same reason
    let _ = tokio::time::timeout(Duration::from_secs(1), head.clone().collect())
        .await
        .expect("source must be closed");
    assert_eq!(head.reason().unwrap().to_string(), "sink is full");
}

#[tokio::test]
async fn test_map_many_windows() {
    let items = Arc::new(Mutex::new(Vec::new()));
    from_slice((1..=9).collect::<Vec<u32>>(), Options::new())
        .map_many(
            |_, input, out: Emitter<u32>| async move {
                let mut sum = 0;
                let mut n = 0;
                while let Some(v) = input.recv().await {
                    sum += v;
                    n += 1;
                    if n == 3 {
                        out.emit(sum).await?;
                        sum = 0;
                        n = 0;
                    }
                }
                Ok::<(), Error>(())
            },
            Options::new().capacity(1),
        )
        .consume(collector(&items), Options::new())
        .await
        .unwrap();

    assert_eq!(*items.lock().unwrap(), vec![6, 15, 24]);
}

#[tokio::test]
async fn test_raw_stream_with_external_producer() {
    let (reader, writer) = new::<String>(Options::new().capacity(2));
    let producer = tokio::spawn(async move {
        for i in 0..5 {
            writer.emit(format!("{i:03}")).await?;
        }
        writer.close(None);
        Ok::<(), Error>(())
    });

    let items = Arc::new(Mutex::new(Vec::new()));
    reader
        .consume(collector(&items), Options::new())
        .await
        .unwrap();
    producer.await.unwrap().unwrap();

    assert_eq!(
        *items.lock().unwrap(),
        vec!["000", "001", "002", "003", "004"]
    );
}

#[tokio::test]
async fn test_upstream_close_reason_reaches_consume() {
    let (reader, writer) = new::<i32>(Options::new().capacity(1));
    tokio::spawn(async move {
        writer.emit(1).await.unwrap();
        writer.close(Some(Error::custom("feed broke")));
    });

    let result = reader
        .filter(|_, _| Ok(true), Options::new())
        .consume(|_, _| async { Ok(()) }, Options::new())
        .await;
    assert_eq!(result.unwrap_err().to_string(), "feed broke");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_partition_by_index() {
    let per_worker: Arc<Vec<AtomicUsize>> =
        Arc::new((0..4).map(|_| AtomicUsize::new(0)).collect());
    let counts = per_worker.clone();

    from_slice((0..200).collect::<Vec<u32>>(), Options::new().capacity(8))
        .consume(
            move |ctx, _| {
                counts[ctx.worker_idx()].fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
            Options::new().parallelism(4).name("partitioned"),
        )
        .await
        .unwrap();

    let handled: usize = per_worker.iter().map(|c| c.load(Ordering::SeqCst)).sum();
    assert_eq!(handled, 200);
}
