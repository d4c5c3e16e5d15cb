//! Counts upwards forever, keeps the even numbers, formats them slowly on five
//! workers, parses them back and prints a running sum roughly every second.
//! Stops after five seconds or on Ctrl-C.

use std::time::{Duration, Instant};

use lazyweld::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let token = CancellationToken::new();
    let opts = || Options::new().cancellation(token.clone());

    let (nums, writer) = new::<u64>(opts());
    tokio::spawn(async move {
        for n in 1.. {
            if let Err(e) = writer.emit(n).await {
                tracing::info!(error = %e, "producer stopped");
                break;
            }
        }
    });

    let summed = nums
        .filter(|_, v| Ok(v % 2 == 0), opts().name("even"))
        .map(
            |_, v| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(format!("{v:03}"))
            },
            opts().capacity(1).parallelism(5).name("format"),
        )
        .map_many(
            |_, input, out: Emitter<u64>| async move {
                let mut sum = 0;
                let mut last = Instant::now();
                while let Some(v) = input.recv().await {
                    sum += v.parse::<u64>().into_stage_error()?;
                    if last.elapsed() > Duration::from_secs(1) {
                        out.emit(sum).await?;
                        last = Instant::now();
                        sum = 0;
                    }
                }
                Ok::<(), Error>(())
            },
            opts().name("sum-every-second"),
        );

    let stopper = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
        }
        stopper.cancel();
    });

    let result = summed
        .consume(
            |ctx, sum| async move {
                println!("[{}] {sum}", ctx.name());
                Ok(())
            },
            opts().name("print"),
        )
        .await;

    match result {
        Err(Error::Cancelled) => {
            println!("pipeline cancelled");
            Ok(())
        }
        other => other,
    }
}
