//! # Example: Resilient call
//!
//! Wraps a flaky operation in a per-attempt deadline and a retry policy, runs the
//! result as a tracked unit, reads a file on the blocking pool, then waits for
//! Ctrl-C (or finishes after a few seconds) and shuts down gracefully.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use taskgate::{
    Config, JitterPolicy, OperationFn, RetryPolicy, Runtime, TaskError, TaskErrorKind,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config {
        grace: Duration::from_secs(3),
        ..Config::default()
    };
    let rt = Runtime::new(cfg)?;

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let flaky = OperationFn::new("load-sessions", move |ctx: CancellationToken| {
        let counter = counter.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                // First attempt hangs and is cut off by the deadline.
                ctx.cancelled().await;
                return Err(TaskError::Canceled);
            }
            if n == 2 {
                return Err(TaskError::fail("connection reset by peer"));
            }
            Ok(vec!["living-room", "bedroom"])
        }
    });

    let policy = RetryPolicy::new(4, Duration::from_millis(100), 2.0)?
        .retry_on([TaskErrorKind::Fail, TaskErrorKind::Timeout])
        .with_jitter(JitterPolicy::Equal);
    let op = rt
        .retry_with(policy)
        .wrap(rt.timeout(Duration::from_millis(300)).wrap(flaky));

    let sessions = rt.spawn_operation(op).join().await?;
    println!(
        "sessions: {sessions:?} after {} attempts",
        attempts.load(Ordering::SeqCst)
    );

    let manifest = rt
        .run_blocking(|| std::fs::read_to_string("Cargo.toml"))
        .await?;
    println!("manifest: {} bytes", manifest.len());

    let heartbeat = rt.spawn_named("heartbeat", async {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        for beat in 1u64.. {
            tick.tick().await;
            tracing::info!(beat, "still alive");
        }
        Ok::<(), TaskError>(())
    });
    tracing::info!(unit = %heartbeat.id(), "press Ctrl-C to stop (auto-stop in 5s)");

    tokio::select! {
        res = rt.run_until_signal() => res?,
        _ = tokio::time::sleep(Duration::from_secs(5)) => rt.shutdown().await?,
    }
    println!("heartbeat: {:?}", heartbeat.join().await);
    Ok(())
}
