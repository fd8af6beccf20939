//! # Example: Bounded fan-out
//!
//! Fetches a batch of "pages" with at most three requests in flight, guards each
//! one with a deadline, serialises writes to a shared index with the reentrant
//! lock, and prints results in request order.
//!
//! Run with `RUST_LOG=debug cargo run --example bounded_fanout` to see unit events.

use std::sync::Arc;
use std::time::Duration;

use taskgate::{Callbacks, Config, ReentrantLock, Runtime, TaskError};
use tracing_subscriber::EnvFilter;

async fn fetch_page(page: u32) -> Result<String, TaskError> {
    tokio::time::sleep(Duration::from_millis(40 + u64::from(page % 4) * 30)).await;
    if page == 6 {
        return Err(TaskError::fail(format!("page {page}: upstream returned 503")));
    }
    Ok(format!("page-{page}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let rt = Runtime::new(Config::default())?;
    let index = Arc::new(ReentrantLock::new());
    let written = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut pool = rt.pool::<String>(3)?;
    for page in 0..10 {
        let deadline = rt.timeout(Duration::from_millis(150));
        let (index, written) = (index.clone(), written.clone());
        pool.submit_with(
            format!("fetch-{page}"),
            async move {
                let body = deadline.run("fetch", fetch_page(page)).await?;
                let _guard = index.lock().await.map_err(TaskError::fatal)?;
                if let Ok(mut w) = written.lock() {
                    w.push(page);
                }
                Ok(body)
            },
            Callbacks::new().on_failure(move |e: &TaskError| {
                tracing::warn!(page, error = %e, "page skipped");
            }),
        );
    }

    println!("queued: {} pending, capacity {}", pool.pending_count(), pool.capacity());
    for (page, res) in pool.gather_all().await.into_iter().enumerate() {
        match res {
            Ok(body) => println!("{page:>2}: {body}"),
            Err(e) => println!("{page:>2}: failed ({})", e.as_label()),
        }
    }
    println!(
        "peak running: {}, completed: {}",
        pool.peak_running(),
        pool.completed_count()
    );

    if let Ok(w) = written.lock() {
        println!("index write order: {:?}", *w);
    }

    rt.shutdown().await?;
    Ok(())
}
