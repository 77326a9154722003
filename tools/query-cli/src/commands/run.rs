//! Run readers against a simulated source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serde::Serialize;
use turbo_query::{fetcher, FetchCoordinator, FetchError, FetchOptions, FetchStatus, Fetcher};

use super::RunArgs;
use crate::context::Context;
use crate::output::{format_millis, status_badge};

/// Item returned by the simulated source.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price: u32,
}

/// What one reader observed.
#[derive(Debug, Serialize)]
struct ReaderReport {
    reader: usize,
    first_status: FetchStatus,
    final_status: FetchStatus,
    from_cache: bool,
    cycles: u64,
    items: Option<usize>,
    error: Option<String>,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
struct RunReport {
    key: String,
    fetcher_calls: usize,
    readers: Vec<ReaderReport>,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    if args.readers == 0 {
        bail!("--readers must be at least 1");
    }

    let store = ctx.store();
    let calls = Arc::new(AtomicUsize::new(0));
    let source = simulated_source(calls.clone(), args.delay_ms, args.fail.clone());

    ctx.output.header(&format!("Fetching '{}'", args.key));
    ctx.output.debug(&format!(
        "default ttl {}, delay {}",
        format_millis(store.default_ttl().as_millis()),
        format_millis(args.delay_ms as u128)
    ));

    let mut readers = Vec::with_capacity(args.readers);
    for reader in 1..=args.readers {
        let mut options = FetchOptions::new(args.key.clone(), source.clone())
            .on_success(move |products: &Vec<Product>| {
                tracing::info!(reader, items = products.len(), "reader fetched");
            })
            .on_error(move |e| {
                tracing::info!(reader, error = %e, "reader failed");
            });
        if let Some(ttl_ms) = args.ttl_ms {
            options = options.cache_time(Duration::from_millis(ttl_ms));
        }

        let coordinator = FetchCoordinator::new(store.clone(), options);
        let report = observe(reader, &coordinator, args.refetch, ctx).await;
        readers.push(report);

        if reader < args.readers {
            tokio::time::sleep(Duration::from_millis(args.gap_ms)).await;
        }
    }

    let report = RunReport {
        key: args.key,
        fetcher_calls: calls.load(Ordering::SeqCst),
        readers,
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    for r in &report.readers {
        ctx.output.info(&format!(
            "reader {}: {} -> {} ({}{})",
            r.reader,
            status_badge(r.first_status),
            status_badge(r.final_status),
            if r.from_cache { "cache, " } else { "" },
            format_millis(r.elapsed_ms),
        ));
        if let Some(items) = r.items {
            ctx.output.kv("items", &items.to_string());
        }
        if let Some(error) = &r.error {
            ctx.output.kv("error", error);
        }
    }

    ctx.output.kv("fetcher calls", &report.fetcher_calls.to_string());
    if report.readers.iter().any(|r| r.final_status == FetchStatus::Error) {
        ctx.output.warn("At least one reader ended in error");
    } else {
        ctx.output.success("All readers fetched");
    }

    Ok(())
}

/// Activate one coordinator and wait for it the way a renderer would.
async fn observe(
    reader: usize,
    coordinator: &FetchCoordinator<Vec<Product>>,
    refetch: bool,
    ctx: &Context,
) -> ReaderReport {
    let started = Instant::now();
    coordinator.activate();
    let first_status = coordinator.status();

    let mut outcome = settle(reader, coordinator, ctx).await;
    if refetch {
        coordinator.refetch();
        outcome = settle(reader, coordinator, ctx).await;
    }

    let (items, error) = match outcome {
        Ok(items) => (items, None),
        Err(error) => (None, Some(error.to_string())),
    };

    ReaderReport {
        reader,
        first_status,
        final_status: coordinator.status(),
        from_cache: first_status == FetchStatus::Fetched,
        cycles: coordinator.cycle(),
        items,
        error,
        elapsed_ms: started.elapsed().as_millis(),
    }
}

async fn settle(
    reader: usize,
    coordinator: &FetchCoordinator<Vec<Product>>,
    ctx: &Context,
) -> Result<Option<usize>, Arc<FetchError>> {
    let spinner = coordinator
        .read()
        .is_pending()
        .then(|| ctx.output.spinner(&format!("reader {} waiting", reader)));

    let result = coordinator.resolve().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    result.map(|r| r.data.map(|products| products.len()))
}

/// Source that sleeps, then returns a fixed catalog or fails.
fn simulated_source(calls: Arc<AtomicUsize>, delay_ms: u64, fail: Option<String>) -> Fetcher<Vec<Product>> {
    fetcher(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let fail = fail.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            match fail {
                Some(message) => Err(FetchError::Connection(message)),
                None => Ok(catalog()),
            }
        }
    })
}

fn catalog() -> Vec<Product> {
    ["Linen Shirt", "Canvas Tote", "Wool Socks"]
        .iter()
        .zip(1u32..)
        .map(|(name, id)| Product {
            id,
            name: name.to_string(),
            price: 9_900 * id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_source_counts_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = simulated_source(calls.clone(), 50, None);

        let products = source().await.unwrap();
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].id, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_source_fails() {
        let source = simulated_source(Arc::new(AtomicUsize::new(0)), 10, Some("network".into()));
        assert_eq!(
            source().await.unwrap_err(),
            FetchError::Connection("network".into())
        );
    }
}
