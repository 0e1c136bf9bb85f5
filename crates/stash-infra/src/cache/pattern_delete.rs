//! Pattern delete engine.
//!
//! One call drives a scan over the keyspace and fans out a batch delete per
//! scanned batch without waiting for earlier deletes. Every spawned delete is
//! tracked and joined before the call resolves, so the returned count covers
//! all acknowledged deletions.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::task::{JoinError, JoinHandle};

use stash_core::ports::{CacheLogger, KeyStore, LogRecord};
use stash_core::{CacheError, StoreError};

/// Running count for one pattern delete; never shared between calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeletionTally {
    /// Batches handed to the store for deletion.
    pub batches: usize,
    /// Batches whose delete failed and contributed nothing.
    pub failed_batches: usize,
    /// Keys reported by the scan.
    pub observed: u64,
    /// Keys the store acknowledged as removed.
    pub deleted: u64,
}

impl DeletionTally {
    fn record(
        &mut self,
        joined: Result<Result<u64, StoreError>, JoinError>,
        pattern: &str,
        logger: &dyn CacheLogger,
    ) {
        match joined {
            Ok(Ok(deleted)) => self.deleted += deleted,
            Ok(Err(e)) => {
                self.failed_batches += 1;
                logger.error(
                    &LogRecord::new("Batch delete failed")
                        .pattern(pattern)
                        .error(&e),
                );
            }
            Err(e) => {
                self.failed_batches += 1;
                logger.error(
                    &LogRecord::new("Batch delete task did not complete")
                        .pattern(pattern)
                        .error(&e),
                );
            }
        }
    }
}

/// Delete every key matching `pattern`, `batch_size` keys per store call.
///
/// Batch failures are logged and counted as zero. A scan failure fails the
/// whole call, after the deletes already issued have been joined.
pub async fn delete_matching(
    store: &Arc<dyn KeyStore>,
    logger: &dyn CacheLogger,
    pattern: &str,
    batch_size: usize,
) -> Result<DeletionTally, CacheError> {
    let mut scan = store.scan(pattern, batch_size);
    let mut in_flight: FuturesUnordered<JoinHandle<Result<u64, StoreError>>> =
        FuturesUnordered::new();
    let mut tally = DeletionTally::default();

    // Scanning: spawn a delete per batch, harvesting finished deletes as we go.
    let scan_error = loop {
        tokio::select! {
            biased;

            Some(joined) = in_flight.next(), if !in_flight.is_empty() => {
                tally.record(joined, pattern, logger);
            }
            next = scan.next() => match next {
                Some(Ok(keys)) => {
                    tally.batches += 1;
                    tally.observed += keys.len() as u64;

                    let store = Arc::clone(store);
                    // Dropping the handle detaches the task, so issued deletes
                    // still run if the caller stops waiting.
                    in_flight.push(tokio::spawn(async move { store.delete_many(&keys).await }));
                }
                Some(Err(e)) => break Some(e),
                None => break None,
            },
        }
    };

    // Draining: wait for every outstanding delete, not only the latest.
    while let Some(joined) = in_flight.next().await {
        tally.record(joined, pattern, logger);
    }

    if let Some(source) = scan_error {
        logger.error(
            &LogRecord::new("Scan failed; deletes already issued were completed")
                .pattern(pattern)
                .count(tally.deleted)
                .error(&source),
        );
        return Err(CacheError::Scan {
            pattern: pattern.to_string(),
            source,
        });
    }

    tracing::debug!(
        pattern = %pattern,
        batches = tally.batches,
        failed_batches = tally.failed_batches,
        observed = tally.observed,
        deleted = tally.deleted,
        "Pattern delete finished"
    );

    Ok(tally)
}
