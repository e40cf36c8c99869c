//! Periodic and on-demand sync driver.
//!
//! # Responsibility
//! - Run fetch, reconcile, persist, push as one cycle.
//! - Repeat the cycle on a fixed interval, once immediately at startup.
//! - Publish the latest `SyncStatus` to subscribers.
//!
//! # Invariants
//! - At most one cycle runs at a time; overlapping triggers coalesce.
//! - Every remote call is bounded by `request_timeout`.
//! - Merge and store write share one lock scope without await points, so a
//!   cancelled cycle leaves the store either untouched or fully written.
//! - A failed fetch never mutates the book.
//! - Merges and pushes start from the stored sequence, not the one loaded at startup.

use crate::model::quote::Quote;
use crate::repo::quote_store::QuoteStore;
use crate::service::quote_book::{QuoteBook, QuoteBookError};
use crate::sync::reconcile::{MergeReport, ReconcileOptions, Reconciler};
use crate::sync::remote::{RemoteError, RemoteQuoteSource, RemoteResult, SyncStage};
use crate::sync::status::SyncStatus;
use chrono::Utc;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing knobs for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Failure of one sync cycle before anything was merged.
#[derive(Debug)]
pub enum SyncError {
    Remote(RemoteError),
    Book(QuoteBookError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(err) => write!(f, "{err}"),
            Self::Book(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Book(err) => Some(err),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

impl From<QuoteBookError> for SyncError {
    fn from(value: QuoteBookError) -> Self {
        Self::Book(value)
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight sync coordinator over a shared quote book.
pub struct SyncDriver<S: QuoteStore> {
    book: Arc<Mutex<QuoteBook<S>>>,
    remote: Arc<dyn RemoteQuoteSource>,
    reconciler: Reconciler,
    settings: SyncSettings,
    in_flight: AtomicBool,
    status_tx: watch::Sender<SyncStatus>,
}

impl<S: QuoteStore + Send> SyncDriver<S> {
    pub fn new(
        book: Arc<Mutex<QuoteBook<S>>>,
        remote: Arc<dyn RemoteQuoteSource>,
        options: ReconcileOptions,
        settings: SyncSettings,
    ) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        Self {
            book,
            remote,
            reconciler: Reconciler::new(options),
            settings,
            in_flight: AtomicBool::new(false),
            status_tx,
        }
    }

    pub fn book(&self) -> Arc<Mutex<QuoteBook<S>>> {
        Arc::clone(&self.book)
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Whether a cycle currently holds the single-flight gate.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Status of the last cycle that actually ran.
    pub fn last_status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    /// Receiver notified after every completed or failed cycle.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Runs one sync cycle, or returns `Coalesced` if one is in flight.
    ///
    /// Coalesced triggers do not overwrite `last_status()`.
    pub async fn sync_now(&self) -> SyncStatus {
        let Some(_guard) = self.try_begin() else {
            debug!(
                "event=sync_run module=sync status=coalesced source={}",
                self.remote.source_id()
            );
            return SyncStatus::Coalesced;
        };

        let started_at = Instant::now();
        info!(
            "event=sync_run module=sync status=start source={}",
            self.remote.source_id()
        );

        let status = match self.run_cycle().await {
            Ok((report, push_error)) => {
                info!(
                    "event=sync_run module=sync status=ok source={} duration_ms={} added={} conflicts={} unchanged={} pushed={}",
                    self.remote.source_id(),
                    started_at.elapsed().as_millis(),
                    report.added,
                    report.conflicts,
                    report.unchanged,
                    push_error.is_none()
                );
                SyncStatus::Completed {
                    report,
                    push_error,
                    at: Utc::now(),
                }
            }
            Err(err) => {
                warn!(
                    "event=sync_run module=sync status=error source={} duration_ms={} error={}",
                    self.remote.source_id(),
                    started_at.elapsed().as_millis(),
                    err
                );
                SyncStatus::Failed {
                    error: err.to_string(),
                    at: Utc::now(),
                }
            }
        };

        self.status_tx.send_replace(status.clone());
        status
    }

    /// Pushes the stored local sequence without pulling.
    ///
    /// Used after local edits; nothing is written to the store here.
    pub async fn push_now(&self) -> RemoteResult<()> {
        let snapshot = self.snapshot().await;
        self.bounded(SyncStage::Push, self.remote.push_quotes(&snapshot))
            .await
    }

    /// Syncs at startup and then every `interval` until `shutdown` fires.
    ///
    /// Shutdown is a `true` value or a dropped sender. A cycle waiting on the
    /// network when shutdown fires is cancelled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "event=sync_driver module=sync status=start interval_ms={} timeout_ms={}",
            self.settings.interval.as_millis(),
            self.settings.request_timeout.as_millis()
        );

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.sync_now() => {}
                        _ = wait_for_shutdown(&mut shutdown) => {
                            info!("event=sync_run module=sync status=cancelled reason=shutdown");
                            break;
                        }
                    }
                }
            }
        }

        info!("event=sync_driver module=sync status=stopped");
    }

    fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.in_flight))
    }

    async fn run_cycle(&self) -> Result<(MergeReport, Option<String>), SyncError> {
        let remote = self
            .bounded(SyncStage::Fetch, self.remote.fetch_quotes())
            .await?;

        let (report, snapshot) = {
            let mut book = self.book.lock().await;
            let report = book.apply_merge(&remote, &self.reconciler)?;
            (report, book.quotes().to_vec())
        };

        let push_error = match self
            .bounded(SyncStage::Push, self.remote.push_quotes(&snapshot))
            .await
        {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    "event=remote_push module=sync status=error source={} code={} retryable={}",
                    err.source_id, err.code, err.retryable
                );
                Some(err.to_string())
            }
        };

        Ok((report, push_error))
    }

    async fn snapshot(&self) -> Vec<Quote> {
        let mut book = self.book.lock().await;
        if let Err(err) = book.refresh() {
            warn!("event=book_refresh module=sync status=error error={err}");
        }
        book.quotes().to_vec()
    }

    async fn bounded<T>(
        &self,
        stage: SyncStage,
        call: impl Future<Output = RemoteResult<T>>,
    ) -> RemoteResult<T> {
        let budget = self.settings.request_timeout;
        match tokio::time::timeout(budget, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::timeout(
                self.remote.source_id(),
                stage,
                budget,
            )),
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
