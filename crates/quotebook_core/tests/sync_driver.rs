use async_trait::async_trait;
use quotebook_core::db::{open_db, open_db_in_memory};
use quotebook_core::{
    Quote, QuoteBook, QuoteStore, ReconcileOptions, RemoteError, RemoteQuoteSource, RemoteResult,
    SqliteQuoteStore, SyncDriver, SyncSettings, SyncStage, SyncStatus,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};

#[derive(Default)]
struct FakeRemote {
    snapshot: Vec<Quote>,
    fail_fetch: AtomicBool,
    fail_push: AtomicBool,
    fetch_delay: Option<Duration>,
    hold_fetch: Option<Arc<Notify>>,
    fetch_calls: AtomicUsize,
    pushed: StdMutex<Vec<Vec<Quote>>>,
}

impl FakeRemote {
    fn serving(snapshot: Vec<Quote>) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn pushes(&self) -> Vec<Vec<Quote>> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteQuoteSource for FakeRemote {
    fn source_id(&self) -> &str {
        "fake"
    }

    async fn fetch_quotes(&self) -> RemoteResult<Vec<Quote>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.hold_fetch {
            gate.notified().await;
        }
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::new(
                "fake",
                SyncStage::Fetch,
                "transport_failed",
                "connection refused",
                true,
            ));
        }
        Ok(self.snapshot.clone())
    }

    async fn push_quotes(&self, quotes: &[Quote]) -> RemoteResult<()> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(RemoteError::new(
                "fake",
                SyncStage::Push,
                "http_status",
                "unexpected status 500",
                true,
            ));
        }
        self.pushed.lock().unwrap().push(quotes.to_vec());
        Ok(())
    }
}

fn shared_book(quotes: &[Quote]) -> Arc<Mutex<QuoteBook<SqliteQuoteStore>>> {
    let store = SqliteQuoteStore::try_new(open_db_in_memory().unwrap()).unwrap();
    store.save_quotes(quotes).unwrap();
    Arc::new(Mutex::new(QuoteBook::load(store).unwrap()))
}

fn driver(
    quotes: &[Quote],
    remote: Arc<FakeRemote>,
    settings: SyncSettings,
) -> Arc<SyncDriver<SqliteQuoteStore>> {
    Arc::new(SyncDriver::new(
        shared_book(quotes),
        remote,
        ReconcileOptions::default(),
        settings,
    ))
}

fn fast_settings() -> SyncSettings {
    SyncSettings {
        interval: Duration::from_secs(3600),
        request_timeout: Duration::from_secs(5),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should become true");
}

#[tokio::test]
async fn sync_now_merges_persists_and_pushes() {
    let remote = Arc::new(FakeRemote::serving(vec![
        Quote::new("A", "X"),
        Quote::with_id("server-1", "New server quote", "Server"),
    ]));
    let driver = driver(&[Quote::new("A", "X")], Arc::clone(&remote), fast_settings());

    let status = driver.sync_now().await;
    let report = status.report().expect("sync should complete");
    assert_eq!(report.added, 1);
    assert!(status.message().contains("1 added"));

    let book = driver.book();
    assert_eq!(book.lock().await.len(), 2);
    let pushes = remote.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].len(), 2);
    assert_eq!(driver.last_status(), status);
}

#[tokio::test]
async fn fetch_failure_leaves_store_unchanged() {
    let remote = Arc::new(FakeRemote::serving(vec![Quote::new("B", "Y")]));
    remote.fail_fetch.store(true, Ordering::SeqCst);
    let driver = driver(&[Quote::new("A", "X")], Arc::clone(&remote), fast_settings());

    let status = driver.sync_now().await;
    assert!(status.is_failure());
    assert!(status.message().contains("connection refused"));
    assert_eq!(driver.book().lock().await.quotes(), &[Quote::new("A", "X")]);
    assert!(remote.pushes().is_empty());

    remote.fail_fetch.store(false, Ordering::SeqCst);
    let retry = driver.sync_now().await;
    assert_eq!(retry.report().map(|report| report.added), Some(1));
}

#[tokio::test]
async fn push_failure_keeps_merge_and_reports_warning() {
    let remote = Arc::new(FakeRemote::serving(vec![Quote::new("B", "Y")]));
    remote.fail_push.store(true, Ordering::SeqCst);
    let driver = driver(&[], Arc::clone(&remote), fast_settings());

    match driver.sync_now().await {
        SyncStatus::Completed {
            report, push_error, ..
        } => {
            assert_eq!(report.added, 1);
            assert!(push_error.unwrap_or_default().contains("http_status"));
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(driver.book().lock().await.len(), 1);
}

#[tokio::test]
async fn slow_fetch_times_out() {
    let remote = Arc::new(FakeRemote {
        snapshot: vec![Quote::new("B", "Y")],
        fetch_delay: Some(Duration::from_secs(30)),
        ..FakeRemote::default()
    });
    let driver = driver(
        &[Quote::new("A", "X")],
        Arc::clone(&remote),
        SyncSettings {
            interval: Duration::from_secs(3600),
            request_timeout: Duration::from_millis(50),
        },
    );

    let status = driver.sync_now().await;
    match &status {
        SyncStatus::Failed { error, .. } => assert!(error.contains("timeout")),
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(driver.book().lock().await.len(), 1);
    assert!(!driver.is_syncing());
}

#[tokio::test]
async fn overlapping_triggers_coalesce() {
    let gate = Arc::new(Notify::new());
    let remote = Arc::new(FakeRemote {
        snapshot: vec![Quote::new("B", "Y")],
        hold_fetch: Some(Arc::clone(&gate)),
        ..FakeRemote::default()
    });
    let driver = driver(&[Quote::new("A", "X")], Arc::clone(&remote), fast_settings());

    let first = tokio::spawn({
        let driver = Arc::clone(&driver);
        async move { driver.sync_now().await }
    });
    wait_until(|| remote.fetch_calls() == 1).await;
    assert!(driver.is_syncing());

    let second = driver.sync_now().await;
    assert_eq!(second, SyncStatus::Coalesced);
    assert_eq!(remote.fetch_calls(), 1);

    gate.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.report().map(|report| report.added), Some(1));
    assert!(!driver.is_syncing());
    assert_eq!(driver.last_status(), first);
}

#[tokio::test]
async fn run_syncs_at_startup_and_on_interval() {
    let remote = Arc::new(FakeRemote::serving(vec![Quote::new("B", "Y")]));
    let driver = driver(
        &[Quote::new("A", "X")],
        Arc::clone(&remote),
        SyncSettings {
            interval: Duration::from_millis(20),
            request_timeout: Duration::from_secs(5),
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn({
        let driver = Arc::clone(&driver);
        async move { driver.run(shutdown_rx).await }
    });
    wait_until(|| remote.fetch_calls() >= 3).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("driver should stop after shutdown")
        .unwrap();

    assert_eq!(driver.book().lock().await.len(), 2);
}

#[tokio::test]
async fn shutdown_cancels_sync_waiting_on_network() {
    let gate = Arc::new(Notify::new());
    let remote = Arc::new(FakeRemote {
        snapshot: vec![Quote::new("B", "Y")],
        hold_fetch: Some(Arc::clone(&gate)),
        ..FakeRemote::default()
    });
    let driver = driver(&[Quote::new("A", "X")], Arc::clone(&remote), fast_settings());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn({
        let driver = Arc::clone(&driver);
        async move { driver.run(shutdown_rx).await }
    });
    wait_until(|| remote.fetch_calls() == 1).await;

    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("driver should stop when sender is dropped")
        .unwrap();

    assert!(!driver.is_syncing());
    assert_eq!(driver.book().lock().await.quotes(), &[Quote::new("A", "X")]);
    assert_eq!(driver.last_status(), SyncStatus::Idle);
}

#[tokio::test]
async fn push_now_sends_current_snapshot() {
    let remote = Arc::new(FakeRemote::default());
    let driver = driver(&[Quote::new("A", "X")], Arc::clone(&remote), fast_settings());

    driver
        .book()
        .lock()
        .await
        .add_quote("Fresh", "Local")
        .unwrap();
    driver.push_now().await.unwrap();

    let pushes = remote.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].len(), 2);
    assert_eq!(remote.fetch_calls(), 0);
}

#[tokio::test]
async fn subscribers_observe_status_changes() {
    let remote = Arc::new(FakeRemote::serving(vec![]));
    let driver = driver(&[], Arc::clone(&remote), fast_settings());
    let mut statuses = driver.subscribe();

    driver.sync_now().await;
    statuses.changed().await.unwrap();
    assert!(matches!(*statuses.borrow(), SyncStatus::Completed { .. }));
}

#[tokio::test]
async fn sync_merges_and_pushes_quotes_added_by_another_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotebook.sqlite3");
    let open_book = || {
        let store = SqliteQuoteStore::try_new(open_db(&path).unwrap()).unwrap();
        QuoteBook::load(store).unwrap()
    };

    let remote = Arc::new(FakeRemote::serving(vec![Quote::with_id(
        "server-1", "srv", "Server",
    )]));
    let driver = SyncDriver::new(
        Arc::new(Mutex::new(open_book())),
        Arc::clone(&remote) as Arc<dyn RemoteQuoteSource>,
        ReconcileOptions::default(),
        fast_settings(),
    );

    open_book().add_quote("Added elsewhere", "Local").unwrap();

    let status = driver.sync_now().await;
    assert_eq!(status.report().map(|report| report.added), Some(1));

    let pushed = remote.pushes();
    assert_eq!(pushed.len(), 1);
    assert!(pushed[0].iter().any(|quote| quote.text == "Added elsewhere"));
    assert_eq!(open_book().len(), 5);

    open_book().add_quote("Second edit", "Local").unwrap();
    driver.push_now().await.unwrap();
    let pushed = remote.pushes();
    assert!(pushed[1].iter().any(|quote| quote.text == "Second edit"));
}
