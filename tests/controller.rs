use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::{Notify, broadcast};
use tokio::time;
use tokio_util::sync::CancellationToken;

use reconvisor::{
    Controller, ControllerConfig, ControllerRunState, Counters, EventKind, HandlerError,
    HandlerFn, HandlerRef, LeaderConfig, LeaderElector, LeadershipState, LeaseLock, ListResult,
    ResourceEvent, ResourceKey, Retriever, RuntimeError, SourceError, Subscribe, WatchStream,
};

/// Lists a fixed set of keys once, then streams `events` after `release` is notified.
struct Scripted {
    items: Vec<(ResourceKey, u32)>,
    events: Mutex<Option<Vec<ResourceEvent<u32>>>>,
    release: Arc<Notify>,
}

impl Scripted {
    fn listing(keys: &[&str]) -> Self {
        Self {
            items: keys.iter().map(|k| (ResourceKey::from(*k), 1)).collect(),
            events: Mutex::new(None),
            release: Arc::new(Notify::new()),
        }
    }

    fn then_watch(self, events: Vec<ResourceEvent<u32>>) -> Self {
        *self.events.lock().unwrap() = Some(events);
        self
    }
}

#[async_trait]
impl Retriever<u32> for Scripted {
    async fn list(&self) -> Result<ListResult<u32>, SourceError> {
        Ok(ListResult::new(self.items.clone(), "100"))
    }

    async fn watch(&self, _version: &str) -> Result<WatchStream<u32>, SourceError> {
        let Some(events) = self.events.lock().unwrap().take() else {
            return Ok(stream::pending().boxed());
        };
        let release = self.release.clone();
        Ok(stream::once(async move { release.notified().await })
            .flat_map(move |_| stream::iter(events.clone().into_iter().map(Ok)))
            .chain(stream::pending())
            .boxed())
    }
}

struct Broken;

#[async_trait]
impl Retriever<u32> for Broken {
    async fn list(&self) -> Result<ListResult<u32>, SourceError> {
        Err(SourceError::list("403 forbidden"))
    }

    async fn watch(&self, _version: &str) -> Result<WatchStream<u32>, SourceError> {
        Ok(stream::pending().boxed())
    }
}

type Calls = Arc<Mutex<Vec<(String, Option<u32>)>>>;

fn recording(calls: Calls, result: fn() -> Result<(), HandlerError>) -> HandlerRef<u32> {
    HandlerFn::arc(
        move |_ctx: CancellationToken, key: ResourceKey, p: Option<Arc<u32>>| {
            calls
                .lock()
                .unwrap()
                .push((key.to_string(), p.as_deref().copied()));
            async move { result() }
        },
    )
}

fn ok() -> Result<(), HandlerError> {
    Ok(())
}

fn boom() -> Result<(), HandlerError> {
    Err(HandlerError::fail("boom"))
}

async fn wait_for(rx: &mut broadcast::Receiver<reconvisor::Event>, kind: EventKind, n: usize) {
    let mut seen = 0;
    while seen < n {
        if rx.recv().await.unwrap().kind == kind {
            seen += 1;
        }
    }
}

#[tokio::test]
async fn list_then_watch_update_and_delete_runs_handler_four_times() {
    let retriever = Scripted::listing(&["a", "b"]).then_watch(vec![
        ResourceEvent::Updated(ResourceKey::from("a"), 2),
        ResourceEvent::Deleted(ResourceKey::from("b")),
    ]);
    let release = retriever.release.clone();
    let calls: Calls = Arc::default();
    let counters = Arc::new(Counters::new());

    let ctrl = Arc::new(
        Controller::builder(ControllerConfig::default())
            .with_handler(recording(calls.clone(), ok))
            .with_retriever(Arc::new(retriever))
            .with_subscribers(vec![counters.clone() as Arc<dyn Subscribe>])
            .build()
            .unwrap(),
    );
    let mut rx = ctrl.subscribe();
    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let ctrl = ctrl.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });

    wait_for(&mut rx, EventKind::ProcessingSucceeded, 2).await;
    release.notify_one();
    wait_for(&mut rx, EventKind::ProcessingSucceeded, 2).await;

    stop.cancel();
    run.await.unwrap().unwrap();
    assert_eq!(ctrl.state(), ControllerRunState::Stopped);

    let mut seen = calls.lock().unwrap().clone();
    let (initial, watched) = seen.split_at_mut(2);
    initial.sort();
    watched.sort();
    assert_eq!(
        seen,
        vec![
            ("a".to_string(), Some(1)),
            ("b".to_string(), Some(1)),
            ("a".to_string(), Some(2)),
            ("b".to_string(), None),
        ]
    );

    let snap = counters.snapshot();
    assert_eq!(snap.succeeded, 4);
    assert_eq!(snap.failed, 0);
    assert_eq!(snap.retries, 0);
}

#[tokio::test(start_paused = true)]
async fn always_failing_key_stops_after_max_retries_plus_one() {
    let calls: Calls = Arc::default();
    let cfg = ControllerConfig {
        max_retries: 2,
        concurrent_workers: 2,
        ..ControllerConfig::default()
    };
    let ctrl = Arc::new(
        Controller::builder(cfg)
            .with_handler(recording(calls.clone(), boom))
            .with_retriever(Arc::new(Scripted::listing(&["a"])))
            .build()
            .unwrap(),
    );
    let mut rx = ctrl.subscribe();
    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let ctrl = ctrl.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });

    wait_for(&mut rx, EventKind::RetriesExhausted, 1).await;
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.lock().unwrap().len(), 3);

    // The next resync gives the key a fresh budget.
    time::sleep(Duration::from_secs(150)).await;
    assert!(calls.lock().unwrap().len() > 3);

    stop.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn resync_reenqueues_every_listed_key_once_per_interval() {
    let calls: Calls = Arc::default();
    let cfg = ControllerConfig {
        resync_interval: Duration::from_secs(60),
        ..ControllerConfig::default()
    };
    let ctrl = Arc::new(
        Controller::builder(cfg)
            .with_handler(recording(calls.clone(), ok))
            .with_retriever(Arc::new(Scripted::listing(&["a", "b", "c"])))
            .build()
            .unwrap(),
    );
    let mut rx = ctrl.subscribe();
    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let ctrl = ctrl.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });

    wait_for(&mut rx, EventKind::ProcessingSucceeded, 3).await;
    wait_for(&mut rx, EventKind::ResyncTriggered, 1).await;
    wait_for(&mut rx, EventKind::ProcessingSucceeded, 3).await;
    stop.cancel();
    run.await.unwrap().unwrap();

    let mut per_key: HashMap<String, usize> = HashMap::new();
    for (key, _) in calls.lock().unwrap().iter() {
        *per_key.entry(key.clone()).or_default() += 1;
    }
    assert_eq!(per_key.len(), 3);
    assert!(per_key.values().all(|n| *n == 2), "{per_key:?}");
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_handlers_and_then_nothing_runs() {
    let finished = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    let handler: HandlerRef<u32> = HandlerFn::arc({
        let finished = finished.clone();
        let started = started.clone();
        move |_ctx: CancellationToken, _key: ResourceKey, _p: Option<Arc<u32>>| {
            let finished = finished.clone();
            started.fetch_add(1, Ordering::SeqCst);
            async move {
                time::sleep(Duration::from_millis(500)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(())
            }
        }
    });
    let cfg = ControllerConfig {
        concurrent_workers: 2,
        ..ControllerConfig::default()
    };
    let ctrl = Arc::new(
        Controller::builder(cfg)
            .with_handler(handler)
            .with_retriever(Arc::new(Scripted::listing(&["a", "b", "c", "d"])))
            .build()
            .unwrap(),
    );
    let mut rx = ctrl.subscribe();
    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let ctrl = ctrl.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });

    wait_for(&mut rx, EventKind::ProcessingStarted, 2).await;
    stop.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(ctrl.state(), ControllerRunState::Stopped);
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(finished.load(Ordering::SeqCst), 2);

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(started.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn processing_timeout_counts_as_retryable_failure() {
    let handler: HandlerRef<u32> = HandlerFn::arc(
        |ctx: CancellationToken, _key: ResourceKey, _p: Option<Arc<u32>>| async move {
            ctx.cancelled().await;
            Err::<(), _>(HandlerError::Canceled)
        },
    );
    let cfg = ControllerConfig {
        max_retries: 1,
        processing_timeout: Some(Duration::from_millis(100)),
        ..ControllerConfig::default()
    };
    let ctrl = Arc::new(
        Controller::builder(cfg)
            .with_handler(handler)
            .with_retriever(Arc::new(Scripted::listing(&["slow"])))
            .build()
            .unwrap(),
    );
    let mut rx = ctrl.subscribe();
    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let ctrl = ctrl.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });

    let mut timeouts = 0;
    loop {
        let ev = rx.recv().await.unwrap();
        match ev.kind {
            EventKind::TimeoutHit => timeouts += 1,
            EventKind::RetriesExhausted => {
                assert_eq!(ev.attempt, Some(2));
                break;
            }
            _ => {}
        }
    }
    assert_eq!(timeouts, 2);

    stop.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn failing_list_surfaces_from_run() {
    let ctrl = Controller::builder(ControllerConfig::default())
        .with_handler(recording(Arc::default(), ok))
        .with_retriever(Arc::new(Broken))
        .build()
        .unwrap();

    let err = ctrl.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Source(SourceError::List { .. })));
    assert_eq!(ctrl.state(), ControllerRunState::Stopped);

    let again = ctrl.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(again, RuntimeError::AlreadyRun));
}

#[tokio::test(start_paused = true)]
async fn only_one_controller_leads_and_the_next_starts_after_the_first_stopped() {
    let lock = LeaseLock::new();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let make = |reacquire: bool| {
        let active = active.clone();
        let max_active = max_active.clone();
        let handler: HandlerRef<u32> = HandlerFn::arc(
            move |_ctx: CancellationToken, _key: ResourceKey, _p: Option<Arc<u32>>| {
                let active = active.clone();
                let max_active = max_active.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    // Ignores cancellation on purpose: the lease must still not move.
                    time::sleep(Duration::from_millis(300)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, HandlerError>(())
                }
            },
        );
        let cfg = ControllerConfig {
            concurrent_workers: 1,
            ..ControllerConfig::default()
        };
        let elector: Arc<dyn LeaderElector> = Arc::new(lock.elector());
        Arc::new(
            Controller::builder(cfg)
                .with_handler(handler)
                .with_retriever(Arc::new(Scripted::listing(&["shared"])))
                .with_leader_elector(
                    elector,
                    LeaderConfig {
                        retry_period: Duration::from_millis(50),
                        reacquire,
                    },
                )
                .build()
                .unwrap(),
        )
    };

    let first = make(false);
    let second = make(true);
    let mut first_rx = first.subscribe();
    let mut second_rx = second.subscribe();
    let stop = CancellationToken::new();

    let first_run = tokio::spawn({
        let ctrl = first.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });
    wait_for(&mut first_rx, EventKind::ProcessingStarted, 1).await;

    let second_run = tokio::spawn({
        let ctrl = second.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });
    time::sleep(Duration::from_millis(120)).await;
    assert_eq!(first.leadership(), LeadershipState::Leader);
    assert_eq!(second.leadership(), LeadershipState::Follower);

    assert!(lock.expire());
    first_run.await.unwrap().unwrap();
    assert_eq!(first.leadership(), LeadershipState::Follower);

    wait_for(&mut second_rx, EventKind::ProcessingSucceeded, 1).await;
    assert_eq!(second.leadership(), LeadershipState::Leader);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);

    stop.cancel();
    second_run.await.unwrap().unwrap();
    assert!(!lock.is_held());
}

#[tokio::test(start_paused = true)]
async fn panicking_handler_does_not_stall_the_remaining_keys() {
    let handled: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = handled.clone();
    let handler: HandlerRef<u32> = HandlerFn::arc(
        move |_ctx: CancellationToken, key: ResourceKey, _p: Option<Arc<u32>>| {
            let sink = sink.clone();
            async move {
                if key.as_str() == "bad" {
                    panic!("corrupt object {key}");
                }
                sink.lock().unwrap().push(key.to_string());
                Ok::<_, HandlerError>(())
            }
        },
    );
    let cfg = ControllerConfig {
        concurrent_workers: 1,
        max_retries: 1,
        ..ControllerConfig::default()
    };
    let ctrl = Arc::new(
        Controller::builder(cfg)
            .with_handler(handler)
            .with_retriever(Arc::new(Scripted::listing(&["bad", "good"])))
            .build()
            .unwrap(),
    );
    let mut rx = ctrl.subscribe();
    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let ctrl = ctrl.clone();
        let stop = stop.clone();
        async move { ctrl.run(stop).await }
    });

    let mut exhausted = false;
    let mut succeeded = false;
    while !(exhausted && succeeded) {
        let ev = rx.recv().await.unwrap();
        match ev.kind {
            EventKind::RetriesExhausted => {
                assert_eq!(ev.key.as_deref(), Some("bad"));
                exhausted = true;
            }
            EventKind::ProcessingSucceeded => succeeded = true,
            _ => {}
        }
    }
    assert_eq!(ctrl.state(), ControllerRunState::Running);

    stop.cancel();
    run.await.unwrap().unwrap();
    assert_eq!(ctrl.state(), ControllerRunState::Stopped);
    assert_eq!(*handled.lock().unwrap(), vec!["good".to_string()]);
}
