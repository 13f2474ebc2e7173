use async_trait::async_trait;
use eventbus::{
    AnyEvent, BusError, Context, Event, EventBus, EventBusConfig, EventBusSettings, EventHandler,
    EventType, Handler, HandlerPanic,
};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Event)]
#[event(name = "account.deposited")]
struct Deposited {
    account: String,
    amount: i64,
}

#[derive(Debug, Clone, Event)]
#[event(name = "account.withdrawn")]
struct Withdrawn {
    account: String,
    amount: i64,
}

#[derive(Default)]
struct Ledger {
    balance: AtomicI64,
    entries: Mutex<Vec<String>>,
}

#[async_trait]
impl EventHandler<Deposited> for Ledger {
    fn handler_name(&self) -> &str {
        "ledger.deposited"
    }

    async fn handle(&self, _ctx: &Context, event: &Deposited) -> anyhow::Result<()> {
        self.balance.fetch_add(event.amount, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .push(format!("+{} {}", event.amount, event.account));
        Ok(())
    }
}

#[async_trait]
impl EventHandler<Withdrawn> for Ledger {
    fn handler_name(&self) -> &str {
        "ledger.withdrawn"
    }

    async fn handle(&self, _ctx: &Context, event: &Withdrawn) -> anyhow::Result<()> {
        if event.amount > self.balance.load(Ordering::SeqCst) {
            anyhow::bail!("insufficient funds on {}", event.account);
        }
        self.balance.fetch_sub(event.amount, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .push(format!("-{} {}", event.amount, event.account));
        Ok(())
    }
}

#[derive(Default)]
struct Failures {
    errors: Mutex<Vec<(String, String)>>,
    panics: Mutex<Vec<(String, String)>>,
}

fn recording_config(failures: &Arc<Failures>) -> EventBusConfig {
    let on_error = {
        let failures = failures.clone();
        move |event: &AnyEvent, handler: &str, _err: &BusError| {
            failures
                .errors
                .lock()
                .unwrap()
                .push((event.name().to_string(), handler.to_string()));
        }
    };
    let on_panic = {
        let failures = failures.clone();
        move |_event: &AnyEvent, handler: &str, panic: HandlerPanic| {
            failures
                .panics
                .lock()
                .unwrap()
                .push((handler.to_string(), panic.message().to_string()));
        }
    };
    EventBusConfig::builder()
        .error_handler(Arc::new(on_error))
        .panic_handler(Arc::new(on_panic))
        .build()
}

fn deposit(amount: i64) -> Deposited {
    Deposited {
        account: "acc-1".into(),
        amount,
    }
}

fn withdraw(amount: i64) -> Withdrawn {
    Withdrawn {
        account: "acc-1".into(),
        amount,
    }
}

#[tokio::test]
async fn object_and_callable_handlers_share_one_bus() {
    let failures = Arc::new(Failures::default());
    let bus = EventBus::new(recording_config(&failures));
    let ledger = Arc::new(Ledger::default());
    let audit = Arc::new(Mutex::new(Vec::new()));

    bus.subscribe(
        EventType::of::<Deposited>(),
        Handler::<Deposited>::shared(ledger.clone()),
    )
    .await
    .unwrap();
    bus.subscribe(
        EventType::of::<Withdrawn>(),
        Handler::<Withdrawn>::shared(ledger.clone()),
    )
    .await
    .unwrap();
    bus.subscribe(EventType::of::<Deposited>(), {
        let audit = audit.clone();
        Handler::callable(move |_ctx, ev: Arc<Deposited>| {
            let audit = audit.clone();
            async move {
                audit.lock().unwrap().push(ev.amount);
                Ok(())
            }
        })
        .named("audit")
    })
    .await
    .unwrap();

    let ctx = Context::background();
    bus.publish(&ctx, deposit(100)).await.unwrap();
    bus.publish(&ctx, withdraw(30)).await.unwrap();

    let err = bus.publish(&ctx, withdraw(500)).await.unwrap_err();
    match &err {
        BusError::Handler { handler, source } => {
            assert_eq!(handler, "ledger.withdrawn");
            assert_eq!(source.to_string(), "insufficient funds on acc-1");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(ledger.balance.load(Ordering::SeqCst), 70);
    assert_eq!(*ledger.entries.lock().unwrap(), vec!["+100 acc-1", "-30 acc-1"]);
    assert_eq!(*audit.lock().unwrap(), vec![100]);
    assert_eq!(
        *failures.errors.lock().unwrap(),
        vec![("account.withdrawn".to_string(), "ledger.withdrawn".to_string())]
    );

    let mut types = bus.subscribed_event_types().await;
    types.sort_unstable();
    assert_eq!(types, vec!["account.deposited", "account.withdrawn"]);
    assert_eq!(bus.handler_count(EventType::of::<Deposited>()).await, 2);

    bus.close().await.unwrap();
}

#[tokio::test]
async fn type_erased_publish_routes_by_runtime_type() {
    let bus = EventBus::default();
    let ledger = Arc::new(Ledger::default());
    bus.subscribe(
        EventType::of::<Deposited>(),
        Handler::<Deposited>::shared(ledger.clone()),
    )
    .await
    .unwrap();

    let ctx = Context::background();
    bus.publish_any(&ctx, Some(AnyEvent::new(deposit(5)))).await.unwrap();
    bus.publish_any(&ctx, Some(AnyEvent::new(withdraw(5)))).await.unwrap();
    bus.publish_any(&ctx, None).await.unwrap();

    assert_eq!(ledger.balance.load(Ordering::SeqCst), 5);
    assert_eq!(Deposited::event_name(), "account.deposited");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn settings_drive_an_async_worker_pool() {
    let settings: EventBusSettings =
        serde_json::from_str(r#"{ "asyncMode": true, "workerCount": 4 }"#).unwrap();
    let failures = Arc::new(Failures::default());
    let config = EventBusConfig {
        async_mode: settings.async_mode,
        worker_count: settings.worker_count(),
        ..recording_config(&failures)
    };
    let bus = EventBus::new(config);
    assert!(bus.is_async());
    assert_eq!(bus.worker_count(), 4);
    assert_eq!(bus.queue_capacity(), 40);

    let ledger = Arc::new(Ledger::default());
    let panicked = Arc::new(AtomicUsize::new(0));
    bus.subscribe(
        EventType::of::<Deposited>(),
        Handler::<Deposited>::shared(ledger.clone()),
    )
    .await
    .unwrap();
    bus.subscribe(EventType::of::<Deposited>(), {
        let panicked = panicked.clone();
        Handler::callable(move |_ctx, ev: Arc<Deposited>| {
            let panicked = panicked.clone();
            async move {
                if ev.amount % 10 == 0 {
                    panicked.fetch_add(1, Ordering::SeqCst);
                    panic!("round amount {}", ev.amount);
                }
                Ok(())
            }
        })
        .named("round-amount-guard")
    })
    .await
    .unwrap();

    let mut set = tokio::task::JoinSet::new();
    for producer in 0..8_i64 {
        let bus = bus.clone();
        set.spawn(async move {
            let ctx = Context::background();
            for i in 1..=25_i64 {
                bus.publish(&ctx, deposit(producer * 100 + i)).await.unwrap();
            }
        });
    }
    while let Some(res) = set.join_next().await {
        res.unwrap();
    }
    bus.close().await.unwrap();

    let expected: i64 = (0..8_i64)
        .flat_map(|p| (1..=25_i64).map(move |i| p * 100 + i))
        .sum();
    assert_eq!(ledger.balance.load(Ordering::SeqCst), expected);
    assert_eq!(ledger.entries.lock().unwrap().len(), 200);

    // 每个生产者的 10、20 两个金额触发 panic
    assert_eq!(panicked.load(Ordering::SeqCst), 16);
    let panics = failures.panics.lock().unwrap();
    assert_eq!(panics.len(), 16);
    assert!(panics.iter().all(|(h, msg)| h == "round-amount-guard" && msg.starts_with("round amount")));
    assert!(failures.errors.lock().unwrap().is_empty());

    let err = bus.publish(&Context::background(), deposit(1)).await.unwrap_err();
    assert!(matches!(err, BusError::PublishOnClosedBus));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expired_deadline_is_reported_as_deadline_exceeded() {
    let bus = EventBus::new(EventBusConfig {
        async_mode: true,
        ..Default::default()
    });
    bus.subscribe(
        EventType::of::<Deposited>(),
        Handler::<Deposited>::object(Ledger::default()),
    )
    .await
    .unwrap();

    let ctx = Context::background().with_timeout(Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = bus.publish(&ctx, deposit(1)).await.unwrap_err();
    assert!(matches!(err, BusError::DeadlineExceeded));
    assert!(err.is_cancellation());

    bus.close().await.unwrap();
}
