/// 异步 worker 池示例
/// 多个生产者并发发布，处理器在 worker 中执行；失败与 panic 只进入钩子，close 等待队列取空
use eventbus::{
    AnyEvent, BusError, Context, Event, EventBus, EventBusConfig, EventBusSettings, EventType,
    Handler, HandlerPanic,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Event)]
#[event(name = "sensor.reading")]
struct SensorReading {
    sensor: u32,
    celsius: f64,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eventbus=debug".into()),
        )
        .init();

    // 选项通常来自外部键值配置源
    let settings: EventBusSettings =
        serde_json::from_str(r#"{ "asyncMode": true, "workerCount": 3 }"#)?;

    let config = EventBusConfig {
        enqueue_timeout: Duration::from_millis(500),
        panic_handler: Some(Arc::new(
            |event: &AnyEvent, handler: &str, panic: HandlerPanic| {
                warn!(event_type = event.name(), handler, panic = panic.message(), "handler panicked");
            },
        )),
        error_handler: Some(Arc::new(
            |event: &AnyEvent, handler: &str, error: &BusError| {
                warn!(event_type = event.name(), handler, %error, "handler failed");
            },
        )),
        ..EventBusConfig::from(settings)
    };
    let bus = EventBus::new(config);
    info!(
        workers = bus.worker_count(),
        capacity = bus.queue_capacity(),
        "bus ready"
    );

    let stored = Arc::new(AtomicUsize::new(0));
    bus.subscribe(EventType::of::<SensorReading>(), {
        let stored = stored.clone();
        Handler::callable(move |_ctx, ev: Arc<SensorReading>| {
            let stored = stored.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                if ev.celsius.is_nan() {
                    anyhow::bail!("sensor {} reported NaN", ev.sensor);
                }
                stored.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .named("store")
    })
    .await?;
    bus.subscribe(
        EventType::of::<SensorReading>(),
        Handler::callable(|_ctx, ev: Arc<SensorReading>| async move {
            if ev.celsius > 90.0 {
                panic!("sensor {} overheated", ev.sensor);
            }
            Ok(())
        })
        .named("overheat-alarm"),
    )
    .await?;

    let mut producers = tokio::task::JoinSet::new();
    for sensor in 0..4_u32 {
        let bus = bus.clone();
        producers.spawn(async move {
            let ctx = Context::background().with_timeout(Duration::from_secs(2));
            for tick in 0..25_u32 {
                let celsius = match (sensor, tick) {
                    (3, 24) => 95.0,
                    (2, 12) => f64::NAN,
                    _ => 20.0 + f64::from(tick) * 0.5,
                };
                bus.publish(&ctx, SensorReading { sensor, celsius }).await?;
            }
            Ok::<_, BusError>(())
        });
    }
    while let Some(res) = producers.join_next().await {
        res??;
    }

    bus.close().await?;
    info!(stored = stored.load(Ordering::SeqCst), "all readings processed");
    Ok(())
}
