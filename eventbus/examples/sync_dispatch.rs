/// 同步分发示例
/// 展示可调用/对象两种处理器、按订阅顺序执行与 fail-fast，以及 panic 被钩子隔离
use async_trait::async_trait;
use eventbus::{Context, Event, EventBus, EventBusConfig, EventHandler, EventType, Handler};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Event)]
#[event(name = "order.placed")]
struct OrderPlaced {
    order_id: u64,
    total_cents: u64,
}

#[derive(Default)]
struct Revenue {
    total_cents: AtomicU64,
}

#[async_trait]
impl EventHandler<OrderPlaced> for Revenue {
    fn handler_name(&self) -> &str {
        "revenue"
    }

    async fn handle(&self, _ctx: &Context, event: &OrderPlaced) -> anyhow::Result<()> {
        self.total_cents.fetch_add(event.total_cents, Ordering::SeqCst);
        Ok(())
    }
}

fn reject_free_order(order_id: u64) -> anyhow::Result<()> {
    anyhow::bail!("order {order_id} has no billable items")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eventbus=debug".into()),
        )
        .init();

    // 配置 logger 后，默认钩子只记录日志，不再重新抛出
    let bus = EventBus::new(
        EventBusConfig::builder()
            .logger(tracing::dispatcher::get_default(|d| d.clone()))
            .build(),
    );

    let revenue = Arc::new(Revenue::default());
    bus.subscribe(
        EventType::of::<OrderPlaced>(),
        Handler::<OrderPlaced>::shared(revenue.clone()),
    )
    .await?;
    bus.subscribe(
        EventType::of::<OrderPlaced>(),
        Handler::callable(|_ctx, ev: Arc<OrderPlaced>| async move {
            if ev.total_cents == 0 {
                return reject_free_order(ev.order_id);
            }
            info!(order_id = ev.order_id, "order confirmation sent");
            Ok(())
        })
        .named("notifier"),
    )
    .await?;

    let ctx = Context::background();
    bus.publish(&ctx, OrderPlaced { order_id: 1, total_cents: 1250 }).await?;
    bus.publish(&ctx, OrderPlaced { order_id: 2, total_cents: 990 }).await?;

    // 同步模式下首个失败直接返回给发布方
    if let Err(err) = bus.publish(&ctx, OrderPlaced { order_id: 3, total_cents: 0 }).await {
        info!(error = %err, "publish failed");
    }

    info!(
        total_cents = revenue.total_cents.load(Ordering::SeqCst),
        subscribed = ?bus.subscribed_event_types().await,
        "revenue summary"
    );

    bus.close().await?;
    Ok(())
}
