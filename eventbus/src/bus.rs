//! 事件总线（EventBus）
//!
//! 发布/订阅核心：持有类型注册表、开闭状态与两种分发策略。
//! - 同步模式：在发布方任务内按订阅顺序逐个调用处理器，首个失败即返回（fail-fast）；
//! - 异步模式：为每个处理器入队一个投递任务，由 worker 池执行，失败只进入钩子；
//! - 入队是三方竞争：入队成功 / 上下文取消或超时 / 入队超时（`EventChannelBlocked`）；
//! - `close` 幂等：翻转关闭标记并关闭队列，随后等待 worker 取空队列后退出。
//!
//! 注册表、关闭标记与入队端放在同一把读写锁下：订阅与关闭取写锁，发布取读锁，
//! 因此关闭标记翻转后不会再有新任务入队；执行处理器前总会先释放锁。
//!
use crate::config::EventBusConfig;
use crate::context::Context;
use crate::error::{BusError, BusResult};
use crate::event::{AnyEvent, Event, EventType};
use crate::handler::{Handler, HandlerAdapter};
use crate::hooks::Hooks;
use crate::pool::{DeliveryTask, WorkerPool};
use crate::registry::TypeRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct BusState {
    registry: TypeRegistry,
    closed: bool,
    queue: Option<flume::Sender<DeliveryTask>>,
}

struct Shared {
    state: RwLock<BusState>,
    hooks: Arc<Hooks>,
    pool: Option<WorkerPool>,
    enqueue_timeout: Duration,
}

/// 进程内类型化事件总线
///
/// 克隆得到的句柄共享同一总线。异步模式需在 Tokio 运行时内构造。
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let worker_count = config.effective_worker_count();
        let capacity = config.queue_capacity();
        let hooks = Arc::new(Hooks::resolve(
            config.panic_handler,
            config.error_handler,
            config.logger,
        ));

        let (pool, queue) = if config.async_mode {
            let (pool, queue) = WorkerPool::start(worker_count, capacity, hooks.clone());
            debug!(workers = worker_count, capacity, "event bus worker pool started");
            (Some(pool), Some(queue))
        } else {
            (None, None)
        };

        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(BusState {
                    registry: TypeRegistry::default(),
                    closed: false,
                    queue,
                }),
                hooks,
                pool,
                enqueue_timeout: config.enqueue_timeout,
            }),
        }
    }

    /// 订阅：`marker` 声明事件类型，须与处理器推断出的类型一致
    ///
    /// 校验失败或总线已关闭时不会注册任何内容。
    pub async fn subscribe<E: Event>(&self, marker: EventType, handler: Handler<E>) -> BusResult<()> {
        let adapter = HandlerAdapter::new(marker, handler)?;

        let mut state = self.shared.state.write().await;
        if state.closed {
            return Err(BusError::BusClosed);
        }
        debug!(
            event_type = marker.name(),
            handler = adapter.name(),
            "event handler subscribed"
        );
        state.registry.register(adapter);
        Ok(())
    }

    /// 发布强类型事件
    pub async fn publish<E: Event>(&self, ctx: &Context, event: E) -> BusResult<()> {
        self.publish_any(ctx, Some(AnyEvent::new(event))).await
    }

    /// 发布类型擦除的事件；`None` 视为空操作
    pub async fn publish_any(&self, ctx: &Context, event: Option<AnyEvent>) -> BusResult<()> {
        let Some(event) = event else {
            return Ok(());
        };

        let state = self.shared.state.read().await;
        if state.closed {
            return Err(BusError::PublishOnClosedBus);
        }

        let handlers = state.registry.lookup(event.event_type());
        if handlers.is_empty() {
            return Ok(());
        }

        if self.shared.pool.is_none() {
            drop(state);
            return self.dispatch_inline(ctx, &event, handlers).await;
        }

        // 入队期间保持读锁，close 会等待在途的发布结束
        let Some(queue) = state.queue.as_ref() else {
            return Err(BusError::PublishOnClosedBus);
        };
        self.enqueue(queue, ctx, &event, handlers).await
    }

    async fn dispatch_inline(
        &self,
        ctx: &Context,
        event: &AnyEvent,
        handlers: Vec<Arc<HandlerAdapter>>,
    ) -> BusResult<()> {
        for handler in handlers {
            self.shared.hooks.invoke(ctx, &handler, event).await?;
        }
        Ok(())
    }

    async fn enqueue(
        &self,
        queue: &flume::Sender<DeliveryTask>,
        ctx: &Context,
        event: &AnyEvent,
        handlers: Vec<Arc<HandlerAdapter>>,
    ) -> BusResult<()> {
        if let Some(err) = ctx.error() {
            return Err(err);
        }

        let timeout = self.shared.enqueue_timeout;
        for handler in handlers {
            let task = DeliveryTask {
                ctx: ctx.clone(),
                event: event.clone(),
                handler,
            };

            tokio::select! {
                biased;
                _ = ctx.done() => {
                    let err = ctx.error().unwrap_or(BusError::Cancelled);
                    warn!(event_type = event.name(), error = %err, "event enqueue abandoned");
                    return Err(err);
                }
                sent = queue.send_async(task) => {
                    // worker 全部意外退出（例如运行时已关闭），总线本身仍处于打开状态
                    if sent.is_err() {
                        warn!(event_type = event.name(), "event queue disconnected");
                        return Err(BusError::QueueDisconnected);
                    }
                }
                _ = tokio::time::sleep(timeout) => {
                    warn!(event_type = event.name(), ?timeout, "event channel blocked");
                    return Err(BusError::EventChannelBlocked {
                        event: event.name(),
                        timeout,
                    });
                }
            }
        }
        Ok(())
    }

    /// 关闭总线：之后的订阅返回 `BusClosed`，发布返回 `PublishOnClosedBus`
    ///
    /// 等待队列中已有的投递全部执行完毕；重复调用直接返回 `Ok(())`。
    ///
    /// 异步模式下，若未配置 logger 的默认钩子在 worker 中升级过 panic，
    /// 取空队列后在调用方重新抛出其中第一个。
    pub async fn close(&self) -> BusResult<()> {
        {
            let mut state = self.shared.state.write().await;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.queue = None;
        }

        if let Some(pool) = &self.shared.pool {
            let escalated = pool.join().await;
            debug!("event bus closed");
            if let Some(payload) = escalated {
                std::panic::resume_unwind(payload);
            }
            return Ok(());
        }
        debug!("event bus closed");
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.state.read().await.closed
    }

    /// 某事件类型当前的处理器数量
    pub async fn handler_count(&self, event_type: EventType) -> usize {
        self.shared.state.read().await.registry.handler_count(event_type)
    }

    /// 已有订阅的事件类型名列表（只读视图）
    pub async fn subscribed_event_types(&self) -> Vec<&'static str> {
        let state = self.shared.state.read().await;
        state
            .registry
            .event_types()
            .into_iter()
            .map(|ty| ty.name())
            .collect()
    }

    pub fn is_async(&self) -> bool {
        self.shared.pool.is_some()
    }

    /// worker 数量（同步模式为 0）
    pub fn worker_count(&self) -> usize {
        self.shared.pool.as_ref().map_or(0, WorkerPool::size)
    }

    /// 异步队列容量（同步模式为 0）
    pub fn queue_capacity(&self) -> usize {
        self.shared.pool.as_ref().map_or(0, WorkerPool::capacity)
    }
}
