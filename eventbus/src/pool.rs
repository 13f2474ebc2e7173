//! 异步模式的 worker 池
//!
//! - 构造时启动固定数量的 worker，之后不再重启；
//! - 所有 worker 共享一个有界多消费者队列；
//! - 队列关闭且取空是 worker 唯一的退出条件；
//! - 默认钩子升级出的 panic 不会结束 worker：记下第一个负载，由 `join` 交还给关闭方。
//!
use crate::context::Context;
use crate::event::AnyEvent;
use crate::handler::HandlerAdapter;
use crate::hooks::Hooks;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

type EscalatedPanic = Arc<Mutex<Option<Box<dyn Any + Send>>>>;

/// 一次待执行的投递：由队列持有，直到被某个 worker 取走
pub(crate) struct DeliveryTask {
    pub(crate) ctx: Context,
    pub(crate) event: AnyEvent,
    pub(crate) handler: Arc<HandlerAdapter>,
}

pub(crate) struct WorkerPool {
    size: usize,
    capacity: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    escalated: EscalatedPanic,
}

impl WorkerPool {
    /// 启动 worker 并返回入队端；丢弃全部入队端即关闭队列
    ///
    /// 需在 Tokio 运行时内调用。
    pub(crate) fn start(
        size: usize,
        capacity: usize,
        hooks: Arc<Hooks>,
    ) -> (Self, flume::Sender<DeliveryTask>) {
        let (tx, rx) = flume::bounded::<DeliveryTask>(capacity);
        let escalated = EscalatedPanic::default();

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    rx.clone(),
                    hooks.clone(),
                    escalated.clone(),
                ))
            })
            .collect();

        let pool = Self {
            size,
            capacity,
            workers: Mutex::new(workers),
            escalated,
        };
        (pool, tx)
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// 等待所有 worker 退出（调用前应已关闭队列）
    ///
    /// 返回运行期间第一个被钩子升级的 panic 负载，由调用方重新抛出。
    pub(crate) async fn join(&self) -> Option<Box<dyn Any + Send>> {
        let workers = std::mem::take(&mut *self.workers.lock().await);

        for (id, worker) in workers.into_iter().enumerate() {
            if let Err(err) = worker.await {
                if err.is_panic() {
                    warn!(worker = id, "event bus worker terminated abnormally");
                }
            }
        }
        self.escalated.lock().await.take()
    }
}

async fn run_worker(
    id: usize,
    queue: flume::Receiver<DeliveryTask>,
    hooks: Arc<Hooks>,
    escalated: EscalatedPanic,
) {
    while let Ok(task) = queue.recv_async().await {
        // 失败已交给钩子处理，发布方早已返回，这里无需再传播
        let delivery = hooks.invoke(&task.ctx, &task.handler, &task.event);
        if let Err(payload) = AssertUnwindSafe(delivery).catch_unwind().await {
            error!(
                worker = id,
                event_type = task.event.name(),
                handler = task.handler.name(),
                "escalated handler failure, re-raised when the bus closes"
            );
            let mut slot = escalated.lock().await;
            if slot.is_none() {
                *slot = Some(payload);
            }
        }
    }
    debug!(worker = id, "event bus worker stopped");
}
