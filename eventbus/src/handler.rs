//! 事件处理器（Handler）与处理器适配器（HandlerAdapter）
//!
//! 处理器只有两种形态，订阅时一次性转换为统一的调用单元：
//! - 可调用形态：`Fn(Context, Arc<E>) -> impl Future<Output = anyhow::Result<()>>`；
//! - 对象形态：实现了 [`EventHandler`] 的值，约定方法为 `handle`。
//!
//! 形态约束（参数个数、上下文能力、返回类型）由构造函数的 trait 约束在编译期完成；
//! 运行期只保留两项校验：订阅声明类型与处理器推断类型是否一致（`InvalidListener`），
//! 以及分发时事件的实际类型是否匹配（`InvalidEventType`）。
//!
use crate::context::Context;
use crate::error::{BusError, BusResult};
use crate::event::{AnyEvent, Event, EventType};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 对象形态的处理器
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    /// 处理器名称（用于钩子与日志），默认取类型名
    fn handler_name(&self) -> &str {
        type_name::<Self>()
    }

    /// 处理事件；返回 `Err` 视为本次投递失败
    async fn handle(&self, ctx: &Context, event: &E) -> anyhow::Result<()>;
}

type CallableFn<E> =
    Arc<dyn Fn(Context, Arc<E>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

type InvokeFn = Arc<dyn Fn(Context, AnyEvent) -> BoxFuture<'static, BusResult<()>> + Send + Sync>;

enum HandlerKind<E: Event> {
    Callable(CallableFn<E>),
    Object(Arc<dyn EventHandler<E>>),
}

/// 待订阅的处理器（两种形态的闭集）
pub struct Handler<E: Event> {
    name: String,
    kind: HandlerKind<E>,
}

impl<E: Event> Handler<E> {
    /// 可调用形态：闭包或异步函数
    ///
    /// ```
    /// use eventbus::{Context, Event, Handler};
    /// use std::sync::Arc;
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// let handler = Handler::callable(|_ctx: Context, _ev: Arc<Ping>| async {
    ///     Ok::<(), anyhow::Error>(())
    /// });
    /// assert_eq!(handler.event_type().name(), "Ping");
    /// ```
    ///
    /// 形态不符的可调用值在编译期被拒绝。缺少上下文参数：
    ///
    /// ```compile_fail
    /// use eventbus::{Event, Handler};
    /// use std::sync::Arc;
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// let _ = Handler::<Ping>::callable(|_ev: Arc<Ping>| async {
    ///     Ok::<(), anyhow::Error>(())
    /// });
    /// ```
    ///
    /// 返回值不是 future：
    ///
    /// ```compile_fail
    /// use eventbus::{Context, Event, Handler};
    /// use std::sync::Arc;
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// let _ = Handler::<Ping>::callable(|_ctx: Context, _ev: Arc<Ping>| {});
    /// ```
    ///
    /// future 的输出不是 `anyhow::Result<()>`：
    ///
    /// ```compile_fail
    /// use eventbus::{Context, Event, Handler};
    /// use std::sync::Arc;
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// let _ = Handler::<Ping>::callable(|_ctx: Context, _ev: Arc<Ping>| async { 42_u32 });
    /// ```
    pub fn callable<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let func: CallableFn<E> =
            Arc::new(move |ctx: Context, event: Arc<E>| f(ctx, event).boxed());
        Self {
            name: type_name::<F>().to_string(),
            kind: HandlerKind::Callable(func),
        }
    }

    /// 对象形态
    ///
    /// ```
    /// use async_trait::async_trait;
    /// use eventbus::{Context, Event, EventHandler, Handler};
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// struct Pong;
    ///
    /// #[async_trait]
    /// impl EventHandler<Ping> for Pong {
    ///     async fn handle(&self, _ctx: &Context, _event: &Ping) -> anyhow::Result<()> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let handler = Handler::<Ping>::object(Pong);
    /// assert!(handler.name().ends_with("Pong"));
    /// ```
    ///
    /// 没有实现 `EventHandler<E>` 的值不能作为对象形态：
    ///
    /// ```compile_fail
    /// use eventbus::{Event, Handler};
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// struct Pong;
    ///
    /// let _ = Handler::<Ping>::object(Pong);
    /// ```
    ///
    /// `handle` 的签名必须与 trait 一致（这里缺少上下文参数）：
    ///
    /// ```compile_fail
    /// use async_trait::async_trait;
    /// use eventbus::{Event, EventHandler, Handler};
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// struct Pong;
    ///
    /// #[async_trait]
    /// impl EventHandler<Ping> for Pong {
    ///     async fn handle(&self, _event: &Ping) -> anyhow::Result<()> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let _ = Handler::<Ping>::object(Pong);
    /// ```
    pub fn object<H: EventHandler<E>>(handler: H) -> Self {
        Self::shared(Arc::new(handler))
    }

    /// 对象形态（已共享的实例）
    pub fn shared(handler: Arc<dyn EventHandler<E>>) -> Self {
        Self {
            name: handler.handler_name().to_string(),
            kind: HandlerKind::Object(handler),
        }
    }

    /// 覆盖处理器名称
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 由处理器签名推断出的事件类型
    pub fn event_type(&self) -> EventType {
        EventType::of::<E>()
    }

    fn into_callable(self) -> CallableFn<E> {
        match self.kind {
            HandlerKind::Callable(func) => func,
            HandlerKind::Object(object) => Arc::new(move |ctx: Context, event: Arc<E>| {
                let object = object.clone();
                async move { object.handle(&ctx, &event).await }.boxed()
            }),
        }
    }
}

impl<E: Event> fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            HandlerKind::Callable(_) => "callable",
            HandlerKind::Object(_) => "object",
        };
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("event_type", &E::event_name())
            .finish()
    }
}

/// 统一调用单元：订阅后不可变，由注册表条目持有
pub struct HandlerAdapter {
    name: Arc<str>,
    event_type: EventType,
    invoke: InvokeFn,
}

impl HandlerAdapter {
    /// 以订阅声明的事件类型 `marker` 构造适配器
    ///
    /// 处理器推断出的事件类型与 `marker` 不一致时返回 `InvalidListener`。
    pub fn new<E: Event>(marker: EventType, handler: Handler<E>) -> BusResult<Self> {
        let inferred = handler.event_type();
        if inferred != marker {
            return Err(BusError::InvalidListener {
                expected: marker.name(),
                found: inferred.name(),
            });
        }

        let name: Arc<str> = Arc::from(handler.name.as_str());
        let func = handler.into_callable();
        let handler_name = name.clone();

        let invoke: InvokeFn = Arc::new(move |ctx: Context, event: AnyEvent| {
            let func = func.clone();
            let handler_name = handler_name.clone();

            async move {
                // 正常情况下这里的 downcast 永远不会失败（handle_event 已校验类型）
                let Some(typed) = event.downcast::<E>() else {
                    return Err(BusError::InvalidEventType {
                        expected: E::event_name(),
                        found: event.name(),
                    });
                };
                func(ctx, typed).await.map_err(|source| BusError::Handler {
                    handler: handler_name.to_string(),
                    source,
                })
            }
            .boxed()
        });

        Ok(Self {
            name,
            event_type: marker,
            invoke,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// 调用处理器
    ///
    /// 先确认事件实际类型与声明类型一致，不一致返回 `InvalidEventType`。
    pub async fn handle_event(&self, ctx: &Context, event: &AnyEvent) -> BusResult<()> {
        if event.event_type() != self.event_type {
            return Err(BusError::InvalidEventType {
                expected: self.event_type.name(),
                found: event.name(),
            });
        }
        (self.invoke)(ctx.clone(), event.clone()).await
    }
}

impl fmt::Debug for HandlerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerAdapter")
            .field("name", &self.name)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}
