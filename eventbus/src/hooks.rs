//! 故障隔离钩子（PanicHandler / ErrorHandler）
//!
//! 每次投递失败最多触发一次对应钩子，且不会因此重试：
//! - 处理器 panic：捕获后交给 `PanicHandler`，不会越过分发边界；
//! - 处理器返回错误：交给 `ErrorHandler`。
//!
//! 未显式配置时的默认实现：
//! - 配置了 logger（`tracing::Dispatch`）：记录一条 error 级日志；
//! - 未配置 logger：重新抛出（panic），避免故障被静默吞掉。
//!
use crate::context::Context;
use crate::error::{BusError, BusResult};
use crate::event::AnyEvent;
use crate::handler::HandlerAdapter;
use futures_util::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::{Future, poll_fn};
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::{Arc, Once};
use tracing::Dispatch;

thread_local! {
    // 当前线程是否正在 poll 处理器
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    // 最近一次处理器 panic 在展开前记录的调用栈
    static PANIC_SITE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_SITE_HOOK: Once = Once::new();

/// 安装一次链式 panic hook，只在处理器执行期间记录 panic 现场的调用栈
///
/// 之前的 hook 照常执行。若之后有人替换了全局 hook，退化为在捕获点采集。
fn install_panic_site_hook() {
    PANIC_SITE_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if CAPTURING.try_with(Cell::get).unwrap_or(false) {
                let _ = PANIC_SITE.try_with(|slot| {
                    *slot.borrow_mut() = Some(Backtrace::force_capture());
                });
            }
            previous(info);
        }));
    });
}

struct CaptureScope {
    previous: bool,
}

impl CaptureScope {
    fn enter() -> Self {
        Self {
            previous: CAPTURING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.previous));
    }
}

/// 每次 poll 都处于采集范围内；panic 总是发生在某次 poll 之中
async fn capture_panic_site<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);
    poll_fn(|cx| {
        let _scope = CaptureScope::enter();
        fut.as_mut().poll(cx)
    })
    .await
}

/// 处理器 panic 的现场
///
/// `backtrace` 是 panic 发生处（展开之前）的调用栈，包含处理器自身的栈帧。
pub struct HandlerPanic {
    payload: Box<dyn Any + Send>,
    message: String,
    backtrace: Backtrace,
}

impl HandlerPanic {
    pub(crate) fn capture(payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        let backtrace = PANIC_SITE
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(Backtrace::force_capture);
        Self {
            payload,
            message,
            backtrace,
        }
    }

    /// panic 值的文本形式（`&str` / `String` 负载），其他类型给出占位描述
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn payload(&self) -> &(dyn Any + Send) {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }
}

impl fmt::Debug for HandlerPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerPanic")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// 处理器 panic 钩子
pub trait PanicHandler: Send + Sync {
    fn handle(&self, event: &AnyEvent, handler: &str, panic: HandlerPanic);
}

/// 处理器错误钩子
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, event: &AnyEvent, handler: &str, error: &BusError);
}

impl<F> PanicHandler for F
where
    F: Fn(&AnyEvent, &str, HandlerPanic) + Send + Sync,
{
    fn handle(&self, event: &AnyEvent, handler: &str, panic: HandlerPanic) {
        self(event, handler, panic)
    }
}

impl<F> ErrorHandler for F
where
    F: Fn(&AnyEvent, &str, &BusError) + Send + Sync,
{
    fn handle(&self, event: &AnyEvent, handler: &str, error: &BusError) {
        self(event, handler, error)
    }
}

/// 默认 panic 钩子（有 logger）：记录 critical 日志
pub struct LogPanicHandler {
    logger: Dispatch,
}

impl LogPanicHandler {
    pub fn new(logger: Dispatch) -> Self {
        Self { logger }
    }
}

impl PanicHandler for LogPanicHandler {
    fn handle(&self, event: &AnyEvent, handler: &str, panic: HandlerPanic) {
        tracing::dispatcher::with_default(&self.logger, || {
            tracing::error!(
                severity = "critical",
                event_type = event.name(),
                handler,
                panic = %panic.message(),
                backtrace = %panic.backtrace(),
                "event handler panicked"
            );
        });
    }
}

/// 默认 panic 钩子（无 logger）：原样重新抛出
pub struct EscalatePanicHandler;

impl PanicHandler for EscalatePanicHandler {
    fn handle(&self, _event: &AnyEvent, _handler: &str, panic: HandlerPanic) {
        std::panic::resume_unwind(panic.into_payload())
    }
}

/// 默认错误钩子（有 logger）：记录 error 日志
pub struct LogErrorHandler {
    logger: Dispatch,
}

impl LogErrorHandler {
    pub fn new(logger: Dispatch) -> Self {
        Self { logger }
    }
}

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, event: &AnyEvent, handler: &str, error: &BusError) {
        tracing::dispatcher::with_default(&self.logger, || {
            tracing::error!(
                event_type = event.name(),
                handler,
                error = %error,
                "event handler failed"
            );
        });
    }
}

/// 默认错误钩子（无 logger）：升级为 panic
pub struct EscalateErrorHandler;

impl ErrorHandler for EscalateErrorHandler {
    fn handle(&self, event: &AnyEvent, handler: &str, error: &BusError) {
        panic!(
            "unhandled event handler error: event={}, handler={handler}, error={error}",
            event.name()
        )
    }
}

/// 总线使用的一组钩子
pub(crate) struct Hooks {
    panic: Arc<dyn PanicHandler>,
    error: Arc<dyn ErrorHandler>,
}

impl Hooks {
    pub(crate) fn resolve(
        panic: Option<Arc<dyn PanicHandler>>,
        error: Option<Arc<dyn ErrorHandler>>,
        logger: Option<Dispatch>,
    ) -> Self {
        install_panic_site_hook();
        let panic = panic.unwrap_or_else(|| match &logger {
            Some(logger) => Arc::new(LogPanicHandler::new(logger.clone())),
            None => Arc::new(EscalatePanicHandler),
        });
        let error = error.unwrap_or_else(|| match &logger {
            Some(logger) => Arc::new(LogErrorHandler::new(logger.clone())),
            None => Arc::new(EscalateErrorHandler),
        });
        Self { panic, error }
    }

    /// 在隔离边界内调用一次处理器
    ///
    /// - 返回错误：交给错误钩子并原样返回；
    /// - panic：交给 panic 钩子，本次投递视为结束（返回 `Ok`）。
    ///
    /// 钩子本身的 panic（默认钩子的升级）不在隔离边界内，由调用方处理。
    pub(crate) async fn invoke(
        &self,
        ctx: &Context,
        handler: &HandlerAdapter,
        event: &AnyEvent,
    ) -> BusResult<()> {
        // resume_unwind 不经过 panic hook，清掉上一次残留的现场
        PANIC_SITE.with(|slot| slot.borrow_mut().take());

        let delivery = capture_panic_site(handler.handle_event(ctx, event));
        match AssertUnwindSafe(delivery).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.error.handle(event, handler.name(), &err);
                Err(err)
            }
            Err(payload) => {
                self.panic
                    .handle(event, handler.name(), HandlerPanic::capture(payload));
                Ok(())
            }
        }
    }
}
