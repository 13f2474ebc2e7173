//! 进程内类型化事件总线（eventbus）
//!
//! 生产方发布强类型事件值，总线按事件的运行时类型路由到零个或多个处理器：
//! - 事件（`event`）：`Event` trait、类型标识 `EventType` 与类型擦除的 `AnyEvent`；
//! - 处理器（`handler`）：可调用/对象两种形态，订阅时一次性转换为 `HandlerAdapter`；
//! - 总线（`bus`）：同步内联分发，或基于有界队列与 worker 池的异步分发；
//! - 钩子（`hooks`）：处理器 panic/错误的隔离与上报；
//! - 上下文（`context`）：协作式取消与截止时间；
//! - 配置（`config`）：构造期一次性读取的选项。
//!
//! 典型用法：
//! 1. 用 `#[derive(Event)]` 定义事件结构体；
//! 2. `EventBus::new(config)` 构造总线（异步模式需在 Tokio 运行时内）；
//! 3. `subscribe(EventType::of::<E>(), Handler::callable(..) / Handler::object(..))`；
//! 4. `publish(&ctx, event)`；应用退出时调用一次 `close()`。
//!
pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod handler;
pub mod hooks;
mod pool;
mod registry;

pub use bus::EventBus;
pub use config::{EventBusConfig, EventBusSettings};
pub use context::Context;
pub use error::{BusError, BusResult};
pub use event::{AnyEvent, Event, EventType};
pub use eventbus_macros::Event;
pub use handler::{EventHandler, Handler, HandlerAdapter};
pub use hooks::{ErrorHandler, HandlerPanic, PanicHandler};

// 允许在本 crate 内部通过 ::eventbus 进行自引用，
// 以便派生宏在本 crate 的单元测试中也能解析到 ::eventbus 路径。
extern crate self as eventbus;
