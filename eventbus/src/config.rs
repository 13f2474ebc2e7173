//! 事件总线配置
//!
//! - `EventBusConfig`：构造总线时一次性读取，不支持运行期修改；
//! - `EventBusSettings`：外部键值配置源中的两个普通选项（异步模式、worker 数量），
//!   由上层模块反序列化后转换为 `EventBusConfig`。
//!
use crate::hooks::{ErrorHandler, PanicHandler};
use bon::Builder;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::Dispatch;

/// 默认 worker 数量
pub const DEFAULT_WORKER_COUNT: usize = 1;
/// 异步模式下单次入队的最长等待时间
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);
/// 队列容量 = worker 数量 × 该倍数
pub const DEFAULT_QUEUE_CAPACITY_FACTOR: usize = 10;

/// 事件总线配置
///
/// 可用 `EventBusConfig::builder()` 构造，也可使用结构体字面量配合 `..Default::default()`。
#[derive(Builder, Clone)]
pub struct EventBusConfig {
    /// panic 钩子；缺省时按是否配置 `logger` 选择记录日志或重新抛出
    pub panic_handler: Option<Arc<dyn PanicHandler>>,
    /// 错误钩子；缺省规则同上
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
    /// 是否启用 worker 池异步分发，默认 `false`（调用方线程内联执行）
    #[builder(default)]
    pub async_mode: bool,
    /// worker 数量，小于 1 时按 1 处理
    #[builder(default = DEFAULT_WORKER_COUNT)]
    pub worker_count: usize,
    #[builder(default = DEFAULT_ENQUEUE_TIMEOUT)]
    pub enqueue_timeout: Duration,
    #[builder(default = DEFAULT_QUEUE_CAPACITY_FACTOR)]
    pub queue_capacity_factor: usize,
    /// 默认钩子使用的 logger
    pub logger: Option<Dispatch>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EventBusConfig {
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.max(1)
    }

    pub fn queue_capacity(&self) -> usize {
        self.effective_worker_count() * self.queue_capacity_factor.max(1)
    }
}

/// 键值配置源中的总线选项
///
/// 接受 `asyncMode`/`workerCount`（亦兼容 snake_case 写法），缺省分别为 `false` 与 `1`；
/// `workerCount` 为有符号整数，非正值会被收敛为 1。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventBusSettings {
    #[serde(alias = "async_mode")]
    pub async_mode: bool,
    #[serde(alias = "worker_count")]
    pub worker_count: i64,
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            async_mode: false,
            worker_count: DEFAULT_WORKER_COUNT as i64,
        }
    }
}

impl EventBusSettings {
    pub fn worker_count(&self) -> usize {
        usize::try_from(self.worker_count).unwrap_or(0).max(1)
    }
}

impl From<EventBusSettings> for EventBusConfig {
    fn from(settings: EventBusSettings) -> Self {
        EventBusConfig::builder()
            .async_mode(settings.async_mode)
            .worker_count(settings.worker_count())
            .build()
    }
}
