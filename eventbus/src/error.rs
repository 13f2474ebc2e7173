//! 事件总线统一错误定义
//!
//! 覆盖订阅校验、发布、背压与取消等场景；处理器自身的失败统一包装为 `Handler`。
//!
use std::time::Duration;
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    // --- 订阅/分发校验 ---
    #[error("invalid event type: expected={expected}, found={found}")]
    InvalidEventType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid listener: expected={expected}, found={found}")]
    InvalidListener {
        expected: &'static str,
        found: &'static str,
    },

    // --- 生命周期 ---
    #[error("event bus is closed")]
    BusClosed,
    #[error("publish on closed event bus")]
    PublishOnClosedBus,
    #[error("event queue disconnected: no worker is running")]
    QueueDisconnected,

    // --- 背压与取消 ---
    #[error("event channel blocked: event={event}, timeout={timeout:?}")]
    EventChannelBlocked {
        event: &'static str,
        timeout: Duration,
    },
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    // --- 处理器 ---
    #[error("event handler error: handler={handler}, reason={source}")]
    Handler {
        handler: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BusError {
    /// 是否来自调用方上下文的取消/超时
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BusError::Cancelled | BusError::DeadlineExceeded)
    }
}

/// 统一 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_keeps_source_and_identity() {
        let err = BusError::Handler {
            handler: "audit".into(),
            source: anyhow::anyhow!("disk full"),
        };

        assert_eq!(err.to_string(), "event handler error: handler=audit, reason=disk full");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk full"));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn cancellation_kinds() {
        assert!(BusError::Cancelled.is_cancellation());
        assert!(BusError::DeadlineExceeded.is_cancellation());
        assert!(!BusError::PublishOnClosedBus.is_cancellation());
        assert!(!BusError::QueueDisconnected.is_cancellation());
    }
}
