//! 调用上下文（Context）
//!
//! 承载一次发布/处理所需的取消信号与截止时间：
//! - 取消基于 `CancellationToken`，子上下文随父上下文一同取消；
//! - 截止时间可选，子上下文只会收紧、不会放宽父级截止时间；
//! - 处理器应协作式地观察取消，总线不会强行中断正在运行的处理器。
//!
use crate::error::BusError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// 永不取消、无截止时间的根上下文
    pub fn background() -> Self {
        Self::default()
    }

    /// 派生子上下文：父级取消会传递给子级，反之不会
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_done(&self) -> bool {
        self.error().is_some()
    }

    /// 已取消返回 `Cancelled`，已过截止时间返回 `DeadlineExceeded`，否则 `None`
    pub fn error(&self) -> Option<BusError> {
        if self.token.is_cancelled() {
            return Some(BusError::Cancelled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(BusError::DeadlineExceeded),
            _ => None,
        }
    }

    /// 等待取消或截止时间到达
    pub async fn done(&self) {
        match self.deadline {
            Some(at) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(at) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
