//! 事件（Event）与事件类型标识（EventType）
//!
//! - `Event`：可被总线发布的强类型值，仅要求可跨线程共享；
//! - `EventType`：事件的运行时类型标识，是路由的唯一键；
//! - `AnyEvent`：类型擦除后的事件，便于在队列与多个处理器之间共享。
//!
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 可发布的事件
///
/// 通常通过 `#[derive(Event)]` 在结构体上派生；也可手动实现。
/// `event_name` 仅用于日志与错误信息，不参与路由。
pub trait Event: Send + Sync + 'static {
    /// 事件的稳定名称，默认取类型名
    fn event_name() -> &'static str {
        type_name::<Self>()
    }
}

/// 事件类型标识：`TypeId` + 名称
///
/// 相等性与哈希只看 `TypeId`，名称只用于展示。
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: E::event_name(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 类型擦除的事件
///
/// 克隆只增加引用计数，同一事件投递给多个处理器时共享同一份数据。
#[derive(Clone)]
pub struct AnyEvent {
    event_type: EventType,
    value: Arc<dyn Any + Send + Sync>,
}

impl AnyEvent {
    pub fn new<E: Event>(event: E) -> Self {
        Self::from_arc(Arc::new(event))
    }

    pub fn from_arc<E: Event>(event: Arc<E>) -> Self {
        Self {
            event_type: EventType::of::<E>(),
            value: event,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn name(&self) -> &'static str {
        self.event_type.name
    }

    pub fn is<E: Event>(&self) -> bool {
        self.event_type.id == TypeId::of::<E>()
    }

    /// 还原为具体事件类型；类型不符时返回 `None`
    pub fn downcast<E: Event>(&self) -> Option<Arc<E>> {
        self.value.clone().downcast::<E>().ok()
    }

    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.value.downcast_ref::<E>()
    }
}

impl fmt::Debug for AnyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEvent")
            .field("event_type", &self.event_type.name)
            .finish_non_exhaustive()
    }
}
