//! 类型注册表：事件类型 -> 有序处理器列表
//!
//! 本身不加锁，由 `EventBus` 与关闭标记放在同一把读写锁之下使用。
//!
use crate::event::EventType;
use crate::handler::HandlerAdapter;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct TypeRegistry {
    // (事件类型, 按订阅顺序排列的处理器)
    entries: HashMap<TypeId, (EventType, Vec<Arc<HandlerAdapter>>)>,
}

impl TypeRegistry {
    pub(crate) fn register(&mut self, adapter: HandlerAdapter) {
        let event_type = adapter.event_type();
        self.entries
            .entry(event_type.id())
            .or_insert_with(|| (event_type, Vec::new()))
            .1
            .push(Arc::new(adapter));
    }

    /// 返回快照，调用方可在释放锁之后再执行处理器
    pub(crate) fn lookup(&self, event_type: EventType) -> Vec<Arc<HandlerAdapter>> {
        self.entries
            .get(&event_type.id())
            .map(|(_, handlers)| handlers.clone())
            .unwrap_or_default()
    }

    pub(crate) fn handler_count(&self, event_type: EventType) -> usize {
        self.entries
            .get(&event_type.id())
            .map_or(0, |(_, handlers)| handlers.len())
    }

    pub(crate) fn event_types(&self) -> Vec<EventType> {
        self.entries.values().map(|(ty, _)| *ty).collect()
    }
}
