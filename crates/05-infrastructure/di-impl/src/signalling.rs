//! 事件总线
//!
//! 按实体类型或事件类型保存监听器。发送时先在锁内复制监听器列表，再在锁外调用；
//! 回调返回错误或 panic 的监听器会被移除，错误不会传播给发送方。

use crate::instantiation::panic_error;
use dashmap::DashMap;
use di_abstractions::{
    Bean, BeanDescriptor, DataChangeAware, DataSetChangeAware, DeleteAware, EntityEventSink,
    GenericEvent, GenericEventAware, Injectable, InjectionPoints, ListenerId,
};
use infrastructure_common::{BoxError, TypeInfo};
use std::any::{Any, TypeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace};

type ErasedListener = dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), BoxError> + Send + Sync;

struct ListenerTable<L: ?Sized> {
    kind: &'static str,
    listeners: DashMap<TypeId, Vec<(ListenerId, Arc<L>)>>,
}

impl<L: ?Sized> ListenerTable<L> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            listeners: DashMap::new(),
        }
    }

    fn add(&self, key: &TypeInfo, listener: Arc<L>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .entry(key.id)
            .or_default()
            .push((id, listener));
        debug!("注册{}监听器 {}: {}", self.kind, id, key);
        id
    }

    fn snapshot(&self, key: TypeId) -> Vec<(ListenerId, Arc<L>)> {
        self.listeners
            .get(&key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut removed = false;
        for mut entry in self.listeners.iter_mut() {
            let before = entry.len();
            entry.retain(|(listener_id, _)| *listener_id != id);
            removed |= entry.len() != before;
        }
        removed
    }

    fn clear(&self) {
        self.listeners.clear();
    }

    fn len(&self) -> usize {
        self.listeners.iter().map(|entry| entry.len()).sum()
    }

    /// 调用某个键下的全部监听器，移除失败的监听器，返回成功调用的数量
    fn dispatch(&self, key: &TypeInfo, call: impl Fn(&L) -> Result<(), BoxError>) -> usize {
        let mut delivered = 0;
        for (id, listener) in self.snapshot(key.id) {
            let outcome = catch_unwind(AssertUnwindSafe(|| call(&listener)))
                .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!("{}监听器 {} 处理 {} 失败, 已移除: {}", self.kind, id, key, e);
                    self.remove(id);
                }
            }
        }
        trace!("{}事件 {} 送达 {} 个监听器", self.kind, key, delivered);
        delivered
    }
}

/// 事件总线
///
/// 同时是数据访问层的 [`EntityEventSink`]，以预先创建的实例注册到容器中，
/// 在容器停用后保持同一个对象。
pub struct EventBus {
    delete: ListenerTable<dyn DeleteAware>,
    change: ListenerTable<dyn DataSetChangeAware>,
    data_change: ListenerTable<ErasedListener>,
    events: ListenerTable<ErasedListener>,
}

impl EventBus {
    /// 创建空的事件总线
    pub fn new() -> Self {
        Self {
            delete: ListenerTable::new("删除"),
            change: ListenerTable::new("集合变更"),
            data_change: ListenerTable::new("实体变更"),
            events: ListenerTable::new("通用"),
        }
    }

    /// 注册实体类型 `E` 的删除监听器
    pub fn on_delete<E: 'static>(&self, listener: Arc<dyn DeleteAware>) -> ListenerId {
        self.delete.add(&TypeInfo::of::<E>(), listener)
    }

    /// 注册实体类型 `E` 的集合变更监听器
    pub fn on_change<E: 'static>(&self, listener: Arc<dyn DataSetChangeAware>) -> ListenerId {
        self.change.add(&TypeInfo::of::<E>(), listener)
    }

    /// 注册实体类型 `E` 的单个实体变更监听器
    pub fn on_data_change<E: Send + Sync + 'static>(
        &self,
        listener: Arc<dyn DataChangeAware<E>>,
    ) -> ListenerId {
        let erased: Arc<ErasedListener> = Arc::new(move |item: &(dyn Any + Send + Sync)| {
            item.downcast_ref::<E>()
                .map_or(Ok(()), |item| listener.on_change(item))
        });
        self.data_change.add(&TypeInfo::of::<E>(), erased)
    }

    /// 注册事件类型 `E` 的通用监听器
    pub fn on_event<E: GenericEvent>(&self, listener: Arc<dyn GenericEventAware<E>>) -> ListenerId {
        let erased: Arc<ErasedListener> = Arc::new(move |event: &(dyn Any + Send + Sync)| {
            event
                .downcast_ref::<E>()
                .map_or(Ok(()), |event| listener.handle_event(event))
        });
        self.events.add(&TypeInfo::of::<E>(), erased)
    }

    /// 发送实体类型 `E` 的删除事件
    pub fn emit_delete_of<E: 'static>(&self) -> usize {
        self.delete
            .dispatch(&TypeInfo::of::<E>(), |listener| listener.on_delete())
    }

    /// 发送实体类型 `E` 的集合变更事件
    pub fn emit_change_of<E: 'static>(&self) -> usize {
        let entity = TypeInfo::of::<E>();
        self.change
            .dispatch(&entity, |listener| listener.on_change(&entity))
    }

    /// 发送单个实体变更事件
    pub fn emit_data_change_of<E: Send + Sync + 'static>(&self, item: &E) -> usize {
        let item: &(dyn Any + Send + Sync) = item;
        self.data_change
            .dispatch(&TypeInfo::of::<E>(), |listener| listener(item))
    }

    /// 发送通用事件
    pub fn emit_event<E: GenericEvent>(&self, event: &E) -> usize {
        let event: &(dyn Any + Send + Sync) = event;
        self.events
            .dispatch(&TypeInfo::of::<E>(), |listener| listener(event))
    }

    /// 注销监听器
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.delete.remove(id)
            | self.change.remove(id)
            | self.data_change.remove(id)
            | self.events.remove(id);
        if removed {
            debug!("注销监听器: {}", id);
        }
        removed
    }

    /// 移除全部删除监听器
    pub fn free_delete_listeners(&self) {
        self.delete.clear();
    }

    /// 移除全部集合变更监听器
    pub fn free_change_listeners(&self) {
        self.change.clear();
    }

    /// 移除全部单个实体变更监听器
    pub fn free_data_change_listeners(&self) {
        self.data_change.clear();
    }

    /// 移除全部通用监听器
    pub fn free_event_listeners(&self) {
        self.events.clear();
    }

    /// 移除全部监听器
    pub fn clear(&self) {
        self.free_delete_listeners();
        self.free_change_listeners();
        self.free_data_change_listeners();
        self.free_event_listeners();
        debug!("清空事件监听器");
    }

    /// 监听器总数
    pub fn listener_count(&self) -> usize {
        self.delete.len() + self.change.len() + self.data_change.len() + self.events.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityEventSink for EventBus {
    fn emit_delete(&self, entity: &TypeInfo) {
        self.delete.dispatch(entity, |listener| listener.on_delete());
    }

    fn emit_change(&self, entity: &TypeInfo) {
        self.change
            .dispatch(entity, |listener| listener.on_change(entity));
    }

    fn emit_data_change(&self, entity: &TypeInfo, item: &(dyn Any + Send + Sync)) {
        self.data_change.dispatch(entity, |listener| listener(item));
    }
}

impl Injectable for EventBus {
    fn injection_points() -> InjectionPoints<Self> {
        InjectionPoints::new()
    }
}

impl Bean for EventBus {
    fn descriptor() -> BeanDescriptor<Self> {
        BeanDescriptor::new()
            .with_default()
            .provides::<dyn EntityEventSink>(|bus| bus as Arc<dyn EntityEventSink>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Customer {
        name: String,
    }

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    impl DeleteAware for Counter {
        fn on_delete(&self) -> Result<(), BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl DataSetChangeAware for Counter {
        fn on_change(&self, _entity: &TypeInfo) -> Result<(), BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl DeleteAware for Failing {
        fn on_delete(&self) -> Result<(), BoxError> {
            Err("监听器故障".into())
        }
    }

    struct Panicking;

    impl DataSetChangeAware for Panicking {
        fn on_change(&self, _entity: &TypeInfo) -> Result<(), BoxError> {
            panic!("监听器崩溃")
        }
    }

    #[derive(Default)]
    struct NameRecorder {
        names: parking_lot::Mutex<Vec<String>>,
    }

    impl DataChangeAware<Customer> for NameRecorder {
        fn on_change(&self, item: &Customer) -> Result<(), BoxError> {
            self.names.lock().push(item.name.clone());
            Ok(())
        }
    }

    struct Refresh(u32);

    impl GenericEvent for Refresh {}

    #[derive(Default)]
    struct RefreshHandler {
        total: AtomicUsize,
    }

    impl GenericEventAware<Refresh> for RefreshHandler {
        fn handle_event(&self, event: &Refresh) -> Result<(), BoxError> {
            self.total.fetch_add(event.0 as usize, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn delete_listeners_are_keyed_by_entity_type() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        bus.on_delete::<Customer>(counter.clone());

        assert_eq!(bus.emit_delete_of::<Customer>(), 1);
        assert_eq!(bus.emit_delete_of::<String>(), 0);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_listener_is_removed_and_others_still_run() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        bus.on_delete::<Customer>(Arc::new(Failing));
        bus.on_delete::<Customer>(counter.clone());

        assert_eq!(bus.emit_delete_of::<Customer>(), 1);
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(bus.emit_delete_of::<Customer>(), 1);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_is_removed() {
        let bus = EventBus::new();
        bus.on_change::<Customer>(Arc::new(Panicking));

        assert_eq!(bus.emit_change_of::<Customer>(), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn data_change_listener_receives_the_item() {
        let bus = EventBus::new();
        let recorder = Arc::new(NameRecorder::default());
        bus.on_data_change::<Customer>(recorder.clone());

        let customer = Customer {
            name: "Ada".to_string(),
        };
        bus.emit_data_change_of(&customer);
        EntityEventSink::emit_data_change(&bus, &TypeInfo::of::<Customer>(), &customer);

        assert_eq!(*recorder.names.lock(), vec!["Ada", "Ada"]);
    }

    #[test]
    fn generic_events_and_unregister() {
        let bus = EventBus::new();
        let handler = Arc::new(RefreshHandler::default());
        let id = bus.on_event::<Refresh>(handler.clone());

        bus.emit_event(&Refresh(3));
        assert!(bus.unregister(id));
        assert!(!bus.unregister(id));
        bus.emit_event(&Refresh(4));

        assert_eq!(handler.total.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clear_drops_every_table() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        bus.on_delete::<Customer>(counter.clone());
        bus.on_change::<Customer>(counter);
        bus.on_data_change::<Customer>(Arc::new(NameRecorder::default()));

        bus.free_change_listeners();
        assert_eq!(bus.listener_count(), 2);

        bus.clear();
        assert_eq!(bus.listener_count(), 0);
    }
}
