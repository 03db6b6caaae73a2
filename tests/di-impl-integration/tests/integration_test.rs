//! 容器、事件总线与数据访问层的跨 crate 集成测试

use anyhow::Result;
use data_abstractions::{
    FnReferenceLoader, LazyCollection, LazyReference, LoadState, MemoryDatabase, Reference,
};
use data_dao::{ConfigurationDao, ConfigurationParameter};
use di_abstractions::{
    Bean, DataSetChangeAware, GenericEvent, GenericEventAware, Inject, Injectable,
    InjectionTarget,
};
use di_impl::{ContainerBuilder, EventBus};
use infrastructure_common::{BoxError, ContainerError, InjectionError, TypeInfo};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Default, Injectable, Bean)]
#[bean(default, provides(dyn Clock))]
struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        42
    }
}

#[derive(Default, Injectable, Bean)]
#[bean(default, provides(dyn Clock))]
struct OtherClock;

impl Clock for OtherClock {
    fn now(&self) -> u64 {
        7
    }
}

/// 依赖能力接口的服务
#[derive(Default, Injectable, Bean)]
#[bean(default)]
struct ServiceB {
    clock: Inject<dyn Clock>,
}

impl ServiceB {
    fn stamp(&self) -> Result<u64> {
        Ok(self.clock.require()?.now())
    }
}

/// 依赖另一个服务和事件总线的服务
#[derive(Default, Injectable, Bean)]
#[bean(default)]
struct ServiceA {
    b: Inject<ServiceB>,
    events: Inject<EventBus>,
}

#[derive(Default, Injectable)]
struct Screen {
    a: Inject<ServiceA>,
}

#[tokio::test]
async fn test_services_are_wired_end_to_end() -> Result<()> {
    let context = ContainerBuilder::new()
        .register_component::<ServiceA>()
        .register_component::<ServiceB>()
        .register_binding::<dyn Clock, FixedClock>()
        .build()?;
    context.activate();

    let screen = Arc::new(Screen::default());
    context.surface_created(screen.clone())?;
    context.surface_started(screen.clone())?;

    let a = screen.a.require()?;
    assert_eq!(a.b.require()?.stamp()?, 42);
    assert!(Arc::ptr_eq(&a.events.require()?, context.events()));

    assert!(context.deactivate(false)?);
    assert!(!screen.a.is_injected());
    assert!(!a.b.is_injected());
    Ok(())
}

#[tokio::test]
async fn test_ambiguous_capability_fails_initialization() -> Result<()> {
    let context = ContainerBuilder::new()
        .register_component::<ServiceB>()
        .register_component::<FixedClock>()
        .register_component::<OtherClock>()
        .build()?;

    let error = context.initialize().unwrap_err();

    match error {
        ContainerError::Injection {
            source: InjectionError::Ambiguous { candidates, .. },
        } => assert_eq!(candidates.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!context.is_initialized());
    Ok(())
}

#[tokio::test]
async fn test_rebind_switches_capability() -> Result<()> {
    let context = ContainerBuilder::new()
        .register_component::<ServiceB>()
        .register_binding::<dyn Clock, FixedClock>()
        .build()?;
    context.initialize()?;
    let b = context
        .resolve::<ServiceB>()
        .ok_or_else(|| anyhow::anyhow!("ServiceB 未创建"))?;
    assert_eq!(b.stamp()?, 42);

    context.rebind_component::<dyn Clock, OtherClock>()?;

    assert_eq!(b.stamp()?, 7);
    Ok(())
}

#[tokio::test]
async fn test_prototypes_are_injected_but_unmanaged() -> Result<()> {
    let context = ContainerBuilder::new()
        .register_component::<ServiceB>()
        .register_binding::<dyn Clock, FixedClock>()
        .build()?;
    context.initialize()?;

    let first = context.create_prototype::<ServiceB>()?;
    let second = context.create_prototype::<ServiceB>()?;

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.stamp()?, 42);
    context.deactivate(true)?;
    assert!(first.clock.is_injected());
    Ok(())
}

struct FlakyListener {
    calls: AtomicUsize,
}

impl DataSetChangeAware for FlakyListener {
    fn on_change(&self, _entity: &TypeInfo) -> Result<(), BoxError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(())
        } else {
            Err("listener gave up".into())
        }
    }
}

#[tokio::test]
async fn test_failing_listener_removes_itself() -> Result<()> {
    let bus = EventBus::new();
    let listener = Arc::new(FlakyListener {
        calls: AtomicUsize::new(0),
    });
    bus.on_change::<ConfigurationParameter>(listener.clone());

    assert_eq!(bus.emit_change_of::<ConfigurationParameter>(), 1);
    assert_eq!(bus.emit_change_of::<ConfigurationParameter>(), 0);
    assert_eq!(bus.emit_change_of::<ConfigurationParameter>(), 0);

    assert_eq!(listener.calls.load(Ordering::SeqCst), 2);
    assert_eq!(bus.listener_count(), 0);
    Ok(())
}

struct SyncFinished {
    rows: usize,
}

impl GenericEvent for SyncFinished {}

#[derive(Default)]
struct SyncLog {
    seen: Mutex<Vec<usize>>,
}

impl GenericEventAware<SyncFinished> for SyncLog {
    fn handle_event(&self, event: &SyncFinished) -> Result<(), BoxError> {
        self.seen.lock().push(event.rows);
        Ok(())
    }
}

#[tokio::test]
async fn test_generic_events_survive_until_deactivate() -> Result<()> {
    let context = ContainerBuilder::new().build()?;
    context.initialize()?;
    let log = Arc::new(SyncLog::default());
    let id = context.events().on_event::<SyncFinished>(log.clone());

    assert_eq!(context.events().emit_event(&SyncFinished { rows: 3 }), 1);
    assert!(context.events().unregister(id));
    assert_eq!(context.events().emit_event(&SyncFinished { rows: 4 }), 0);

    context.events().on_event::<SyncFinished>(log.clone());
    context.deactivate(true)?;
    assert_eq!(context.events().listener_count(), 0);
    assert_eq!(*log.seen.lock(), vec![3]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lazy_reference_loads_once_under_contention() -> Result<()> {
    const READERS: usize = 8;
    let loads = Arc::new(AtomicUsize::new(0));
    let reference = Arc::new(LazyReference::new(FnReferenceLoader::new(Some(5), {
        let loads = Arc::clone(&loads);
        move || {
            loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Some("customer-5".to_string())
        }
    })));
    let barrier = Arc::new(Barrier::new(READERS));

    let mut readers = Vec::new();
    for _ in 0..READERS {
        let reference = Arc::clone(&reference);
        let barrier = Arc::clone(&barrier);
        readers.push(tokio::task::spawn_blocking(move || {
            barrier.wait();
            reference.object()
        }));
    }

    let mut loaded = Vec::new();
    for reader in readers {
        loaded.push(reader.await?.ok_or_else(|| anyhow::anyhow!("引用为空"))?);
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(loaded.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(reference.object_ref_id(), Some(5));
    Ok(())
}

#[tokio::test]
async fn test_lazy_collection_loads_on_first_access() -> Result<()> {
    let loads = Arc::new(AtomicUsize::new(0));
    let collection = LazyCollection::new({
        let loads = Arc::clone(&loads);
        move || {
            loads.fetch_add(1, Ordering::SeqCst);
            vec![1, 2, 3]
        }
    });
    assert_eq!(collection.state(), LoadState::Armed);

    assert_eq!(collection.len(), 3);
    assert_eq!(collection.len(), 3);

    assert_eq!(collection.state(), LoadState::Loaded);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    Ok(())
}

#[derive(Default, Injectable, Bean)]
#[bean(default)]
struct SettingsService {
    dao: Inject<ConfigurationDao>,
}

#[tokio::test]
async fn test_dao_persists_through_container() -> Result<()> {
    let database = Arc::new(MemoryDatabase::new("integration.db"));
    let context = ContainerBuilder::new()
        .register_component::<SettingsService>()
        .register_component::<ConfigurationDao>()
        .with_open_helper(database.clone())
        .build()?;
    context.initialize()?;

    let settings = context
        .resolve::<SettingsService>()
        .ok_or_else(|| anyhow::anyhow!("SettingsService 未创建"))?;
    let dao = settings.dao.require()?;
    dao.set_value("theme", Some("dark".to_string()))?;
    dao.set_value("theme", Some("light".to_string()))?;

    assert_eq!(dao.get_value("theme")?.as_deref(), Some("light"));
    assert_eq!(database.row_count(data_dao::CONFIGURATION_TABLE), 1);

    context.deactivate(true)?;
    assert!(dao.get_value("theme").is_err());
    assert_eq!(database.row_count(data_dao::CONFIGURATION_TABLE), 1);
    Ok(())
}

#[tokio::test]
async fn test_outject_now_clears_registered_slots() -> Result<()> {
    let context = ContainerBuilder::new()
        .register_component::<ServiceA>()
        .register_component::<ServiceB>()
        .register_binding::<dyn Clock, FixedClock>()
        .build()?;
    context.initialize()?;
    let screen = Arc::new(Screen::default());

    let target: &dyn InjectionTarget = screen.as_ref();
    assert_eq!(context.inject_now(target)?, 1);
    assert!(screen.a.is_injected());
    assert_eq!(context.outject_now(target)?, 1);
    assert!(!screen.a.is_injected());
    Ok(())
}
