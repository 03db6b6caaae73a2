//! 派生宏生成的注入点表和组件描述

use di_abstractions::{Bean, Inject, Injectable, InjectionTarget, PlatformContext};
use infrastructure_common::{BoxError, ContainerConfig, PostConstruct, PreDestroy, TypeInfo};
use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

trait Named: Send + Sync {
    fn name(&self) -> &str;
}

#[derive(Default, Injectable, Bean)]
#[bean(default, provides(dyn Clock, dyn Named), post_construct, pre_destroy)]
struct SystemClock {
    hooks: AtomicUsize,
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        1_700_000_000
    }
}

impl Named for SystemClock {
    fn name(&self) -> &str {
        "system"
    }
}

impl PostConstruct for SystemClock {
    fn post_construct(&self) -> Result<(), BoxError> {
        self.hooks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PreDestroy for SystemClock {
    fn pre_destroy(&self) -> Result<(), BoxError> {
        self.hooks.fetch_add(10, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default, Injectable, Bean)]
#[bean(default, provides(dyn Clock))]
struct EpochClock;

impl Clock for EpochClock {
    fn now(&self) -> u64 {
        0
    }
}

#[derive(Default, Injectable)]
struct AuditBase {
    clock: Inject<dyn Clock>,
}

#[derive(Injectable, Bean)]
#[bean(constructor = Self::fresh)]
struct AuditService {
    #[injectable(inherit)]
    base: AuditBase,
    named: Inject<dyn Named>,
    #[injectable(skip)]
    manual: Inject<SystemClock>,
    label: String,
}

impl AuditService {
    fn fresh() -> Self {
        Self {
            base: AuditBase::default(),
            named: Inject::empty(),
            manual: Inject::empty(),
            label: "audit".to_string(),
        }
    }
}

#[derive(Injectable, Bean)]
#[bean(context_constructor = Self::for_context, fragment)]
struct HeaderFragment {
    title: String,
}

impl HeaderFragment {
    fn for_context(context: &Arc<PlatformContext>) -> Self {
        Self {
            title: context.application_name().to_string(),
        }
    }
}

#[tokio::test]
async fn test_injection_points_follow_field_order() {
    let points = AuditService::injection_points();
    let described: Vec<(&str, &TypeInfo)> = points.describe();

    let names: Vec<&str> = described.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["base.clock", "named"]);
    assert_eq!(described[0].1.id, TypeId::of::<dyn Clock>());
    assert_eq!(described[1].1.id, TypeId::of::<dyn Named>());
}

#[tokio::test]
async fn test_skipped_slot_is_not_exposed() {
    let service = AuditService::fresh();
    service.manual.set(Arc::new(SystemClock::default()));

    let slots = service.slots();

    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|slot| slot.name != "manual"));
    assert_eq!(service.label, "audit");
}

#[tokio::test]
async fn test_declared_capabilities_and_hooks() {
    let definition = SystemClock::definition();

    assert!(definition.has_default_constructor());
    assert!(definition.provides(TypeId::of::<dyn Clock>()));
    assert!(definition.provides(TypeId::of::<dyn Named>()));
    assert!(definition.satisfies(TypeId::of::<SystemClock>()));
    assert!(definition.has_post_construct());
    assert!(!definition.is_fragment());

    let instance = definition.construct_default().unwrap().unwrap();
    definition.run_post_construct(&instance).unwrap();
    definition.run_pre_destroy(&instance).unwrap();
    let clock = instance.downcast::<SystemClock>().unwrap();
    assert_eq!(clock.hooks.load(Ordering::SeqCst), 11);
}

#[tokio::test]
async fn test_capability_handle_reaches_trait_object() {
    let definition = SystemClock::definition();
    let instance = definition.construct_default().unwrap().unwrap();

    let handle = definition
        .handle_for(&instance, TypeId::of::<dyn Named>())
        .unwrap();
    let named = handle.downcast_ref::<Arc<dyn Named>>().unwrap();

    assert_eq!(named.name(), "system");
}

#[tokio::test]
async fn test_explicit_constructor_is_used() {
    let definition = AuditService::definition();
    assert!(definition.has_default_constructor());
    assert!(!definition.has_context_constructor());
    assert!(!definition.has_post_construct());

    let instance = definition.construct_default().unwrap().unwrap();
    assert_eq!(instance.downcast::<AuditService>().unwrap().label, "audit");
}

#[tokio::test]
async fn test_context_constructor_and_fragment_flag() {
    let definition = HeaderFragment::definition();
    let context = Arc::new(PlatformContext::new(
        ContainerConfig::new().with_application_name("notes"),
    ));

    assert!(definition.is_fragment());
    assert!(definition.construct_default().is_none());
    let instance = definition
        .construct_with_context(&context)
        .unwrap()
        .unwrap();
    assert_eq!(instance.downcast::<HeaderFragment>().unwrap().title, "notes");
}

#[tokio::test]
async fn test_unit_struct_has_no_injection_points() {
    assert!(EpochClock::injection_points().describe().is_empty());
    assert!(EpochClock.slots().is_empty());

    let definition = EpochClock::definition();
    let instance = definition.construct_default().unwrap().unwrap();
    let handle = definition
        .handle_for(&instance, TypeId::of::<dyn Clock>())
        .unwrap();
    assert_eq!(handle.downcast_ref::<Arc<dyn Clock>>().unwrap().now(), 0);
}
