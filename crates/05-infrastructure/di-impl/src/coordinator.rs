//! 生命周期协调器
//!
//! 负责容器的启动、重新初始化、引用计数的激活/停用，以及 UI 界面生命周期事件的处理。
//! 启动和停用由一个可重入的转换锁串行化；状态字段只在短暂的状态锁内读写，
//! 因此用户回调可以在启动过程中查询上下文。构造函数和用户回调不持有注册表锁。

use crate::infrastructure::DataInfrastructure;
use crate::injection::{InjectionEngine, TargetKind};
use crate::registry::BeanRegistryImpl;
use crate::signalling::EventBus;
use crate::tracking::{SurfaceSet, SurfaceTracker};
use di_abstractions::{
    BeanRegistry, ContextInitializer, Injectable, InjectionTarget, InstantiationStrategy,
    LifecycleSource, ManagedBean, PlatformContext, SurfaceEvent, SurfaceLifecycleCallbacks,
};
use infrastructure_common::{
    BeanDestructionError, ContainerError, ContainerResult, InjectionError, LifecycleState,
};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 上下文初始化器及其注入视图
#[derive(Clone)]
pub(crate) struct InitializerEntry {
    pub(crate) target: Arc<dyn InjectionTarget>,
    pub(crate) hook: Arc<dyn ContextInitializer>,
}

impl InitializerEntry {
    pub(crate) fn new<I: ContextInitializer + Injectable>(initializer: Arc<I>) -> Self {
        Self {
            target: Arc::clone(&initializer) as Arc<dyn InjectionTarget>,
            hook: initializer,
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    state: LifecycleState,
    ref_count: usize,
    callbacks_registered: bool,
}

/// 生命周期协调器
pub struct LifecycleCoordinator {
    pub(crate) registry: BeanRegistryImpl,
    pub(crate) strategy: Arc<dyn InstantiationStrategy>,
    pub(crate) infrastructure: DataInfrastructure,
    pub(crate) tracker: SurfaceTracker,
    pub(crate) events: Arc<EventBus>,
    pub(crate) context: Arc<PlatformContext>,
    pub(crate) initializer: RwLock<Option<InitializerEntry>>,
    pub(crate) lifecycle_source: Option<Arc<dyn LifecycleSource>>,
    lifecycle: Mutex<Lifecycle>,
    /// 串行化初始化与停用；同一线程上的回调可以重入
    transition: ReentrantMutex<()>,
}

impl LifecycleCoordinator {
    pub(crate) fn new(
        registry: BeanRegistryImpl,
        strategy: Arc<dyn InstantiationStrategy>,
        events: Arc<EventBus>,
        context: Arc<PlatformContext>,
        lifecycle_source: Option<Arc<dyn LifecycleSource>>,
    ) -> Self {
        Self {
            registry,
            strategy,
            infrastructure: DataInfrastructure::new(),
            tracker: SurfaceTracker::new(),
            events,
            context,
            initializer: RwLock::new(None),
            lifecycle_source,
            lifecycle: Mutex::new(Lifecycle::default()),
            transition: ReentrantMutex::new(()),
        }
    }

    /// 按需创建注入引擎
    pub fn engine(&self) -> InjectionEngine<'_> {
        InjectionEngine::new(&self.registry, &self.infrastructure, &self.context)
    }

    /// 当前生命周期状态
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.lock().state
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.state().is_initialized()
    }

    /// 当前激活计数
    pub fn ref_count(&self) -> usize {
        self.lifecycle.lock().ref_count
    }

    /// 初始化容器，已初始化时不做任何事
    ///
    /// 启动序列中的回调再次调用时直接返回。
    pub fn initialize(&self) -> ContainerResult<()> {
        let _transition = self.transition.lock();
        self.run_initialize()
    }

    /// 重置为未初始化并重新执行启动序列
    pub fn reinitialize(&self) -> ContainerResult<()> {
        let _transition = self.transition.lock();
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == LifecycleState::Initializing {
                debug!("启动序列进行中, 忽略重新初始化请求");
                return Ok(());
            }
            lifecycle.state = LifecycleState::Uninitialized;
        }
        info!("重新初始化应用上下文");
        self.run_initialize()
    }

    fn run_initialize(&self) -> ContainerResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                LifecycleState::Initialized => {
                    debug!("应用上下文已初始化");
                    return Ok(());
                }
                LifecycleState::Initializing => {
                    debug!("启动序列进行中, 忽略重入的初始化请求");
                    return Ok(());
                }
                LifecycleState::Uninitialized | LifecycleState::ShuttingDown => {}
            }
            lifecycle.state = LifecycleState::Initializing;
        }

        info!("初始化应用上下文: {}", self.context.application_name());
        let result = self.run_startup();
        self.lifecycle.lock().state = if result.is_ok() {
            LifecycleState::Initialized
        } else {
            LifecycleState::Uninitialized
        };
        result
    }

    fn run_startup(&self) -> ContainerResult<()> {
        let created = self
            .registry
            .instantiate_all(self.strategy.as_ref(), &self.context)?;
        for bean in created.iter().filter(|b| b.definition.is_fragment()) {
            self.tracker.add_fragment(Arc::clone(bean.instance.target()));
        }

        let mut constructed = 0;
        let result = self.complete_startup(&created, &mut constructed);
        if result.is_err() {
            self.discard_failed_startup(&created, constructed);
        }
        result
    }

    fn complete_startup(
        &self,
        created: &[ManagedBean],
        constructed: &mut usize,
    ) -> ContainerResult<()> {
        let engine = self.engine();
        engine.inject_all()?;
        for bean in created {
            run_post_construct(bean)?;
            *constructed += 1;
        }
        self.inject_visible_surfaces(&engine)?;

        let initializer = self.initializer.read().clone();
        if let Some(entry) = initializer {
            engine.inject(entry.target.as_ref(), TargetKind::Initializer)?;
            entry
                .hook
                .after_context_is_built()
                .map_err(|source| ContainerError::InitializerFailed { source })?;
        }

        info!(
            "应用上下文初始化完成: 新建 {} 个组件, 共 {} 个",
            created.len(),
            self.registry.managed().len()
        );
        Ok(())
    }

    /// 丢弃启动失败时新建的实例，下次启动重新创建并执行初始化回调
    fn discard_failed_startup(&self, created: &[ManagedBean], constructed: usize) {
        warn!("启动失败, 丢弃本次新建的 {} 个组件", created.len());
        for bean in created[..constructed].iter().rev() {
            if let Err(e) = bean.definition.run_pre_destroy(&bean.instance) {
                warn!("组件 {} 销毁回调失败: {}", bean.definition.type_info(), e);
            }
        }
        for bean in created {
            let type_id = bean.definition.type_id();
            if bean.definition.is_fragment() {
                self.tracker.remove_fragment(type_id);
            }
            self.registry.remove_instance(type_id);
        }
    }

    /// 注入可见界面和已知碎片，注入失败的碎片被丢弃
    fn inject_visible_surfaces(&self, engine: &InjectionEngine<'_>) -> ContainerResult<()> {
        for surface in self.tracker.active_surfaces() {
            engine.inject(surface.as_ref(), TargetKind::Surface)?;
        }
        for fragment in self.tracker.fragments() {
            if let Err(e) = engine.inject(fragment.as_ref(), TargetKind::Fragment) {
                let fragment_type = fragment.target_type();
                warn!("碎片 {} 注入失败, 已丢弃: {}", fragment_type, e);
                self.tracker.remove_fragment(fragment_type.id);
            }
        }
        Ok(())
    }

    /// 增加激活计数，首次激活时向界面生命周期事件源注册回调
    pub fn activate(self: &Arc<Self>) -> usize {
        let _transition = self.transition.lock();
        let (first, count) = {
            let mut lifecycle = self.lifecycle.lock();
            let first = !lifecycle.callbacks_registered;
            lifecycle.callbacks_registered = true;
            lifecycle.ref_count += 1;
            (first, lifecycle.ref_count)
        };
        if first {
            if let Some(source) = &self.lifecycle_source {
                debug!("注册界面生命周期回调");
                source.register_callbacks(Arc::new(CallbackBridge {
                    coordinator: Arc::downgrade(self),
                }));
            }
        }
        info!("激活应用上下文, 引用计数: {}", count);
        count
    }

    /// 减少激活计数，计数由 1 归零或强制时关闭容器，返回是否执行了关闭
    ///
    /// 没有对应激活的非强制停用被忽略。关闭尽力执行每一步，返回遇到的第一个错误。
    pub fn deactivate(&self, force: bool) -> ContainerResult<bool> {
        let _transition = self.transition.lock();
        let callbacks_registered = {
            let mut lifecycle = self.lifecycle.lock();
            if !force {
                if lifecycle.ref_count == 0 {
                    warn!("停用请求没有对应的激活, 忽略");
                    return Ok(false);
                }
                lifecycle.ref_count -= 1;
                if lifecycle.ref_count > 0 {
                    debug!("停用请求, 剩余引用计数: {}", lifecycle.ref_count);
                    return Ok(false);
                }
            }
            info!("停用应用上下文{}", if force { " (强制)" } else { "" });
            lifecycle.state = LifecycleState::ShuttingDown;
            lifecycle.callbacks_registered
        };

        let result = self.shutdown();

        if callbacks_registered {
            if let Some(source) = &self.lifecycle_source {
                debug!("注销界面生命周期回调");
                source.unregister_callbacks();
            }
        }
        *self.lifecycle.lock() = Lifecycle::default();
        result.map(|()| true)
    }

    fn shutdown(&self) -> ContainerResult<()> {
        let mut first_error: Option<BeanDestructionError> = None;
        let mut record = |error: BeanDestructionError| {
            warn!("销毁过程出错: {}", error);
            first_error.get_or_insert(error);
        };

        let managed = self.registry.managed();
        for bean in managed.iter().rev() {
            if let Err(source) = bean.definition.run_pre_destroy(&bean.instance) {
                record(BeanDestructionError::PreDestroyFailed {
                    type_name: bean.definition.type_info().name.clone(),
                    source,
                });
            }
        }

        let engine = self.engine();
        let surfaces = self.tracker.active_surfaces().into_iter();
        let targets = managed
            .iter()
            .map(|bean| Arc::clone(bean.instance.target()))
            .chain(surfaces)
            .chain(self.tracker.fragments());
        for target in targets {
            if let Err(source) = engine.outject(target.as_ref()) {
                record(outjection_failed(target.as_ref(), source));
            }
        }

        let removed = self.registry.clear_instances();
        debug!("移除 {} 个组件实例", removed.len());

        if let Err(e) = self.infrastructure.close() {
            record(e);
        }
        self.events.clear();
        self.tracker.clear_fragments();

        first_error.map_or(Ok(()), |e| Err(e.into()))
    }

    /// 处理一个界面生命周期事件
    pub fn handle_surface_event(
        &self,
        event: SurfaceEvent,
        surface: Arc<dyn InjectionTarget>,
    ) -> ContainerResult<()> {
        debug!("界面事件 {}: {}", event, surface.target_type());
        match event {
            SurfaceEvent::Created => {
                self.tracker.add(SurfaceSet::Existing, Arc::clone(&surface));
                if !self.is_initialized() {
                    debug!("首个界面创建, 构建应用上下文");
                    self.initialize()?;
                }
                self.engine().inject(surface.as_ref(), TargetKind::Surface)?;
            }
            SurfaceEvent::Started => self.tracker.add(SurfaceSet::Active, surface),
            SurfaceEvent::Resumed => {
                self.tracker.remove(SurfaceSet::Paused, &surface);
                self.engine().inject(surface.as_ref(), TargetKind::Surface)?;
            }
            SurfaceEvent::Paused => self.tracker.add(SurfaceSet::Paused, surface),
            SurfaceEvent::Stopped => {
                self.tracker.remove(SurfaceSet::Active, &surface);
                self.engine()
                    .outject(surface.as_ref())
                    .map_err(|source| outjection_failed(surface.as_ref(), source))?;
            }
            SurfaceEvent::SaveInstanceState => {
                debug!("保存界面状态: {}", surface.target_type());
            }
            SurfaceEvent::Destroyed => self.tracker.remove(SurfaceSet::Existing, &surface),
        }
        Ok(())
    }
}

fn run_post_construct(bean: &ManagedBean) -> ContainerResult<()> {
    if !bean.definition.has_post_construct() {
        return Ok(());
    }
    debug!("执行初始化回调: {}", bean.definition.type_info());
    bean.definition
        .run_post_construct(&bean.instance)
        .map_err(|source| ContainerError::PostConstructFailed {
            type_name: bean.definition.type_info().name.clone(),
            source,
        })
}

fn outjection_failed(target: &dyn InjectionTarget, source: InjectionError) -> BeanDestructionError {
    BeanDestructionError::OutjectionFailed {
        type_name: target.target_type().name,
        source,
    }
}

/// 转发界面事件到协调器，协调器释放后事件被忽略
struct CallbackBridge {
    coordinator: Weak<LifecycleCoordinator>,
}

impl SurfaceLifecycleCallbacks for CallbackBridge {
    fn on_surface_event(
        &self,
        event: SurfaceEvent,
        surface: Arc<dyn InjectionTarget>,
    ) -> ContainerResult<()> {
        match self.coordinator.upgrade() {
            Some(coordinator) => coordinator.handle_surface_event(event, surface),
            None => {
                debug!("应用上下文已释放, 忽略界面事件 {}", event);
                Ok(())
            }
        }
    }
}
