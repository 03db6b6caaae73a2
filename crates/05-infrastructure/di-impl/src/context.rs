//! 应用上下文
//!
//! [`ApplicationContext`] 是宿主应用使用的门面：注册组件、控制生命周期、解析实例、
//! 转发界面事件以及访问事件总线和数据库连接。克隆得到的是同一个容器。

use crate::builder::{ContainerBuilder, Registration};
use crate::coordinator::{InitializerEntry, LifecycleCoordinator};
use crate::injection::TargetKind;
use crate::signalling::EventBus;
use data_abstractions::{DataHandle, OpenHelper};
use di_abstractions::{
    Bean, BeanRegistry, BeanRegistryExt, ContextInitializer, Injectable, InjectionTarget,
    PlatformContext, SurfaceEvent,
};
use infrastructure_common::{
    ContainerError, ContainerResult, ContextError, InstantiationError, LifecycleState, TypeInfo,
};
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, info};

/// 应用上下文
#[derive(Clone)]
pub struct ApplicationContext {
    coordinator: Arc<LifecycleCoordinator>,
}

impl ApplicationContext {
    pub(crate) fn from_coordinator(coordinator: LifecycleCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }

    /// 使用默认配置创建构建器
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// 注册组件类型
    pub fn register_component<T: Bean>(&self) {
        self.coordinator.registry.register_bean::<T>();
    }

    /// 注册预先创建的单例
    pub fn register_instance<T: Bean>(&self, instance: Arc<T>) {
        self.coordinator.registry.register_instance(instance);
    }

    /// 注册能力类型 `S` 到实现 `T` 的绑定
    pub fn register_binding<S: ?Sized + 'static, T: Bean>(&self) -> ContainerResult<()> {
        self.coordinator.registry.bind::<S, T>()?;
        Ok(())
    }

    /// 替换能力类型 `S` 的实现；已初始化的上下文会立即重新初始化
    pub fn rebind_component<S: ?Sized + 'static, T: Bean>(&self) -> ContainerResult<()> {
        self.coordinator
            .registry
            .rebind(TypeInfo::of::<S>(), T::definition())?;
        if self.is_initialized() {
            info!("绑定已替换, 重新初始化: {}", TypeInfo::of::<S>());
            self.coordinator.reinitialize()?;
        }
        Ok(())
    }

    /// 执行启动序列
    pub fn initialize(&self) -> ContainerResult<()> {
        self.coordinator.initialize()
    }

    /// 重新执行启动序列
    pub fn reinitialize(&self) -> ContainerResult<()> {
        self.coordinator.reinitialize()
    }

    /// 增加激活计数，返回当前计数
    pub fn activate(&self) -> usize {
        self.coordinator.activate()
    }

    /// 减少激活计数，计数归零或强制时关闭容器，返回是否执行了关闭
    pub fn deactivate(&self, force: bool) -> ContainerResult<bool> {
        self.coordinator.deactivate(force)
    }

    /// 生命周期状态
    pub fn state(&self) -> LifecycleState {
        self.coordinator.state()
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.coordinator.is_initialized()
    }

    /// 激活计数
    pub fn ref_count(&self) -> usize {
        self.coordinator.ref_count()
    }

    /// 类型是否已注册
    pub fn is_registered<U: ?Sized + 'static>(&self) -> bool {
        self.coordinator.registry.is_registered(TypeId::of::<U>())
    }

    /// 解析类型 `U` 的实例；注册表中没有时查找可见的同类型界面
    pub fn resolve<U: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<U>> {
        self.coordinator.registry.resolve::<U>().or_else(|| {
            let surface = self.coordinator.tracker.active(TypeId::of::<U>())?;
            surface
                .into_handle()
                .downcast_ref::<Arc<U>>()
                .cloned()
        })
    }

    /// 所有是 `U` 或声明了 `U` 能力的活动实例
    pub fn resolve_all<U: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<U>> {
        self.coordinator
            .registry
            .get_all_of_type(TypeId::of::<U>())
            .iter()
            .filter_map(|handle| handle.downcast_ref::<Arc<U>>().cloned())
            .collect()
    }

    /// 立即注入任意目标
    pub fn inject_now(&self, target: &dyn InjectionTarget) -> ContainerResult<usize> {
        Ok(self.coordinator.engine().inject(target, TargetKind::Bean)?)
    }

    /// 清空目标上可由受管组件提供的字段
    pub fn outject_now(&self, target: &dyn InjectionTarget) -> ContainerResult<usize> {
        Ok(self.coordinator.engine().outject(target)?)
    }

    /// 创建不受管理的原型实例：构造、注入、执行初始化回调，之后不再注出
    pub fn create_prototype<T: Bean>(&self) -> ContainerResult<Arc<T>> {
        let definition = T::definition();
        let instance = self
            .coordinator
            .strategy
            .instantiate(&definition, &self.coordinator.context)?;
        let prototype =
            instance
                .downcast::<T>()
                .ok_or_else(|| InstantiationError::ConstructionFailed {
                    type_name: definition.type_info().name.clone(),
                    source: "实例化策略返回了错误的类型".into(),
                })?;

        self.coordinator
            .engine()
            .inject(prototype.as_ref(), TargetKind::Prototype)?;
        definition
            .run_post_construct(&instance)
            .map_err(|source| ContainerError::PostConstructFailed {
                type_name: definition.type_info().name.clone(),
                source,
            })?;
        debug!("创建原型组件: {}", definition.type_info());
        Ok(prototype)
    }

    /// 设置上下文初始化器，它在启动序列最后被注入并调用
    pub fn set_context_initializer<I: ContextInitializer + Injectable>(&self, initializer: Arc<I>) {
        debug!("设置上下文初始化器: {}", TypeInfo::of::<I>());
        *self.coordinator.initializer.write() = Some(InitializerEntry::new(initializer));
    }

    /// 记录一个由 UI 框架创建的碎片，它随可见界面一起注入
    pub fn register_fragment(&self, fragment: Arc<dyn InjectionTarget>) {
        self.coordinator.tracker.add_fragment(fragment);
    }

    /// 显式设置数据库打开助手
    pub fn set_open_helper(&self, helper: Arc<dyn OpenHelper>) {
        self.coordinator.infrastructure.set_open_helper(helper);
    }

    /// 获取数据库打开助手
    pub fn connect_open_helper(&self) -> ContainerResult<Arc<dyn OpenHelper>> {
        self.ensure_data_access("connect_open_helper")?;
        Ok(self
            .coordinator
            .infrastructure
            .connect_open_helper(&self.coordinator.registry)?)
    }

    /// 获取数据库句柄，首次调用时建立连接
    pub fn connect_data_handle(&self) -> ContainerResult<Arc<dyn DataHandle>> {
        self.ensure_data_access("connect_data_handle")?;
        Ok(self
            .coordinator
            .infrastructure
            .connect_data_handle(&self.coordinator.registry)?)
    }

    fn ensure_data_access(&self, operation: &str) -> Result<(), ContextError> {
        let explicit = self.coordinator.infrastructure.explicit_open_helper();
        let started = matches!(
            self.state(),
            LifecycleState::Initializing | LifecycleState::Initialized
        );
        if explicit.is_none() && !started {
            return Err(ContextError::ContextNotYetCreated {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// 事件总线
    pub fn events(&self) -> &Arc<EventBus> {
        &self.coordinator.events
    }

    /// 平台上下文
    pub fn context(&self) -> &Arc<PlatformContext> {
        &self.coordinator.context
    }

    /// 界面已创建
    pub fn surface_created(&self, surface: Arc<dyn InjectionTarget>) -> ContainerResult<()> {
        self.coordinator
            .handle_surface_event(SurfaceEvent::Created, surface)
    }

    /// 界面已启动
    pub fn surface_started(&self, surface: Arc<dyn InjectionTarget>) -> ContainerResult<()> {
        self.coordinator
            .handle_surface_event(SurfaceEvent::Started, surface)
    }

    /// 界面已恢复
    pub fn surface_resumed(&self, surface: Arc<dyn InjectionTarget>) -> ContainerResult<()> {
        self.coordinator
            .handle_surface_event(SurfaceEvent::Resumed, surface)
    }

    /// 界面已暂停
    pub fn surface_paused(&self, surface: Arc<dyn InjectionTarget>) -> ContainerResult<()> {
        self.coordinator
            .handle_surface_event(SurfaceEvent::Paused, surface)
    }

    /// 界面已停止
    pub fn surface_stopped(&self, surface: Arc<dyn InjectionTarget>) -> ContainerResult<()> {
        self.coordinator
            .handle_surface_event(SurfaceEvent::Stopped, surface)
    }

    /// 界面保存状态
    pub fn surface_save_instance_state(
        &self,
        surface: Arc<dyn InjectionTarget>,
    ) -> ContainerResult<()> {
        self.coordinator
            .handle_surface_event(SurfaceEvent::SaveInstanceState, surface)
    }

    /// 界面已销毁
    pub fn surface_destroyed(&self, surface: Arc<dyn InjectionTarget>) -> ContainerResult<()> {
        self.coordinator
            .handle_surface_event(SurfaceEvent::Destroyed, surface)
    }

    /// 导出当前的注册方案，用于丢弃本容器后构建新容器
    pub fn to_builder(&self) -> ContainerBuilder {
        let registry = &self.coordinator.registry;
        let definitions = registry.definitions();
        let bindings = registry.bindings();

        let mut builder = ContainerBuilder::new()
            .with_config(self.coordinator.context.config().clone())
            .with_strategy(Arc::clone(&self.coordinator.strategy));
        if let Some(source) = &self.coordinator.lifecycle_source {
            builder = builder.with_lifecycle_source(Arc::clone(source));
        }
        if let Some(helper) = self.coordinator.infrastructure.explicit_open_helper() {
            builder = builder.with_open_helper(helper);
        }
        if let Some(entry) = self.coordinator.initializer.read().clone() {
            builder = builder.with_initializer_entry(entry);
        }

        for definition in &definitions {
            if definition.type_info().is::<EventBus>() {
                continue;
            }
            builder = builder.with_registration(Registration::Component(definition.clone()));
        }
        for binding in bindings {
            if let Some(definition) = definitions
                .iter()
                .find(|d| d.type_id() == binding.implementation.id)
            {
                builder = builder
                    .with_registration(Registration::Binding(binding.supertype, definition.clone()));
            }
        }
        builder
    }
}
