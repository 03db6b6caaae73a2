//! 容器构建器

use crate::context::ApplicationContext;
use crate::coordinator::{InitializerEntry, LifecycleCoordinator};
use crate::instantiation::DefaultInstantiationStrategy;
use crate::registry::BeanRegistryImpl;
use crate::signalling::EventBus;
use data_abstractions::OpenHelper;
use di_abstractions::{
    Bean, BeanDefinition, BeanRegistry, ContextInitializer, Injectable, InstantiationStrategy,
    LifecycleSource, PlatformContext,
};
use infrastructure_common::{ContainerConfig, ContainerResult, TypeInfo};
use std::sync::Arc;
use tracing::info;

/// 构建器中的一条注册
#[derive(Clone)]
pub enum Registration {
    /// 组件类型
    Component(BeanDefinition),
    /// 能力类型到实现的绑定
    Binding(TypeInfo, BeanDefinition),
}

/// 容器构建器
///
/// 收集组件、绑定、配置和协作者，`build` 时一次性创建 [`ApplicationContext`]。
/// 容器自己的事件总线总是作为预先创建的实例注册。
pub struct ContainerBuilder {
    config: ContainerConfig,
    registrations: Vec<Registration>,
    strategy: Option<Arc<dyn InstantiationStrategy>>,
    initializer: Option<InitializerEntry>,
    lifecycle_source: Option<Arc<dyn LifecycleSource>>,
    open_helper: Option<Arc<dyn OpenHelper>>,
}

impl ContainerBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            registrations: Vec::new(),
            strategy: None,
            initializer: None,
            lifecycle_source: None,
            open_helper: None,
        }
    }

    /// 容器配置
    #[must_use]
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 注册组件类型
    #[must_use]
    pub fn register_component<T: Bean>(self) -> Self {
        self.with_registration(Registration::Component(T::definition()))
    }

    /// 注册预先创建的单例
    #[must_use]
    pub fn register_instance<T: Bean>(self, instance: Arc<T>) -> Self {
        self.with_registration(Registration::Component(
            T::descriptor().build_with_instance(instance),
        ))
    }

    /// 注册能力类型 `S` 到实现 `T` 的绑定，兼容性在 `build` 时检查
    #[must_use]
    pub fn register_binding<S: ?Sized + 'static, T: Bean>(self) -> Self {
        self.with_registration(Registration::Binding(TypeInfo::of::<S>(), T::definition()))
    }

    /// 追加一条注册
    #[must_use]
    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    /// 替换实例化策略
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn InstantiationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// 上下文初始化器
    #[must_use]
    pub fn with_context_initializer<I: ContextInitializer + Injectable>(
        self,
        initializer: Arc<I>,
    ) -> Self {
        self.with_initializer_entry(InitializerEntry::new(initializer))
    }

    pub(crate) fn with_initializer_entry(mut self, entry: InitializerEntry) -> Self {
        self.initializer = Some(entry);
        self
    }

    /// 界面生命周期事件源
    #[must_use]
    pub fn with_lifecycle_source(mut self, source: Arc<dyn LifecycleSource>) -> Self {
        self.lifecycle_source = Some(source);
        self
    }

    /// 数据库打开助手
    #[must_use]
    pub fn with_open_helper(mut self, helper: Arc<dyn OpenHelper>) -> Self {
        self.open_helper = Some(helper);
        self
    }

    /// 注册数量
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// 构建应用上下文
    ///
    /// 任一绑定不兼容时失败，不会创建容器。
    pub fn build(self) -> ContainerResult<ApplicationContext> {
        let registry = BeanRegistryImpl::new();
        let events = Arc::new(EventBus::new());
        registry.register(EventBus::descriptor().build_with_instance(Arc::clone(&events)));

        let registration_count = self.registrations.len();
        for registration in self.registrations {
            match registration {
                Registration::Component(definition) => registry.register(definition),
                Registration::Binding(supertype, definition) => {
                    registry.register_binding(supertype, definition)?;
                }
            }
        }

        let strategy = self
            .strategy
            .unwrap_or_else(|| Arc::new(DefaultInstantiationStrategy::new()));
        let context = Arc::new(PlatformContext::new(self.config));
        let coordinator = LifecycleCoordinator::new(
            registry,
            strategy,
            events,
            context,
            self.lifecycle_source,
        );
        if let Some(helper) = self.open_helper {
            coordinator.infrastructure.set_open_helper(helper);
        }
        *coordinator.initializer.write() = self.initializer;

        info!("构建容器完成，注册了 {} 个组件", registration_count);
        Ok(ApplicationContext::from_coordinator(coordinator))
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
