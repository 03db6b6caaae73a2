//! 应用启动器
//!
//! 按固定顺序完成启动：加载配置、初始化日志、组装容器、激活上下文。

use crate::logging::init_tracing;
use crate::settings::{load_settings, load_settings_from, validate};
use data_abstractions::{MemoryDatabase, OpenHelper};
use data_dao::ConfigurationDao;
use di_abstractions::{Bean, ContextInitializer, Injectable, LifecycleSource};
use di_impl::{ApplicationContext, ContainerBuilder};
use infrastructure_common::{ContainerConfig, InfrastructureError, InfrastructureResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 应用启动器
pub struct ApplicationBootstrapper {
    builder: ContainerBuilder,
    config: Option<ContainerConfig>,
    settings_file: Option<PathBuf>,
    open_helper: Option<Arc<dyn OpenHelper>>,
    /// 是否安装日志订阅者
    logging_enabled: bool,
    /// 是否在启动时立即初始化上下文
    eager_initialization: bool,
}

impl ApplicationBootstrapper {
    /// 创建启动器
    pub fn new() -> Self {
        Self {
            builder: ContainerBuilder::new(),
            config: None,
            settings_file: None,
            open_helper: None,
            logging_enabled: true,
            eager_initialization: true,
        }
    }

    /// 直接使用给定配置，不再读取配置文件
    #[must_use]
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 从指定文件读取配置
    #[must_use]
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    /// 数据库打开助手，缺省为以配置中数据库名命名的内存数据库
    #[must_use]
    pub fn with_open_helper(mut self, helper: Arc<dyn OpenHelper>) -> Self {
        self.open_helper = Some(helper);
        self
    }

    /// 是否安装日志订阅者
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// 是否在启动时立即初始化上下文
    ///
    /// 关闭后上下文在第一个界面创建时才初始化。
    #[must_use]
    pub fn with_eager_initialization(mut self, enabled: bool) -> Self {
        self.eager_initialization = enabled;
        self
    }

    /// 注册组件类型
    #[must_use]
    pub fn register_component<T: Bean>(mut self) -> Self {
        self.builder = self.builder.register_component::<T>();
        self
    }

    /// 注册能力绑定
    #[must_use]
    pub fn register_binding<S: ?Sized + 'static, T: Bean>(mut self) -> Self {
        self.builder = self.builder.register_binding::<S, T>();
        self
    }

    /// 注册预先创建的单例
    #[must_use]
    pub fn register_instance<T: Bean>(mut self, instance: Arc<T>) -> Self {
        self.builder = self.builder.register_instance(instance);
        self
    }

    /// 上下文初始化器
    #[must_use]
    pub fn with_context_initializer<I: ContextInitializer + Injectable>(
        mut self,
        initializer: Arc<I>,
    ) -> Self {
        self.builder = self.builder.with_context_initializer(initializer);
        self
    }

    /// 界面生命周期事件源
    #[must_use]
    pub fn with_lifecycle_source(mut self, source: Arc<dyn LifecycleSource>) -> Self {
        self.builder = self.builder.with_lifecycle_source(source);
        self
    }

    /// 启动应用
    pub fn bootstrap(self) -> InfrastructureResult<ApplicationContext> {
        info!("开始启动应用");

        let config = self.resolve_config()?;
        if self.logging_enabled {
            init_tracing(&config)?;
        }
        info!(
            "应用 {} 使用数据库 {}",
            config.application_name, config.database_name
        );

        let helper = self.open_helper.unwrap_or_else(|| {
            debug!("未指定数据库打开助手, 使用内存数据库");
            Arc::new(MemoryDatabase::new(config.database_name.clone())) as Arc<dyn OpenHelper>
        });

        let context = self
            .builder
            .with_config(config)
            .with_open_helper(helper)
            .register_component::<ConfigurationDao>()
            .build()?;

        context.activate();
        if self.eager_initialization {
            if let Err(e) = context.initialize() {
                error!("上下文初始化失败: {}", e);
                return Err(InfrastructureError::BootstrapFailed {
                    message: e.to_string(),
                });
            }
        }

        info!("应用启动完成, 当前状态: {:?}", context.state());
        Ok(context)
    }

    fn resolve_config(&self) -> InfrastructureResult<ContainerConfig> {
        let config = match (&self.config, &self.settings_file) {
            (Some(config), _) => {
                validate(config)?;
                config.clone()
            }
            (None, Some(path)) => load_settings_from(path)?,
            (None, None) => load_settings()?,
        };
        Ok(config)
    }
}

impl Default for ApplicationBootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

/// 强制关闭上下文
pub fn shutdown(context: &ApplicationContext) -> InfrastructureResult<()> {
    info!("开始关闭应用");
    context
        .deactivate(true)
        .map_err(|e| InfrastructureError::ShutdownFailed {
            message: e.to_string(),
        })?;
    info!("应用已关闭");
    Ok(())
}
