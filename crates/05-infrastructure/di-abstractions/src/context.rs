//! 平台上下文

use chrono::{DateTime, Utc};
use infrastructure_common::ContainerConfig;
use uuid::Uuid;

/// 平台宿主对象
///
/// 作为可选构造参数传给组件，也可以注入到非 UI 组件的 `Inject<PlatformContext>` 字段。
#[derive(Debug, Clone)]
pub struct PlatformContext {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: ContainerConfig,
}

impl PlatformContext {
    /// 用配置创建上下文
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
        }
    }

    /// 上下文标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 创建时间
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 应用名称
    pub fn application_name(&self) -> &str {
        &self.config.application_name
    }

    /// 数据库名称
    pub fn database_name(&self) -> &str {
        &self.config.database_name
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

impl Default for PlatformContext {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}
