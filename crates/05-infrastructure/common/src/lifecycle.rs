//! 组件生命周期管理

use crate::errors::BoxError;

/// 容器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// 未初始化
    Uninitialized,
    /// 初始化中
    Initializing,
    /// 已初始化
    Initialized,
    /// 停止中
    ShuttingDown,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl LifecycleState {
    /// 是否已完成启动序列
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized)
    }
}

/// 初始化回调
///
/// 在所有组件完成实例化和注入之后调用，每个实例只调用一次。
/// 返回错误会中止容器启动。
pub trait PostConstruct: Send + Sync {
    /// 组件初始化
    fn post_construct(&self) -> Result<(), BoxError>;
}

/// 销毁回调
///
/// 在容器关闭时、注出之前调用。
pub trait PreDestroy: Send + Sync {
    /// 组件销毁
    fn pre_destroy(&self) -> Result<(), BoxError>;
}
