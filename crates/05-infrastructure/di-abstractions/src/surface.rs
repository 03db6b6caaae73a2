//! UI 界面生命周期契约
//!
//! 外部 UI 框架通过 [`LifecycleSource`] 把界面的生命周期事件转发给容器。
//! 事件在同一个逻辑线程上串行到达。

use crate::inject::InjectionTarget;
use infrastructure_common::{BoxError, ContainerResult};
use std::fmt;
use std::sync::Arc;

/// 界面生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceEvent {
    /// 已创建
    Created,
    /// 已启动（可见）
    Started,
    /// 已恢复（获得焦点）
    Resumed,
    /// 已暂停
    Paused,
    /// 已停止
    Stopped,
    /// 保存实例状态
    SaveInstanceState,
    /// 已销毁
    Destroyed,
}

impl fmt::Display for SurfaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Resumed => "resumed",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::SaveInstanceState => "save-instance-state",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// 界面生命周期回调
pub trait SurfaceLifecycleCallbacks: Send + Sync {
    /// 处理一个界面事件
    fn on_surface_event(
        &self,
        event: SurfaceEvent,
        surface: Arc<dyn InjectionTarget>,
    ) -> ContainerResult<()>;
}

/// 界面生命周期事件源
pub trait LifecycleSource: Send + Sync {
    /// 注册回调
    fn register_callbacks(&self, callbacks: Arc<dyn SurfaceLifecycleCallbacks>);

    /// 注销回调
    fn unregister_callbacks(&self);
}

/// 上下文初始化器
///
/// 在启动序列的最后被注入并调用一次。
pub trait ContextInitializer: Send + Sync {
    /// 上下文构建完成
    fn after_context_is_built(&self) -> Result<(), BoxError>;
}
