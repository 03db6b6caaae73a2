//! 事件监听契约
//!
//! 监听器回调返回错误（或 panic）时会被事件总线移除，错误不会传播给发送方。

use infrastructure_common::{BoxError, TypeInfo};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// 实体删除监听器
pub trait DeleteAware: Send + Sync {
    /// 某类实体被删除
    fn on_delete(&self) -> Result<(), BoxError>;
}

/// 实体集合变更监听器
pub trait DataSetChangeAware: Send + Sync {
    /// 某类实体的集合发生变化（通常是插入）
    fn on_change(&self, entity: &TypeInfo) -> Result<(), BoxError>;
}

/// 单个实体变更监听器
pub trait DataChangeAware<E>: Send + Sync {
    /// 实体被更新
    fn on_change(&self, item: &E) -> Result<(), BoxError>;
}

/// 通用事件标记
pub trait GenericEvent: Send + Sync + 'static {}

/// 通用事件监听器
pub trait GenericEventAware<E: GenericEvent>: Send + Sync {
    /// 处理事件
    fn handle_event(&self, event: &E) -> Result<(), BoxError>;
}

/// 数据访问层使用的事件出口
pub trait EntityEventSink: Send + Sync {
    /// 发送删除事件
    fn emit_delete(&self, entity: &TypeInfo);

    /// 发送集合变更事件
    fn emit_change(&self, entity: &TypeInfo);

    /// 发送单个实体变更事件，`item` 的实际类型为 `entity`
    fn emit_data_change(&self, entity: &TypeInfo, item: &(dyn Any + Send + Sync));
}

/// 监听器注册标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// 生成新的标识
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
