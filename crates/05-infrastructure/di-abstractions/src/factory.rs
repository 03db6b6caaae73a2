//! 实例化策略抽象接口

use crate::context::PlatformContext;
use crate::descriptor::{BeanDefinition, BeanInstance};
use infrastructure_common::InstantiationResult;
use std::sync::Arc;

/// 实例化策略 trait
///
/// 为一个组件定义产生恰好一个实例。只负责构造，不做注入。
pub trait InstantiationStrategy: Send + Sync {
    /// 创建实例
    fn instantiate(
        &self,
        definition: &BeanDefinition,
        context: &Arc<PlatformContext>,
    ) -> InstantiationResult<BeanInstance>;

    /// 策略名称
    fn name(&self) -> &str;
}
