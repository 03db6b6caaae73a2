//! 默认实例化策略

use di_abstractions::{BeanDefinition, BeanInstance, InstantiationStrategy, PlatformContext};
use infrastructure_common::{BoxError, InstantiationError, InstantiationResult};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::trace;

/// 默认实例化策略
///
/// 优先使用无参构造函数，其次使用接收平台上下文的构造函数。
/// 构造函数中的 panic 被捕获并作为构造失败返回。
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInstantiationStrategy;

impl DefaultInstantiationStrategy {
    /// 创建策略
    pub const fn new() -> Self {
        Self
    }
}

impl InstantiationStrategy for DefaultInstantiationStrategy {
    fn instantiate(
        &self,
        definition: &BeanDefinition,
        context: &Arc<PlatformContext>,
    ) -> InstantiationResult<BeanInstance> {
        let type_name = definition.type_info().name.clone();
        let attempt = if definition.has_default_constructor() {
            trace!("使用无参构造函数: {}", type_name);
            catch_unwind(AssertUnwindSafe(|| definition.construct_default()))
        } else if definition.has_context_constructor() {
            trace!("使用上下文构造函数: {}", type_name);
            catch_unwind(AssertUnwindSafe(|| {
                definition.construct_with_context(context)
            }))
        } else {
            return Err(InstantiationError::NoUsableConstructor { type_name });
        };

        match attempt {
            Ok(Some(Ok(instance))) => Ok(instance),
            Ok(Some(Err(source))) => Err(InstantiationError::ConstructionFailed { type_name, source }),
            Ok(None) => Err(InstantiationError::NoUsableConstructor { type_name }),
            Err(payload) => Err(InstantiationError::ConstructionFailed {
                type_name,
                source: panic_error(payload.as_ref()),
            }),
        }
    }

    fn name(&self) -> &str {
        "default"
    }
}

/// 把 panic 载荷转为错误
pub(crate) fn panic_error(payload: &(dyn Any + Send)) -> BoxError {
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知 panic".to_string());
    format!("panic: {message}").into()
}
