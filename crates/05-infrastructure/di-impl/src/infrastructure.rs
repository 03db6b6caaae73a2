//! 数据库基础设施
//!
//! 容器持有一个打开助手和一个延迟建立的数据库句柄。打开助手可以显式设置，
//! 也可以来自声明了 `dyn OpenHelper` 能力的受管组件。

use data_abstractions::{DataHandle, OpenHelper};
use di_abstractions::{BeanRegistry, BeanRegistryExt};
use infrastructure_common::{BeanDestructionError, ContextError};
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 容器持有的数据库连接
#[derive(Default)]
pub struct DataInfrastructure {
    open_helper: RwLock<Option<Arc<dyn OpenHelper>>>,
    explicit_helper: RwLock<Option<Arc<dyn OpenHelper>>>,
    data_handle: Mutex<Option<Arc<dyn DataHandle>>>,
}

impl DataInfrastructure {
    /// 创建空的基础设施
    pub fn new() -> Self {
        Self::default()
    }

    /// 显式设置打开助手，优先于受管组件
    pub fn set_open_helper(&self, helper: Arc<dyn OpenHelper>) {
        info!("设置数据库打开助手: {}", helper.database_name());
        *self.explicit_helper.write() = Some(helper);
        *self.open_helper.write() = None;
    }

    /// 显式设置的打开助手
    pub fn explicit_open_helper(&self) -> Option<Arc<dyn OpenHelper>> {
        self.explicit_helper.read().clone()
    }

    /// 获取打开助手
    ///
    /// 没有显式设置时，在受管组件中查找声明了 `dyn OpenHelper` 能力的实例。
    pub fn connect_open_helper(
        &self,
        registry: &dyn BeanRegistry,
    ) -> Result<Arc<dyn OpenHelper>, ContextError> {
        if let Some(helper) = self.open_helper.read().clone() {
            return Ok(helper);
        }

        let helper = self
            .explicit_open_helper()
            .or_else(|| registry.resolve::<dyn OpenHelper>())
            .or_else(|| {
                registry
                    .providers_of(TypeId::of::<dyn OpenHelper>())
                    .into_iter()
                    .last()
                    .and_then(|(_, handle)| handle.downcast_ref::<Arc<dyn OpenHelper>>().cloned())
            })
            .ok_or(ContextError::NoOpenHelper)?;

        debug!("使用数据库打开助手: {}", helper.database_name());
        *self.open_helper.write() = Some(Arc::clone(&helper));
        Ok(helper)
    }

    /// 获取数据库句柄，首次调用时通过打开助手建立连接
    pub fn connect_data_handle(
        &self,
        registry: &dyn BeanRegistry,
    ) -> Result<Arc<dyn DataHandle>, ContextError> {
        let mut handle = self.data_handle.lock();
        if let Some(existing) = handle.as_ref() {
            if existing.is_open() {
                return Ok(Arc::clone(existing));
            }
        }

        let helper = self.connect_open_helper(registry)?;
        let connected = helper
            .connect()
            .map_err(|e| ContextError::DataHandleUnavailable {
                source: Box::new(e),
            })?;
        info!("连接数据库: {}", helper.database_name());
        *handle = Some(Arc::clone(&connected));
        Ok(connected)
    }

    /// 是否已建立连接
    pub fn is_connected(&self) -> bool {
        self.data_handle
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.is_open())
    }

    /// 关闭数据库句柄并丢弃从组件中找到的打开助手
    pub fn close(&self) -> Result<(), BeanDestructionError> {
        *self.open_helper.write() = None;
        let Some(handle) = self.data_handle.lock().take() else {
            return Ok(());
        };
        if !handle.is_open() {
            warn!("数据库句柄已关闭");
            return Ok(());
        }
        info!("关闭数据库句柄");
        handle
            .close()
            .map_err(|e| BeanDestructionError::DataHandleCloseFailed {
                source: Box::new(e),
            })
    }
}
