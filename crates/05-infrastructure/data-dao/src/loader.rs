//! 基于 DAO 的引用加载器

use crate::base_dao::Dao;
use data_abstractions::ReferenceLoader;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// 通过 DAO 按主键加载实体
///
/// 加载失败只记录日志并视为目标不存在。
pub struct DaoReferenceLoader<D> {
    dao: Arc<D>,
    id: i64,
}

impl<D: Dao> DaoReferenceLoader<D> {
    /// 创建加载器
    pub fn new(dao: Arc<D>, id: i64) -> Self {
        Self { dao, id }
    }
}

impl<D: Dao> ReferenceLoader<D::Entity> for DaoReferenceLoader<D> {
    fn load_object(&self) -> Option<D::Entity> {
        trace!("通过 DAO 加载引用: {} (id={})", self.dao.base().table_name(), self.id);
        match self.dao.base().get_by_id(self.id) {
            Ok(item) => item,
            Err(e) => {
                warn!(
                    "加载引用 {} (id={}) 失败: {}",
                    self.dao.base().table_name(),
                    self.id,
                    e
                );
                None
            }
        }
    }

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }
}

impl<D: Dao> fmt::Debug for DaoReferenceLoader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaoReferenceLoader")
            .field("table", &self.dao.base().table_name())
            .field("id", &self.id)
            .finish()
    }
}
