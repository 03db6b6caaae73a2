//! 实体基类型
//!
//! 所有持久化实体都内嵌一个 [`ModelBase`]，按需内嵌 [`Timestamps`] 和 [`OptimisticLock`]。

use crate::field::{Field, FieldList, FieldListError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 主键列名
pub const ID_COLUMN: &str = "_id";
/// 创建时间列名
pub const CREATION_DATE_COLUMN: &str = "creation_date";
/// 最后修改时间列名
pub const LAST_MODIFICATION_DATE_COLUMN: &str = "last_modification_date";
/// 乐观锁版本列名
pub const VERSION_COLUMN: &str = "version";

/// 实体公共部分：主键、持久化状态、表名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBase {
    id: Option<i64>,
    transient: bool,
    table: String,
}

impl ModelBase {
    /// 创建尚未持久化的实体基
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            id: None,
            transient: true,
            table: table.into(),
        }
    }

    /// 从存储中读出的实体基
    pub fn persisted(table: impl Into<String>, id: i64) -> Self {
        Self {
            id: Some(id),
            transient: false,
            table: table.into(),
        }
    }

    /// 主键
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// 设置主键
    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// 是否尚未持久化
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// 设置持久化状态
    pub fn set_transient(&mut self, transient: bool) {
        self.transient = transient;
    }

    /// 表名
    pub fn table(&self) -> &str {
        &self.table
    }

    /// 主键字段列表
    pub fn field_list() -> Result<FieldList, FieldListError> {
        FieldList::locked("ModelBase", [Field::key(ID_COLUMN, 0)])
    }
}

/// 创建和修改时间
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// 创建时间
    pub created: Option<DateTime<Utc>>,
    /// 最后修改时间
    pub modified: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// 首次保存时写入两个时间
    pub fn touch_created(&mut self, now: DateTime<Utc>) {
        self.created = Some(now);
        self.modified = Some(now);
    }

    /// 更新时刷新修改时间
    pub fn touch_modified(&mut self, now: DateTime<Utc>) {
        self.modified = Some(now);
    }
}

/// 乐观锁版本号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimisticLock {
    /// 当前版本
    pub version: i64,
}

impl OptimisticLock {
    /// 版本号字段，不属于主键
    pub fn field(index: usize) -> Field {
        Field::new(VERSION_COLUMN, index)
    }
}

/// 持久化实体
pub trait Entity: Send + Sync + 'static {
    /// 实体基
    fn model(&self) -> &ModelBase;

    /// 可变实体基
    fn model_mut(&mut self) -> &mut ModelBase;

    /// 时间戳，不支持时返回 `None`
    fn timestamps(&self) -> Option<&Timestamps> {
        None
    }

    /// 可变时间戳
    fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
        None
    }

    /// 乐观锁，不支持时返回 `None`
    fn optimistic_lock(&self) -> Option<&OptimisticLock> {
        None
    }

    /// 可变乐观锁
    fn optimistic_lock_mut(&mut self) -> Option<&mut OptimisticLock> {
        None
    }

    /// 主键
    fn id(&self) -> Option<i64> {
        self.model().id()
    }

    /// 是否尚未持久化
    fn is_transient(&self) -> bool {
        self.model().is_transient()
    }
}
