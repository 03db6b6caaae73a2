//! 行映射

use crate::field::{Field, FieldList};
use crate::store::{ContentValues, Row, StoreResult};

/// 实体与存储行之间的映射
pub trait RowMapper<E>: Send + Sync {
    /// 表名
    fn table_name(&self) -> &str;

    /// 实体的全部字段
    fn field_list(&self) -> &FieldList;

    /// 从行构造实体
    fn from_row(&self, row: &Row) -> StoreResult<E>;

    /// 实体的列值，不含主键
    fn to_values(&self, item: &E) -> ContentValues;

    /// 名称字段，支持按名称查询时提供
    fn name_field(&self) -> Option<&Field> {
        None
    }

    /// 创建时间字段
    fn creation_date_field(&self) -> Option<&Field> {
        None
    }

    /// 最后修改时间字段
    fn last_modification_date_field(&self) -> Option<&Field> {
        None
    }
}
