//! 数据访问错误类型

use data_abstractions::{FieldListError, StoreError};
use infrastructure_common::InjectionError;
use thiserror::Error;

/// 数据访问错误类型
#[derive(Error, Debug)]
pub enum DaoError {
    #[error("查询 {table}.{column} 返回了 {count} 行, 期望至多一行")]
    NotUnique {
        table: String,
        column: String,
        count: usize,
    },

    #[error("实体 {entity} (id={id}) 版本冲突: 期望 {expected}, 存储中为 {found:?}")]
    OptimisticLock {
        entity: String,
        id: i64,
        expected: i64,
        found: Option<i64>,
    },

    #[error("表 {table} 没有定义名称字段")]
    NoNameField { table: String },

    #[error("实体 {entity} 的行映射不支持修改时间查询")]
    TimestampsUnsupported { entity: String },

    #[error("字段定义错误: {source}")]
    Mapping {
        #[from]
        source: FieldListError,
    },

    #[error("存储错误: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    #[error("数据库句柄不可用: {source}")]
    Injection {
        #[from]
        source: InjectionError,
    },
}

/// 数据访问结果类型别名
pub type DaoResult<T> = Result<T, DaoError>;
