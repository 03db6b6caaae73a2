//! 行存储接口
//!
//! 容器只通过这里的窄接口使用底层数据库：查询执行、游标和事务机制都属于存储实现。

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("数据库句柄已关闭")]
    Closed,

    #[error("表不存在: {table}")]
    TableNotFound { table: String },

    #[error("列 {column} 缺失或类型错误")]
    ColumnMismatch { column: String },

    #[error("没有活动的事务")]
    NoActiveTransaction,

    #[error("存储后端错误: {message}")]
    Backend { message: String },
}

/// 存储结果类型别名
pub type StoreResult<T> = Result<T, StoreError>;

/// 列值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// 是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 读取整数
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// 读取浮点数
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// 读取文本
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// 读取以毫秒整数保存的时间戳
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        self.as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }

    /// 以毫秒整数保存时间戳
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Self::Integer(at.timestamp_millis())
    }

    pub(crate) fn partial_cmp_value(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// 写入的列值集合
pub type ContentValues = BTreeMap<String, Value>;

/// 查询结果行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    /// 创建空行
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置列值
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    /// 读取列值
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// 读取整数列
    pub fn get_i64(&self, column: &str) -> StoreResult<i64> {
        self.get(column)
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::ColumnMismatch {
                column: column.to_string(),
            })
    }

    /// 读取文本列
    pub fn get_str(&self, column: &str) -> StoreResult<&str> {
        self.get(column)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::ColumnMismatch {
                column: column.to_string(),
            })
    }

    /// 读取可空的时间戳列
    pub fn get_timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        self.get(column).and_then(Value::as_timestamp)
    }

    /// 列迭代器
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<ContentValues> for Row {
    fn from(columns: ContentValues) -> Self {
        Self { columns }
    }
}

/// 单个过滤条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// 列等于
    Eq(String, Value),
    /// 列大于
    Gt(String, Value),
    /// 文本列匹配 LIKE 模式，`%` 匹配任意长度，`_` 匹配单个字符，忽略 ASCII 大小写
    Like(String, String),
}

impl Condition {
    /// 行是否满足条件
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Eq(column, value) => row.get(column) == Some(value),
            Self::Gt(column, value) => row
                .get(column)
                .and_then(|actual| actual.partial_cmp_value(value))
                .is_some_and(std::cmp::Ordering::is_gt),
            Self::Like(column, pattern) => row
                .get(column)
                .and_then(Value::as_str)
                .is_some_and(|text| like_matches(text, pattern)),
        }
    }
}

fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p).copied() {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(c) if c == '_' || c.eq_ignore_ascii_case(&text[t]) => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

/// 过滤条件，条件之间为 AND 关系
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    conditions: Vec<Condition>,
}

impl Selection {
    /// 匹配所有行
    pub fn all() -> Self {
        Self::default()
    }

    /// 列等于指定值
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(column, value)
    }

    /// 列大于指定值
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_gt(column, value)
    }

    /// 追加等值条件
    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.into(), value.into()));
        self
    }

    /// 文本列匹配 LIKE 模式
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::all().and_like(column, pattern)
    }

    /// 追加 LIKE 条件
    pub fn and_like(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.conditions
            .push(Condition::Like(column.into(), pattern.into()));
        self
    }

    /// 追加大于条件
    pub fn and_gt(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Gt(column.into(), value.into()));
        self
    }

    /// 条件列表
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// 行是否满足全部条件
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// 生成带 `?` 占位符的 SQL 条件子句及参数
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut args = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            match condition {
                Condition::Eq(column, value) => {
                    clauses.push(format!("{column} = ?"));
                    args.push(value.clone());
                }
                Condition::Gt(column, value) => {
                    clauses.push(format!("{column} > ?"));
                    args.push(value.clone());
                }
                Condition::Like(column, pattern) => {
                    clauses.push(format!("{column} LIKE ?"));
                    args.push(Value::from(pattern.as_str()));
                }
            }
        }
        (clauses.join(" AND "), args)
    }
}

/// 查询描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// 表名
    pub table: String,
    /// 投影列，为空表示全部列
    pub columns: Vec<String>,
    /// 过滤条件
    pub selection: Selection,
    /// 排序列
    pub order_by: Option<String>,
}

impl Query {
    /// 查询整张表
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            selection: Selection::all(),
            order_by: None,
        }
    }

    /// 设置投影列
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// 设置过滤条件
    pub fn filter(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// 设置排序列
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }
}

/// 数据库句柄
///
/// 对应一个已打开的行存储连接，由 [`OpenHelper`] 创建并由容器持有。
pub trait DataHandle: Send + Sync {
    /// 执行查询
    fn query(&self, query: &Query) -> StoreResult<Vec<Row>>;

    /// 插入一行，返回新行的主键
    fn insert(&self, table: &str, values: &ContentValues) -> StoreResult<i64>;

    /// 更新满足条件的行，返回受影响行数
    fn update(&self, table: &str, values: &ContentValues, selection: &Selection)
        -> StoreResult<usize>;

    /// 删除满足条件的行，返回受影响行数
    fn delete(&self, table: &str, selection: &Selection) -> StoreResult<usize>;

    /// 开启事务
    fn begin_transaction(&self) -> StoreResult<()>;

    /// 标记当前事务成功
    fn set_transaction_successful(&self) -> StoreResult<()>;

    /// 结束事务；未标记成功时回滚
    fn end_transaction(&self) -> StoreResult<()>;

    /// 关闭句柄
    fn close(&self) -> StoreResult<()>;

    /// 句柄是否仍然可用
    fn is_open(&self) -> bool;
}

/// 数据库打开助手
pub trait OpenHelper: Send + Sync {
    /// 数据库名称
    fn database_name(&self) -> &str;

    /// 打开数据库，返回可写句柄
    fn connect(&self) -> StoreResult<Arc<dyn DataHandle>>;
}
