//! 持久化字段描述
//!
//! [`FieldList`] 按字段序号排序，用于生成投影列和插入/更新的占位符。

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// 字段列表错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldListError {
    #[error("字段列表 {binder} 已锁定, 不能再添加字段")]
    Locked { binder: String },

    #[error("字段 {field} 在 {binder} 中重复")]
    Duplicate { binder: String, field: String },
}

/// 持久化字段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    index: Option<usize>,
    key: bool,
}

impl Field {
    /// 普通字段
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
            key: false,
        }
    }

    /// 主键字段
    pub fn key(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
            key: true,
        }
    }

    /// 未指定序号的字段，加入列表时按位置分配
    pub fn unindexed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
            key: false,
        }
    }

    /// 字段名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 字段序号
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// 是否为主键
    pub fn is_key(&self) -> bool {
        self.key
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 字段列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList {
    binder: String,
    fields: Vec<Field>,
    locked: bool,
}

impl FieldList {
    /// 创建可继续添加字段的列表
    pub fn new(binder: impl Into<String>) -> Self {
        Self {
            binder: binder.into(),
            fields: Vec::new(),
            locked: false,
        }
    }

    /// 创建并锁定列表
    pub fn locked<I>(binder: impl Into<String>, fields: I) -> Result<Self, FieldListError>
    where
        I: IntoIterator<Item = Field>,
    {
        let mut list = Self::new(binder);
        list.add_all(fields)?;
        list.locked = true;
        Ok(list)
    }

    /// 列表名称
    pub fn binder(&self) -> &str {
        &self.binder
    }

    /// 是否已锁定
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// 锁定列表
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// 添加字段
    pub fn add(&mut self, field: Field) -> Result<(), FieldListError> {
        if self.locked {
            return Err(FieldListError::Locked {
                binder: self.binder.clone(),
            });
        }

        let field = match field.index {
            Some(_) => field,
            None => Field {
                index: Some(self.fields.len()),
                ..field
            },
        };

        if self.fields.iter().any(|f| f.name == field.name) {
            return Err(FieldListError::Duplicate {
                binder: self.binder.clone(),
                field: field.name,
            });
        }

        let position = self.fields.partition_point(|f| f <= &field);
        self.fields.insert(position, field);
        Ok(())
    }

    /// 批量添加字段
    pub fn add_all<I>(&mut self, fields: I) -> Result<(), FieldListError>
    where
        I: IntoIterator<Item = Field>,
    {
        for field in fields {
            self.add(field)?;
        }
        Ok(())
    }

    /// 继承另一个列表的全部字段
    pub fn extend_from(&mut self, parent: &Self) -> Result<(), FieldListError> {
        self.add_all(parent.fields.iter().cloned())
    }

    /// 按序号排列的字段
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 字段数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 按名称查找字段
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 字段名列表
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    /// 逗号分隔的字段名
    pub fn field_names_joined(&self) -> String {
        self.field_names().join(",")
    }

    /// 逗号分隔的非主键字段名
    pub fn field_names_without_key(&self) -> String {
        self.fields
            .iter()
            .filter(|f| !f.key)
            .map(Field::name)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// 与字段数量相同的 `?` 占位符
    pub fn placeholders(&self) -> String {
        vec!["?"; self.fields.len()].join(",")
    }

    /// 与非主键字段数量相同的 `?` 占位符
    pub fn placeholders_without_key(&self) -> String {
        let count = self.fields.iter().filter(|f| !f.key).count();
        vec!["?"; count].join(",")
    }

    /// 检查序号是否连续，返回位置不正确的字段名
    pub fn validate(&self) -> Vec<String> {
        let mut misplaced = Vec::new();
        for (position, field) in self.fields.iter().enumerate() {
            if field.index != Some(position) {
                warn!(
                    "{} 的字段 {} 序号为 {:?}, 应为 {}",
                    self.binder, field.name, field.index, position
                );
                misplaced.push(field.name.clone());
            }
        }
        misplaced
    }
}
