//! 内置的配置参数 DAO
//!
//! 在应用自己的数据库中保存键值对形式的配置参数。建议在它之上包装一个服务组件，
//! 负责把字符串值转换为具体类型。

use crate::base_dao::{BaseDao, Dao};
use crate::error::DaoResult;
use data_abstractions::{
    ContentValues, Entity, Field, FieldList, ModelBase, Row, RowMapper, StoreResult, Value,
    ID_COLUMN,
};
use di_abstractions::{Bean, BeanDescriptor, Injectable};
use tracing::debug;

/// 配置表名
pub const CONFIGURATION_TABLE: &str = "configuration";
/// 参数名列
pub const CONFIG_PARAMETER_COLUMN: &str = "config_parameter";
/// 参数值列
pub const CONFIG_PARAMETER_VALUE_COLUMN: &str = "config_parameter_value";

/// 配置参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationParameter {
    model: ModelBase,
    /// 参数名
    pub parameter: String,
    /// 参数值
    pub value: Option<String>,
}

impl ConfigurationParameter {
    /// 创建尚未保存的参数
    pub fn new(parameter: impl Into<String>, value: Option<String>) -> Self {
        Self {
            model: ModelBase::new(CONFIGURATION_TABLE),
            parameter: parameter.into(),
            value,
        }
    }
}

impl Entity for ConfigurationParameter {
    fn model(&self) -> &ModelBase {
        &self.model
    }

    fn model_mut(&mut self) -> &mut ModelBase {
        &mut self.model
    }
}

/// 配置参数的行映射
#[derive(Debug, Clone)]
pub struct ConfigurationRowMapper {
    fields: FieldList,
}

impl ConfigurationRowMapper {
    /// 创建行映射
    pub fn new() -> DaoResult<Self> {
        let mut fields = FieldList::new("ConfigurationParameter");
        fields.extend_from(&ModelBase::field_list()?)?;
        fields.add(Field::unindexed(CONFIG_PARAMETER_COLUMN))?;
        fields.add(Field::unindexed(CONFIG_PARAMETER_VALUE_COLUMN))?;
        fields.lock();
        Ok(Self { fields })
    }
}

impl RowMapper<ConfigurationParameter> for ConfigurationRowMapper {
    fn table_name(&self) -> &str {
        CONFIGURATION_TABLE
    }

    fn field_list(&self) -> &FieldList {
        &self.fields
    }

    fn from_row(&self, row: &Row) -> StoreResult<ConfigurationParameter> {
        Ok(ConfigurationParameter {
            model: ModelBase::persisted(CONFIGURATION_TABLE, row.get_i64(ID_COLUMN)?),
            parameter: row.get_str(CONFIG_PARAMETER_COLUMN)?.to_string(),
            value: row
                .get(CONFIG_PARAMETER_VALUE_COLUMN)
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn to_values(&self, item: &ConfigurationParameter) -> ContentValues {
        let mut values = ContentValues::new();
        values.insert(
            CONFIG_PARAMETER_COLUMN.to_string(),
            Value::from(item.parameter.as_str()),
        );
        values.insert(
            CONFIG_PARAMETER_VALUE_COLUMN.to_string(),
            Value::from(item.value.clone()),
        );
        values
    }

    fn name_field(&self) -> Option<&Field> {
        self.fields.field(CONFIG_PARAMETER_COLUMN)
    }
}

/// 配置参数 DAO
#[derive(Debug, Injectable)]
pub struct ConfigurationDao {
    #[injectable(inherit)]
    base: BaseDao<ConfigurationParameter>,
}

impl ConfigurationDao {
    /// 创建 DAO
    pub fn try_new() -> DaoResult<Self> {
        Ok(Self {
            base: BaseDao::new(ConfigurationRowMapper::new()?),
        })
    }

    /// 读取参数值
    pub fn get_value(&self, parameter: &str) -> DaoResult<Option<String>> {
        Ok(self
            .base
            .get_by_name(parameter)?
            .and_then(|found| found.value))
    }

    /// 写入参数值，参数不存在时新建
    pub fn set_value(&self, parameter: &str, value: Option<String>) -> DaoResult<()> {
        let mut item = match self.base.get_by_name(parameter)? {
            Some(mut existing) => {
                existing.value = value;
                existing
            }
            None => ConfigurationParameter::new(parameter, value),
        };
        debug!("写入配置参数: {}", parameter);
        self.base.save(&mut item, None)
    }
}

impl Dao for ConfigurationDao {
    type Entity = ConfigurationParameter;

    fn base(&self) -> &BaseDao<ConfigurationParameter> {
        &self.base
    }
}

impl Bean for ConfigurationDao {
    fn descriptor() -> BeanDescriptor<Self> {
        BeanDescriptor::new().try_constructor(|| Ok(Self::try_new()?))
    }
}
