//! # Data DAO
//!
//! 实体持久化的通用实现：增删改查、事务、乐观锁、时间戳，以及基于 DAO 的
//! 延迟引用和延迟集合。
//!
//! ## 核心组件
//!
//! - [`BaseDao`] - 通用数据访问对象，数据库句柄和事件出口由容器注入
//! - [`TxHandle`] - 事务句柄
//! - [`Dao`] - 具体 DAO 的公共接口，提供延迟原语的构造方法
//! - [`ConfigurationDao`] - 内置的配置参数 DAO
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! #[derive(Debug, Injectable)]
//! pub struct CustomerDao {
//!     #[injectable(inherit)]
//!     base: BaseDao<Customer>,
//! }
//!
//! let mut customer = Customer::new("Ada");
//! dao.base().save(&mut customer, None)?;
//! let orders = dao.lazy_collection_by_field(&ORDER_CUSTOMER_FIELD, customer.id().unwrap_or_default());
//! ```

pub mod base_dao;
pub mod configuration;
pub mod error;
pub mod loader;

pub use base_dao::{BaseDao, Dao, TxHandle};
pub use configuration::{
    ConfigurationDao, ConfigurationParameter, ConfigurationRowMapper, CONFIGURATION_TABLE,
};
pub use error::{DaoError, DaoResult};
pub use loader::DaoReferenceLoader;
