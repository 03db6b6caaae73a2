//! # Data Abstractions
//!
//! 数据访问层的抽象定义：行存储接口、持久化字段描述、实体基类型，
//! 以及延迟加载的引用和集合。
//!
//! ## 核心组件
//!
//! - [`DataHandle`] / [`OpenHelper`] - 行存储连接
//! - [`FieldList`] - 按序号排列的持久化字段
//! - [`Entity`] / [`ModelBase`] - 实体基类型
//! - [`LazyReference`] / [`LazyCollection`] - 一次性加载的延迟原语

pub mod collection;
pub mod field;
pub mod memory;
pub mod model;
pub mod reference;
pub mod row_mapper;
pub mod store;

pub use collection::*;
pub use field::*;
pub use memory::{MemoryDataHandle, MemoryDatabase};
pub use model::*;
pub use reference::*;
pub use row_mapper::*;
pub use store::*;
