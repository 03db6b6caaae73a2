//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义按类型注入的核心接口。
//!
//! ## 核心接口
//!
//! - [`Inject`] / [`Injectable`] - 注入字段与注入元数据表
//! - [`BeanDescriptor`] / [`BeanDefinition`] - 组件描述
//! - [`BeanRegistry`] - 组件注册表接口
//! - [`InstantiationStrategy`] - 实例化策略接口
//! - [`LifecycleSource`] - UI 界面生命周期事件源
//! - [`EntityEventSink`] - 数据变更事件出口

extern crate self as di_abstractions;

pub mod context;
pub mod descriptor;
pub mod factory;
pub mod inject;
pub mod registry;
pub mod signalling;
pub mod surface;

pub use context::*;
pub use descriptor::*;
pub use factory::*;
pub use inject::*;
pub use registry::*;
pub use signalling::*;
pub use surface::*;

pub use component_macros::{Bean, Injectable};
