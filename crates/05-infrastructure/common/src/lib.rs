//! # Infrastructure Common
//!
//! 这个 crate 提供了容器各层共享的基础类型。
//!
//! ## 核心组件
//!
//! - [`TypeInfo`] - 组件类型标识
//! - [`PostConstruct`] / [`PreDestroy`] - 组件生命周期回调
//! - [`ContainerConfig`] - 容器配置
//! - [`ContainerError`] - 容器错误分类

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
