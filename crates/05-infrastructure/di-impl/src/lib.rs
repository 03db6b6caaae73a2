//! # 依赖注入具体实现
//!
//! 提供组件注册表、实例化策略、按类型注入引擎、界面跟踪、事件总线、
//! 生命周期协调器，以及宿主应用使用的 [`ApplicationContext`] 和 [`ContainerBuilder`]。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use di_impl::ContainerBuilder;
//!
//! let context = ContainerBuilder::new()
//!     .register_component::<CustomerDao>()
//!     .register_binding::<dyn Greeter, EnglishGreeter>()
//!     .build()?;
//! context.activate();
//! context.initialize()?;
//! let greeter = context.resolve::<dyn Greeter>();
//! ```

pub mod builder;
pub mod context;
pub mod coordinator;
pub mod infrastructure;
pub mod injection;
pub mod instantiation;
pub mod registry;
pub mod signalling;
pub mod tracking;

pub use builder::{ContainerBuilder, Registration};
pub use context::ApplicationContext;
pub use coordinator::LifecycleCoordinator;
pub use infrastructure::DataInfrastructure;
pub use injection::{InjectionEngine, TargetKind};
pub use instantiation::DefaultInstantiationStrategy;
pub use registry::BeanRegistryImpl;
pub use signalling::EventBus;
pub use tracking::{SurfaceSet, SurfaceTracker};
