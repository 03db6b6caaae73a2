//! # 容器组合层
//!
//! 把配置加载、日志初始化、容器组装和界面事件泵组合成宿主应用的启动入口。
//!
//! ## 基本使用
//!
//! ```rust,ignore
//! use infrastructure_composition::{ApplicationBootstrapper, SurfaceEventPump};
//!
//! let (pump, sender) = SurfaceEventPump::channel();
//! let context = ApplicationBootstrapper::new()
//!     .register_component::<CustomerDao>()
//!     .with_lifecycle_source(pump.clone())
//!     .bootstrap()?;
//!
//! tokio::spawn(async move { pump.run().await });
//! sender.send(SurfaceEvent::Created, main_screen);
//! ```

pub mod bootstrapper;
pub mod logging;
pub mod pump;
pub mod settings;

pub use bootstrapper::{shutdown, ApplicationBootstrapper};
pub use logging::{init_tracing, validate_filter};
pub use pump::{SurfaceEventPump, SurfaceEventSender};
pub use settings::{load_settings, load_settings_from, ENV_PREFIX};
