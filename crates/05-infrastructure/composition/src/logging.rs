//! 日志初始化

use infrastructure_common::{ConfigError, ConfigResult, ContainerConfig, LogFormat};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// 按配置安装全局 tracing 订阅者
///
/// `RUST_LOG` 存在时优先于配置中的过滤规则。已经安装过订阅者时返回 `Ok(false)`。
pub fn init_tracing(config: &ContainerConfig) -> ConfigResult<bool> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.log_filter),
    }
    .map_err(|e| ConfigError::LoggingInitFailed {
        message: e.to_string(),
    })?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match config.log_format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Plain => subscriber.try_init(),
    };

    match installed {
        Ok(()) => {
            debug!("日志系统初始化完成: {:?}", config.log_format);
            Ok(true)
        }
        Err(e) => {
            debug!("日志订阅者已存在, 跳过初始化: {}", e);
            Ok(false)
        }
    }
}

/// 检查过滤规则是否可以解析
pub fn validate_filter(directives: &str) -> ConfigResult<()> {
    EnvFilter::try_new(directives)
        .map(|_| ())
        .map_err(|e| ConfigError::LoggingInitFailed {
            message: e.to_string(),
        })
}
