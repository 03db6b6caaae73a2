//! 容器配置加载
//!
//! 按顺序合并可选的 `config/app`、`config/local` 文件（TOML/JSON/YAML）以及
//! `LORN_` 前缀的环境变量，后加载的来源覆盖先加载的来源。

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use infrastructure_common::{ConfigError, ConfigResult, ContainerConfig};
use std::path::Path;
use tracing::{debug, error, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LORN";

/// 环境变量中嵌套键的分隔符
pub const ENV_SEPARATOR: &str = "__";

/// 默认的环境变量配置源
pub fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR)
}

/// 从默认位置加载配置，文件都不存在时使用默认值
pub fn load_settings() -> ConfigResult<ContainerConfig> {
    let builder = Config::builder()
        .add_source(File::with_name("config/app").required(false))
        .add_source(File::with_name("config/local").required(false));
    load(builder, environment_source())
}

/// 从指定文件加载配置，文件格式由扩展名决定
pub fn load_settings_from(path: impl AsRef<Path>) -> ConfigResult<ContainerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    info!("加载配置文件: {}", path.display());
    let builder = Config::builder().add_source(File::from(path).required(true));
    load(builder, environment_source())
}

pub(crate) fn load(
    builder: ConfigBuilder<DefaultState>,
    environment: Environment,
) -> ConfigResult<ContainerConfig> {
    let settings = builder.add_source(environment).build().map_err(|e| {
        error!("配置构建失败: {}", e);
        ConfigError::LoadFailed {
            source: Box::new(e),
        }
    })?;

    let config: ContainerConfig = settings.try_deserialize().map_err(|e| {
        error!("配置绑定失败: {}", e);
        ConfigError::LoadFailed {
            source: Box::new(e),
        }
    })?;

    validate(&config)?;
    debug!("配置加载完成: {:?}", config);
    Ok(config)
}

/// 检查配置取值
pub fn validate(config: &ContainerConfig) -> ConfigResult<()> {
    if config.application_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            message: "application_name 不能为空".to_string(),
        });
    }
    if config.database_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            message: "database_name 不能为空".to_string(),
        });
    }
    if config.slot_lock_timeout_ms == 0 {
        return Err(ConfigError::ValidationError {
            message: "slot_lock_timeout_ms 必须大于 0".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrastructure_common::LogFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn isolated_environment(pairs: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        environment_source().source(Some(source))
    }

    fn settings_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let file = settings_file(
            ".toml",
            "application_name = \"notes\"\nlog_format = \"json\"\n",
        );
        let builder = Config::builder().add_source(File::from(file.path()));

        let config = load(builder, isolated_environment(&[])).unwrap();

        assert_eq!(config.application_name, "notes");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_name, ContainerConfig::default().database_name);
    }

    #[test]
    fn environment_overrides_file() {
        let file = settings_file(
            ".json",
            &serde_json::json!({ "database_name": "file.db" }).to_string(),
        );
        let builder = Config::builder().add_source(File::from(file.path()));

        let config = load(
            builder,
            isolated_environment(&[("LORN_DATABASE_NAME", "env.db")]),
        )
        .unwrap();

        assert_eq!(config.database_name, "env.db");
    }

    #[test]
    fn missing_file_is_reported() {
        let result = load_settings_from("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file = settings_file(".toml", "slot_lock_timeout_ms = 0\n");
        let builder = Config::builder().add_source(File::from(file.path()));

        let result = load(builder, isolated_environment(&[]));

        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn malformed_file_fails_to_load() {
        let file = settings_file(".toml", "application_name = [unterminated\n");
        let builder = Config::builder().add_source(File::from(file.path()));

        let result = load(builder, isolated_environment(&[]));

        assert!(matches!(result, Err(ConfigError::LoadFailed { .. })));
    }
}
