//! 容器配置定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 纯文本
    Plain,
    /// JSON
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Plain
    }
}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 应用名称
    pub application_name: String,
    /// 数据库名称
    pub database_name: String,
    /// 注入字段加锁的最长等待时间（毫秒）
    pub slot_lock_timeout_ms: u64,
    /// 日志过滤规则
    pub log_filter: String,
    /// 日志输出格式
    pub log_format: LogFormat,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            application_name: "lorn-app".to_string(),
            database_name: "lorn.db".to_string(),
            slot_lock_timeout_ms: 500,
            log_filter: "info".to_string(),
            log_format: LogFormat::Plain,
        }
    }
}

impl ContainerConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置应用名称
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// 设置数据库名称
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// 设置注入字段加锁超时
    pub fn with_slot_lock_timeout(mut self, timeout: Duration) -> Self {
        self.slot_lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// 注入字段加锁超时
    pub fn slot_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.slot_lock_timeout_ms)
    }
}
