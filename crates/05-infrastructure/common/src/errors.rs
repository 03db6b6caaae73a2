//! 错误类型定义

use thiserror::Error;

/// 用户回调和钩子返回的通用错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置加载失败: {source}")]
    LoadFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },

    #[error("日志初始化失败: {message}")]
    LoggingInitFailed { message: String },
}

/// 组件实例化错误类型
#[derive(Error, Debug)]
pub enum InstantiationError {
    #[error("组件没有可用的构造函数: {type_name}")]
    NoUsableConstructor { type_name: String },

    #[error("组件构造失败: {type_name}, 原因: {source}")]
    ConstructionFailed {
        type_name: String,
        source: BoxError,
    },

    #[error("组件未注册: {type_name}")]
    NotRegistered { type_name: String },
}

/// 注入错误类型
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("注入目标 {target} 的字段 {field} ({declared}) 存在多个候选: {candidates:?}")]
    Ambiguous {
        target: String,
        field: String,
        declared: String,
        candidates: Vec<String>,
    },

    #[error("注入目标 {target} 的字段 {field} 类型不匹配, 期望 {declared}")]
    TypeMismatch {
        target: String,
        field: String,
        declared: String,
    },

    #[error("注入目标 {target} 的字段 {field} 访问超时")]
    SlotAccess { target: String, field: String },

    #[error("依赖尚未注入: {declared}")]
    NotInjected { declared: String },

    #[error("注入目标 {target} 的字段 {field} 基础设施不可用: {source}")]
    Infrastructure {
        target: String,
        field: String,
        source: BoxError,
    },
}

/// 注册错误类型
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("类型不兼容: {implementation} 没有声明 {supertype} 能力")]
    IncompatibleTypes {
        supertype: String,
        implementation: String,
    },

    #[error("组件注册失败: {type_name}, 原因: {message}")]
    Rejected { type_name: String, message: String },
}

/// 上下文错误类型
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("应用上下文尚未创建, 无法执行: {operation}")]
    ContextNotYetCreated { operation: String },

    #[error("未配置数据库打开助手")]
    NoOpenHelper,

    #[error("数据库连接失败: {source}")]
    DataHandleUnavailable { source: BoxError },
}

/// 组件销毁错误类型
#[derive(Error, Debug)]
pub enum BeanDestructionError {
    #[error("组件注出失败: {type_name}, 原因: {source}")]
    OutjectionFailed {
        type_name: String,
        #[source]
        source: InjectionError,
    },

    #[error("组件销毁回调失败: {type_name}, 原因: {source}")]
    PreDestroyFailed {
        type_name: String,
        source: BoxError,
    },

    #[error("数据库句柄关闭失败: {source}")]
    DataHandleCloseFailed { source: BoxError },
}

/// 容器错误类型
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("实例化错误: {source}")]
    Instantiation {
        #[from]
        source: InstantiationError,
    },

    #[error("注入错误: {source}")]
    Injection {
        #[from]
        source: InjectionError,
    },

    #[error("注册错误: {source}")]
    Registration {
        #[from]
        source: RegistrationError,
    },

    #[error("上下文错误: {source}")]
    Context {
        #[from]
        source: ContextError,
    },

    #[error("销毁错误: {source}")]
    Destruction {
        #[from]
        source: BeanDestructionError,
    },

    #[error("初始化回调失败: {type_name}, 原因: {source}")]
    PostConstructFailed {
        type_name: String,
        source: BoxError,
    },

    #[error("上下文初始化器执行失败: {source}")]
    InitializerFailed { source: BoxError },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("容器错误: {source}")]
    ContainerError {
        #[from]
        source: ContainerError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("基础设施关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type InstantiationResult<T> = Result<T, InstantiationError>;
pub type InjectionResult<T> = Result<T, InjectionError>;
pub type RegistrationResult<T> = Result<T, RegistrationError>;
pub type ContainerResult<T> = Result<T, ContainerError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
